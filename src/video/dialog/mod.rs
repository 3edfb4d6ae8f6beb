//! Dialog scripts: `## Section` headings and `label: text` /
//! `label(voice): text` lines, parsed in a single forward pass.
//!
//! Every line is first classified as a [`ScriptLine`]. Blank lines, comments
//! and prose that does not look like an utterance classify as
//! [`ScriptLine::Ignored`] so hand-edited scripts keep working.

mod compile;

use regex::Regex;

pub use self::compile::compile_segments;
use super::document::frontmatter::{lines_before, split_frontmatter};
use super::error::PipelineError;
use super::speakers::VoiceId;

const DEFAULT_SECTION: &str = "intro";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub speaker_label: String,
    pub speaker_override: Option<VoiceId>,
    pub text: String,
    pub section: String,
    /// 1-based line in the script file
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptLine<'a> {
    Heading {
        level: usize,
        title: &'a str,
    },
    Utterance {
        label: &'a str,
        voice: Option<&'a str>,
        text: &'a str,
    },
    Ignored,
}

pub struct ScriptClassifier {
    heading: Regex,
    utterance: Regex,
}

impl ScriptClassifier {
    pub fn new() -> Result<Self, PipelineError> {
        Ok(Self {
            heading: Regex::new(r"^(#{1,6})\s+(.+?)\s*$")?,
            utterance: Regex::new(
                r"^([A-Za-z][A-Za-z0-9_-]{0,15})(?:\(([^()]*)\))?\s*:\s*(.*?)\s*$",
            )?,
        })
    }

    pub fn classify<'a>(&self, line: &'a str) -> ScriptLine<'a> {
        let trimmed = line.trim_end();
        let lead = trimmed.trim_start();
        if lead.is_empty() || lead.starts_with("<!--") || lead.starts_with("//") {
            return ScriptLine::Ignored;
        }

        if let Some(caps) = self.heading.captures(trimmed) {
            let level = caps.get(1).map_or(0, |m| m.as_str().len());
            let title = caps.get(2).map_or("", |m| m.as_str());
            return ScriptLine::Heading { level, title };
        }

        if let Some(caps) = self.utterance.captures(trimmed) {
            let label = caps.get(1).map_or("", |m| m.as_str());
            let voice = caps.get(2).map(|m| m.as_str().trim());
            let text = caps.get(3).map_or("", |m| m.as_str());
            // `https://...` and friends are prose, not a speaker named `https`
            if text.starts_with("//") {
                return ScriptLine::Ignored;
            }
            return ScriptLine::Utterance { label, voice, text };
        }

        ScriptLine::Ignored
    }
}

/// Parses a dialog script into utterances in document order.
///
/// `#` is the document title and leaves the section alone; `##` and deeper
/// open a new section. Utterances before any section belong to `intro`.
pub fn parse_dialog(content: &str) -> Result<Vec<Utterance>, PipelineError> {
    let classifier = ScriptClassifier::new()?;
    let (_, body, body_offset) = split_frontmatter(content)?;
    let first_line = lines_before(content, body_offset) + 1;

    let mut section = DEFAULT_SECTION.to_string();
    let mut utterances = Vec::new();

    for (idx, raw) in body.lines().enumerate() {
        let line = first_line + idx;
        match classifier.classify(raw) {
            ScriptLine::Heading { level, title } => {
                if level >= 2 {
                    section = title.to_string();
                }
            }
            ScriptLine::Utterance { label, voice, text } => {
                let speaker_override = voice.map(|token| parse_voice(token, line)).transpose()?;
                if text.trim().is_empty() {
                    return Err(PipelineError::Parse {
                        line,
                        message: format!("utterance for `{label}` has no text"),
                    });
                }
                utterances.push(Utterance {
                    speaker_label: label.to_string(),
                    speaker_override,
                    text: text.trim().to_string(),
                    section: section.clone(),
                    line,
                });
            }
            ScriptLine::Ignored => {}
        }
    }

    Ok(utterances)
}

fn parse_voice(token: &str, line: usize) -> Result<VoiceId, PipelineError> {
    token.parse().map_err(|_| PipelineError::Parse {
        line,
        message: format!("voice override `{token}` is not a numeric voice id"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> ScriptClassifier {
        ScriptClassifier::new().unwrap()
    }

    #[test]
    fn classifies_each_line_kind() {
        let c = classifier();
        assert_eq!(
            c.classify("## Intro"),
            ScriptLine::Heading {
                level: 2,
                title: "Intro"
            }
        );
        assert_eq!(
            c.classify("B(8): Hi there."),
            ScriptLine::Utterance {
                label: "B",
                voice: Some("8"),
                text: "Hi there."
            }
        );
        assert_eq!(
            c.classify("A:Hello"),
            ScriptLine::Utterance {
                label: "A",
                voice: None,
                text: "Hello"
            }
        );
        assert_eq!(c.classify("https://example.com/post"), ScriptLine::Ignored);
        assert_eq!(c.classify(""), ScriptLine::Ignored);
        assert_eq!(c.classify("   "), ScriptLine::Ignored);
        assert_eq!(c.classify("<!-- note -->"), ScriptLine::Ignored);
        assert_eq!(c.classify("// TODO: rewrite"), ScriptLine::Ignored);
        assert_eq!(
            c.classify("Just some prose, no label."),
            ScriptLine::Ignored
        );
    }

    #[test]
    fn parses_scenario_script_in_order() {
        let utterances = parse_dialog("## Intro\nA: Hello.\nB(8): Hi there.").unwrap();
        assert_eq!(utterances.len(), 2);

        assert_eq!(utterances[0].speaker_label, "A");
        assert_eq!(utterances[0].speaker_override, None);
        assert_eq!(utterances[0].text, "Hello.");
        assert_eq!(utterances[0].section, "Intro");
        assert_eq!(utterances[0].line, 2);

        assert_eq!(utterances[1].speaker_label, "B");
        assert_eq!(utterances[1].speaker_override, Some(VoiceId(8)));
        assert_eq!(utterances[1].text, "Hi there.");
    }

    #[test]
    fn section_carries_forward_and_h1_is_not_a_section() {
        let script = "# Title\nA: before\n\n## Part one\nA: one\n\nstray prose\nB: two\n### Detail\nA: three\n";
        let utterances = parse_dialog(script).unwrap();
        let sections: Vec<_> = utterances.iter().map(|u| u.section.as_str()).collect();
        assert_eq!(sections, vec!["intro", "Part one", "Part one", "Detail"]);
    }

    #[test]
    fn empty_utterance_is_a_parse_error_with_line_number() {
        let err = parse_dialog("## Intro\nA: Hello.\n\nB:   \n").unwrap_err();
        match err {
            PipelineError::Parse { line, message } => {
                assert_eq!(line, 4);
                assert!(message.contains("`B`"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_numeric_override_is_a_parse_error() {
        let err = parse_dialog("A(narrator): Hello.").unwrap_err();
        assert!(matches!(err, PipelineError::Parse { line: 1, .. }));
    }

    #[test]
    fn front_matter_is_skipped_and_line_numbers_stay_absolute() {
        let script = "---\ntitle: Talk\n---\nA: Hello.\nB:\n";
        let utterances = parse_dialog("---\ntitle: Talk\n---\nA: Hello.\n").unwrap();
        assert_eq!(utterances[0].line, 4);

        let err = parse_dialog(script).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { line: 5, .. }));
    }

    #[test]
    fn unknown_labels_are_accepted_at_parse_time() {
        let utterances = parse_dialog("Zed: who am I").unwrap();
        assert_eq!(utterances[0].speaker_label, "Zed");
    }
}
