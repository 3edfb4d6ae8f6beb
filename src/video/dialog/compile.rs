use super::Utterance;
use crate::video::error::PipelineError;
use crate::video::segments::{Segment, SegmentCollection};
use crate::video::speakers::SpeakerMap;
use crate::video::support::utils::slugify;

const LABEL_SLUG_CHARS: usize = 24;

/// Turns parsed utterances into a fresh segment collection, one segment per
/// utterance, with every speaker resolved. Fails on the first label the map
/// cannot resolve.
pub fn compile_segments(
    utterances: &[Utterance],
    speakers: &SpeakerMap,
) -> Result<SegmentCollection, PipelineError> {
    let mut segments = Vec::with_capacity(utterances.len());
    for (idx, utterance) in utterances.iter().enumerate() {
        let voice = speakers.resolve_utterance(utterance)?;
        let mut segment = Segment::new(
            segment_id(idx + 1, &utterance.speaker_label),
            &utterance.text,
        );
        segment.speaker = Some(voice);
        segment.section = Some(utterance.section.clone());
        segments.push(segment);
    }
    SegmentCollection::new(segments)
}

fn segment_id(ordinal: usize, label: &str) -> String {
    let slug = slugify(label, LABEL_SLUG_CHARS);
    let slug = if slug.is_empty() { "spk".to_string() } else { slug };
    format!("{ordinal:04}_{slug}")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::video::dialog::parse_dialog;
    use crate::video::speakers::VoiceId;

    fn speakers(pairs: &[(&str, u32)], default: Option<u32>) -> SpeakerMap {
        let labels: BTreeMap<_, _> = pairs
            .iter()
            .map(|(label, id)| (label.to_string(), VoiceId(*id)))
            .collect();
        SpeakerMap::new(labels, default.map(VoiceId))
    }

    #[test]
    fn resolves_scenario_script() {
        let utterances = parse_dialog("## Intro\nA: Hello.\nB(8): Hi there.").unwrap();
        let collection = compile_segments(&utterances, &speakers(&[("A", 1)], Some(3))).unwrap();

        let resolved: Vec<_> = collection
            .iter()
            .map(|s| (s.speaker, s.text.as_str()))
            .collect();
        assert_eq!(
            resolved,
            vec![(Some(VoiceId(1)), "Hello."), (Some(VoiceId(8)), "Hi there.")]
        );

        let ids: Vec<_> = collection.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["0001_a", "0002_b"]);
        assert!(collection.iter().all(|s| s.section.as_deref() == Some("Intro")));
    }

    #[test]
    fn unmapped_label_without_default_names_the_label() {
        let utterances = parse_dialog("## Intro\nA: fine\nC: test").unwrap();
        let err = compile_segments(&utterances, &speakers(&[("A", 1)], None)).unwrap_err();
        assert!(err.to_string().starts_with("line 3: "), "{err}");
        match err {
            PipelineError::Resolution { label, known, line } => {
                assert_eq!(label, "C");
                assert_eq!(known, vec!["A".to_string()]);
                assert_eq!(line, Some(3));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn one_segment_per_utterance_in_order() {
        let script = "## One\nA: first\nnoise line\nB: second\n\n## Two\nA: third\n";
        let utterances = parse_dialog(script).unwrap();
        let collection = compile_segments(&utterances, &speakers(&[], Some(2))).unwrap();

        assert_eq!(collection.len(), utterances.len());
        let texts: Vec<_> = collection.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert_eq!(
            collection.get("0003_a").and_then(|s| s.section.as_deref()),
            Some("Two")
        );
    }

    #[test]
    fn ids_fall_back_when_label_has_no_slug() {
        assert_eq!(segment_id(7, "--"), "0007_spk");
        assert_eq!(segment_id(12, "Host"), "0012_host");
    }
}
