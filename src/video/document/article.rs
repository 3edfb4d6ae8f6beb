//! Markdown article outline: narration sections and image occurrences.
//!
//! Both carry byte positions into the full article file (front matter
//! included), so an image can later be matched to the section it appeared in.

use std::ops::Range;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use serde::Deserialize;

use super::frontmatter::split_frontmatter;
use crate::video::error::PipelineError;
use crate::video::segments::{Segment, SegmentCollection, SourceSpan};
use crate::video::support::utils::slugify;

const DEFAULT_SECTION: &str = "intro";
const SECTION_SLUG_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleOutline {
    pub title: Option<String>,
    pub source_url: Option<String>,
    pub sections: Vec<ArticleSection>,
    pub images: Vec<ArticleImage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleSection {
    pub title: String,
    pub text: String,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArticleImage {
    pub url: String,
    pub position: usize,
    pub section: String,
}

#[derive(Debug, Default, Deserialize)]
struct ArticleFrontMatter {
    title: Option<String>,
    source_url: Option<String>,
}

pub fn parse_article(content: &str) -> Result<ArticleOutline, PipelineError> {
    let (front_matter, body, body_offset) = split_frontmatter(content)?;
    let metadata = parse_front_matter(front_matter)?;

    let first_section = metadata
        .title
        .clone()
        .filter(|title| !title.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SECTION.to_string());

    let options =
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_FOOTNOTES;
    let mut state = ArticleParserState::new(first_section, body_offset, HtmlImages::new()?);
    for (event, range) in Parser::new_ext(body, options).into_offset_iter() {
        state.process_event(event, range);
    }
    let (sections, images) = state.finish(content.len());

    Ok(ArticleOutline {
        title: metadata.title,
        source_url: metadata.source_url,
        sections,
        images,
    })
}

/// One segment per section with body text, ids `NNNN_<section slug>`.
pub fn article_segments(outline: &ArticleOutline) -> Result<SegmentCollection, PipelineError> {
    let segments = outline
        .sections
        .iter()
        .enumerate()
        .map(|(idx, section)| {
            let slug = slugify(&section.title, SECTION_SLUG_CHARS);
            let slug = if slug.is_empty() { "section".to_string() } else { slug };
            let mut segment = Segment::new(format!("{:04}_{slug}", idx + 1), &section.text);
            segment.section = Some(section.title.clone());
            segment.span = Some(section.span);
            segment
        })
        .collect();
    SegmentCollection::new(segments)
}

fn parse_front_matter(front_matter: Option<&str>) -> Result<ArticleFrontMatter, PipelineError> {
    let Some(raw) = front_matter.filter(|fm| !fm.trim().is_empty()) else {
        return Ok(ArticleFrontMatter::default());
    };
    serde_yaml::from_str(raw).map_err(|e| PipelineError::Parse {
        line: e.location().map(|loc| loc.line() + 1).unwrap_or(1),
        message: format!("invalid article front matter: {e}"),
    })
}

/// `<img>` tags in raw HTML blocks and inline HTML.
struct HtmlImages {
    tag: Regex,
    attr: Regex,
}

impl HtmlImages {
    fn new() -> Result<Self, PipelineError> {
        Ok(Self {
            tag: Regex::new(r"(?is)<img\b[^>]*>")?,
            attr: Regex::new(
                r#"(?i)\s(data-src|src)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#,
            )?,
        })
    }

    /// Source and byte offset of every image tag in `html`. A lazy-loading
    /// `data-src` wins over the placeholder `src`.
    fn scan(&self, html: &str) -> Vec<(String, usize)> {
        self.tag
            .find_iter(html)
            .filter_map(|tag| {
                let mut src = None;
                for caps in self.attr.captures_iter(tag.as_str()) {
                    let value = caps
                        .get(2)
                        .or_else(|| caps.get(3))
                        .or_else(|| caps.get(4))
                        .map(|m| m.as_str().trim())
                        .filter(|value| !value.is_empty());
                    let Some(value) = value else { continue };
                    if caps[1].eq_ignore_ascii_case("data-src") {
                        src = Some(value);
                        break;
                    }
                    src.get_or_insert(value);
                }
                src.map(|src| (src.to_string(), tag.start()))
            })
            .collect()
    }
}

struct ArticleParserState {
    offset: usize,
    html_images: HtmlImages,
    section_title: String,
    section_start: usize,
    buffer: String,
    heading: Option<String>,
    image_depth: usize,
    in_code_block: bool,
    sections: Vec<ArticleSection>,
    images: Vec<ArticleImage>,
}

impl ArticleParserState {
    fn new(section_title: String, offset: usize, html_images: HtmlImages) -> Self {
        Self {
            offset,
            html_images,
            section_title,
            section_start: offset,
            buffer: String::new(),
            heading: None,
            image_depth: 0,
            in_code_block: false,
            sections: Vec::new(),
            images: Vec::new(),
        }
    }

    fn process_event(&mut self, event: Event, range: Range<usize>) {
        let start = range.start + self.offset;
        let end = range.end + self.offset;
        match event {
            Event::Start(Tag::Heading { .. }) => {
                self.flush_section(start);
                self.heading = Some(String::new());
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(text) = self.heading.take() {
                    let title = text.split_whitespace().collect::<Vec<_>>().join(" ");
                    if !title.is_empty() {
                        self.section_title = title;
                    }
                }
                self.section_start = end;
            }
            Event::Start(Tag::Image { dest_url, .. }) => {
                self.images.push(ArticleImage {
                    url: dest_url.into_string(),
                    position: start,
                    section: self.section_title.clone(),
                });
                self.image_depth += 1;
            }
            Event::End(TagEnd::Image) => {
                self.image_depth = self.image_depth.saturating_sub(1);
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                for (url, at) in self.html_images.scan(&html) {
                    self.images.push(ArticleImage {
                        url,
                        position: start + at,
                        section: self.section_title.clone(),
                    });
                }
            }
            Event::Start(Tag::CodeBlock(_)) => self.in_code_block = true,
            Event::End(TagEnd::CodeBlock) => self.in_code_block = false,
            Event::Text(text) | Event::Code(text) => self.push_text(&text),
            Event::SoftBreak | Event::HardBreak => self.push_text("\n"),
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::BlockQuote(_)) => {
                self.buffer.push_str("\n\n");
            }
            Event::End(TagEnd::Item) | Event::End(TagEnd::TableRow) => self.buffer.push('\n'),
            Event::End(TagEnd::TableCell) => self.buffer.push(' '),
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(heading) = self.heading.as_mut() {
            heading.push_str(text);
        } else if self.image_depth == 0 && !self.in_code_block {
            self.buffer.push_str(text);
        }
    }

    fn flush_section(&mut self, end: usize) {
        let text = normalize_text(&self.buffer);
        self.buffer.clear();
        if text.is_empty() {
            return;
        }
        self.sections.push(ArticleSection {
            title: self.section_title.clone(),
            text,
            span: SourceSpan {
                start: self.section_start,
                end,
            },
        });
    }

    fn finish(mut self, content_len: usize) -> (Vec<ArticleSection>, Vec<ArticleImage>) {
        self.flush_section(content_len);
        (self.sections, self.images)
    }
}

/// Collapses horizontal whitespace inside lines and keeps at most one blank
/// line between paragraphs.
fn normalize_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        blank_run = 0;
    }
    out
}
