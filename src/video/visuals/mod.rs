//! Per-segment visual assignment.
//!
//! Rules run in a fixed order and the first that produces an asset wins:
//! an explicit file named after the segment, then an unconsumed figure from
//! the article, then a generated slide. Every segment's visual is decided
//! again on each run, so a file dropped into `assets/images/` later replaces
//! a slide generated earlier.

mod hints;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::json;

pub use self::hints::{HintPool, ImageResolver, StructuralHint, collect_hints};
use super::error::PipelineError;
use super::segments::{MergePolicy, Segment, SegmentCollection, SegmentField, SegmentPatch};
use super::support::utils::{collapse_whitespace, relative_to_root, write_json_atomic};
use crate::ui::prelude::*;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisualKind {
    ExistingImage,
    GeneratedSlide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rationale {
    Explicit,
    FigurePosition,
    Fallback,
}

impl Rationale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rationale::Explicit => "explicit",
            Rationale::FigurePosition => "figure-position",
            Rationale::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualAssignment {
    pub segment_id: String,
    pub kind: VisualKind,
    /// Project-relative
    pub asset_path: PathBuf,
    pub rationale: Rationale,
}

/// The audit log written to `assets/images/assignments.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentLog {
    pub items: Vec<VisualAssignment>,
}

impl AssignmentLog {
    pub fn count(&self, rationale: Rationale) -> usize {
        self.items
            .iter()
            .filter(|item| item.rationale == rationale)
            .count()
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        write_json_atomic(path, self)
    }
}

/// Content of a fallback slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideCard {
    pub heading: String,
    pub excerpt: String,
}

impl SlideCard {
    pub fn for_segment(segment: &Segment, excerpt_chars: usize) -> Self {
        let heading = segment
            .section
            .as_deref()
            .map(collapse_whitespace)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| segment.id.clone());
        Self {
            heading,
            excerpt: excerpt(&segment.text, excerpt_chars),
        }
    }

    pub fn to_markdown(&self) -> String {
        format!("# {}\n\n{}\n", self.heading, self.excerpt)
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let collapsed = collapse_whitespace(text);
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(max_chars.saturating_sub(1)).collect();
    cut.truncate(cut.trim_end().len());
    cut.push('…');
    cut
}

/// Renders a fallback slide and returns the image path.
pub trait SlideRenderer {
    fn render(&self, card: &SlideCard) -> Result<PathBuf, PipelineError>;
}

/// Explicit per-segment assets: `<dir>/<segment-id>.<ext>`.
pub struct ExplicitAssets {
    dir: PathBuf,
}

impl ExplicitAssets {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn lookup(&self, segment_id: &str) -> Option<PathBuf> {
        IMAGE_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{segment_id}.{ext}")))
            .find(|path| path.is_file())
    }
}

pub struct VisualAssigner<'a> {
    root: PathBuf,
    assets: ExplicitAssets,
    hints: HintPool,
    slides: &'a dyn SlideRenderer,
    excerpt_chars: usize,
}

impl<'a> VisualAssigner<'a> {
    pub fn new(
        root: impl Into<PathBuf>,
        assets: ExplicitAssets,
        hints: HintPool,
        slides: &'a dyn SlideRenderer,
        excerpt_chars: usize,
    ) -> Self {
        Self {
            root: root.into(),
            assets,
            hints,
            slides,
            excerpt_chars,
        }
    }

    /// Figures that no segment claimed.
    pub fn unclaimed_hints(&self) -> usize {
        self.hints.remaining()
    }

    /// Decides every segment's visual in store order and writes it onto the
    /// collection. Nothing is written if any segment fails.
    pub fn assign(
        &mut self,
        segments: &mut SegmentCollection,
    ) -> Result<AssignmentLog, PipelineError> {
        let mut items = Vec::with_capacity(segments.len());
        for segment in segments.iter() {
            let (kind, path, rationale) = self.decide(segment)?;
            let asset_path = relative_to_root(&self.root, &path);
            emit(
                Level::Debug,
                "video.visuals.assigned",
                &format!(
                    "{} -> {} ({})",
                    segment.id,
                    asset_path.display(),
                    rationale.as_str()
                ),
                Some(json!({
                    "segment_id": segment.id,
                    "asset_path": asset_path,
                    "rationale": rationale,
                })),
            );
            items.push(VisualAssignment {
                segment_id: segment.id.clone(),
                kind,
                asset_path,
                rationale,
            });
        }

        let policy = MergePolicy::overwrite([SegmentField::Visual]);
        for item in &items {
            let patch = SegmentPatch {
                visual: Some(item.asset_path.clone()),
                ..SegmentPatch::default()
            };
            segments.apply(&item.segment_id, patch, &policy)?;
        }

        Ok(AssignmentLog { items })
    }

    fn decide(
        &mut self,
        segment: &Segment,
    ) -> Result<(VisualKind, PathBuf, Rationale), PipelineError> {
        if let Some(path) = self.assets.lookup(&segment.id) {
            return Ok((VisualKind::ExistingImage, path, Rationale::Explicit));
        }
        if let Some(hint) = self.hints.claim(segment) {
            return Ok((
                VisualKind::ExistingImage,
                hint.image.clone(),
                Rationale::FigurePosition,
            ));
        }
        let card = SlideCard::for_segment(segment, self.excerpt_chars);
        let path = self.slides.render(&card)?;
        Ok((VisualKind::GeneratedSlide, path, Rationale::Fallback))
    }
}
