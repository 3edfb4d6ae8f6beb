//! Segments are the unit that every later stage joins on.
//!
//! A segment is created once by a segmentation stage (article or dialog) and
//! then enriched in place: speaker, then timing, then visual. Each stage owns
//! one field and writes it through [`Segment::apply`], which consults a
//! [`MergePolicy`] to decide whether an existing value may be replaced.

mod store;

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use self::store::SegmentStore;
use super::error::PipelineError;
use super::speakers::VoiceId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<VoiceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual: Option<PathBuf>,
    /// Byte range of the article text this segment was cut from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<SourceSpan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn contains(&self, position: usize) -> bool {
        self.start <= position && position < self.end
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// Fields owned by the enrichment stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SegmentField {
    Speaker,
    Timing,
    Visual,
}

/// Which already-populated fields a stage is allowed to replace. Fields not
/// listed keep their stored value, which is what makes re-running a stage a
/// no-op for segments it has already enriched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePolicy {
    overwrite: BTreeSet<SegmentField>,
}

impl MergePolicy {
    pub fn preserve() -> Self {
        Self::default()
    }

    pub fn overwrite(fields: impl IntoIterator<Item = SegmentField>) -> Self {
        Self {
            overwrite: fields.into_iter().collect(),
        }
    }

    pub fn forces(&self, field: SegmentField) -> bool {
        self.overwrite.contains(&field)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SegmentPatch {
    pub speaker: Option<VoiceId>,
    pub timing: Option<TimeWindow>,
    pub visual: Option<PathBuf>,
}

impl Segment {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            speaker: None,
            start: None,
            end: None,
            section: None,
            visual: None,
            span: None,
        }
    }

    pub fn timing(&self) -> Option<TimeWindow> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(TimeWindow::new(start, end)),
            _ => None,
        }
    }

    pub fn has_field(&self, field: SegmentField) -> bool {
        match field {
            SegmentField::Speaker => self.speaker.is_some(),
            SegmentField::Timing => self.start.is_some() || self.end.is_some(),
            SegmentField::Visual => self.visual.is_some(),
        }
    }

    fn may_write(&self, field: SegmentField, policy: &MergePolicy) -> bool {
        !self.has_field(field) || policy.forces(field)
    }

    /// Writes the fields present in `patch` that `policy` allows. Returns
    /// true when at least one field was written.
    pub fn apply(&mut self, patch: SegmentPatch, policy: &MergePolicy) -> bool {
        let mut written = false;
        if let Some(speaker) = patch.speaker
            && self.may_write(SegmentField::Speaker, policy)
        {
            self.speaker = Some(speaker);
            written = true;
        }
        if let Some(window) = patch.timing
            && self.may_write(SegmentField::Timing, policy)
        {
            self.start = Some(window.start);
            self.end = Some(window.end);
            written = true;
        }
        if let Some(visual) = patch.visual
            && self.may_write(SegmentField::Visual, policy)
        {
            self.visual = Some(visual);
            written = true;
        }
        written
    }
}

/// Ordered, id-unique collection of segments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentCollection {
    segments: Vec<Segment>,
}

impl SegmentCollection {
    pub fn new(segments: Vec<Segment>) -> Result<Self, PipelineError> {
        let collection = Self { segments };
        collection.check_structure()?;
        Ok(collection)
    }

    /// Ids must be unique and every segment must carry narration text.
    pub fn check_structure(&self) -> Result<(), PipelineError> {
        let mut seen = HashSet::new();
        for segment in &self.segments {
            if segment.id.trim().is_empty() {
                return Err(invalid("segment with an empty id"));
            }
            if !seen.insert(segment.id.as_str()) {
                return Err(invalid(format!("duplicate segment id `{}`", segment.id)));
            }
            if segment.text.trim().is_empty() {
                return Err(invalid(format!("segment `{}` has no text", segment.id)));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Segment> {
        self.segments.iter_mut()
    }

    pub fn get(&self, id: &str) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.id == id)
    }

    /// Field-scoped update of a single segment.
    pub fn apply(
        &mut self,
        id: &str,
        patch: SegmentPatch,
        policy: &MergePolicy,
    ) -> Result<bool, PipelineError> {
        let segment = self
            .segments
            .iter_mut()
            .find(|segment| segment.id == id)
            .ok_or_else(|| PipelineError::UnknownSegment { id: id.to_string() })?;
        Ok(segment.apply(patch, policy))
    }

    /// Carries enrichment from a previously stored collection into a freshly
    /// segmented one. Only segments whose id and text are unchanged inherit
    /// anything; speaker follows `policy` (a fresh speaker wins only when the
    /// policy forces it), timing and visual are inherited as stored.
    pub fn rebase_onto(&mut self, previous: &SegmentCollection, policy: &MergePolicy) -> usize {
        let mut carried = 0;
        for segment in &mut self.segments {
            let Some(old) = previous.get(&segment.id) else {
                continue;
            };
            if old.text != segment.text {
                continue;
            }
            if let Some(speaker) = old.speaker
                && !policy.forces(SegmentField::Speaker)
            {
                segment.speaker = Some(speaker);
            }
            segment.start = old.start;
            segment.end = old.end;
            segment.visual = old.visual.clone();
            carried += 1;
        }
        carried
    }
}

fn invalid(message: impl Into<String>) -> PipelineError {
    PipelineError::InvalidSegments {
        message: message.into(),
    }
}
