//! Segment timeline built from per-segment audio clips.
//!
//! Durations are quantised to whole milliseconds and the cursor walk runs on
//! integers, so `end[i] + gap == start[i + 1]` holds exactly in the persisted
//! artifact and the total is the plain sum of clips and gaps.

mod clips;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use self::clips::{WavClipSource, concat_timeline};
use super::error::PipelineError;
use super::segments::{MergePolicy, SegmentCollection, SegmentField, SegmentPatch, TimeWindow};
use super::support::utils::{relative_to_root, write_json_atomic};

/// A produced audio clip for one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub path: PathBuf,
    pub duration_ms: u64,
}

/// Looks up the clip produced for a segment. `Ok(None)` means no clip exists.
pub trait ClipSource {
    fn clip_for(&self, segment_id: &str) -> Result<Option<AudioClip>, PipelineError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub segment_id: String,
    pub section: Option<String>,
    pub start_ms: u64,
    pub end_ms: u64,
    pub clip: PathBuf,
}

impl TimelineEntry {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(ms_to_seconds(self.start_ms), ms_to_seconds(self.end_ms))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
    pub gap_ms: u64,
    pub total_ms: u64,
}

pub struct TimelineBuilder {
    gap_ms: u64,
}

impl TimelineBuilder {
    pub fn new(gap_seconds: f64) -> Self {
        Self {
            gap_ms: seconds_to_ms(gap_seconds),
        }
    }

    /// Walks the collection in store order. Any segment without a usable clip
    /// fails the whole build; nothing is skipped.
    pub fn build(
        &self,
        segments: &SegmentCollection,
        clips: &dyn ClipSource,
    ) -> Result<Timeline, PipelineError> {
        let mut entries = Vec::with_capacity(segments.len());
        let mut cursor = 0u64;

        for (idx, segment) in segments.iter().enumerate() {
            let clip = clips
                .clip_for(&segment.id)?
                .ok_or_else(|| PipelineError::missing_input(&segment.id, "no audio clip"))?;
            if clip.duration_ms == 0 {
                return Err(PipelineError::missing_input(
                    &segment.id,
                    format!("audio clip {} has zero length", clip.path.display()),
                ));
            }

            let overflow = || PipelineError::TimelineOverflow {
                segment_id: segment.id.clone(),
            };
            let start_ms = if idx > 0 {
                cursor.checked_add(self.gap_ms).ok_or_else(overflow)?
            } else {
                cursor
            };
            let end_ms = start_ms.checked_add(clip.duration_ms).ok_or_else(overflow)?;
            cursor = end_ms;

            entries.push(TimelineEntry {
                segment_id: segment.id.clone(),
                section: segment.section.clone(),
                start_ms,
                end_ms,
                clip: clip.path,
            });
        }

        Ok(Timeline {
            entries,
            gap_ms: self.gap_ms,
            total_ms: cursor,
        })
    }
}

impl Timeline {
    pub fn total_seconds(&self) -> f64 {
        ms_to_seconds(self.total_ms)
    }

    /// Writes `start`/`end` onto every segment. Timing is derived data, so
    /// existing values are always replaced.
    pub fn apply_to(&self, segments: &mut SegmentCollection) -> Result<usize, PipelineError> {
        let policy = MergePolicy::overwrite([SegmentField::Timing]);
        let mut updated = 0;
        for entry in &self.entries {
            let patch = SegmentPatch {
                timing: Some(entry.window()),
                ..SegmentPatch::default()
            };
            if segments.apply(&entry.segment_id, patch, &policy)? {
                updated += 1;
            }
        }
        Ok(updated)
    }

    pub fn to_document(&self, root: &Path) -> TimelineDocument {
        TimelineDocument {
            master: MasterTrack {
                duration_sec: self.total_seconds(),
                gap_sec: ms_to_seconds(self.gap_ms),
            },
            items: self
                .entries
                .iter()
                .map(|entry| TimelineItem {
                    segment_id: entry.segment_id.clone(),
                    section: entry.section.clone(),
                    start: ms_to_seconds(entry.start_ms),
                    end: ms_to_seconds(entry.end_ms),
                    clip: relative_to_root(root, &entry.clip),
                })
                .collect(),
        }
    }

    pub fn save(&self, path: &Path, root: &Path) -> Result<(), PipelineError> {
        write_json_atomic(path, &self.to_document(root))
    }
}

/// On-disk form of the timeline (`script/timeline.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineDocument {
    pub master: MasterTrack,
    pub items: Vec<TimelineItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterTrack {
    pub duration_sec: f64,
    pub gap_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineItem {
    pub segment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub start: f64,
    pub end: f64,
    pub clip: PathBuf,
}

pub fn seconds_to_ms(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * 1000.0).round() as u64
}

pub fn ms_to_seconds(ms: u64) -> f64 {
    ms as f64 / 1000.0
}
