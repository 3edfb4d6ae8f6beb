//! Voice identity resolution.
//!
//! Precedence, highest first: the inline override on a dialog line, the
//! project's label map, the project-wide default voice. A label that none of
//! the three covers is an error rather than a silent fallback.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::dialog::Utterance;
use super::error::PipelineError;
use super::segments::{MergePolicy, SegmentCollection, SegmentField, SegmentPatch};

/// Synthesized-voice persona, identified by the engine's numeric speaker id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceId(pub u32);

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VoiceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(VoiceId)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpeakerMap {
    labels: BTreeMap<String, VoiceId>,
    default: Option<VoiceId>,
}

impl SpeakerMap {
    pub fn new(labels: BTreeMap<String, VoiceId>, default: Option<VoiceId>) -> Self {
        Self { labels, default }
    }

    pub fn known_labels(&self) -> Vec<String> {
        self.labels.keys().cloned().collect()
    }

    pub fn resolve(&self, label: &str, inline: Option<VoiceId>) -> Result<VoiceId, PipelineError> {
        inline
            .or_else(|| self.labels.get(label).copied())
            .or(self.default)
            .ok_or_else(|| PipelineError::Resolution {
                label: label.to_string(),
                known: self.known_labels(),
                line: None,
            })
    }

    /// Like [`resolve`](Self::resolve), with the script line attached to a
    /// resolution failure.
    pub fn resolve_utterance(&self, utterance: &Utterance) -> Result<VoiceId, PipelineError> {
        self.resolve(&utterance.speaker_label, utterance.speaker_override)
            .map_err(|err| match err {
                PipelineError::Resolution { label, known, .. } => PipelineError::Resolution {
                    label,
                    known,
                    line: Some(utterance.line),
                },
                other => other,
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentSummary {
    pub updated: usize,
    pub total: usize,
}

/// Cycles `voices` across the collection in store order. The cycle only
/// advances on segments that actually receive a voice, so an unassigned tail
/// keeps alternating even when earlier segments were skipped.
pub fn assign_alternating(
    collection: &mut SegmentCollection,
    voices: &[VoiceId],
    policy: &MergePolicy,
) -> Result<AssignmentSummary, PipelineError> {
    let total = collection.len();
    if voices.is_empty() {
        return Ok(AssignmentSummary { updated: 0, total });
    }

    let mut updated = 0;
    let mut cursor = 0;
    for segment in collection.iter_mut() {
        if segment.speaker.is_some() && !policy.forces(SegmentField::Speaker) {
            continue;
        }
        let patch = SegmentPatch {
            speaker: Some(voices[cursor % voices.len()]),
            ..SegmentPatch::default()
        };
        if segment.apply(patch, policy) {
            updated += 1;
        }
        cursor += 1;
    }

    Ok(AssignmentSummary { updated, total })
}
