use std::collections::HashSet;
use std::path::Path;

use anyhow::{Result, anyhow};
use serde_json::json;

use crate::ui::prelude::{Level, emit};

use super::cli::CheckArgs;
use super::config::Project;
use super::segments::{SegmentCollection, SegmentStore};

/// Allowed floating point slack when comparing persisted seconds.
const TIME_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub segment_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentStats {
    pub segments: usize,
    pub with_speaker: usize,
    pub timed: usize,
    pub with_visual: usize,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckReport {
    pub violations: Vec<Violation>,
    pub stats: SegmentStats,
}

impl CheckReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    fn flag(&mut self, segment_id: Option<&str>, message: impl Into<String>) {
        self.violations.push(Violation {
            segment_id: segment_id.map(str::to_string),
            message: message.into(),
        });
    }
}

/// Checks a stored collection against the segment, timing and visual
/// invariants. `root` resolves project-relative visual paths.
pub fn inspect(collection: &SegmentCollection, root: &Path) -> CheckReport {
    let mut report = CheckReport::default();
    let mut seen = HashSet::new();

    for segment in collection.iter() {
        let id = segment.id.as_str();
        if id.trim().is_empty() {
            report.flag(None, "segment with an empty id");
        } else if !seen.insert(id) {
            report.flag(Some(id), "duplicate segment id");
        }
        if segment.text.trim().is_empty() {
            report.flag(Some(id), "empty narration text");
        }

        match (segment.start, segment.end) {
            (Some(start), Some(end)) => {
                if start.is_nan() || end.is_nan() || start < 0.0 || start >= end {
                    report.flag(Some(id), format!("invalid timing {start}..{end}"));
                }
            }
            (None, None) => {}
            _ => report.flag(Some(id), "only one of start/end is set"),
        }

        if let Some(visual) = &segment.visual {
            let path = if visual.is_absolute() {
                visual.clone()
            } else {
                root.join(visual)
            };
            if !path.is_file() {
                report.flag(
                    Some(id),
                    format!("visual {} does not exist", visual.display()),
                );
            }
        }
    }

    let timed: Vec<_> = collection.iter().filter_map(|s| s.timing().map(|w| (s, w))).collect();
    if !timed.is_empty() && timed.len() != collection.len() {
        report.flag(
            None,
            format!(
                "timing present on {} of {} segments; rebuild the timeline",
                timed.len(),
                collection.len()
            ),
        );
    }
    for pair in timed.windows(2) {
        let (prev, prev_window) = pair[0];
        let (next, next_window) = pair[1];
        if prev_window.end > next_window.start + TIME_EPSILON {
            report.flag(
                Some(next.id.as_str()),
                format!(
                    "starts at {:.3}s before `{}` ends at {:.3}s",
                    next_window.start, prev.id, prev_window.end
                ),
            );
        }
    }

    report.stats = SegmentStats {
        segments: collection.len(),
        with_speaker: collection.iter().filter(|s| s.speaker.is_some()).count(),
        timed: timed.len(),
        with_visual: collection.iter().filter(|s| s.visual.is_some()).count(),
        duration_seconds: timed
            .iter()
            .map(|(_, window)| window.end)
            .fold(0.0, f64::max),
    };
    report
}

pub fn handle_check(args: CheckArgs) -> Result<()> {
    let project = Project::open(&args.project)?;
    let store = SegmentStore::new(project.paths.segments_path());
    let collection = store.load_unvalidated()?;
    let report = inspect(&collection, project.paths.root());
    let stats = &report.stats;

    emit(
        Level::Info,
        "video.check.counts",
        &format!(
            "Segments: {}, with speaker: {}, timed: {}, with visual: {}",
            stats.segments, stats.with_speaker, stats.timed, stats.with_visual
        ),
        Some(json!({
            "segments": stats.segments,
            "with_speaker": stats.with_speaker,
            "timed": stats.timed,
            "with_visual": stats.with_visual,
        })),
    );

    if stats.timed > 0 {
        emit(
            Level::Info,
            "video.check.duration",
            &format!("Timeline duration: {}", format_duration(stats.duration_seconds)),
            Some(json!({ "duration_sec": stats.duration_seconds })),
        );
    }

    for violation in &report.violations {
        let message = match &violation.segment_id {
            Some(id) => format!("{id}: {}", violation.message),
            None => violation.message.clone(),
        };
        emit(
            Level::Warn,
            "video.check.violation",
            &message,
            Some(json!({
                "segment_id": violation.segment_id,
                "message": violation.message,
            })),
        );
    }

    if !report.is_valid() {
        return Err(anyhow!(
            "{} has {} invariant violation(s)",
            store.path().display(),
            report.violations.len()
        ));
    }

    emit(
        Level::Success,
        "video.check.valid",
        &format!("{} is consistent", store.path().display()),
        None,
    );
    Ok(())
}

fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds.round().max(0.0) as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}
