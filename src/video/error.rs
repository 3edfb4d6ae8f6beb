use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(
        "{}No voice configured for speaker label `{label}` (known labels: {}). Add it under [voices.speakers] in project.toml or set [voices] default",
        display_line(.line),
        display_labels(.known)
    )]
    Resolution {
        label: String,
        known: Vec<String>,
        line: Option<usize>,
    },

    #[error("Segment `{segment_id}` is missing input: {detail}")]
    MissingInput { segment_id: String, detail: String },

    #[error("{} not found", .path.display())]
    NotFound { path: PathBuf },

    #[error(
        "Timeline position overflows at segment `{segment_id}`; the gap or clip durations are too large"
    )]
    TimelineOverflow { segment_id: String },

    #[error("No segment with id `{id}`")]
    UnknownSegment { id: String },

    #[error("Invalid segment collection: {message}")]
    InvalidSegments { message: String },

    #[error("{}: {message}", .path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("`{tool}` is required to {purpose} but was not found on PATH")]
    DependencyUnavailable { tool: String, purpose: String },

    #[error("`{tool}` failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("Invalid line pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl PipelineError {
    pub fn persistence(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn missing_input(segment_id: &str, detail: impl Into<String>) -> Self {
        Self::MissingInput {
            segment_id: segment_id.to_string(),
            detail: detail.into(),
        }
    }
}

fn display_line(line: &Option<usize>) -> String {
    line.map(|line| format!("line {line}: ")).unwrap_or_default()
}

fn display_labels(labels: &[String]) -> String {
    if labels.is_empty() {
        "none".to_string()
    } else {
        labels.join(", ")
    }
}
