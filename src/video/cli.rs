use clap::{Args, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Subcommand, Debug, Clone)]
pub enum VideoCommands {
    /// Split source/article.md into one narration segment per section
    SegmentArticle(SegmentArticleArgs),
    /// Compile script/dialog.md into speaker-tagged segments
    CompileDialog(CompileDialogArgs),
    /// Assign voices to segments in bulk, cycling through the given ids
    AssignSpeakers(AssignSpeakersArgs),
    /// Lay segments out on a timeline from their audio clip durations
    BuildTimeline(BuildTimelineArgs),
    /// Pick an image or a generated slide for every segment
    AssignVisuals(AssignVisualsArgs),
    /// Validate the segment collection and show statistics
    Check(CheckArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SegmentArticleArgs {
    /// Project directory
    #[arg(value_hint = ValueHint::DirPath)]
    pub project: PathBuf,

    /// Article to segment, relative to the project (default: source/article.md)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub article: Option<PathBuf>,

    /// Replace the stored segments instead of carrying over speaker, timing and visual
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompileDialogArgs {
    /// Project directory
    #[arg(value_hint = ValueHint::DirPath)]
    pub project: PathBuf,

    /// Dialog script, relative to the project (default: script/dialog.md)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub script: Option<PathBuf>,

    /// Replace the stored segments; resolved speakers win over stored ones
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AssignSpeakersArgs {
    /// Project directory
    #[arg(value_hint = ValueHint::DirPath)]
    pub project: PathBuf,

    /// Voice ids to cycle through, e.g. `1,8`
    #[arg(long, value_delimiter = ',', required = true, num_args = 1..)]
    pub speakers: Vec<u32>,

    /// Reassign segments that already have a speaker
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BuildTimelineArgs {
    /// Project directory
    #[arg(value_hint = ValueHint::DirPath)]
    pub project: PathBuf,

    /// Silence between segments in seconds (overrides [timeline] gap_seconds)
    #[arg(long, value_name = "SECONDS")]
    pub gap: Option<f64>,

    /// Also write export/master.wav with every clip in timeline order
    #[arg(long)]
    pub concat_audio: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AssignVisualsArgs {
    /// Project directory
    #[arg(value_hint = ValueHint::DirPath)]
    pub project: PathBuf,

    /// Re-render fallback slides even when cached
    #[arg(long)]
    pub force: bool,

    /// Ignore figures found in the article
    #[arg(long)]
    pub no_hints: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    /// Project directory
    #[arg(value_hint = ValueHint::DirPath)]
    pub project: PathBuf,
}
