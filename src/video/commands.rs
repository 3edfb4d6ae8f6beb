use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::json;

use crate::ui::prelude::{Level, emit};

use super::check::handle_check;
use super::cli::{
    AssignSpeakersArgs, AssignVisualsArgs, BuildTimelineArgs, CompileDialogArgs,
    SegmentArticleArgs, VideoCommands,
};
use super::config::{Project, sanitize_gap};
use super::dialog::{compile_segments, parse_dialog};
use super::document::article::{article_segments, parse_article};
use super::document::read_source;
use super::segments::{MergePolicy, SegmentCollection, SegmentField, SegmentStore};
use super::slides::SlideGenerator;
use super::speakers::{VoiceId, assign_alternating};
use super::support::utils::relative_to_root;
use super::timeline::{TimelineBuilder, WavClipSource, concat_timeline};
use super::visuals::{
    ExplicitAssets, HintPool, ImageResolver, Rationale, StructuralHint, VisualAssigner,
    collect_hints,
};

pub fn handle_video_command(command: VideoCommands) -> Result<()> {
    match command {
        VideoCommands::SegmentArticle(args) => handle_segment_article(args),
        VideoCommands::CompileDialog(args) => handle_compile_dialog(args),
        VideoCommands::AssignSpeakers(args) => handle_assign_speakers(args),
        VideoCommands::BuildTimeline(args) => handle_build_timeline(args),
        VideoCommands::AssignVisuals(args) => handle_assign_visuals(args),
        VideoCommands::Check(args) => handle_check(args),
    }
}

fn handle_segment_article(args: SegmentArticleArgs) -> Result<()> {
    let project = Project::open(&args.project)?;
    let article_path = match &args.article {
        Some(path) => project.paths.resolve(path),
        None => project.paths.article_path().to_path_buf(),
    };

    let content = read_source(&article_path)?;
    let outline = parse_article(&content)
        .with_context(|| format!("Failed to parse article {}", article_path.display()))?;
    if outline.sections.is_empty() {
        bail!("No narration text found in {}", article_path.display());
    }
    let collection = article_segments(&outline)?;

    store_segmentation(&project, collection, args.force, "video.segments.article")
}

fn handle_compile_dialog(args: CompileDialogArgs) -> Result<()> {
    let project = Project::open(&args.project)?;
    let script_path = match &args.script {
        Some(path) => project.paths.resolve(path),
        None => project.paths.dialog_path().to_path_buf(),
    };

    let content = read_source(&script_path)?;
    let utterances = parse_dialog(&content)
        .with_context(|| format!("Failed to parse dialog script {}", script_path.display()))?;
    if utterances.is_empty() {
        bail!("No utterances found in {}", script_path.display());
    }

    let collection = compile_segments(&utterances, &project.config.speaker_map())
        .with_context(|| format!("Failed to resolve speakers for {}", script_path.display()))?;

    store_segmentation(&project, collection, args.force, "video.segments.dialog")
}

/// Saves a freshly segmented collection. Without `force` it is first rebased
/// onto the stored one so unchanged segments keep their enrichment.
fn store_segmentation(
    project: &Project,
    mut collection: SegmentCollection,
    force: bool,
    code: &str,
) -> Result<()> {
    let store = SegmentStore::new(project.paths.segments_path());
    let mut carried = 0;
    if !force && let Some(previous) = store.load_optional()? {
        carried = collection.rebase_onto(&previous, &MergePolicy::preserve());
    }
    store.save(&collection)?;

    emit(
        Level::Success,
        code,
        &format!(
            "Wrote {} segment(s) to {} ({} carried over)",
            collection.len(),
            relative_to_root(project.paths.root(), store.path()).display(),
            carried
        ),
        Some(json!({
            "project": project.slug(),
            "segments": collection.len(),
            "carried": carried,
            "path": store.path(),
        })),
    );
    Ok(())
}

fn handle_assign_speakers(args: AssignSpeakersArgs) -> Result<()> {
    let project = Project::open(&args.project)?;
    let store = SegmentStore::new(project.paths.segments_path());
    let mut collection = store.load()?;

    let voices: Vec<VoiceId> = args.speakers.into_iter().map(VoiceId).collect();
    let policy = if args.all {
        MergePolicy::overwrite([SegmentField::Speaker])
    } else {
        MergePolicy::preserve()
    };

    let summary = assign_alternating(&mut collection, &voices, &policy)?;
    if summary.updated > 0 {
        store.save(&collection)?;
    }

    emit(
        Level::Success,
        "video.speakers.assigned",
        &format!("Assigned speakers: {}/{}", summary.updated, summary.total),
        Some(json!({
            "updated": summary.updated,
            "total": summary.total,
            "voices": voices,
        })),
    );
    Ok(())
}

fn handle_build_timeline(args: BuildTimelineArgs) -> Result<()> {
    let project = Project::open(&args.project)?;
    let store = SegmentStore::new(project.paths.segments_path());
    let mut collection = store.load()?;
    if collection.is_empty() {
        bail!("{} contains no segments", store.path().display());
    }

    let gap = args
        .gap
        .map(sanitize_gap)
        .unwrap_or_else(|| project.config.timeline.gap_seconds());
    let clips = WavClipSource::new(project.paths.audio_dir());
    let timeline = TimelineBuilder::new(gap).build(&collection, &clips)?;

    if args.concat_audio {
        let master = project.paths.master_audio_path();
        let summary = concat_timeline(&timeline, master)?;
        emit(
            Level::Info,
            "video.timeline.master_audio",
            &format!(
                "Concatenated {} clip(s) into {}",
                summary.clips,
                relative_to_root(project.paths.root(), master).display()
            ),
            Some(json!({
                "clips": summary.clips,
                "frames": summary.frames,
                "sample_rate": summary.sample_rate,
                "path": master,
            })),
        );
    }

    timeline.apply_to(&mut collection)?;
    timeline.save(project.paths.timeline_path(), project.paths.root())?;
    store.save(&collection)?;

    emit(
        Level::Success,
        "video.timeline.built",
        &format!(
            "Timeline: {} segment(s), {:.3}s total (gap {:.3}s)",
            timeline.entries.len(),
            timeline.total_seconds(),
            gap
        ),
        Some(json!({
            "segments": timeline.entries.len(),
            "duration_sec": timeline.total_seconds(),
            "gap_sec": gap,
        })),
    );
    Ok(())
}

fn handle_assign_visuals(args: AssignVisualsArgs) -> Result<()> {
    let project = Project::open(&args.project)?;
    let store = SegmentStore::new(project.paths.segments_path());
    let mut collection = store.load()?;

    let hints = if args.no_hints {
        Vec::new()
    } else {
        article_hints(&project)?
    };
    let hint_count = hints.len();

    let slides = SlideGenerator::new(
        project.paths.slides_dir(),
        project.config.slides.width,
        project.config.slides.height,
    )
    .force(args.force);

    let mut assigner = VisualAssigner::new(
        project.paths.root(),
        ExplicitAssets::new(project.paths.images_dir()),
        HintPool::new(hints),
        &slides,
        project.config.slides.excerpt_chars,
    );
    let log = assigner.assign(&mut collection)?;
    let unclaimed = assigner.unclaimed_hints();

    log.save(project.paths.assignments_path())?;
    store.save(&collection)?;

    let slide_stats = slides.stats();
    emit(
        Level::Success,
        "video.visuals.assigned",
        &format!(
            "Visuals: {} explicit, {} from article figures, {} slides ({} rendered, {} cached)",
            log.count(Rationale::Explicit),
            log.count(Rationale::FigurePosition),
            log.count(Rationale::Fallback),
            slide_stats.rendered,
            slide_stats.cached
        ),
        Some(json!({
            "explicit": log.count(Rationale::Explicit),
            "figure_position": log.count(Rationale::FigurePosition),
            "fallback": log.count(Rationale::Fallback),
            "hints": hint_count,
            "hints_unclaimed": unclaimed,
            "slides_rendered": slide_stats.rendered,
            "slides_cached": slide_stats.cached,
            "log": project.paths.assignments_path(),
        })),
    );
    Ok(())
}

/// Figures from `source/article.md`, or none when the project has no article.
fn article_hints(project: &Project) -> Result<Vec<StructuralHint>> {
    let article_path = project.paths.article_path();
    if !article_path.is_file() {
        emit(
            Level::Debug,
            "video.visuals.no_article",
            &format!("{} not found; figure matching disabled", article_path.display()),
            None,
        );
        return Ok(Vec::new());
    }

    let content = read_source(article_path)?;
    let outline = parse_article(&content)
        .with_context(|| format!("Failed to parse article {}", article_path.display()))?;
    let article_dir = article_path.parent().unwrap_or_else(|| Path::new("."));
    let resolver = ImageResolver::new(article_dir)
        .with_index(project.paths.article_image_index(), project.paths.root())?;
    Ok(collect_hints(&outline.images, &resolver))
}
