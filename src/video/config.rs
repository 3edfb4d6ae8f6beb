use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::speakers::{SpeakerMap, VoiceId};
use super::support::utils::canonicalize_existing;

const CONFIG_FILE: &str = "project.toml";

pub struct ProjectPaths {
    root: PathBuf,
    config_path: PathBuf,
    article_path: PathBuf,
    dialog_path: PathBuf,
    segments_path: PathBuf,
    timeline_path: PathBuf,
    audio_dir: PathBuf,
    master_audio_path: PathBuf,
    images_dir: PathBuf,
    article_image_index: PathBuf,
    slides_dir: PathBuf,
    assignments_path: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_path: root.join(CONFIG_FILE),
            article_path: root.join("source").join("article.md"),
            dialog_path: root.join("script").join("dialog.md"),
            segments_path: root.join("script").join("segments.json"),
            timeline_path: root.join("script").join("timeline.json"),
            audio_dir: root.join("audio"),
            master_audio_path: root.join("export").join("master.wav"),
            images_dir: root.join("assets").join("images"),
            article_image_index: root
                .join("assets")
                .join("images")
                .join("article")
                .join("images.json"),
            slides_dir: root.join("assets").join("slides"),
            assignments_path: root.join("assets").join("images").join("assignments.json"),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a project-relative path (as given on the command line) against the root.
    pub fn resolve(&self, relative: &Path) -> PathBuf {
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.root.join(relative)
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn article_path(&self) -> &Path {
        &self.article_path
    }

    pub fn dialog_path(&self) -> &Path {
        &self.dialog_path
    }

    pub fn segments_path(&self) -> &Path {
        &self.segments_path
    }

    pub fn timeline_path(&self) -> &Path {
        &self.timeline_path
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub fn master_audio_path(&self) -> &Path {
        &self.master_audio_path
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn article_image_index(&self) -> &Path {
        &self.article_image_index
    }

    pub fn slides_dir(&self) -> &Path {
        &self.slides_dir
    }

    pub fn assignments_path(&self) -> &Path {
        &self.assignments_path
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name; defaults to the directory name
    pub slug: Option<String>,
    pub voices: VoicesConfig,
    pub timeline: TimelineConfig,
    pub slides: SlidesConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoicesConfig {
    /// Voice used for labels without an entry in `speakers`
    pub default: Option<VoiceId>,
    /// Dialog label -> voice id
    pub speakers: BTreeMap<String, VoiceId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Silence inserted between consecutive segments, in seconds
    pub gap_seconds: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            gap_seconds: Self::DEFAULT_GAP_SECONDS,
        }
    }
}

impl TimelineConfig {
    pub const DEFAULT_GAP_SECONDS: f64 = 0.0;

    pub fn gap_seconds(&self) -> f64 {
        sanitize_gap(self.gap_seconds)
    }
}

pub fn sanitize_gap(gap: f64) -> f64 {
    if !gap.is_finite() || gap < 0.0 {
        TimelineConfig::DEFAULT_GAP_SECONDS
    } else {
        gap
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlidesConfig {
    pub width: u32,
    pub height: u32,
    /// Maximum characters of segment text shown on a fallback slide
    pub excerpt_chars: usize,
}

impl Default for SlidesConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            excerpt_chars: 220,
        }
    }
}

impl ProjectConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading project config from {}", path.display()))?;
        let mut config: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing project config {}", path.display()))?;
        config.timeline.gap_seconds = config.timeline.gap_seconds();
        if config.slides.width == 0 || config.slides.height == 0 {
            let defaults = SlidesConfig::default();
            config.slides.width = defaults.width;
            config.slides.height = defaults.height;
        }
        Ok(config)
    }

    pub fn speaker_map(&self) -> SpeakerMap {
        SpeakerMap::new(self.voices.speakers.clone(), self.voices.default)
    }
}

/// A project directory together with its configuration.
pub struct Project {
    pub paths: ProjectPaths,
    pub config: ProjectConfig,
}

impl Project {
    pub fn open(project_dir: &Path) -> Result<Self> {
        let root = canonicalize_existing(project_dir)
            .with_context(|| format!("opening project directory {}", project_dir.display()))?;
        if !root.is_dir() {
            anyhow::bail!("{} is not a directory", root.display());
        }
        let paths = ProjectPaths::new(root);
        let config = ProjectConfig::load_from_path(paths.config_path())?;
        Ok(Self { paths, config })
    }

    pub fn slug(&self) -> String {
        self.config.slug.clone().unwrap_or_else(|| {
            self.paths
                .root()
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "project".to_string())
        })
    }
}
