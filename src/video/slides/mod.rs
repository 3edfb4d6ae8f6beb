use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use sha2::{Digest, Sha256};

use super::error::PipelineError;
use super::visuals::{SlideCard, SlideRenderer};

const DEFAULT_CSS: &str = include_str!("slide.css");
const CHROMIUM_CANDIDATES: &[&str] = &["chromium", "chromium-browser", "google-chrome"];
const SLIDE_PURPOSE: &str = "render fallback slides";

/// Renders slide cards to PNG via pandoc (markdown to HTML) and a headless
/// chromium screenshot. Results are cached per content hash.
pub struct SlideGenerator {
    cache_dir: PathBuf,
    width: u32,
    height: u32,
    force: bool,
    rendered: Cell<usize>,
    cached: Cell<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideStats {
    pub rendered: usize,
    pub cached: usize,
}

impl SlideGenerator {
    pub fn new(cache_dir: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            width,
            height,
            force: false,
            rendered: Cell::new(0),
            cached: Cell::new(0),
        }
    }

    /// Ignore cached images and render again.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn stats(&self) -> SlideStats {
        SlideStats {
            rendered: self.rendered.get(),
            cached: self.cached.get(),
        }
    }

    /// Cache key from dimensions, stylesheet and markdown, so editing the
    /// stylesheet invalidates every slide.
    fn cache_key(&self, markdown: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width.to_le_bytes());
        hasher.update(self.height.to_le_bytes());
        hasher.update(DEFAULT_CSS.as_bytes());
        hasher.update(markdown.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn markdown_slide(&self, markdown: &str) -> Result<PathBuf, PipelineError> {
        let slide_dir = self.cache_dir.join(self.cache_key(markdown));
        let image_path = slide_dir.join("slide.png");
        if image_path.is_file() && !self.force {
            self.cached.set(self.cached.get() + 1);
            return Ok(image_path);
        }

        let pandoc = require_tool(&["pandoc"])?;
        let chromium = require_tool(CHROMIUM_CANDIDATES)?;

        fs::create_dir_all(&slide_dir)
            .map_err(|e| PipelineError::persistence(&slide_dir, e))?;
        let markdown_path = slide_dir.join("input.md");
        let css_path = slide_dir.join("slide.css");
        let html_path = slide_dir.join("slide.html");
        fs::write(&markdown_path, markdown)
            .map_err(|e| PipelineError::persistence(&markdown_path, e))?;
        fs::write(&css_path, self.stylesheet())
            .map_err(|e| PipelineError::persistence(&css_path, e))?;

        self.run_pandoc(&pandoc, &markdown_path, &html_path, &css_path)?;

        // chromium writes in place; only a finished screenshot becomes slide.png
        let partial = slide_dir.join("slide.partial.png");
        self.capture_screenshot(&chromium, &html_path, &partial)?;
        fs::rename(&partial, &image_path)
            .map_err(|e| PipelineError::persistence(&image_path, e))?;

        self.rendered.set(self.rendered.get() + 1);
        Ok(image_path)
    }

    fn stylesheet(&self) -> String {
        format!(
            "{DEFAULT_CSS}\nbody {{ width: {}px; height: {}px; }}\n",
            self.width, self.height
        )
    }

    fn run_pandoc(
        &self,
        pandoc: &Path,
        markdown: &Path,
        html: &Path,
        css: &Path,
    ) -> Result<(), PipelineError> {
        let output = Command::new(pandoc)
            .arg(markdown)
            .arg("-o")
            .arg(html)
            .arg("--standalone")
            .arg("--metadata=pagetitle:slide")
            .arg("--css")
            .arg(css)
            .output()
            .map_err(|e| tool_failed("pandoc", e))?;

        if !output.status.success() {
            return Err(tool_failed(
                "pandoc",
                format!(
                    "exited with status {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(())
    }

    fn capture_screenshot(
        &self,
        chromium: &Path,
        html: &Path,
        image: &Path,
    ) -> Result<(), PipelineError> {
        let output = Command::new(chromium)
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--hide-scrollbars")
            .arg("--force-device-scale-factor=1")
            .arg(format!("--window-size={},{}", self.width, self.height))
            .arg(format!("--screenshot={}", image.display()))
            .arg(format!("file://{}", html.display()))
            .output()
            .map_err(|e| tool_failed("chromium", e))?;

        if !output.status.success() || !image.is_file() {
            return Err(tool_failed(
                "chromium",
                format!(
                    "no screenshot produced (status {:?}): {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        Ok(())
    }
}

impl SlideRenderer for SlideGenerator {
    fn render(&self, card: &SlideCard) -> Result<PathBuf, PipelineError> {
        self.markdown_slide(&card.to_markdown())
    }
}

fn require_tool(candidates: &[&str]) -> Result<PathBuf, PipelineError> {
    candidates
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| PipelineError::DependencyUnavailable {
            tool: candidates.join(" / "),
            purpose: SLIDE_PURPOSE.to_string(),
        })
}

fn tool_failed(tool: &str, message: impl ToString) -> PipelineError {
    PipelineError::ToolFailed {
        tool: tool.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cache_key_depends_on_dimensions_and_content() {
        let temp = tempdir().unwrap();
        let a = SlideGenerator::new(temp.path(), 1920, 1080);
        let b = SlideGenerator::new(temp.path(), 1280, 720);

        assert_eq!(a.cache_key("# One"), a.cache_key("# One"));
        assert_ne!(a.cache_key("# One"), a.cache_key("# Two"));
        assert_ne!(a.cache_key("# One"), b.cache_key("# One"));
    }

    #[test]
    fn cached_slide_is_reused_without_tools() {
        let temp = tempdir().unwrap();
        let generator = SlideGenerator::new(temp.path(), 1920, 1080);
        let card = SlideCard {
            heading: "Intro".to_string(),
            excerpt: "Hello.".to_string(),
        };
        let slide_dir = temp.path().join(generator.cache_key(&card.to_markdown()));
        fs::create_dir_all(&slide_dir).unwrap();
        fs::write(slide_dir.join("slide.png"), b"png").unwrap();

        let path = generator.render(&card).unwrap();
        assert_eq!(path, slide_dir.join("slide.png"));
        assert_eq!(
            generator.stats(),
            SlideStats {
                rendered: 0,
                cached: 1
            }
        );
    }

    #[test]
    fn missing_tool_is_reported_with_purpose() {
        let err = require_tool(&["vidgen-no-such-renderer"]).unwrap_err();
        match err {
            PipelineError::DependencyUnavailable { tool, purpose } => {
                assert_eq!(tool, "vidgen-no-such-renderer");
                assert_eq!(purpose, SLIDE_PURPOSE);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn stylesheet_pins_slide_dimensions() {
        let temp = tempdir().unwrap();
        let css = SlideGenerator::new(temp.path(), 1280, 720).stylesheet();
        assert!(css.ends_with("body { width: 1280px; height: 720px; }\n"));
    }
}
