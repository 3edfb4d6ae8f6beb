//! Structural hints: figures recovered from the article's markup, each
//! tagged with where it appeared, matched to segments by provenance.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::json;

use crate::ui::prelude::*;
use crate::video::document::article::ArticleImage;
use crate::video::error::PipelineError;
use crate::video::segments::Segment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralHint {
    pub image: PathBuf,
    /// Byte offset of the image in the article
    pub position: usize,
    pub section: String,
}

/// Maps article image references to files inside the project.
pub struct ImageResolver {
    article_dir: PathBuf,
    /// URL path -> project file, from the downloaded image index
    downloaded: HashMap<String, PathBuf>,
}

#[derive(Deserialize)]
struct ImageIndex {
    #[serde(default)]
    items: Vec<ImageIndexItem>,
}

#[derive(Deserialize)]
struct ImageIndexItem {
    url: String,
    path: PathBuf,
}

impl ImageResolver {
    pub fn new(article_dir: impl Into<PathBuf>) -> Self {
        Self {
            article_dir: article_dir.into(),
            downloaded: HashMap::new(),
        }
    }

    /// Loads `images.json` (`{items: [{url, path}]}`, paths relative to
    /// `root`). A missing index leaves only local references resolvable.
    pub fn with_index(mut self, index_path: &Path, root: &Path) -> Result<Self, PipelineError> {
        let contents = match fs::read_to_string(index_path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(self),
            Err(err) => return Err(PipelineError::persistence(index_path, err)),
        };
        let index: ImageIndex = serde_json::from_str(&contents)
            .map_err(|e| PipelineError::persistence(index_path, e))?;
        for item in index.items {
            self.downloaded
                .insert(url_path(&item.url).to_string(), root.join(item.path));
        }
        Ok(self)
    }

    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let reference = reference.trim();
        if reference.is_empty() || reference.starts_with("data:") {
            return None;
        }

        let candidate = if is_remote(reference) || reference.starts_with('/') {
            self.downloaded.get(url_path(reference)).cloned()
        } else {
            let local = strip_query(reference);
            Some(self.article_dir.join(local))
        };
        candidate.filter(|path| path.is_file())
    }
}

fn is_remote(reference: &str) -> bool {
    reference.starts_with("//") || reference.contains("://")
}

fn strip_query(reference: &str) -> &str {
    let end = reference.find(['?', '#']).unwrap_or(reference.len());
    &reference[..end]
}

/// Path component of a URL: `https://host/a/b.png?x=1` -> `/a/b.png`.
fn url_path(url: &str) -> &str {
    let without_scheme = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url.strip_prefix("//").unwrap_or(url),
    };
    let path = if url.contains("://") || url.starts_with("//") {
        without_scheme
            .find('/')
            .map_or("/", |idx| &without_scheme[idx..])
    } else {
        without_scheme
    };
    strip_query(path)
}

/// Turns article image occurrences into hints, in document order. References
/// that do not resolve to a project file are dropped.
pub fn collect_hints(images: &[ArticleImage], resolver: &ImageResolver) -> Vec<StructuralHint> {
    let mut hints = Vec::with_capacity(images.len());
    for image in images {
        match resolver.resolve(&image.url) {
            Some(path) => hints.push(StructuralHint {
                image: path,
                position: image.position,
                section: image.section.clone(),
            }),
            None => emit(
                Level::Debug,
                "video.visuals.hint_unresolved",
                &format!("Skipping article image {} (no local file)", image.url),
                Some(json!({ "url": image.url, "position": image.position })),
            ),
        }
    }
    hints
}

/// Hints available for matching, each handed out at most once.
pub struct HintPool {
    hints: Vec<StructuralHint>,
    consumed: Vec<bool>,
}

impl HintPool {
    pub fn new(hints: Vec<StructuralHint>) -> Self {
        let consumed = vec![false; hints.len()];
        Self { hints, consumed }
    }

    pub fn remaining(&self) -> usize {
        self.consumed.iter().filter(|used| !**used).count()
    }

    /// Takes the first unconsumed hint, in document order, that belongs to
    /// `segment`: inside its article span when it has one, otherwise in a
    /// section with the same name.
    pub fn claim(&mut self, segment: &Segment) -> Option<&StructuralHint> {
        let wanted_section = segment.section.as_deref().map(section_key);
        let idx = self.hints.iter().enumerate().position(|(idx, hint)| {
            if self.consumed[idx] {
                return false;
            }
            match (&segment.span, &wanted_section) {
                (Some(span), _) => span.contains(hint.position),
                (None, Some(section)) => section_key(&hint.section) == *section,
                (None, None) => false,
            }
        })?;
        self.consumed[idx] = true;
        Some(&self.hints[idx])
    }
}

/// Case- and punctuation-insensitive section name.
fn section_key(section: &str) -> String {
    section
        .chars()
        .filter(|ch| ch.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::segments::SourceSpan;
    use tempfile::tempdir;

    fn hint(name: &str, position: usize, section: &str) -> StructuralHint {
        StructuralHint {
            image: PathBuf::from(name),
            position,
            section: section.to_string(),
        }
    }

    fn span_segment(id: &str, start: usize, end: usize) -> Segment {
        let mut segment = Segment::new(id, "text");
        segment.span = Some(SourceSpan { start, end });
        segment
    }

    fn section_segment(id: &str, section: &str) -> Segment {
        let mut segment = Segment::new(id, "text");
        segment.section = Some(section.to_string());
        segment
    }

    #[test]
    fn claims_first_hint_inside_span() {
        let mut pool = HintPool::new(vec![
            hint("a.png", 5, "One"),
            hint("b.png", 50, "Two"),
            hint("c.png", 60, "Two"),
        ]);
        let first = span_segment("0001_one", 0, 40);
        let second = span_segment("0002_two", 40, 100);

        assert_eq!(pool.claim(&first).map(|h| h.position), Some(5));
        assert_eq!(pool.claim(&second).map(|h| h.position), Some(50));
        assert_eq!(pool.claim(&second).map(|h| h.position), Some(60));
        assert_eq!(pool.claim(&second), None);
        assert_eq!(pool.remaining(), 0);
    }

    #[test]
    fn a_hint_is_never_handed_out_twice() {
        let mut pool = HintPool::new(vec![hint("a.png", 10, "Intro")]);
        let a = section_segment("0001_a", "Intro");
        let b = section_segment("0002_b", "intro!");

        assert!(pool.claim(&a).is_some());
        assert!(pool.claim(&b).is_none());
    }

    #[test]
    fn section_match_ignores_case_and_punctuation() {
        let mut pool = HintPool::new(vec![hint("a.png", 10, "Getting Started")]);
        let segment = section_segment("0001_a", "getting started:");
        assert_eq!(pool.claim(&segment).map(|h| h.position), Some(10));
    }

    #[test]
    fn segment_without_span_or_section_claims_nothing() {
        let mut pool = HintPool::new(vec![hint("a.png", 10, "intro")]);
        assert!(pool.claim(&Segment::new("0001_a", "text")).is_none());
        assert_eq!(pool.remaining(), 1);
    }

    #[test]
    fn url_path_strips_host_and_query() {
        assert_eq!(
            url_path("https://cdn.example.com/img/a.png?w=600"),
            "/img/a.png"
        );
        assert_eq!(url_path("//cdn.example.com/b.jpg#top"), "/b.jpg");
        assert_eq!(url_path("https://example.com"), "/");
        assert_eq!(url_path("/static/c.png"), "/static/c.png");
    }

    #[test]
    fn resolves_local_and_downloaded_images() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let source = root.join("source");
        let downloaded = root.join("assets/images/article");
        fs::create_dir_all(source.join("images")).unwrap();
        fs::create_dir_all(&downloaded).unwrap();
        fs::write(source.join("images/local.png"), b"png").unwrap();
        fs::write(downloaded.join("001.png"), b"png").unwrap();
        let index = downloaded.join("images.json");
        fs::write(
            &index,
            r#"{"items": [{"url": "https://example.com/media/fig.png", "path": "assets/images/article/001.png", "bytes": 3}]}"#,
        )
        .unwrap();

        let resolver = ImageResolver::new(&source).with_index(&index, root).unwrap();
        assert_eq!(
            resolver.resolve("images/local.png"),
            Some(source.join("images/local.png"))
        );
        assert_eq!(
            resolver.resolve("https://example.com/media/fig.png?fm=webp"),
            Some(downloaded.join("001.png"))
        );
        assert_eq!(resolver.resolve("https://example.com/other.png"), None);
        assert_eq!(resolver.resolve("images/missing.png"), None);

        let images = vec![
            ArticleImage {
                url: "images/local.png".to_string(),
                position: 12,
                section: "Intro".to_string(),
            },
            ArticleImage {
                url: "images/missing.png".to_string(),
                position: 40,
                section: "Intro".to_string(),
            },
        ];
        let hints = collect_hints(&images, &resolver);
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].position, 12);
    }

    #[test]
    fn corrupt_index_is_a_persistence_error() {
        let temp = tempdir().unwrap();
        let index = temp.path().join("images.json");
        fs::write(&index, "{").unwrap();
        let result = ImageResolver::new(temp.path()).with_index(&index, temp.path());
        assert!(matches!(result, Err(PipelineError::Persistence { .. })));
    }
}
