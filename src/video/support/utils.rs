use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::video::error::PipelineError;

pub fn canonicalize_existing(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        anyhow::bail!("{} does not exist", path.display());
    }
    path.canonicalize()
        .with_context(|| format!("Failed to canonicalize path {}", path.display()))
}

/// Lowercased, underscore-joined slug that keeps any alphanumeric script
/// (Japanese headings survive intact) and is cut to `max_chars`.
pub fn slugify(value: &str, max_chars: usize) -> String {
    let lowered = value.trim().to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_separator = false;
    for ch in lowered.chars() {
        if ch.is_whitespace() {
            pending_separator = true;
            continue;
        }
        if !(ch.is_alphanumeric() || ch == '_') {
            continue;
        }
        if pending_separator && !slug.is_empty() {
            slug.push('_');
        }
        pending_separator = false;
        slug.push(ch);
    }
    let truncated: String = slug.chars().take(max_chars).collect();
    truncated.trim_matches('_').to_string()
}

/// Replaces `path` in one step: the bytes go to a sibling temp file that is
/// renamed over the target, so readers see either the old or the new content.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PipelineError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| PipelineError::persistence(parent, e))?;

    let mut temp = NamedTempFile::new_in(parent).map_err(|e| PipelineError::persistence(path, e))?;
    temp.write_all(contents)
        .map_err(|e| PipelineError::persistence(path, e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| PipelineError::persistence(path, e))?;
    temp.persist(path)
        .map_err(|e| PipelineError::persistence(path, e.error))?;
    Ok(())
}

pub fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), PipelineError> {
    let mut json =
        serde_json::to_string_pretty(value).map_err(|e| PipelineError::persistence(path, e))?;
    json.push('\n');
    write_atomic(path, json.as_bytes())
}

/// Project-relative form of `path` with forward slashes, falling back to the
/// path as given when it lives outside `root`.
pub fn relative_to_root(root: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(root) {
        Ok(rel) => PathBuf::from(rel.to_string_lossy().replace('\\', "/")),
        Err(_) => path.to_path_buf(),
    }
}

/// Collapses runs of whitespace into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
