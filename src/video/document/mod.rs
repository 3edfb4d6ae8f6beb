pub mod article;
pub mod frontmatter;

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::video::error::PipelineError;

/// Reads a UTF-8 source document, mapping absence to `NotFound`.
pub fn read_source(path: &Path) -> Result<String, PipelineError> {
    match fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(PipelineError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(err) => Err(PipelineError::persistence(path, err)),
    }
}
