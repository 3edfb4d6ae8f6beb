use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::SegmentCollection;
use crate::video::error::PipelineError;
use crate::video::support::utils::write_json_atomic;

/// The persisted segment collection of one project (`script/segments.json`).
pub struct SegmentStore {
    path: PathBuf,
}

impl SegmentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<SegmentCollection, PipelineError> {
        let collection = self.load_unvalidated()?;
        collection
            .check_structure()
            .map_err(|e| PipelineError::persistence(&self.path, e))?;
        Ok(collection)
    }

    /// Reads the stored collection without checking ids and text, for
    /// reporting on a store that may violate them.
    pub fn load_unvalidated(&self) -> Result<SegmentCollection, PipelineError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(PipelineError::NotFound {
                    path: self.path.clone(),
                });
            }
            Err(err) => return Err(PipelineError::persistence(&self.path, err)),
        };

        serde_json::from_str(&contents).map_err(|e| PipelineError::persistence(&self.path, e))
    }

    pub fn load_optional(&self) -> Result<Option<SegmentCollection>, PipelineError> {
        match self.load() {
            Ok(collection) => Ok(Some(collection)),
            Err(PipelineError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn save(&self, collection: &SegmentCollection) -> Result<(), PipelineError> {
        collection.check_structure()?;
        write_json_atomic(&self.path, collection)
    }
}
