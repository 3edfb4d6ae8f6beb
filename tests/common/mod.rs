use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throwaway project directory laid out the way vidgen expects.
pub struct TestEnvironment {
    temp_dir: TempDir,
    project: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let project = temp_dir.path().join("demo-project");
        for dir in ["source", "script", "audio", "assets/images", "export"] {
            fs::create_dir_all(project.join(dir))?;
        }
        Ok(Self { temp_dir, project })
    }

    /// Project root
    pub fn project(&self) -> &Path {
        &self.project
    }

    pub fn project_arg(&self) -> String {
        self.project.to_string_lossy().into_owned()
    }

    #[allow(dead_code)]
    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.project.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Writes a mono 16-bit clip of `millis` length at 8 kHz.
    pub fn write_clip(&self, segment_id: &str, millis: u32) -> Result<PathBuf> {
        let path = self.project.join("audio").join(format!("{segment_id}.wav"));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec)?;
        for _ in 0..millis * 8 {
            writer.write_sample(1000i16)?;
        }
        writer.finalize()?;
        Ok(path)
    }

    pub fn read_json(&self, relative: &str) -> Result<serde_json::Value> {
        let contents = fs::read_to_string(self.project.join(relative))?;
        Ok(serde_json::from_str(&contents)?)
    }
}
