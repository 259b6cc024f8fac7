//! Snapshot persistence.
//!
//! Annotated frames are written as JPEG files named
//! `<animal>_<confidence percent>.jpg`. The percentage is rounded half away
//! from zero (`87.5` becomes `88`). Names are not time-unique: a later alarm
//! for the same animal and rounded confidence overwrites the earlier file.

use anyhow::{Context, Result};
use image::{ImageFormat, RgbImage};
use std::path::{Path, PathBuf};

pub const DEFAULT_SNAPSHOT_DIR: &str = "snapshots";

/// File name for a snapshot, e.g. `bear_87.jpg` for `("bear", 0.8734)`.
pub fn snapshot_file_name(animal: &str, confidence: f32) -> String {
    let percent = (confidence * 100.0).round() as u32;
    format!("{}_{}.jpg", animal, percent)
}

#[derive(Clone, Debug)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `frame` under the deterministic name and return its path. The
    /// directory is created on demand.
    pub fn save(&self, frame: &RgbImage, animal: &str, confidence: f32) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create snapshot dir {}", self.dir.display()))?;
        let path = self.dir.join(snapshot_file_name(animal, confidence));
        frame
            .save_with_format(&path, ImageFormat::Jpeg)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        Ok(path)
    }
}

impl Default for SnapshotWriter {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_DIR)
    }
}
