//! Frame ingestion sources.
//!
//! This module provides the video sources the capture loop can read from:
//! - Synthetic frames (`stub://<name>`, testing and demos)
//! - A directory of still images, read in file-name order
//! - Local video files (feature: ingest-file-ffmpeg)
//! - USB/V4L2 cameras by index (`camera://0` or `0`, feature: ingest-v4l2)
//!
//! Only local sources are supported; other URL schemes are rejected.
//!
//! Every source yields `Ok(None)` once it has no more frames. A read error is
//! returned as `Err` and the capture loop stops without retrying.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use crate::frame::Frame;

pub use file::{FileConfig, FileSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{CameraConfig, CameraSource};

/// A pull-based video source.
pub trait FrameSource {
    /// Human-readable origin, for logs.
    fn describe(&self) -> String;

    fn connect(&mut self) -> Result<()>;

    /// Read the next frame; `Ok(None)` means end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying device or file handle.
    fn release(&mut self);

    fn stats(&self) -> SourceStats;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub uri: String,
}

/// Source selection and capture geometry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceConfig {
    pub uri: String,
    /// Preferred frame width (cameras and synthetic frames).
    pub width: u32,
    /// Preferred frame height (cameras and synthetic frames).
    pub height: u32,
    pub target_fps: u32,
    /// Number of frames a `stub://` source yields before end of stream.
    pub synthetic_frames: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            uri: "dog_video.mp4".to_string(),
            width: 640,
            height: 480,
            target_fps: 30,
            synthetic_frames: 100,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Synthetic(String),
    Camera(u32),
    ImageDir(PathBuf),
    VideoFile(PathBuf),
}

impl SourceKind {
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(anyhow!("video source must not be empty"));
        }
        if let Some(name) = uri.strip_prefix("stub://") {
            return Ok(Self::Synthetic(name.to_string()));
        }
        if let Some(index) = uri.strip_prefix("camera://") {
            let index = index
                .parse()
                .map_err(|_| anyhow!("camera index must be a number, got '{}'", index))?;
            return Ok(Self::Camera(index));
        }
        if uri.chars().all(|c| c.is_ascii_digit()) {
            let index = uri
                .parse()
                .map_err(|_| anyhow!("camera index '{}' is out of range", uri))?;
            return Ok(Self::Camera(index));
        }
        if uri.contains("://") {
            return Err(anyhow!(
                "only local video sources are supported (got '{}')",
                uri
            ));
        }
        let path = Path::new(uri);
        if path.is_dir() {
            Ok(Self::ImageDir(path.to_path_buf()))
        } else {
            Ok(Self::VideoFile(path.to_path_buf()))
        }
    }
}

/// Build (but do not connect) the source named by `config.uri`.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    match SourceKind::parse(&config.uri)? {
        SourceKind::Synthetic(_) | SourceKind::ImageDir(_) | SourceKind::VideoFile(_) => {
            let source = FileSource::new(FileConfig {
                path: config.uri.trim().to_string(),
                width: config.width,
                height: config.height,
                synthetic_frames: config.synthetic_frames,
            })?;
            Ok(Box::new(source))
        }
        SourceKind::Camera(index) => open_camera(index, config),
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_camera(index: u32, config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    let source = CameraSource::new(CameraConfig {
        device: format!("/dev/video{}", index),
        target_fps: config.target_fps,
        width: config.width,
        height: config.height,
    })?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_camera(index: u32, _config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "camera {} requested but camera capture requires the ingest-v4l2 feature",
        index
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_source_kinds() -> Result<()> {
        assert_eq!(
            SourceKind::parse("stub://yard")?,
            SourceKind::Synthetic("yard".to_string())
        );
        assert_eq!(SourceKind::parse("0")?, SourceKind::Camera(0));
        assert_eq!(SourceKind::parse("camera://2")?, SourceKind::Camera(2));
        assert_eq!(
            SourceKind::parse("dog_video.mp4")?,
            SourceKind::VideoFile(PathBuf::from("dog_video.mp4"))
        );
        let dir = tempfile::tempdir()?;
        assert_eq!(
            SourceKind::parse(&dir.path().display().to_string())?,
            SourceKind::ImageDir(dir.path().to_path_buf())
        );
        Ok(())
    }

    #[test]
    fn rejects_remote_and_empty_sources() {
        assert!(SourceKind::parse("").is_err());
        assert!(SourceKind::parse("rtsp://camera/stream").is_err());
        assert!(SourceKind::parse("camera://front").is_err());
    }

    #[test]
    fn opens_synthetic_source() -> Result<()> {
        let mut source = open_source(&SourceConfig {
            uri: "stub://test".to_string(),
            width: 32,
            height: 24,
            synthetic_frames: 2,
            ..SourceConfig::default()
        })?;
        source.connect()?;
        let frame = source.next_frame()?.expect("first frame");
        assert_eq!((frame.width(), frame.height()), (32, 24));
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }
}
