//! Animal Alarm
//!
//! Watches a video stream with an object detector and raises an alarm when a
//! monitored animal appears: the frame is annotated, saved as a snapshot, and
//! an animal-specific sound is played.
//!
//! # Pipeline
//!
//! Each frame flows through the same stages:
//!
//! 1. `ingest`: read the next frame from a camera, video file, image
//!    directory or synthetic source.
//! 2. `detect`: run the detector backend and decode its raw output rows.
//! 3. `filter`: keep monitored classes above the confidence threshold and pick
//!    one primary detection.
//! 4. `annotate`: draw boxes and labels on the frame.
//! 5. `alarm`: snapshot the annotated frame and play the sound cue.
//! 6. `display`: present the frame and poll for the quit key.
//!
//! `capture` owns the loop and its stop conditions; `config` and `model` load
//! everything the loop needs before it starts.

pub mod alarm;
pub mod annotate;
pub mod capture;
pub mod config;
pub mod detect;
pub mod display;
pub mod filter;
pub mod frame;
pub mod ingest;
pub mod model;
pub mod snapshot;

pub use alarm::{AlarmDispatcher, AlarmEvent, NullPlayer, SoundCue, SoundPlayer};
pub use capture::{CancelToken, CaptureLoop, LoopState, Pipeline, RunSummary, StopReason};
pub use config::AlarmConfig;
pub use detect::{DetectorBackend, RawDetection};
pub use filter::{DetectionFilter, MonitoredSet, PrimaryPolicy, QualifyingDetection};
pub use frame::Frame;
pub use ingest::{open_source, FrameSource, SourceConfig};
pub use model::{ClassCatalog, ModelPaths, ModelSpec};
pub use snapshot::SnapshotWriter;
