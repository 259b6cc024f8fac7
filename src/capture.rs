//! Capture loop.
//!
//! Drives the pipeline one frame at a time:
//!
//! ```text
//! source -> detector -> filter -> annotate -> (alarm) -> display
//! ```
//!
//! The loop has two states, `Running` and `Stopped`. It stops on end of
//! stream, on a failed frame read (no retry), when the cancel token is set or
//! when the display reports the quit key. Per-frame detector failures are
//! logged and the frame is still displayed, unannotated. Source and display
//! are released exactly once on every exit path by a drop guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::alarm::{AlarmDispatcher, AlarmEvent, DispatchReport, SoundPlayer};
use crate::annotate::annotate;
use crate::detect::DetectorBackend;
use crate::display::{DisplayEvent, DisplaySink};
use crate::filter::DetectionFilter;
use crate::frame::Frame;
use crate::ingest::FrameSource;

/// Cooperative cancellation flag, shareable with a signal handler.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    /// Cancel token or quit key.
    Cancelled,
    /// Reading a frame failed.
    SourceError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped(StopReason),
}

/// Result of one processed frame.
#[derive(Debug, Default)]
pub struct FrameOutcome {
    pub detections: usize,
    pub qualifying: usize,
    pub detection_failed: bool,
    pub alarm: Option<DispatchReport>,
}

/// Totals for a finished run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub detection_failures: u64,
    pub qualifying_frames: u64,
    pub alarms: u64,
    pub snapshots: u64,
    pub stop_reason: StopReason,
}

impl RunSummary {
    fn new() -> Self {
        Self {
            frames: 0,
            detection_failures: 0,
            qualifying_frames: 0,
            alarms: 0,
            snapshots: 0,
            stop_reason: StopReason::EndOfStream,
        }
    }

    fn record(&mut self, outcome: &FrameOutcome) {
        self.frames += 1;
        if outcome.detection_failed {
            self.detection_failures += 1;
        }
        if outcome.qualifying > 0 {
            self.qualifying_frames += 1;
        }
        if let Some(report) = &outcome.alarm {
            self.alarms += 1;
            if report.snapshot.is_some() {
                self.snapshots += 1;
            }
        }
    }
}

/// Detector, filter and alarm dispatcher for one frame at a time.
pub struct Pipeline<D: DetectorBackend, P: SoundPlayer> {
    detector: D,
    filter: DetectionFilter,
    alarms: AlarmDispatcher<P>,
}

impl<D: DetectorBackend, P: SoundPlayer> Pipeline<D, P> {
    pub fn new(detector: D, filter: DetectionFilter, alarms: AlarmDispatcher<P>) -> Self {
        Self {
            detector,
            filter,
            alarms,
        }
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn alarms(&self) -> &AlarmDispatcher<P> {
        &self.alarms
    }

    /// Detect, filter, annotate `frame` in place and dispatch at most one
    /// alarm for it.
    pub fn process(&mut self, frame: &mut Frame) -> FrameOutcome {
        let detections = match self.detector.detect(frame) {
            Ok(detections) => detections,
            Err(e) => {
                log::warn!(
                    "detector {} failed on frame {}: {:#}",
                    self.detector.name(),
                    frame.index,
                    e
                );
                return FrameOutcome {
                    detection_failed: true,
                    ..FrameOutcome::default()
                };
            }
        };

        let outcome = self
            .filter
            .filter(&detections, frame.width(), frame.height());
        for det in &outcome.qualifying {
            log::info!(
                "frame {}: {} {:.2}% at ({}, {}) {}x{}",
                frame.index,
                det.animal_name,
                det.confidence * 100.0,
                det.rect.x,
                det.rect.y,
                det.rect.w,
                det.rect.h
            );
        }
        annotate(frame.image_mut(), &outcome.qualifying);

        let alarm = outcome.primary.as_ref().and_then(|primary| {
            self.alarms.dispatch(&AlarmEvent {
                animal_name: &primary.animal_name,
                confidence: primary.confidence,
                frame: frame.image(),
            })
        });

        FrameOutcome {
            detections: detections.len(),
            qualifying: outcome.qualifying.len(),
            detection_failed: false,
            alarm,
        }
    }
}

/// Releases source and display when dropped.
struct Session<'a, S: FrameSource + ?Sized, K: DisplaySink + ?Sized> {
    source: &'a mut S,
    display: &'a mut K,
}

impl<S: FrameSource + ?Sized, K: DisplaySink + ?Sized> Drop for Session<'_, S, K> {
    fn drop(&mut self) {
        let stats = self.source.stats();
        self.source.release();
        self.display.release();
        log::info!(
            "capture stopped: released {} after {} frames",
            stats.uri,
            stats.frames_captured
        );
    }
}

pub struct CaptureLoop<'a, S: FrameSource + ?Sized, K: DisplaySink + ?Sized> {
    session: Session<'a, S, K>,
    cancel: CancelToken,
    state: LoopState,
    summary: RunSummary,
}

impl<'a, S: FrameSource + ?Sized, K: DisplaySink + ?Sized> CaptureLoop<'a, S, K> {
    /// Take over a connected source and a display. Both are released when the
    /// loop is dropped, whether or not `run` completed.
    pub fn new(source: &'a mut S, display: &'a mut K, cancel: CancelToken) -> Self {
        Self {
            session: Session { source, display },
            cancel,
            state: LoopState::Running,
            summary: RunSummary::new(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Run one iteration. Returns the state after it.
    pub fn step<D: DetectorBackend, P: SoundPlayer>(
        &mut self,
        pipeline: &mut Pipeline<D, P>,
    ) -> LoopState {
        if let LoopState::Stopped(_) = self.state {
            return self.state;
        }
        if self.cancel.is_cancelled() {
            return self.stop(StopReason::Cancelled);
        }

        let mut frame = match self.session.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return self.stop(StopReason::EndOfStream),
            Err(e) => {
                log::error!(
                    "reading from {} failed: {:#}",
                    self.session.source.describe(),
                    e
                );
                return self.stop(StopReason::SourceError);
            }
        };

        let outcome = pipeline.process(&mut frame);
        self.summary.record(&outcome);

        match self.session.display.present(frame.image()) {
            Ok(DisplayEvent::Continue) => self.state,
            Ok(DisplayEvent::Quit) => self.stop(StopReason::Cancelled),
            Err(e) => {
                log::warn!("display failed on frame {}: {:#}", frame.index, e);
                self.state
            }
        }
    }

    /// Run until stopped and return the totals. Source and display are
    /// released before this returns.
    pub fn run<D: DetectorBackend, P: SoundPlayer>(
        mut self,
        pipeline: &mut Pipeline<D, P>,
    ) -> RunSummary {
        log::info!("capture started on {}", self.session.source.describe());
        while self.step(pipeline) == LoopState::Running {}
        self.summary
    }

    fn stop(&mut self, reason: StopReason) -> LoopState {
        log::info!("capture loop stopping: {:?}", reason);
        self.summary.stop_reason = reason;
        self.state = LoopState::Stopped(reason);
        self.state
    }
}
