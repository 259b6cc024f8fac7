use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use image::RgbImage;

use animal_alarm::alarm::{AlarmDispatcher, NullPlayer};
use animal_alarm::capture::{CancelToken, CaptureLoop, Pipeline, StopReason};
use animal_alarm::detect::{RawDetection, ScriptedBackend};
use animal_alarm::display::{DisplayEvent, DisplaySink, HeadlessDisplay};
use animal_alarm::filter::{DetectionFilter, MonitoredSet, PrimaryPolicy};
use animal_alarm::frame::Frame;
use animal_alarm::ingest::{open_source, FrameSource, SourceConfig, SourceStats};
use animal_alarm::model::ClassCatalog;
use animal_alarm::snapshot::SnapshotWriter;

const PERSON: usize = 0;
const DOG: usize = 16;

fn catalog() -> Arc<ClassCatalog> {
    let mut names: Vec<String> = (0..80).map(|i| format!("class{}", i)).collect();
    names[PERSON] = "person".to_string();
    names[DOG] = "dog".to_string();
    names[21] = "bear".to_string();
    Arc::new(ClassCatalog::from_names(names))
}

fn pipeline(
    script: Vec<Vec<RawDetection>>,
    workdir: &Path,
) -> Result<Pipeline<ScriptedBackend, NullPlayer>> {
    let assets = workdir.join("static");
    std::fs::create_dir_all(&assets)?;
    std::fs::write(assets.join("dog_sound.wav"), b"RIFF")?;
    std::fs::write(assets.join("alarm.wav"), b"RIFF")?;

    let filter = DetectionFilter::new(
        catalog(),
        MonitoredSet::default(),
        0.5,
        PrimaryPolicy::LastMatch,
    )?;
    let alarms = AlarmDispatcher::new(
        NullPlayer::new(),
        assets,
        SnapshotWriter::new(workdir.join("snapshots")),
    );
    Ok(Pipeline::new(ScriptedBackend::new(script), filter, alarms))
}

/// Source that counts releases and can cancel or fail on a given frame.
struct ProbeSource {
    frames: u64,
    next: u64,
    released: Rc<Cell<u32>>,
    cancel_at: Option<(u64, CancelToken)>,
    fail_at: Option<u64>,
}

impl ProbeSource {
    fn new(frames: u64, released: Rc<Cell<u32>>) -> Self {
        Self {
            frames,
            next: 0,
            released,
            cancel_at: None,
            fail_at: None,
        }
    }
}

impl FrameSource for ProbeSource {
    fn describe(&self) -> String {
        "probe".to_string()
    }

    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.fail_at == Some(self.next) {
            return Err(anyhow!("device unplugged"));
        }
        if self.next >= self.frames {
            return Ok(None);
        }
        if let Some((at, token)) = &self.cancel_at {
            if *at == self.next {
                token.cancel();
            }
        }
        let frame = Frame::new(self.next, RgbImage::new(100, 100));
        self.next += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        self.released.set(self.released.get() + 1);
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.next,
            uri: "probe".to_string(),
        }
    }
}

/// Display that counts releases and reports the quit key after `quit_after`
/// frames.
struct ProbeDisplay {
    presented: u64,
    quit_after: Option<u64>,
    released: Rc<Cell<u32>>,
}

impl DisplaySink for ProbeDisplay {
    fn present(&mut self, _frame: &RgbImage) -> Result<DisplayEvent> {
        self.presented += 1;
        if self.quit_after == Some(self.presented) {
            return Ok(DisplayEvent::Quit);
        }
        Ok(DisplayEvent::Continue)
    }

    fn release(&mut self) {
        self.released.set(self.released.get() + 1);
    }
}

#[test]
fn three_frame_clip_raises_exactly_one_alarm() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let script = vec![
        vec![],
        vec![RawDetection::new(DOG, 0.9, (0.5, 0.5), (0.2, 0.2))],
        vec![RawDetection::new(PERSON, 0.95, (0.5, 0.5), (0.2, 0.2))],
    ];
    let mut pipeline = pipeline(script, dir.path())?;

    let mut source = open_source(&SourceConfig {
        uri: "stub://clip".to_string(),
        width: 100,
        height: 100,
        target_fps: 30,
        synthetic_frames: 3,
    })?;
    source.connect()?;
    let mut display = HeadlessDisplay::new();

    let summary =
        CaptureLoop::new(&mut source, &mut display, CancelToken::new()).run(&mut pipeline);

    assert_eq!(summary.frames, 3);
    assert_eq!(summary.qualifying_frames, 1);
    assert_eq!(summary.alarms, 1);
    assert_eq!(summary.snapshots, 1);
    assert_eq!(summary.stop_reason, StopReason::EndOfStream);
    assert_eq!(pipeline.alarms().player().played(), 1);
    assert_eq!(display.presented(), 3);

    let snapshot = dir.path().join("snapshots").join("dog_90.jpg");
    let saved = image::open(&snapshot)?.to_rgb8();
    assert_eq!(saved.dimensions(), (100, 100));
    let entries = std::fs::read_dir(dir.path().join("snapshots"))?.count();
    assert_eq!(entries, 1);
    Ok(())
}

#[test]
fn animals_below_threshold_or_unmonitored_stay_quiet() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let script = vec![
        vec![RawDetection::new(DOG, 0.5, (0.5, 0.5), (0.2, 0.2))],
        vec![RawDetection::new(PERSON, 0.99, (0.5, 0.5), (0.2, 0.2))],
    ];
    let mut pipeline = pipeline(script, dir.path())?;
    let released = Rc::new(Cell::new(0));
    let mut source = ProbeSource::new(2, released.clone());
    let mut display = HeadlessDisplay::new();

    let summary =
        CaptureLoop::new(&mut source, &mut display, CancelToken::new()).run(&mut pipeline);

    assert_eq!(summary.frames, 2);
    assert_eq!(summary.alarms, 0);
    assert!(!dir.path().join("snapshots").exists());
    Ok(())
}

#[test]
fn bear_uses_the_generic_alarm_and_snapshot_name_rounds() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let script = vec![vec![RawDetection::new(21, 0.8734, (0.5, 0.5), (0.4, 0.4))]];
    let mut pipeline = pipeline(script, dir.path())?;
    let released = Rc::new(Cell::new(0));
    let mut source = ProbeSource::new(1, released.clone());
    let mut display = HeadlessDisplay::new();

    let summary =
        CaptureLoop::new(&mut source, &mut display, CancelToken::new()).run(&mut pipeline);

    assert_eq!(summary.alarms, 1);
    assert!(dir.path().join("snapshots").join("bear_87.jpg").is_file());
    assert_eq!(pipeline.alarms().player().played(), 1);
    Ok(())
}

#[test]
fn cancellation_mid_stream_releases_once() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut pipeline = pipeline(vec![], dir.path())?;
    let source_released = Rc::new(Cell::new(0));
    let display_released = Rc::new(Cell::new(0));
    let cancel = CancelToken::new();

    let mut source = ProbeSource::new(100, source_released.clone());
    source.cancel_at = Some((1, cancel.clone()));
    let mut display = ProbeDisplay {
        presented: 0,
        quit_after: None,
        released: display_released.clone(),
    };

    let summary = CaptureLoop::new(&mut source, &mut display, cancel).run(&mut pipeline);

    // the frame read when the token flipped is still processed
    assert_eq!(summary.frames, 2);
    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(source_released.get(), 1);
    assert_eq!(display_released.get(), 1);
    Ok(())
}

#[test]
fn quit_key_stops_the_loop() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut pipeline = pipeline(vec![], dir.path())?;
    let source_released = Rc::new(Cell::new(0));
    let display_released = Rc::new(Cell::new(0));
    let mut source = ProbeSource::new(100, source_released.clone());
    let mut display = ProbeDisplay {
        presented: 0,
        quit_after: Some(3),
        released: display_released.clone(),
    };

    let summary =
        CaptureLoop::new(&mut source, &mut display, CancelToken::new()).run(&mut pipeline);

    assert_eq!(summary.frames, 3);
    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(source_released.get(), 1);
    assert_eq!(display_released.get(), 1);
    Ok(())
}

#[test]
fn read_error_stops_without_retry() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut pipeline = pipeline(vec![], dir.path())?;
    let source_released = Rc::new(Cell::new(0));
    let mut source = ProbeSource::new(100, source_released.clone());
    source.fail_at = Some(2);
    let mut display = HeadlessDisplay::new();

    let summary =
        CaptureLoop::new(&mut source, &mut display, CancelToken::new()).run(&mut pipeline);

    assert_eq!(summary.frames, 2);
    assert_eq!(summary.stop_reason, StopReason::SourceError);
    assert_eq!(source.stats().frames_captured, 2);
    assert_eq!(source_released.get(), 1);
    Ok(())
}

#[test]
fn dropping_an_unrun_loop_still_releases() {
    let released = Rc::new(Cell::new(0));
    let mut source = ProbeSource::new(1, released.clone());
    let mut display = HeadlessDisplay::new();
    drop(CaptureLoop::new(&mut source, &mut display, CancelToken::new()));
    assert_eq!(released.get(), 1);
}

#[test]
fn cooldown_suppresses_repeat_alarms() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let dog = RawDetection::new(DOG, 0.9, (0.5, 0.5), (0.2, 0.2));
    let script = vec![vec![dog]; 4];
    let filter = DetectionFilter::new(
        catalog(),
        MonitoredSet::default(),
        0.5,
        PrimaryPolicy::LastMatch,
    )?;
    let alarms = AlarmDispatcher::new(
        NullPlayer::new(),
        dir.path().join("static"),
        SnapshotWriter::new(dir.path().join("snapshots")),
    )
    .with_cooldown(std::time::Duration::from_secs(3600));
    let mut pipeline = Pipeline::new(ScriptedBackend::new(script), filter, alarms);
    let released = Rc::new(Cell::new(0));
    let mut source = ProbeSource::new(4, released);
    let mut display = HeadlessDisplay::new();

    let summary =
        CaptureLoop::new(&mut source, &mut display, CancelToken::new()).run(&mut pipeline);

    assert_eq!(summary.qualifying_frames, 4);
    assert_eq!(summary.alarms, 1);
    assert_eq!(pipeline.alarms().suppressed(), 3);
    Ok(())
}
