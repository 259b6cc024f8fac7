//! demo - end-to-end synthetic run of the animal alarm pipeline
//!
//! Uses a `stub://` source and a scripted detector that reports a dog on one
//! frame, so it needs no model files, camera or audio device.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use animal_alarm::alarm::{AlarmDispatcher, NullPlayer, DEFAULT_ASSETS_DIR};
use animal_alarm::capture::{CancelToken, CaptureLoop, Pipeline};
use animal_alarm::detect::{RawDetection, ScriptedBackend};
use animal_alarm::display::HeadlessDisplay;
use animal_alarm::filter::{DetectionFilter, MonitoredSet, PrimaryPolicy, DEFAULT_THRESHOLD};
use animal_alarm::ingest::{FileConfig, FileSource, FrameSource};
use animal_alarm::model::ClassCatalog;
use animal_alarm::snapshot::SnapshotWriter;

const DEMO_CLASSES: [&str; 5] = ["person", "dog", "elephant", "bear", "cow"];

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of synthetic frames.
    #[arg(long, default_value_t = 10)]
    frames: u64,
    /// Zero-based frame on which the dog appears.
    #[arg(long, default_value_t = 3)]
    dog_frame: u64,
    /// Confidence reported for the dog.
    #[arg(long, default_value_t = 0.9)]
    confidence: f32,
    /// Output directory for snapshots.
    #[arg(long, default_value = "demo_out")]
    out: PathBuf,
    /// Directory holding the alarm sounds.
    #[arg(long, default_value = DEFAULT_ASSETS_DIR)]
    assets_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.frames == 0 {
        return Err(anyhow!("frames must be >= 1"));
    }
    if args.dog_frame >= args.frames {
        return Err(anyhow!(
            "dog frame {} is outside the {} synthetic frames",
            args.dog_frame,
            args.frames
        ));
    }

    let catalog = Arc::new(ClassCatalog::from_names(DEMO_CLASSES));
    let dog_id = catalog
        .position("dog")
        .ok_or_else(|| anyhow!("demo catalog has no dog class"))?;

    let mut script = vec![Vec::new(); args.dog_frame as usize];
    script.push(vec![RawDetection::new(
        dog_id,
        args.confidence,
        (0.5, 0.5),
        (0.3, 0.4),
    )]);

    let filter = DetectionFilter::new(
        catalog,
        MonitoredSet::default(),
        DEFAULT_THRESHOLD,
        PrimaryPolicy::default(),
    )?;
    let alarms = AlarmDispatcher::new(
        NullPlayer::new(),
        args.assets_dir.clone(),
        SnapshotWriter::new(args.out.clone()),
    );
    let mut pipeline = Pipeline::new(ScriptedBackend::new(script), filter, alarms);

    let mut source = FileSource::new(FileConfig {
        path: "stub://demo".to_string(),
        width: 320,
        height: 240,
        synthetic_frames: args.frames,
    })?;
    source.connect()?;
    let mut display = HeadlessDisplay::new();

    let summary =
        CaptureLoop::new(&mut source, &mut display, CancelToken::new()).run(&mut pipeline);

    println!("demo complete");
    println!("  frames processed: {}", summary.frames);
    println!("  alarms raised:    {}", summary.alarms);
    println!("  snapshots:        {}", summary.snapshots);
    println!("  sounds played:    {}", pipeline.alarms().player().played());
    println!("  stop reason:      {:?}", summary.stop_reason);
    println!("  snapshot dir:     {}", args.out.display());
    Ok(())
}
