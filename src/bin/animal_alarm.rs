//! animal_alarm - watch a video source and raise an alarm on monitored animals
//!
//! Startup failures (config, model files, source) exit non-zero. Once the
//! loop runs, end of stream, Ctrl-C and the quit key all exit cleanly.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use animal_alarm::alarm::{AlarmDispatcher, NullPlayer, SoundPlayer};
use animal_alarm::capture::{CancelToken, CaptureLoop, Pipeline};
use animal_alarm::config::{AlarmConfig, CONFIG_ENV};
use animal_alarm::detect::DetectorBackend;
use animal_alarm::display::{DisplaySink, HeadlessDisplay};
use animal_alarm::filter::{DetectionFilter, PrimaryPolicy};
use animal_alarm::ingest::open_source;
use animal_alarm::model::ModelSpec;
use animal_alarm::snapshot::SnapshotWriter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON config file.
    #[arg(long, env = CONFIG_ENV)]
    config: Option<PathBuf>,
    /// Video file, image directory, camera index or stub://name.
    #[arg(long)]
    source: Option<String>,
    /// Confidence threshold in [0, 1); detections must exceed it.
    #[arg(long)]
    threshold: Option<f32>,
    /// Comma-separated class names that raise an alarm.
    #[arg(long, value_delimiter = ',')]
    monitored: Option<Vec<String>>,
    /// Primary detection policy: "last" or "highest".
    #[arg(long)]
    primary: Option<PrimaryPolicy>,
    /// Directory for alarm snapshots.
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
    /// Directory holding the alarm sounds.
    #[arg(long)]
    assets_dir: Option<PathBuf>,
    /// Minimum milliseconds between alarms (0 = every qualifying frame).
    #[arg(long)]
    cooldown_ms: Option<u64>,
    /// Show annotated frames in a window.
    #[arg(long)]
    window: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = load_config(&args)?;

    let spec = ModelSpec::load(&cfg.model)?;
    let mut detector = build_detector(&spec)?;
    if let Err(e) = detector.warm_up() {
        log::warn!("detector warm-up failed: {:#}", e);
    }

    let filter = DetectionFilter::new(
        spec.catalog.clone(),
        cfg.monitored_set()?,
        cfg.threshold,
        cfg.primary,
    )?;
    let alarms = AlarmDispatcher::new(
        build_player(),
        cfg.assets_dir.clone(),
        SnapshotWriter::new(cfg.snapshot_dir.clone()),
    )
    .with_cooldown(cfg.cooldown);
    let mut pipeline = Pipeline::new(detector, filter, alarms);

    let mut source = open_source(&cfg.source)?;
    source
        .connect()
        .with_context(|| format!("failed to open video source {}", cfg.source.uri))?;
    let mut display = build_display(&cfg)?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        log::info!("shutdown signal received");
        handler_token.cancel();
    })
    .context("error setting Ctrl-C handler")?;

    log::info!(
        "monitoring {} for [{}] above {:.2}",
        cfg.source.uri,
        cfg.monitored.join(", "),
        cfg.threshold
    );
    let summary = CaptureLoop::new(&mut source, &mut display, cancel).run(&mut pipeline);

    log::info!(
        "done: {} frames, {} with animals, {} alarms ({} suppressed), {} snapshots, {} detector failures, stop={:?}",
        summary.frames,
        summary.qualifying_frames,
        summary.alarms,
        pipeline.alarms().suppressed(),
        summary.snapshots,
        summary.detection_failures,
        summary.stop_reason
    );
    Ok(())
}

fn load_config(args: &Args) -> Result<AlarmConfig> {
    let mut cfg = AlarmConfig::load(args.config.as_deref())?;
    if let Some(source) = &args.source {
        cfg.source.uri = source.clone();
    }
    if let Some(threshold) = args.threshold {
        cfg.threshold = threshold;
    }
    if let Some(monitored) = &args.monitored {
        cfg.monitored = monitored.clone();
    }
    if let Some(primary) = args.primary {
        cfg.primary = primary;
    }
    if let Some(dir) = &args.snapshot_dir {
        cfg.snapshot_dir = dir.clone();
    }
    if let Some(dir) = &args.assets_dir {
        cfg.assets_dir = dir.clone();
    }
    if let Some(millis) = args.cooldown_ms {
        cfg.cooldown = Duration::from_millis(millis);
    }
    if args.window {
        cfg.display.window = true;
    }
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(feature = "backend-tract")]
fn build_detector(spec: &ModelSpec) -> Result<Box<dyn DetectorBackend>> {
    let backend = animal_alarm::detect::TractBackend::new(spec)?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn build_detector(spec: &ModelSpec) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow::anyhow!(
        "cannot load {}: built without the backend-tract feature",
        spec.weights.display()
    ))
}

#[cfg(feature = "audio-rodio")]
fn build_player() -> Box<dyn SoundPlayer> {
    match animal_alarm::alarm::RodioPlayer::new() {
        Ok(player) => Box::new(player),
        Err(e) => {
            log::warn!("no audio output ({}); alarms will be silent", e);
            Box::new(NullPlayer::new())
        }
    }
}

#[cfg(not(feature = "audio-rodio"))]
fn build_player() -> Box<dyn SoundPlayer> {
    Box::new(NullPlayer::new())
}

fn build_display(cfg: &AlarmConfig) -> Result<Box<dyn DisplaySink>> {
    if !cfg.display.window {
        return Ok(Box::new(HeadlessDisplay::new()));
    }
    #[cfg(feature = "display-opencv")]
    {
        let window =
            animal_alarm::display::OpenCvWindow::new(&cfg.display.title, cfg.display.quit_key)?;
        Ok(Box::new(window))
    }
    #[cfg(not(feature = "display-opencv"))]
    {
        Err(anyhow::anyhow!(
            "--window requires the display-opencv feature; run without it for headless mode"
        ))
    }
}
