use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::alarm::DEFAULT_ASSETS_DIR;
use crate::display::{DEFAULT_QUIT_KEY, DEFAULT_WINDOW_TITLE};
use crate::filter::{MonitoredSet, PrimaryPolicy, DEFAULT_MONITORED, DEFAULT_THRESHOLD};
use crate::ingest::{SourceConfig, SourceKind};
use crate::model::ModelPaths;
use crate::snapshot::DEFAULT_SNAPSHOT_DIR;

pub const CONFIG_ENV: &str = "ANIMAL_ALARM_CONFIG";

const DEFAULT_WEIGHTS: &str = "yolov3-tiny.onnx";
const DEFAULT_NETWORK: &str = "yolov3-tiny.toml";
const DEFAULT_CLASSES: &str = "coco.names";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AlarmConfigFile {
    model: Option<ModelConfigFile>,
    source: Option<SourceConfigFile>,
    threshold: Option<f32>,
    monitored: Option<Vec<String>>,
    primary: Option<PrimaryPolicy>,
    assets_dir: Option<PathBuf>,
    snapshot_dir: Option<PathBuf>,
    cooldown_ms: Option<u64>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ModelConfigFile {
    weights: Option<PathBuf>,
    network: Option<PathBuf>,
    classes: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceConfigFile {
    uri: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    synthetic_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DisplayConfigFile {
    window: Option<bool>,
    title: Option<String>,
    quit_key: Option<char>,
}

#[derive(Debug, Clone)]
pub struct AlarmConfig {
    pub model: ModelPaths,
    pub source: SourceConfig,
    pub threshold: f32,
    pub monitored: Vec<String>,
    pub primary: PrimaryPolicy,
    pub assets_dir: PathBuf,
    pub snapshot_dir: PathBuf,
    /// Minimum gap between alarms; zero fires on every qualifying frame.
    pub cooldown: Duration,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySettings {
    /// Open a window; otherwise frames go to the headless sink.
    pub window: bool,
    pub title: String,
    pub quit_key: char,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            window: false,
            title: DEFAULT_WINDOW_TITLE.to_string(),
            quit_key: DEFAULT_QUIT_KEY,
        }
    }
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self::from_file(AlarmConfigFile::default())
    }
}

impl AlarmConfig {
    /// Load from `path` (or `ANIMAL_ALARM_CONFIG` when `path` is `None`),
    /// apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let file_cfg = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Some(read_config_file(&path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AlarmConfigFile) -> Self {
        let model = file.model.unwrap_or_default();
        let model = ModelPaths {
            weights: model
                .weights
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WEIGHTS)),
            network: model
                .network
                .unwrap_or_else(|| PathBuf::from(DEFAULT_NETWORK)),
            classes: model
                .classes
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CLASSES)),
        };

        let defaults = SourceConfig::default();
        let source = file.source.unwrap_or_default();
        let source = SourceConfig {
            uri: source.uri.unwrap_or(defaults.uri),
            width: source.width.unwrap_or(defaults.width),
            height: source.height.unwrap_or(defaults.height),
            target_fps: source.target_fps.unwrap_or(defaults.target_fps),
            synthetic_frames: source.synthetic_frames.unwrap_or(defaults.synthetic_frames),
        };

        let display_defaults = DisplaySettings::default();
        let display = file.display.unwrap_or_default();
        let display = DisplaySettings {
            window: display.window.unwrap_or(display_defaults.window),
            title: display.title.unwrap_or(display_defaults.title),
            quit_key: display.quit_key.unwrap_or(display_defaults.quit_key),
        };

        Self {
            model,
            source,
            threshold: file.threshold.unwrap_or(DEFAULT_THRESHOLD),
            monitored: file
                .monitored
                .unwrap_or_else(|| DEFAULT_MONITORED.iter().map(|s| s.to_string()).collect()),
            primary: file.primary.unwrap_or_default(),
            assets_dir: file
                .assets_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSETS_DIR)),
            snapshot_dir: file
                .snapshot_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_DIR)),
            cooldown: Duration::from_millis(file.cooldown_ms.unwrap_or(0)),
            display,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(uri) = std::env::var("ANIMAL_ALARM_SOURCE") {
            if !uri.trim().is_empty() {
                self.source.uri = uri;
            }
        }
        if let Ok(threshold) = std::env::var("ANIMAL_ALARM_THRESHOLD") {
            self.threshold = threshold.trim().parse().map_err(|_| {
                anyhow!("ANIMAL_ALARM_THRESHOLD must be a number in [0, 1)")
            })?;
        }
        if let Ok(monitored) = std::env::var("ANIMAL_ALARM_MONITORED") {
            let parsed = split_csv(&monitored);
            if !parsed.is_empty() {
                self.monitored = parsed;
            }
        }
        if let Ok(dir) = std::env::var("ANIMAL_ALARM_SNAPSHOT_DIR") {
            if !dir.trim().is_empty() {
                self.snapshot_dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("ANIMAL_ALARM_ASSETS_DIR") {
            if !dir.trim().is_empty() {
                self.assets_dir = PathBuf::from(dir);
            }
        }
        if let Ok(cooldown) = std::env::var("ANIMAL_ALARM_COOLDOWN_MS") {
            let millis: u64 = cooldown.trim().parse().map_err(|_| {
                anyhow!("ANIMAL_ALARM_COOLDOWN_MS must be an integer number of milliseconds")
            })?;
            self.cooldown = Duration::from_millis(millis);
        }
        Ok(())
    }

    /// Check invariants after every override has been applied. Binaries call
    /// this again once CLI flags are merged in.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.threshold) {
            return Err(anyhow!(
                "threshold must be within [0, 1), got {}",
                self.threshold
            ));
        }
        self.monitored_set()?;
        SourceKind::parse(&self.source.uri)?;
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be non-zero"));
        }
        if !self.display.quit_key.is_ascii() || self.display.quit_key.is_ascii_control() {
            return Err(anyhow!(
                "quit key must be a printable ASCII character, got {:?}",
                self.display.quit_key
            ));
        }
        Ok(())
    }

    pub fn monitored_set(&self) -> Result<MonitoredSet> {
        MonitoredSet::new(self.monitored.iter())
    }
}

fn read_config_file(path: &Path) -> Result<AlarmConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
