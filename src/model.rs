//! Detector model artifacts.
//!
//! The model is described by three files loaded once at startup:
//! - the weights (an ONNX graph),
//! - the network config (TOML: input size and pixel normalisation),
//! - the class list (one class name per line; line order defines class ids).
//!
//! All three are bundled into an immutable `ModelSpec` that is handed to the
//! detector backend at construction time. Any missing or malformed artifact is
//! a startup error.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Ordered, index-addressable class names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassCatalog {
    names: Vec<String>,
}

impl ClassCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read class list {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid class list {}", path.display()))
    }

    /// Parse a class list. Lines are trimmed; trailing blank lines are dropped
    /// so a final newline does not create a phantom class.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut names: Vec<String> = raw.lines().map(|line| line.trim().to_string()).collect();
        while names.last().is_some_and(|name| name.is_empty()) {
            names.pop();
        }
        if names.is_empty() {
            return Err(anyhow!("class list is empty"));
        }
        Ok(Self { names })
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// Input geometry and normalisation expected by the network.
///
/// Each input value is `(pixel - mean[c]) * scale`, laid out NCHW in
/// `channel_order`.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct NetworkConfig {
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub mean: [f32; 3],
    #[serde(default)]
    pub channel_order: ChannelOrder,
}

fn default_input_size() -> u32 {
    416
}

fn default_scale() -> f32 {
    1.0 / 255.0
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            input_size: default_input_size(),
            scale: default_scale(),
            mean: [0.0; 3],
            channel_order: ChannelOrder::Rgb,
        }
    }
}

impl NetworkConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read network config {}", path.display()))?;
        let cfg: NetworkConfig = toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid network config {}: {}", path.display(), e))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(anyhow!("network input_size must be greater than zero"));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(anyhow!("network scale must be a positive number"));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(anyhow!("network mean values must be finite"));
        }
        Ok(())
    }
}

/// Locations of the three model artifacts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelPaths {
    pub weights: PathBuf,
    pub network: PathBuf,
    pub classes: PathBuf,
}

/// Everything a detector backend needs, loaded once and never mutated.
#[derive(Clone, Debug)]
pub struct ModelSpec {
    pub weights: PathBuf,
    pub network: NetworkConfig,
    pub catalog: Arc<ClassCatalog>,
}

impl ModelSpec {
    pub fn load(paths: &ModelPaths) -> Result<Self> {
        if !paths.weights.is_file() {
            return Err(anyhow!(
                "model weights not found at {}",
                paths.weights.display()
            ));
        }
        let network = NetworkConfig::load(&paths.network)?;
        let catalog = ClassCatalog::load(&paths.classes)?;
        log::info!(
            "model: weights={} input={}x{} classes={}",
            paths.weights.display(),
            network.input_size,
            network.input_size,
            catalog.len()
        );
        Ok(Self {
            weights: paths.weights.clone(),
            network,
            catalog: Arc::new(catalog),
        })
    }
}
