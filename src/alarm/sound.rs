use std::path::{Path, PathBuf};

use thiserror::Error;

pub const DEFAULT_ASSETS_DIR: &str = "static";

/// Logical alarm sounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SoundCue {
    Dog,
    Alarm,
}

impl SoundCue {
    /// Static animal to sound mapping. Monitored animals without a cue raise
    /// a silent alarm (snapshot only).
    pub fn for_animal(animal: &str) -> Option<Self> {
        match animal {
            "dog" => Some(Self::Dog),
            "elephant" | "bear" => Some(Self::Alarm),
            _ => None,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Dog => "dog_sound.wav",
            Self::Alarm => "alarm.wav",
        }
    }

    pub fn resolve(self, assets_dir: &Path) -> PathBuf {
        assets_dir.join(self.file_name())
    }
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("sound asset {} not found", .path.display())]
    Missing { path: PathBuf },
    #[error("failed to open {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },
    #[error("audio output unavailable: {0}")]
    Device(String),
}

/// The single audio channel.
///
/// The dispatcher is the only caller and always stops a busy channel before
/// starting a new sound, so implementations never have to mix or queue.
pub trait SoundPlayer {
    /// True while a previously started sound is still playing.
    fn is_busy(&self) -> bool;

    fn stop(&mut self);

    /// Load `path` and start playing it without blocking.
    fn play(&mut self, path: &Path) -> Result<(), PlaybackError>;
}

impl<P: SoundPlayer + ?Sized> SoundPlayer for Box<P> {
    fn is_busy(&self) -> bool {
        (**self).is_busy()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn play(&mut self, path: &Path) -> Result<(), PlaybackError> {
        (**self).play(path)
    }
}

/// Player for hosts without audio output.
///
/// Checks that the asset exists so a missing file is still reported, then
/// logs the sound it would have played.
#[derive(Debug, Default)]
pub struct NullPlayer {
    played: u64,
}

impl NullPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> u64 {
        self.played
    }
}

impl SoundPlayer for NullPlayer {
    fn is_busy(&self) -> bool {
        false
    }

    fn stop(&mut self) {}

    fn play(&mut self, path: &Path) -> Result<(), PlaybackError> {
        if !path.is_file() {
            return Err(PlaybackError::Missing {
                path: path.to_path_buf(),
            });
        }
        self.played += 1;
        log::info!("audio disabled; would play {}", path.display());
        Ok(())
    }
}
