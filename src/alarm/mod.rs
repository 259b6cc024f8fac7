//! Alarm dispatch.
//!
//! One dispatch per frame that has a primary qualifying detection:
//! 1. log the event
//! 2. write the annotated frame as a snapshot
//! 3. resolve the animal's sound cue and play it on the single audio channel
//!
//! Snapshot and playback failures are logged here and never reach the capture
//! loop. An optional cooldown suppresses dispatches that follow the previous
//! one too closely; with the default zero cooldown every qualifying frame
//! fires.

#[cfg(feature = "audio-rodio")]
mod rodio_player;
pub mod sound;

use image::RgbImage;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::snapshot::SnapshotWriter;

#[cfg(feature = "audio-rodio")]
pub use rodio_player::RodioPlayer;
pub use sound::{NullPlayer, PlaybackError, SoundCue, SoundPlayer, DEFAULT_ASSETS_DIR};

/// A qualifying detection ready to be acted on.
pub struct AlarmEvent<'a> {
    pub animal_name: &'a str,
    pub confidence: f32,
    /// Annotated frame; this is what gets saved.
    pub frame: &'a RgbImage,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SoundOutcome {
    Played(PathBuf),
    /// No cue is mapped for this animal.
    NoCue,
    Failed { path: PathBuf, reason: String },
}

/// What a non-suppressed dispatch did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchReport {
    pub snapshot: Option<PathBuf>,
    pub sound: SoundOutcome,
}

/// Cooldown gate between consecutive alarms.
#[derive(Clone, Debug)]
pub struct Debounce {
    cooldown: Duration,
    last_fired: Option<Instant>,
}

impl Debounce {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_fired: None,
        }
    }

    /// Returns true and records `now` when an alarm may fire.
    pub fn try_fire(&mut self, now: Instant) -> bool {
        if let Some(prev) = self.last_fired {
            if now.saturating_duration_since(prev) < self.cooldown {
                return false;
            }
        }
        self.last_fired = Some(now);
        true
    }
}

pub struct AlarmDispatcher<P: SoundPlayer> {
    player: P,
    assets_dir: PathBuf,
    snapshots: SnapshotWriter,
    debounce: Debounce,
    dispatched: u64,
    suppressed: u64,
}

impl<P: SoundPlayer> AlarmDispatcher<P> {
    pub fn new<A: Into<PathBuf>>(player: P, assets_dir: A, snapshots: SnapshotWriter) -> Self {
        Self {
            player,
            assets_dir: assets_dir.into(),
            snapshots,
            debounce: Debounce::new(Duration::ZERO),
            dispatched: 0,
            suppressed: 0,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.debounce = Debounce::new(cooldown);
        self
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    /// Number of alarms that went through (not suppressed).
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    pub fn dispatch(&mut self, event: &AlarmEvent<'_>) -> Option<DispatchReport> {
        self.dispatch_at(event, Instant::now())
    }

    /// Dispatch with an explicit clock reading. Returns `None` when the
    /// cooldown suppressed the alarm.
    pub fn dispatch_at(&mut self, event: &AlarmEvent<'_>, now: Instant) -> Option<DispatchReport> {
        if !self.debounce.try_fire(now) {
            self.suppressed += 1;
            log::info!(
                "alarm for {} suppressed by cooldown",
                event.animal_name
            );
            return None;
        }
        self.dispatched += 1;

        log::info!(
            "animal detected: {} ({:.2}%)",
            event.animal_name,
            event.confidence * 100.0
        );

        let snapshot = match self
            .snapshots
            .save(event.frame, event.animal_name, event.confidence)
        {
            Ok(path) => {
                log::info!("snapshot saved at: {}", path.display());
                Some(path)
            }
            Err(e) => {
                log::error!("snapshot for {} failed: {:#}", event.animal_name, e);
                None
            }
        };

        let sound = match SoundCue::for_animal(event.animal_name) {
            Some(cue) => self.play(cue),
            None => {
                log::info!("no alarm sound set for {}", event.animal_name);
                SoundOutcome::NoCue
            }
        };

        Some(DispatchReport { snapshot, sound })
    }

    fn play(&mut self, cue: SoundCue) -> SoundOutcome {
        let path = cue.resolve(&self.assets_dir);
        if self.player.is_busy() {
            self.player.stop();
        }
        match self.player.play(&path) {
            Ok(()) => SoundOutcome::Played(path),
            Err(e) => {
                log::warn!("failed to play sound {}: {}", cue.file_name(), e);
                SoundOutcome::Failed {
                    path,
                    reason: e.to_string(),
                }
            }
        }
    }
}
