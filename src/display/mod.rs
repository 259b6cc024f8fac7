//! Display sinks.
//!
//! The capture loop presents every annotated frame to a `DisplaySink` and
//! polls it for the quit key in the same call. Presentation is synchronous and
//! returns promptly.

#[cfg(feature = "display-opencv")]
mod opencv_window;

use anyhow::Result;
use image::RgbImage;

#[cfg(feature = "display-opencv")]
pub use opencv_window::OpenCvWindow;

pub const DEFAULT_WINDOW_TITLE: &str = "Animal Detection";
pub const DEFAULT_QUIT_KEY: char = 'q';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayEvent {
    Continue,
    /// The user pressed the quit key.
    Quit,
}

pub trait DisplaySink {
    /// Show `frame` and report whether the user asked to quit.
    fn present(&mut self, frame: &RgbImage) -> Result<DisplayEvent>;

    /// Tear down any window resources. Called once when the loop stops.
    fn release(&mut self);
}

impl<K: DisplaySink + ?Sized> DisplaySink for Box<K> {
    fn present(&mut self, frame: &RgbImage) -> Result<DisplayEvent> {
        (**self).present(frame)
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Sink for runs without a screen. Frames are counted and dropped; quitting is
/// left to the Ctrl-C handler.
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    presented: u64,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl DisplaySink for HeadlessDisplay {
    fn present(&mut self, frame: &RgbImage) -> Result<DisplayEvent> {
        self.presented += 1;
        log::trace!(
            "headless display: frame {} ({}x{})",
            self.presented,
            frame.width(),
            frame.height()
        );
        Ok(DisplayEvent::Continue)
    }

    fn release(&mut self) {
        log::debug!("headless display released after {} frames", self.presented);
    }
}
