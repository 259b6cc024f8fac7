#![cfg(feature = "display-opencv")]

use anyhow::{Context, Result};
use image::RgbImage;
use opencv::{core, highgui, prelude::*};

use super::{DisplayEvent, DisplaySink};

/// HighGUI window. Polls the keyboard for 1 ms after each frame.
pub struct OpenCvWindow {
    title: String,
    quit_key: char,
    open: bool,
}

impl OpenCvWindow {
    pub fn new(title: &str, quit_key: char) -> Result<Self> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("failed to open window '{}'", title))?;
        Ok(Self {
            title: title.to_string(),
            quit_key,
            open: true,
        })
    }
}

/// Copy an RGB image into a BGR `Mat`.
fn to_bgr_mat(frame: &RgbImage) -> Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        core::CV_8UC3,
        core::Scalar::all(0.0),
    )
    .context("allocate display buffer")?;
    let dst = mat.data_bytes_mut().context("access display buffer")?;
    for (dst, src) in dst.chunks_exact_mut(3).zip(frame.as_raw().chunks_exact(3)) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
    }
    Ok(mat)
}

impl DisplaySink for OpenCvWindow {
    fn present(&mut self, frame: &RgbImage) -> Result<DisplayEvent> {
        let mat = to_bgr_mat(frame)?;
        highgui::imshow(&self.title, &mat).context("imshow")?;
        let key = highgui::wait_key(1).context("wait_key")?;
        if key >= 0 && (key & 0xFF) as u8 == self.quit_key as u8 {
            return Ok(DisplayEvent::Quit);
        }
        Ok(DisplayEvent::Continue)
    }

    fn release(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Err(e) = highgui::destroy_window(&self.title) {
            log::warn!("failed to close window '{}': {}", self.title, e);
        }
    }
}
