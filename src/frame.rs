//! Captured video frames.
//!
//! A `Frame` is one decoded RGB image plus its position in the stream. Frames
//! are produced by the ingestion layer, borrowed by the detector, mutated in
//! place by the annotator and finally handed to the display sink. Nothing
//! retains a frame across loop iterations.

use anyhow::{anyhow, Result};
use image::RgbImage;

/// One decoded RGB frame.
pub struct Frame {
    /// Zero-based position of this frame in the stream.
    pub index: u64,
    image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// Build a frame from packed RGB24 bytes.
    pub fn from_rgb(index: u64, width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("RGB buffer does not fit {}x{}", width, height))?;
        Ok(Self { index, image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgb_validates_length() {
        assert!(Frame::from_rgb(0, 2, 2, vec![0u8; 12]).is_ok());
        assert!(Frame::from_rgb(0, 2, 2, vec![0u8; 11]).is_err());
    }

    #[test]
    fn frame_reports_dimensions() -> Result<()> {
        let frame = Frame::from_rgb(7, 4, 3, vec![9u8; 36])?;
        assert_eq!(frame.index, 7);
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 3);
        assert_eq!(frame.image().get_pixel(3, 2).0, [9, 9, 9]);
        Ok(())
    }
}
