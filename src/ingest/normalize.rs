//! Conversion of camera buffers to packed RGB24.

use anyhow::{anyhow, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Nv12,
    /// Packed 4:2:2, `Y0 U Y1 V` per pixel pair.
    Yuyv,
}

impl PixelFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(Self::Rgb24),
            b"NV12" => Some(Self::Nv12),
            b"YUYV" => Some(Self::Yuyv),
            _ => None,
        }
    }

    fn expected_len(self, width: usize, height: usize) -> Option<usize> {
        let pixels = width.checked_mul(height)?;
        match self {
            Self::Rgb24 => pixels.checked_mul(3),
            Self::Nv12 => pixels.checked_add(pixels / 2),
            Self::Yuyv => pixels.checked_mul(2),
        }
    }
}

pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    let (w, h) = (width as usize, height as usize);
    let expected = format
        .expected_len(w, h)
        .ok_or_else(|| anyhow!("{:?} frame dimensions overflow", format))?;
    // drivers may pad the final buffer
    if pixels.len() < expected {
        return Err(anyhow!(
            "{:?} frame too short: expected {} bytes, got {}",
            format,
            expected,
            pixels.len()
        ));
    }
    let pixels = &pixels[..expected];

    match format {
        PixelFormat::Rgb24 => Ok(pixels.to_vec()),
        PixelFormat::Nv12 => {
            let y_plane = w * h;
            let mut rgb = Vec::with_capacity(y_plane * 3);
            for j in 0..h {
                for i in 0..w {
                    let uv = y_plane + (j / 2) * w + (i / 2) * 2;
                    rgb.extend_from_slice(&yuv_to_rgb(pixels[j * w + i], pixels[uv], pixels[uv + 1]));
                }
            }
            Ok(rgb)
        }
        PixelFormat::Yuyv => {
            let mut rgb = Vec::with_capacity(w * h * 3);
            for quad in pixels.chunks_exact(4) {
                let (y0, u, y1, v) = (quad[0], quad[1], quad[2], quad[3]);
                rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
                rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
            }
            Ok(rgb)
        }
    }
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;
    [
        clamp_to_u8(y + 1.402 * v),
        clamp_to_u8(y - 0.344_136 * u - 0.714_136 * v),
        clamp_to_u8(y + 1.772 * u),
    ]
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_chroma_produces_gray() -> Result<()> {
        let nv12 = [vec![128u8; 4], vec![128u8; 2]].concat();
        assert_eq!(normalize_to_rgb(&nv12, 2, 2, PixelFormat::Nv12)?, vec![128u8; 12]);

        let yuyv = [64u8, 128, 200, 128];
        assert_eq!(
            normalize_to_rgb(&yuyv, 2, 1, PixelFormat::Yuyv)?,
            vec![64, 64, 64, 200, 200, 200]
        );
        Ok(())
    }

    #[test]
    fn short_buffers_are_rejected_and_padding_trimmed() -> Result<()> {
        assert!(normalize_to_rgb(&[0u8; 5], 1, 2, PixelFormat::Rgb24).is_err());
        let padded = vec![7u8; 10];
        assert_eq!(normalize_to_rgb(&padded, 1, 2, PixelFormat::Rgb24)?, vec![7u8; 6]);
        Ok(())
    }

    #[test]
    fn fourcc_lookup() {
        assert_eq!(PixelFormat::from_fourcc(b"YUYV"), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(b"MJPG"), None);
    }
}
