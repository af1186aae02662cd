//! Bounds-checked access to the source bitmap.

use crate::color::Rgba;
use thiserror::Error;

/// Errors raised while wrapping raw pixel data.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ImageError {
    #[error("Pixel buffer holds {actual} bytes, expected {expected} for a {width}x{height} RGBA image")]
    BufferSizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Read-only view of an RGBA image.
///
/// Reads outside the image return [`Rgba::TRANSPARENT`]; callers never see an
/// out-of-range error.
pub trait ImageSampler {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn pixel(&self, x: u32, y: u32) -> Rgba;

    fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Row-major 8-bit RGBA pixel storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps a raw `width * height * 4` byte buffer.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ImageError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(ImageError::BufferSizeMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { width, height, data })
    }

    /// Builds a buffer by evaluating `f` for every pixel.
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> Rgba,
    {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            for x in 0..width {
                let c = f(x, y);
                data.extend_from_slice(&[c.r, c.g, c.b, c.a]);
            }
        }
        Self { width, height, data }
    }

    /// Number of pixels with non-zero alpha.
    pub fn opaque_count(&self) -> usize {
        self.data.chunks_exact(4).filter(|px| px[3] != 0).count()
    }
}

impl ImageSampler for PixelBuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel(&self, x: u32, y: u32) -> Rgba {
        if x >= self.width || y >= self.height {
            return Rgba::TRANSPARENT;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        Rgba::from([self.data[idx], self.data[idx + 1], self.data[idx + 2], self.data[idx + 3]])
    }
}
