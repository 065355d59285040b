//! Owned RGBA8 raster with explicit dimensions.

use crate::error::DiffError;
use core::fmt;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder as _, RgbaImage, load_from_memory};
use std::fs::{create_dir_all, read, write};
use std::path::Path;

/// One pixel as `[r, g, b, a]`.
pub type Rgba = [u8; 4];

/// Opaque white, the fill used for padding and excluded diff pixels.
pub const WHITE: Rgba = [255, 255, 255, 255];

/// Fill of the placeholder returned when a comparison could not run.
const PLACEHOLDER_FILL: Rgba = [255, 240, 240, 255];
/// Border of the placeholder returned when a comparison could not run.
const PLACEHOLDER_BORDER: Rgba = [231, 76, 60, 255];
const PLACEHOLDER_WIDTH: u32 = 500;
const PLACEHOLDER_HEIGHT: u32 = 150;

/// Raw RGBA image data with dimensions.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// A `width x height` bitmap filled with one colour.
    pub fn filled(width: u32, height: u32, color: Rgba) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 4);
        for _ in 0..count {
            pixels.extend_from_slice(&color);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// A `width x height` opaque white bitmap.
    pub fn white(width: u32, height: u32) -> Self {
        Self::filled(width, height, WHITE)
    }

    /// Wraps an RGBA8 buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::BufferSize`] if the buffer length is not `width * height * 4`.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, DiffError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(DiffError::BufferSize {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Decodes a PNG (or any format enabled on the `image` crate) into RGBA8.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be decoded.
    pub fn decode_png(bytes: &[u8]) -> Result<Self, DiffError> {
        Ok(load_from_memory(bytes)?.to_rgba8().into())
    }

    /// Encodes the bitmap as PNG.
    ///
    /// # Errors
    ///
    /// Returns an error if PNG encoding fails.
    pub fn encode_png(&self) -> Result<Vec<u8>, DiffError> {
        let mut buf = Vec::new();
        let encoder = PngEncoder::new(&mut buf);
        encoder.write_image(&self.pixels, self.width, self.height, ColorType::Rgba8.into())?;
        Ok(buf)
    }

    /// Writes the bitmap as a PNG file only if the content has changed.
    ///
    /// Returns `true` when the file was (re)written.
    ///
    /// # Errors
    ///
    /// Returns an error if PNG encoding or file I/O fails.
    pub fn write_png(&self, path: &Path) -> Result<bool, DiffError> {
        let bytes = self.encode_png()?;
        if let Ok(existing) = read(path)
            && existing == bytes
        {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        write(path, &bytes)?;
        Ok(true)
    }

    /// Placeholder shown in place of a diff when a comparison could not run.
    pub fn diagnostic_placeholder() -> Self {
        let mut placeholder = Self::filled(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, PLACEHOLDER_FILL);
        let (width, height) = (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT);
        placeholder.fill_rect(0, 0, width, 4, PLACEHOLDER_BORDER);
        placeholder.fill_rect(0, height - 4, width, 4, PLACEHOLDER_BORDER);
        placeholder.fill_rect(0, 0, 4, height, PLACEHOLDER_BORDER);
        placeholder.fill_rect(width - 4, 0, 4, height, PLACEHOLDER_BORDER);
        placeholder
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `true` when either dimension is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Pixel at `(x, y)`. Coordinates must be in bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let idx = self.offset(x, y);
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    /// Sets the pixel at `(x, y)`; out-of-bounds writes are ignored.
    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, color: Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = self.offset(x, y);
        self.pixels[idx..idx + 4].copy_from_slice(&color);
    }

    /// Fills a rectangle, clipped to the bitmap bounds.
    pub fn fill_rect(&mut self, left: u32, top: u32, width: u32, height: u32, color: Rgba) {
        let right = left.saturating_add(width).min(self.width);
        let bottom = top.saturating_add(height).min(self.height);
        for y in top..bottom {
            for x in left..right {
                self.put_pixel(x, y, color);
            }
        }
    }

    /// Top-left crop to at most `width x height`. Never upscales.
    pub fn clipped(&self, width: u32, height: u32) -> Self {
        let width = width.min(self.width);
        let height = height.min(self.height);
        if width == self.width && height == self.height {
            return self.clone();
        }
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for y in 0..height {
            let start = self.offset(0, y);
            pixels.extend_from_slice(&self.pixels[start..start + width as usize * 4]);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Exactly `width x height`: overflow is clipped, underflow padded with white.
    pub fn fitted(&self, width: u32, height: u32) -> Self {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let mut out = Self::white(width, height);
        let copy_width = width.min(self.width);
        let copy_height = height.min(self.height);
        for y in 0..copy_height {
            let src = self.offset(0, y);
            let dst = out.offset(0, y);
            let len = copy_width as usize * 4;
            out.pixels[dst..dst + len].copy_from_slice(&self.pixels[src..src + len]);
        }
        out
    }
}

impl From<RgbaImage> for Bitmap {
    fn from(img: RgbaImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            pixels: img.into_raw(),
        }
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Composites a pixel over opaque white and returns its RGB channels.
#[inline]
pub(crate) fn over_white(pixel: Rgba) -> [f64; 3] {
    let alpha = f64::from(pixel[3]) / 255.0;
    let blend = |channel: u8| 255.0 + (f64::from(channel) - 255.0) * alpha;
    [blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]
}
