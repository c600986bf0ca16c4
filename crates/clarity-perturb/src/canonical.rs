use std::path::Path;

use clarity_core::errors::{ClarityError, ErrorInfo};
use image::{DynamicImage, Rgb32FImage, RgbImage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

fn image_error(code: &str, err: impl ToString) -> ClarityError {
    ClarityError::Image(ErrorInfo::new(code, err.to_string()))
}

/// Canonical 8-bit RGB raster, row-major with interleaved channels.
///
/// Grayscale inputs are expanded to three channels and alpha is dropped, so
/// every perturbation sees the same representation regardless of the source
/// encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl CanonicalImage {
    /// Builds an image from raw RGB bytes, validating the buffer length.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ClarityError> {
        if width == 0 || height == 0 {
            return Err(ClarityError::Validation(
                ErrorInfo::new("image.empty", "image dimensions must be positive")
                    .with_context("width", width.to_string())
                    .with_context("height", height.to_string()),
            ));
        }
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(ClarityError::Validation(
                ErrorInfo::new("image.buffer_len", "pixel buffer does not match dimensions")
                    .with_context("expected", expected.to_string())
                    .with_context("actual", pixels.len().to_string()),
            ));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Fills a `width x height` image with a single colour.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self, ClarityError> {
        let count = width as usize * height as usize;
        let pixels = rgb.iter().copied().cycle().take(count * 3).collect();
        Self::new(width, height, pixels)
    }

    /// Converts any decoded image into the canonical representation.
    pub fn from_dynamic(image: &DynamicImage) -> Result<Self, ClarityError> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self::new(width, height, rgb.into_raw())
    }

    /// Decodes an encoded PNG/JPEG payload.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, ClarityError> {
        let decoded =
            image::load_from_memory(bytes).map_err(|err| image_error("image.decode", err))?;
        Self::from_dynamic(&decoded)
    }

    /// Loads and canonicalizes an image file.
    pub fn load(path: &Path) -> Result<Self, ClarityError> {
        let decoded = image::open(path).map_err(|err| {
            image_error("image.open", err).with_context("path", path.display().to_string())
        })?;
        Self::from_dynamic(&decoded)
    }

    /// Writes the image as PNG. The on-disk encoding never feeds the content hash.
    pub fn save_png(&self, path: &Path) -> Result<(), ClarityError> {
        self.to_rgb_image()?
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|err| {
                image_error("image.save", err).with_context("path", path.display().to_string())
            })
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw interleaved RGB bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns the RGB triple at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics when `(x, y)` lies outside the image; see [`Self::get_pixel`].
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        match self.get_pixel(x, y) {
            Some(rgb) => rgb,
            None => panic!(
                "pixel ({x}, {y}) outside {}x{} image",
                self.width, self.height
            ),
        }
    }

    /// Returns the RGB triple at `(x, y)`, or `None` outside the image.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 3;
        Some([
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ])
    }

    /// Canonical content hash over `width(u32 BE) || height(u32 BE) || raw RGB`.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width.to_be_bytes());
        hasher.update(self.height.to_be_bytes());
        hasher.update(&self.pixels);
        format!("{:x}", hasher.finalize())
    }

    /// Channel values normalised to `[0, 1]` as 32-bit floats.
    pub fn to_unit_f32(&self) -> Vec<f32> {
        self.pixels.iter().map(|&v| v as f32 / 255.0).collect()
    }

    /// Clips float channels to `[0, 1]` and quantises back to 8 bits.
    pub fn from_unit_f32(width: u32, height: u32, values: &[f32]) -> Result<Self, ClarityError> {
        let pixels = values.iter().map(|&v| quantize(v)).collect();
        Self::new(width, height, pixels)
    }

    pub(crate) fn to_rgb_image(&self) -> Result<RgbImage, ClarityError> {
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or_else(|| image_error("image.buffer", "pixel buffer rejected by encoder"))
    }

    pub(crate) fn to_rgb32f(&self) -> Result<Rgb32FImage, ClarityError> {
        Rgb32FImage::from_raw(self.width, self.height, self.to_unit_f32())
            .ok_or_else(|| image_error("image.buffer", "float buffer rejected"))
    }
}

/// Computes the canonical content hash of an image.
pub fn image_hash(image: &CanonicalImage) -> String {
    image.content_hash()
}

fn quantize(value: f32) -> u8 {
    let clipped = if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    };
    (clipped * 255.0).round() as u8
}
