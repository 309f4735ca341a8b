use std::io::Cursor;

use image::io::{Limits, Reader};
use image::{GenericImageView, ImageFormat};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::UploadedImage;

/// Largest page side a PDF 1.x reader is required to handle, in default units.
pub const PDF_MAX_PAGE_SIDE: u32 = 14_400;

/// 8-bit RGB pixel plane, row-major, `width * height * 3` bytes.
#[derive(Debug, Clone)]
pub struct DecodedRaster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl DecodedRaster {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Bounds on what a single image, and a whole request, may decode to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_image_side: u32,
    pub max_image_pixels: u64,
    pub max_request_pixels: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_image_side: PDF_MAX_PAGE_SIDE,
            max_image_pixels: 40_000_000,
            max_request_pixels: 100_000_000,
        }
    }
}

impl DecodeLimits {
    /// Checked against the header dimensions, before any pixel is decoded.
    fn check(&self, width: u32, height: u32, remaining_pixels: u64) -> Result<(), String> {
        if width == 0 || height == 0 {
            return Err(format!("image has zero dimension ({}x{})", width, height));
        }
        if width > self.max_image_side || height > self.max_image_side {
            return Err(format!(
                "image is {}x{}, larger than the {} pixel side limit",
                width, height, self.max_image_side
            ));
        }
        let pixels = width as u64 * height as u64;
        if pixels > self.max_image_pixels {
            return Err(format!(
                "image has {} pixels, over the per-image limit of {}",
                pixels, self.max_image_pixels
            ));
        }
        if pixels > remaining_pixels {
            return Err(format!(
                "image has {} pixels but only {} remain in this request's budget",
                pixels, remaining_pixels
            ));
        }
        Ok(())
    }

    fn reader_limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_image_side);
        limits.max_image_height = Some(self.max_image_side);
        // 16-bit RGBA is the widest sample layout the PNG decoder produces.
        limits.max_alloc = Some(self.max_image_pixels.saturating_mul(8));
        limits
    }
}

pub fn decode_raster(
    image: &UploadedImage,
    limits: &DecodeLimits,
    remaining_pixels: u64,
) -> AppResult<DecodedRaster> {
    let bytes = std::fs::read(&image.path).map_err(|e| {
        AppError::decode(&image.original_name, format!("failed to read staged file: {}", e))
    })?;
    decode_bytes(&image.original_name, &bytes, limits, remaining_pixels)
}

/// Format is sniffed from the content and must be JPEG or PNG; a JPEG named
/// `.png` still decodes, a GIF named `.png` does not.
pub fn decode_bytes(
    file_name: &str,
    bytes: &[u8],
    limits: &DecodeLimits,
    remaining_pixels: u64,
) -> AppResult<DecodedRaster> {
    if bytes.is_empty() {
        return Err(AppError::decode(file_name, "file is empty"));
    }

    let format = image::guess_format(bytes)
        .map_err(|e| AppError::decode(file_name, e.to_string()))?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return Err(AppError::decode(
            file_name,
            format!("unsupported image format {:?}", format),
        ));
    }

    let (width, height) = Reader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|e| AppError::decode(file_name, e.to_string()))?;
    limits
        .check(width, height, remaining_pixels)
        .map_err(|reason| AppError::decode(file_name, reason))?;

    let mut reader = Reader::with_format(Cursor::new(bytes), format);
    reader.limits(limits.reader_limits());
    let decoded = reader
        .decode()
        .map_err(|e| AppError::decode(file_name, e.to_string()))?;

    debug!(
        file_name = %file_name,
        format = ?format,
        width,
        height,
        color = ?decoded.color(),
        "Decoded image"
    );

    // Header and pixel data agree for every valid file, but the page is sized
    // from what was actually decoded.
    let (width, height) = decoded.dimensions();

    // Alpha is dropped and gray/palette data expanded.
    let pixels = decoded.to_rgb8().into_raw();

    Ok(DecodedRaster {
        width,
        height,
        pixels,
    })
}
