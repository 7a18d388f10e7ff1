//! Image encoding and display helpers.
//!
//! Captures are sent to the vision API as base64 PNG data URLs; the result
//! window shows a thumbnail bounded by [`DISPLAY_SIZE`].

use crate::error::{CaptureError, VisionError};
use crate::selection::PhysicalRegion;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Largest thumbnail shown next to the analysis text.
pub const DISPLAY_SIZE: (u32, u32) = (400, 300);

/// Upper bound on the base64 payload accepted by the vision endpoint.
pub const MAX_ENCODED_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Image processing utilities for the capture pipeline.
pub struct ImageProcessor;

impl ImageProcessor {
    /// Crops `frame` to `region`, clamping the region to the frame bounds.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::EmptyRegion`] if nothing of the region lies
    /// inside the frame.
    pub fn crop(frame: &DynamicImage, region: PhysicalRegion) -> Result<DynamicImage, CaptureError> {
        let x = region.x.min(frame.width());
        let y = region.y.min(frame.height());
        let width = region.width.min(frame.width() - x);
        let height = region.height.min(frame.height() - y);

        if width == 0 || height == 0 {
            return Err(CaptureError::EmptyRegion);
        }

        Ok(frame.crop_imm(x, y, width, height))
    }

    /// Encodes an image to a Base64 PNG string.
    ///
    /// PNG keeps text edges sharp, which matters for transcription.
    ///
    /// # Errors
    ///
    /// Returns an encoding [`VisionError`] for empty images, encoder failures
    /// and payloads above [`MAX_ENCODED_IMAGE_BYTES`].
    pub fn encode_to_base64_png(image: &DynamicImage) -> Result<String, VisionError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(VisionError::encoding("Image has no pixels"));
        }

        let mut buffer: Vec<u8> = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        image
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| VisionError::encoding(format!("Failed to encode image: {}", e)))?;

        let encoded = BASE64.encode(buffer);
        if encoded.len() > MAX_ENCODED_IMAGE_BYTES {
            return Err(VisionError::encoding(format!(
                "Encoded image is {} bytes, limit is {}",
                encoded.len(),
                MAX_ENCODED_IMAGE_BYTES
            )));
        }

        Ok(encoded)
    }

    /// Wraps the PNG encoding in a `data:` URL.
    pub fn to_png_data_url(image: &DynamicImage) -> Result<String, VisionError> {
        Ok(format!("data:image/png;base64,{}", Self::encode_to_base64_png(image)?))
    }

    /// Scales the image down to fit [`DISPLAY_SIZE`], keeping aspect ratio.
    /// Images already inside the box are returned unchanged.
    pub fn thumbnail_for_display(image: &DynamicImage) -> DynamicImage {
        let (max_w, max_h) = DISPLAY_SIZE;
        if image.width() <= max_w && image.height() <= max_h {
            image.clone()
        } else {
            image.thumbnail(max_w, max_h)
        }
    }
}
