//! Screen capture functionality.
//!
//! [`RegionCapturer`] turns a [`SelectionRectangle`] into pixels. It applies
//! the DPI scale, asks a [`ScreenGrabber`] for the physical region and keeps
//! a rolling debug copy of the last capture on disk.
//!
//! # Example
//!
//! ```ignore
//! use vision_snip_core::capture::{RegionCapturer, ScreenshotsGrabber};
//!
//! let grabber = ScreenshotsGrabber::for_monitor(0)?;
//! let capturer = RegionCapturer::new(Box::new(grabber), Some("debug_capture.png".into()));
//! let image = capturer.capture(rect, 1.5)?;
//! ```

use crate::error::{AppError, CaptureError, Result};
use crate::image_processing::ImageProcessor;
use crate::selection::{PhysicalRegion, SelectionRectangle};
use image::DynamicImage;
use screenshots::Screen;
use std::path::{Path, PathBuf};

/// Source of physical screen pixels.
pub trait ScreenGrabber: Send + Sync {
    /// Returns the pixels of `region`, in physical coordinates of the
    /// captured display.
    fn grab(&self, region: PhysicalRegion) -> std::result::Result<DynamicImage, CaptureError>;
}

/// Where a monitor sits on the desktop, as the OS reports it.
///
/// Position and size are in logical points; `scale_factor` converts them to
/// the physical pixels of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorGeometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub scale_factor: f32,
}

/// Lists available screens with their dimensions and scale factor.
///
/// # Errors
///
/// Returns [`AppError::Capture`] if screen enumeration fails.
pub fn list_monitors() -> Result<Vec<String>> {
    let screens = enumerate_screens()?;
    Ok(screens
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "Monitor {}: {}x{} (scale: {}){}",
                i,
                s.display_info.width,
                s.display_info.height,
                s.display_info.scale_factor,
                if s.display_info.is_primary { " [primary]" } else { "" }
            )
        })
        .collect())
}

fn enumerate_screens() -> std::result::Result<Vec<Screen>, CaptureError> {
    let screens = Screen::all()
        .map_err(|e| CaptureError::display(format!("Failed to enumerate screens: {}", e)))?;

    if screens.is_empty() {
        return Err(CaptureError::display("No screens detected"));
    }

    Ok(screens)
}

/// Grabs pixels from one monitor through the `screenshots` crate.
///
/// The whole monitor is captured at its native resolution and then cropped,
/// so the region is always interpreted in physical pixels regardless of how
/// the platform backend treats scaled coordinates.
pub struct ScreenshotsGrabber {
    screen: Screen,
}

impl ScreenshotsGrabber {
    /// Binds the grabber to the monitor at `index`.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - [`AppError::ScreenNotFound`] if the index is out of bounds
    /// - [`AppError::Capture`] if no display server is reachable
    pub fn for_monitor(index: usize) -> Result<Self> {
        let screens = enumerate_screens()?;
        let screen = screens
            .into_iter()
            .nth(index)
            .ok_or(AppError::ScreenNotFound(index))?;

        log::info!(
            "[CAPTURE] using monitor {} ({}x{}, scale {})",
            index,
            screen.display_info.width,
            screen.display_info.height,
            screen.display_info.scale_factor
        );

        Ok(Self { screen })
    }

    /// The monitor this grabber samples, used to place the overlay over it.
    pub fn geometry(&self) -> MonitorGeometry {
        let info = &self.screen.display_info;
        MonitorGeometry {
            x: info.x,
            y: info.y,
            width: info.width,
            height: info.height,
            scale_factor: info.scale_factor,
        }
    }

    fn capture_frame(&self) -> std::result::Result<DynamicImage, CaptureError> {
        let captured = self
            .screen
            .capture()
            .map_err(|e| CaptureError::display(format!("Failed to capture screen: {}", e)))?;

        // Convert screenshots::Image to image::DynamicImage
        let width = captured.width();
        let height = captured.height();
        let rgba_data = captured.into_raw();

        let img_buffer = image::RgbaImage::from_raw(width, height, rgba_data)
            .ok_or_else(|| CaptureError::display("Failed to create image buffer"))?;

        Ok(DynamicImage::ImageRgba8(img_buffer))
    }
}

impl ScreenGrabber for ScreenshotsGrabber {
    fn grab(&self, region: PhysicalRegion) -> std::result::Result<DynamicImage, CaptureError> {
        let frame = self.capture_frame()?;
        log::debug!(
            "[CAPTURE] frame {}x{}, cropping {:?}",
            frame.width(),
            frame.height(),
            region
        );
        ImageProcessor::crop(&frame, region)
    }
}

/// Converts selections into images.
pub struct RegionCapturer {
    grabber: Box<dyn ScreenGrabber>,
    debug_image_path: Option<PathBuf>,
}

impl RegionCapturer {
    pub fn new(grabber: Box<dyn ScreenGrabber>, debug_image_path: Option<PathBuf>) -> Self {
        Self {
            grabber,
            debug_image_path,
        }
    }

    pub fn debug_image_path(&self) -> Option<&Path> {
        self.debug_image_path.as_deref()
    }

    /// Captures the pixels under `rect`.
    ///
    /// `dpi_scale` is the ratio of physical pixels to the logical points the
    /// rectangle was measured in.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::EmptyRegion`] for a zero-area rectangle or an
    ///   unusable scale
    /// - [`CaptureError::DisplayUnavailable`] if the screen can't be read
    pub fn capture(
        &self,
        rect: SelectionRectangle,
        dpi_scale: f64,
    ) -> std::result::Result<DynamicImage, CaptureError> {
        let region = rect.to_physical(dpi_scale).ok_or(CaptureError::EmptyRegion)?;
        log::info!(
            "[CAPTURE] capturing {:?} at scale {} -> physical {:?}",
            rect,
            dpi_scale,
            region
        );

        let image = self.grabber.grab(region)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(CaptureError::EmptyRegion);
        }

        self.write_debug_copy(&image);
        Ok(image)
    }

    /// Overwrites the debug image. Failures are logged, never propagated.
    fn write_debug_copy(&self, image: &DynamicImage) {
        if let Some(path) = &self.debug_image_path {
            match image.save(path) {
                Ok(()) => log::debug!("[CAPTURE] debug copy written to {}", path.display()),
                Err(e) => log::warn!(
                    "[CAPTURE] failed to write debug copy to {}: {}",
                    path.display(),
                    e
                ),
            }
        }
    }
}
