//! Vision Snip core library.
//!
//! Select a region of the screen, capture its pixels at native resolution
//! and ask an OpenAI vision model what it shows.
//!
//! # Overview
//!
//! - **Selection**: pointer-driven rectangle state machine via [`selection`]
//! - **Screen Capture**: DPI-aware region capture via [`capture`]
//! - **Image Processing**: cropping and PNG/base64 encoding via [`image_processing`]
//! - **AI Integration**: OpenAI chat completions via [`vision`]
//! - **Orchestration**: single-flight capture/analysis cycle via [`controller`]
//! - **Diagnostics**: one line per analysis via [`diagnostics`]
//! - **User Interface**: overlay and result window via [`ui`]
//!
//! # Quick Start
//!
//! ```ignore
//! use vision_snip_core::{Config, VisionSnip};
//!
//! let config = Config::load()?;
//! VisionSnip::with_config(config).monitor(0).run()?;
//! ```

pub mod capture;
pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod image_processing;
pub mod presenter;
pub mod selection;
pub mod ui;
pub mod vision;

// Re-export primary types for convenience
pub use capture::{MonitorGeometry, RegionCapturer, ScreenGrabber, ScreenshotsGrabber};
pub use config::Config;
pub use controller::AppController;
pub use error::{AppError, Result};
pub use selection::{SelectionMachine, SelectionOutcome, SelectionRectangle};
pub use vision::{AnalysisResult, OpenAiVisionClient, VisionClient};

/// Main entry point for the desktop application.
///
/// Collects the per-run choices the command line can make and hands them
/// to the UI.
pub struct VisionSnip {
    config: Config,
    monitor_index: usize,
    overrides: ui::SessionOverrides,
}

impl VisionSnip {
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            monitor_index: 0,
            overrides: ui::SessionOverrides::default(),
        }
    }

    /// Zero-based index of the monitor to capture from.
    pub fn monitor(mut self, index: usize) -> Self {
        self.monitor_index = index;
        self
    }

    /// Replaces the analysis prompt for this run.
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.overrides.prompt = Some(prompt.into());
        self
    }

    /// Overrides the saved model choice for this run.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.overrides.model = Some(model.into());
        self
    }

    /// Lists available monitors with their dimensions.
    pub fn list_monitors() -> Result<Vec<String>> {
        capture::list_monitors()
    }

    /// Opens the main window and blocks until it is closed.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The monitor index is out of bounds or no display is available
    /// - The HTTP client can't be created
    /// - UI initialization fails
    pub fn run(self) -> Result<()> {
        let grabber = ScreenshotsGrabber::for_monitor(self.monitor_index)?;
        let monitor = grabber.geometry();
        let capturer = RegionCapturer::new(
            Box::new(grabber),
            self.config.debug_image_path.clone(),
        );
        if let Some(path) = capturer.debug_image_path() {
            log::info!("[APP] debug captures go to {}", path.display());
        }

        let settings = ui::Settings::load(&self.config.model_name, self.config.max_tokens);

        ui::run_app(
            self.config,
            settings,
            capturer,
            Some(monitor),
            self.overrides,
        )
    }
}
