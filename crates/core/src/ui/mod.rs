//! Desktop front end.
//!
//! # Architecture
//!
//! - [`app`]: the main window, wiring the toolbar to the controller
//! - [`overlay`]: full-screen selection viewport
//! - [`rendering`]: drawing helpers for the overlay
//! - [`result_view`]: captured image and analysis display
//! - [`settings`]: user preferences and persistence

mod app;
mod overlay;
mod rendering;
mod result_view;
mod settings;

pub use app::{SessionOverrides, VisionSnipApp};
pub use overlay::ScreenOverlay;
pub use result_view::ResultView;
pub use settings::{AVAILABLE_MODELS, Settings};

use crate::capture::{MonitorGeometry, RegionCapturer};
use crate::config::Config;
use crate::controller::{AppController, ControllerOptions};
use crate::diagnostics::DiagnosticLog;
use crate::error::{AppError, Result};
use crate::vision::OpenAiVisionClient;
use eframe::egui;
use std::sync::Arc;

const WINDOW_TITLE: &str = "Vision Snip";

/// Opens the main window and blocks until it is closed.
///
/// `settings` supply the model, prompt and token limit; `overrides` win over
/// them for this run only. With a `monitor` the overlay is placed over it.
///
/// # Errors
///
/// Returns an error if the vision client can't be built or the window
/// can't be created.
pub fn run_app(
    config: Config,
    settings: Settings,
    capturer: RegionCapturer,
    monitor: Option<MonitorGeometry>,
    overrides: SessionOverrides,
) -> Result<()> {
    let vision = Arc::new(OpenAiVisionClient::new(&app::client_config(
        &config, &settings, &overrides,
    ))?);
    let log = Arc::new(DiagnosticLog::new(config.log_path.clone()));
    let capturer = Arc::new(capturer);

    log::info!(
        "[UI] starting with model {}, diagnostics in {}",
        vision.model(),
        log.path().display()
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size([900.0, 560.0])
            .with_min_inner_size([600.0, 360.0]),
        ..Default::default()
    };

    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());

            let ctx = cc.egui_ctx.clone();
            let controller = AppController::new(
                capturer,
                vision,
                log,
                ResultView::new(),
                ControllerOptions::default(),
            )
            .with_waker(move || ctx.request_repaint());

            let overlay = match monitor {
                Some(geometry) => ScreenOverlay::on_monitor(geometry),
                None => ScreenOverlay::default(),
            };

            Ok(Box::new(VisionSnipApp::new(
                controller, overlay, config, settings, overrides,
            )) as Box<dyn eframe::App>)
        }),
    )
    .map_err(|e| AppError::ui(format!("Failed to run UI: {}", e)))
}
