//! Result display: captured image on the left, analysis on the right.

use crate::error::AnalysisErrorKind;
use crate::image_processing::ImageProcessor;
use crate::presenter::ResultPresenter;
use crate::vision::AnalysisResult;
use eframe::egui;
use egui_commonmark::{CommonMarkCache, CommonMarkViewer};
use image::DynamicImage;

#[derive(Default)]
pub struct ResultView {
    /// Converted on the worker's behalf, uploaded on the next frame.
    pending_image: Option<egui::ColorImage>,
    texture: Option<egui::TextureHandle>,
    capture_size: Option<(u32, u32)>,
    result: Option<AnalysisResult>,
    error: Option<String>,
    notice: Option<String>,
    busy: bool,
    markdown_cache: CommonMarkCache,
}

impl ResultView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, ui: &mut egui::Ui) {
        if let Some(color_image) = self.pending_image.take() {
            self.texture = Some(ui.ctx().load_texture(
                "capture",
                color_image,
                egui::TextureOptions::LINEAR,
            ));
        }

        if let Some(notice) = &self.notice {
            ui.label(egui::RichText::new(notice).italics().color(egui::Color32::GRAY));
            ui.add_space(4.0);
        }

        let Self {
            texture,
            capture_size,
            result,
            error,
            busy,
            markdown_cache,
            ..
        } = self;

        ui.columns(2, |columns| {
            columns[0].heading("Captured Image");
            match texture {
                Some(texture) => {
                    columns[0].image(&*texture);
                    if let Some((w, h)) = capture_size {
                        columns[0].small(format!("{} x {} px", w, h));
                    }
                }
                None => {
                    columns[0].label("Press \"Snip Area\" and drag over the screen.");
                }
            }

            let ui = &mut columns[1];
            ui.heading("Vision API Response");

            if let Some(message) = error {
                ui.label(egui::RichText::new(message.as_str()).color(egui::Color32::RED));
            }

            if *busy {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Analyzing...");
                });
            }

            match result {
                Some(AnalysisResult::Success(text)) => {
                    egui::ScrollArea::vertical()
                        .id_salt("response_scroll")
                        .show(ui, |ui| {
                            CommonMarkViewer::new().show(ui, markdown_cache, text);
                        });

                    ui.separator();
                    if ui.button("Copy").clicked() {
                        copy_to_clipboard(text);
                    }
                }
                Some(AnalysisResult::Failure { kind, message }) => {
                    ui.label(
                        egui::RichText::new(failure_text(*kind, message))
                            .color(egui::Color32::RED),
                    );
                }
                None => {}
            }
        });
    }
}

fn failure_text(kind: AnalysisErrorKind, message: &str) -> String {
    let hint = match kind {
        AnalysisErrorKind::Auth => " Check OPENAI_API_KEY.",
        AnalysisErrorKind::Network => " Check your connection and try again.",
        AnalysisErrorKind::Api | AnalysisErrorKind::Encoding => "",
    };
    format!("Error processing image: {}: {}.{}", kind, message, hint)
}

fn copy_to_clipboard(text: &str) {
    match arboard::Clipboard::new() {
        Ok(mut clipboard) => {
            if let Err(e) = clipboard.set_text(text) {
                log::warn!("[UI] failed to copy to clipboard: {}", e);
            }
        }
        Err(e) => log::warn!("[UI] could not access clipboard: {}", e),
    }
}

fn to_color_image(image: &DynamicImage) -> egui::ColorImage {
    let rgba = image.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_flat_samples().as_slice())
}

impl ResultPresenter for ResultView {
    fn show_capture(&mut self, image: &DynamicImage) {
        let thumbnail = ImageProcessor::thumbnail_for_display(image);
        self.pending_image = Some(to_color_image(&thumbnail));
        self.capture_size = Some((image.width(), image.height()));
        self.result = None;
        self.error = None;
        self.notice = None;
    }

    fn show_result(&mut self, result: &AnalysisResult) {
        self.result = Some(result.clone());
    }

    /// Errors happen before an image exists, so the previous capture goes too.
    fn show_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
        self.result = None;
        self.pending_image = None;
        self.texture = None;
        self.capture_size = None;
    }

    fn show_notice(&mut self, message: &str) {
        self.notice = Some(message.to_string());
    }

    fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
        if busy {
            self.notice = None;
            self.error = None;
        }
    }
}
