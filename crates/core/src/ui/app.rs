//! Main window: toolbar, settings panel and result view.
//!
//! While the controller claims the screen the main window is parked off
//! every monitor so it can't end up in the capture. It comes back once the
//! capture has been applied, or straight away if the selection is cancelled.

use super::overlay::ScreenOverlay;
use super::result_view::ResultView;
use super::settings::{AVAILABLE_MODELS, Settings};
use crate::config::Config;
use crate::controller::{AppController, TriggerOutcome};
use crate::vision::OpenAiVisionClient;
use eframe::egui;
use std::sync::Arc;

/// Far outside any realistic desktop layout.
const PARKED_POS: egui::Pos2 = egui::pos2(-20_000.0, -20_000.0);

/// Choices made on the command line that hold for this run only and are
/// never written to the settings file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionOverrides {
    pub prompt: Option<String>,
    pub model: Option<String>,
}

impl SessionOverrides {
    pub fn model<'a>(&'a self, settings: &'a Settings) -> &'a str {
        self.model.as_deref().unwrap_or(&settings.model)
    }

    pub fn prompt<'a>(&'a self, settings: &'a Settings) -> &'a str {
        self.prompt
            .as_deref()
            .unwrap_or_else(|| settings.effective_prompt())
    }
}

/// The configuration a vision client is built from: environment config
/// with settings and overrides layered on top.
pub(super) fn client_config(
    base: &Config,
    settings: &Settings,
    overrides: &SessionOverrides,
) -> Config {
    Config {
        model_name: overrides.model(settings).to_string(),
        max_tokens: settings.max_tokens.max(1),
        ..base.clone()
    }
}

/// Moves the main window out of sight and back.
///
/// The window must stay mapped: the overlay is an immediate viewport and
/// only repaints when its parent does.
#[derive(Debug, Default)]
struct RootParking {
    restore_to: Option<egui::Pos2>,
    parked: bool,
}

impl RootParking {
    fn park(&mut self, current: Option<egui::Pos2>) -> Vec<egui::ViewportCommand> {
        if self.parked {
            return Vec::new();
        }
        self.parked = true;
        self.restore_to = current;
        vec![egui::ViewportCommand::OuterPosition(PARKED_POS)]
    }

    fn unpark(&mut self) -> Vec<egui::ViewportCommand> {
        if !self.parked {
            return Vec::new();
        }
        self.parked = false;
        let mut commands = Vec::new();
        if let Some(pos) = self.restore_to.take() {
            commands.push(egui::ViewportCommand::OuterPosition(pos));
        }
        commands.push(egui::ViewportCommand::Focus);
        commands
    }
}

fn send_to_root(ctx: &egui::Context, commands: Vec<egui::ViewportCommand>) {
    for command in commands {
        ctx.send_viewport_cmd_to(egui::ViewportId::ROOT, command);
    }
}

pub struct VisionSnipApp {
    controller: AppController<ResultView>,
    overlay: ScreenOverlay,
    parking: RootParking,
    /// Environment configuration; settings are layered on top of it.
    config: Config,
    settings: Settings,
    /// The settings the current vision client was built from.
    applied: Settings,
    overrides: SessionOverrides,
    show_settings: bool,
}

impl VisionSnipApp {
    pub fn new(
        controller: AppController<ResultView>,
        overlay: ScreenOverlay,
        config: Config,
        settings: Settings,
        overrides: SessionOverrides,
    ) -> Self {
        let mut app = Self {
            controller,
            overlay,
            parking: RootParking::default(),
            config,
            applied: settings.clone(),
            settings,
            overrides,
            show_settings: false,
        };
        app.apply_prompt();
        app
    }

    fn apply_prompt(&mut self) {
        let prompt = self.overrides.prompt(&self.settings).to_string();
        self.controller.set_prompt(prompt);
    }

    /// Rebuilds the vision client if the model or token limit changed.
    fn apply_settings(&mut self) {
        if self.settings == self.applied {
            return;
        }

        let next = client_config(&self.config, &self.settings, &self.overrides);
        let previous = client_config(&self.config, &self.applied, &self.overrides);
        if next.model_name != previous.model_name || next.max_tokens != previous.max_tokens {
            match OpenAiVisionClient::new(&next) {
                Ok(client) => {
                    log::info!(
                        "[UI] using model {} (max tokens {})",
                        client.model(),
                        next.max_tokens
                    );
                    self.controller.set_vision_client(Arc::new(client));
                }
                Err(e) => log::error!("[UI] keeping previous vision client: {}", e),
            }
        }

        self.apply_prompt();

        if let Err(e) = self.settings.save() {
            log::warn!("[UI] failed to save settings: {}", e);
        }
        self.applied = self.settings.clone();
    }

    fn start_capture(&mut self, ctx: &egui::Context) {
        self.apply_settings();

        if self.controller.trigger_capture() == TriggerOutcome::Started {
            let current = ctx.input(|i| i.viewport().outer_rect.map(|rect| rect.min));
            send_to_root(ctx, self.parking.park(current));
            self.overlay.begin_selection();
        }
    }

    fn render_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let busy = self.controller.is_busy();
            let snip = ui.add_enabled(!busy, egui::Button::new("Snip Area"));
            if snip.clicked() {
                self.start_capture(ui.ctx());
            }

            if ui.button("⚙").clicked() {
                self.show_settings = !self.show_settings;
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.weak(self.overrides.model(&self.settings));
            });
        });

        if self.show_settings {
            self.render_settings_ui(ui);
        }
    }

    fn render_settings_ui(&mut self, ui: &mut egui::Ui) {
        ui.separator();
        ui.label("Settings");

        egui::ComboBox::from_label("Model")
            .selected_text(&self.settings.model)
            .show_ui(ui, |ui| {
                for model in AVAILABLE_MODELS {
                    ui.selectable_value(&mut self.settings.model, model.to_string(), *model);
                }
            });
        if self.overrides.model.is_some() {
            ui.weak("Overridden by --model for this session.");
        }

        ui.horizontal(|ui| {
            ui.label("Max tokens:");
            ui.add(egui::DragValue::new(&mut self.settings.max_tokens).range(1..=4096));
        });

        ui.label("Prompt:");
        if self.overrides.prompt.is_some() {
            ui.weak("Overridden by --prompt for this session.");
        }
        ui.add(
            egui::TextEdit::multiline(&mut self.settings.prompt)
                .desired_rows(4)
                .desired_width(f32::INFINITY)
                .hint_text("Leave empty for the built-in analysis prompt"),
        );
        ui.separator();
    }
}

impl eframe::App for VisionSnipApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.controller.poll();

        if ctx.input(|i| i.viewport().close_requested()) {
            // Closing the app mid-selection still yields an outcome.
            self.overlay.cancel();
        }

        if let Some((outcome, dpi_scale)) = self.overlay.show(ctx) {
            self.controller.complete_selection(outcome, dpi_scale);
        }

        if !self.controller.screen_in_use() {
            send_to_root(ctx, self.parking.unpark());
        }

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.add_space(4.0);
            self.render_toolbar(ui);
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.controller.presenter_mut().render(ui);
        });
    }
}
