//! Full-screen selection overlay.
//!
//! The overlay is an immediate egui viewport that only exists while a
//! session is active: [`ScreenOverlay::show`] must be called every frame,
//! and as soon as the session is dropped (selection done, cancelled or
//! disposed) the viewport is no longer shown and egui destroys the window.
//!
//! When the captured monitor is known the overlay is placed exactly over
//! it, so overlay coordinates line up with that monitor's frame.

use super::rendering::{
    coordinate_text, draw_coordinate_label, draw_selection_border, draw_selection_overlay,
};
use crate::capture::MonitorGeometry;
use crate::selection::{DisplayBounds, PointerEvent, SelectionMachine, SelectionOutcome};
use eframe::egui;

const OVERLAY_TITLE: &str = "vision-snip selection";

/// Translucent gray, premultiplied (30% opacity).
const DIM_COLOR: egui::Color32 = egui::Color32::from_rgba_premultiplied(38, 38, 38, 77);
const BORDER_COLOR: egui::Color32 = egui::Color32::RED;
const BORDER_WIDTH: f32 = 2.0;
const LABEL_POS: egui::Pos2 = egui::pos2(10.0, 10.0);

#[derive(Default)]
pub struct ScreenOverlay {
    /// `None` lets the window manager pick the monitor.
    placement: Option<MonitorGeometry>,
    session: Option<OverlaySession>,
}

#[derive(Default)]
struct OverlaySession {
    /// Created on the first frame, once the viewport size is known.
    machine: Option<SelectionMachine>,
    abort_requested: bool,
}

impl ScreenOverlay {
    pub fn on_monitor(geometry: MonitorGeometry) -> Self {
        Self {
            placement: Some(geometry),
            session: None,
        }
    }

    /// Opens the overlay on the next frame.
    pub fn begin_selection(&mut self) {
        log::info!("[OVERLAY] selection started");
        self.session = Some(OverlaySession::default());
    }

    /// Closes the overlay with a cancelled outcome on the next frame.
    pub fn cancel(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.abort_requested = true;
        }
    }

    /// Drops the session without reporting an outcome.
    pub fn dispose(&mut self) {
        if self.session.take().is_some() {
            log::debug!("[OVERLAY] disposed");
        }
    }

    /// Renders the overlay for this frame.
    ///
    /// Returns the outcome and the overlay's DPI scale once the selection
    /// closes; the session is disposed at that point.
    pub fn show(&mut self, ctx: &egui::Context) -> Option<(SelectionOutcome, f64)> {
        let session = self.session.as_mut()?;

        let finished = ctx.show_viewport_immediate(
            egui::ViewportId::from_hash_of("selection_overlay"),
            viewport_builder(self.placement),
            |ctx, _class| session.frame(ctx),
        );

        if let Some((outcome, dpi_scale)) = finished {
            log::info!("[OVERLAY] closed with {:?} at scale {}", outcome, dpi_scale);
            self.dispose();
        }
        finished
    }
}

fn viewport_builder(placement: Option<MonitorGeometry>) -> egui::ViewportBuilder {
    let builder = egui::ViewportBuilder::default()
        .with_title(OVERLAY_TITLE)
        .with_decorations(false)
        .with_transparent(true)
        .with_always_on_top();

    match placement {
        Some(monitor) => builder
            .with_position(egui::pos2(monitor.x as f32, monitor.y as f32))
            .with_inner_size([monitor.width as f32, monitor.height as f32]),
        None => builder.with_fullscreen(true),
    }
}

impl OverlaySession {
    fn frame(&mut self, ctx: &egui::Context) -> Option<(SelectionOutcome, f64)> {
        let screen_rect = ctx.viewport_rect();
        let bounds = DisplayBounds::new(
            screen_rect.width().round() as i32,
            screen_rect.height().round() as i32,
        );
        let dpi_scale = f64::from(ctx.pixels_per_point());
        let abort = self.abort_requested
            || ctx.input(|i| i.key_pressed(egui::Key::Escape) || i.viewport().close_requested());

        let machine = self
            .machine
            .get_or_insert_with(|| SelectionMachine::new(bounds));
        machine.set_bounds(bounds);

        let mut outcome = if abort {
            machine.handle(PointerEvent::Abort)
        } else {
            None
        };

        ctx.set_cursor_icon(egui::CursorIcon::Crosshair);

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let rect = ui.max_rect();
                let response = ui.interact(
                    rect,
                    ui.id().with("selection_area"),
                    egui::Sense::click_and_drag(),
                );

                if outcome.is_none() {
                    for event in pointer_events(ctx, &response, machine) {
                        if let Some(closed) = machine.handle(event) {
                            outcome = Some(closed);
                            break;
                        }
                    }
                }

                paint(ui.painter(), rect, machine);
            });

        if outcome.is_none() {
            ctx.request_repaint();
        }
        outcome.map(|o| (o, dpi_scale))
    }
}

fn to_point(pos: egui::Pos2) -> (i32, i32) {
    (pos.x.round() as i32, pos.y.round() as i32)
}

fn to_pos(point: (i32, i32)) -> egui::Pos2 {
    egui::pos2(point.0 as f32, point.1 as f32)
}

/// Translates this frame's egui interaction into machine events.
fn pointer_events(
    ctx: &egui::Context,
    response: &egui::Response,
    machine: &SelectionMachine,
) -> Vec<PointerEvent> {
    let mut events = Vec::new();

    if response.drag_started() {
        // egui only reports a drag after the pointer moved a little, so
        // anchor at the press position rather than the current one.
        let origin = ctx
            .input(|i| i.pointer.press_origin())
            .or_else(|| response.interact_pointer_pos());
        if let Some((x, y)) = origin.map(to_point) {
            events.push(PointerEvent::Down { x, y });
        }
    }

    if response.dragged() {
        if let Some((x, y)) = response.interact_pointer_pos().map(to_point) {
            events.push(PointerEvent::Move { x, y });
        }
    }

    if response.drag_stopped() {
        let release = response
            .interact_pointer_pos()
            .or_else(|| ctx.pointer_latest_pos())
            .map(to_point)
            .or_else(|| machine.anchor_points().map(|(_, current)| current));
        if let Some((x, y)) = release {
            events.push(PointerEvent::Up { x, y });
        }
    } else if response.clicked() {
        // A click never becomes a drag: report it as a zero-area selection.
        if let Some((x, y)) = response.interact_pointer_pos().map(to_point) {
            events.push(PointerEvent::Down { x, y });
            events.push(PointerEvent::Up { x, y });
        }
    }

    events
}

fn paint(painter: &egui::Painter, screen_rect: egui::Rect, machine: &SelectionMachine) {
    match machine.anchor_points() {
        Some((start, current)) => {
            let selection_rect = egui::Rect::from_two_pos(to_pos(start), to_pos(current));
            draw_selection_overlay(painter, screen_rect, selection_rect, DIM_COLOR);
            draw_selection_border(painter, selection_rect, BORDER_WIDTH, BORDER_COLOR);
            draw_coordinate_label(painter, LABEL_POS, coordinate_text(start, current));
        }
        None => {
            painter.rect_filled(screen_rect, 0.0, DIM_COLOR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_covers_the_captured_monitor() {
        let secondary = MonitorGeometry {
            x: 1920,
            y: -120,
            width: 2560,
            height: 1440,
            scale_factor: 1.5,
        };
        let builder = viewport_builder(Some(secondary));

        assert_eq!(builder.position, Some(egui::pos2(1920.0, -120.0)));
        assert_eq!(builder.inner_size, Some(egui::vec2(2560.0, 1440.0)));
        assert_eq!(builder.fullscreen, None);
        assert_eq!(builder.decorations, Some(false));
    }

    #[test]
    fn unknown_monitor_falls_back_to_fullscreen() {
        let builder = viewport_builder(None);
        assert_eq!(builder.fullscreen, Some(true));
        assert_eq!(builder.position, None);
    }
}
