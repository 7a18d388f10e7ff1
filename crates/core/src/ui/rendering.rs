//! Drawing helpers for the selection overlay.

use eframe::egui;

/// Dims the screen with a clear "cutout" over the selection.
///
/// # Arguments
/// * `painter` - The egui painter to draw with
/// * `screen_rect` - The full screen rectangle
/// * `selection_rect` - The selected area to keep clear
/// * `color` - Dimming color, usually translucent
pub fn draw_selection_overlay(
    painter: &egui::Painter,
    screen_rect: egui::Rect,
    selection_rect: egui::Rect,
    color: egui::Color32,
) {
    // Top region (above selection)
    painter.rect_filled(
        egui::Rect::from_min_max(
            screen_rect.min,
            egui::pos2(screen_rect.max.x, selection_rect.min.y),
        ),
        0.0,
        color,
    );

    // Bottom region (below selection)
    painter.rect_filled(
        egui::Rect::from_min_max(
            egui::pos2(screen_rect.min.x, selection_rect.max.y),
            screen_rect.max,
        ),
        0.0,
        color,
    );

    // Left region (left of selection, between top and bottom)
    painter.rect_filled(
        egui::Rect::from_min_max(
            egui::pos2(screen_rect.min.x, selection_rect.min.y),
            egui::pos2(selection_rect.min.x, selection_rect.max.y),
        ),
        0.0,
        color,
    );

    // Right region (right of selection, between top and bottom)
    painter.rect_filled(
        egui::Rect::from_min_max(
            egui::pos2(selection_rect.max.x, selection_rect.min.y),
            egui::pos2(screen_rect.max.x, selection_rect.max.y),
        ),
        0.0,
        color,
    );
}

pub fn draw_selection_border(
    painter: &egui::Painter,
    selection_rect: egui::Rect,
    stroke_width: f32,
    color: egui::Color32,
) {
    painter.rect_stroke(
        selection_rect,
        0.0,
        egui::Stroke::new(stroke_width, color),
        egui::StrokeKind::Middle,
    );
}

/// Draws black text on a white plate with its top-left corner at `pos`.
pub fn draw_coordinate_label(painter: &egui::Painter, pos: egui::Pos2, text: String) {
    let galley = painter.layout_no_wrap(
        text,
        egui::FontId::proportional(14.0),
        egui::Color32::BLACK,
    );
    let plate = egui::Rect::from_min_size(pos, galley.size()).expand(4.0);
    painter.rect_filled(plate, 2.0, egui::Color32::WHITE);
    painter.galley(pos, galley, egui::Color32::BLACK);
}

/// Formats the label shown while dragging.
pub fn coordinate_text(start: (i32, i32), current: (i32, i32)) -> String {
    if current == start {
        format!("Start: ({}, {})", start.0, start.1)
    } else {
        format!(
            "Start: ({}, {}), Current: ({}, {})",
            start.0, start.1, current.0, current.1
        )
    }
}
