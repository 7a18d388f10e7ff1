//! Selection geometry and the overlay state machine.
//!
//! Nothing here knows about windows or egui. The overlay feeds
//! [`PointerEvent`]s into a [`SelectionMachine`] and reads back a
//! [`SelectionOutcome`] once the drag is over.
//!
//! ```text
//! Idle --pointer down--> Selecting --pointer up--> Closed(Selected | Cancelled)
//!   \______________________ abort ______________________/
//! ```

/// A normalized bounding box in logical screen pixels.
///
/// Always satisfies `x0 <= x1` and `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectionRectangle {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl SelectionRectangle {
    /// Builds a rectangle from two opposite corners in any order.
    pub fn from_corners(a: (i32, i32), b: (i32, i32)) -> Self {
        Self {
            x0: a.0.min(b.0),
            y0: a.1.min(b.1),
            x1: a.0.max(b.0),
            y1: a.1.max(b.1),
        }
    }

    pub fn width(&self) -> u32 {
        self.x1.abs_diff(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.abs_diff(self.y0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Maps the rectangle into physical pixels.
    ///
    /// Under display scaling the UI reports logical points while the screen
    /// buffer is stored in physical pixels, so the origin is scaled down to
    /// the pixel it falls in and the extent is scaled to the nearest pixel.
    /// Returns `None` for an unusable scale or a region that ends up empty.
    pub fn to_physical(&self, dpi_scale: f64) -> Option<PhysicalRegion> {
        if !dpi_scale.is_finite() || dpi_scale <= 0.0 {
            return None;
        }

        let x = (f64::from(self.x0.max(0)) * dpi_scale).floor() as u32;
        let y = (f64::from(self.y0.max(0)) * dpi_scale).floor() as u32;
        let width = (f64::from(self.x1.max(0) - self.x0.max(0)) * dpi_scale).round() as u32;
        let height = (f64::from(self.y1.max(0) - self.y0.max(0)) * dpi_scale).round() as u32;

        if width == 0 || height == 0 {
            return None;
        }

        Some(PhysicalRegion {
            x,
            y,
            width,
            height,
        })
    }
}

/// A region of the physical screen buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicalRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// The drawable extent of the overlay, with its origin at `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayBounds {
    pub width: i32,
    pub height: i32,
}

impl DisplayBounds {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width: width.max(0),
            height: height.max(0),
        }
    }

    pub fn clamp(&self, point: (i32, i32)) -> (i32, i32) {
        (point.0.clamp(0, self.width), point.1.clamp(0, self.height))
    }
}

/// Input delivered to the selection machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Down { x: i32, y: i32 },
    Move { x: i32, y: i32 },
    Up { x: i32, y: i32 },
    /// Escape key, window close, or an external cancel.
    Abort,
}

/// How a selection session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    Selected(SelectionRectangle),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Idle,
    Selecting {
        start: (i32, i32),
        current: (i32, i32),
    },
    Closed(SelectionOutcome),
}

/// Tracks one pointer-down, pointer-move, pointer-up sequence.
#[derive(Debug, Clone)]
pub struct SelectionMachine {
    bounds: DisplayBounds,
    state: SelectionState,
}

impl SelectionMachine {
    pub fn new(bounds: DisplayBounds) -> Self {
        Self {
            bounds,
            state: SelectionState::Idle,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    /// Updates the display bounds, e.g. once a fullscreen window settles.
    pub fn set_bounds(&mut self, bounds: DisplayBounds) {
        self.bounds = bounds;
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, SelectionState::Closed(_))
    }

    /// The start and latest pointer positions while selecting.
    pub fn anchor_points(&self) -> Option<((i32, i32), (i32, i32))> {
        match self.state {
            SelectionState::Selecting { start, current } => Some((start, current)),
            _ => None,
        }
    }

    /// The rectangle currently being dragged, for live feedback.
    pub fn live_rect(&self) -> Option<SelectionRectangle> {
        self.anchor_points()
            .map(|(start, current)| SelectionRectangle::from_corners(start, current))
    }

    /// Feeds one event. Returns the outcome on the transition into `Closed`.
    pub fn handle(&mut self, event: PointerEvent) -> Option<SelectionOutcome> {
        match (self.state, event) {
            (SelectionState::Closed(_), _) => None,
            (_, PointerEvent::Abort) => self.close(SelectionOutcome::Cancelled),
            (_, PointerEvent::Down { x, y }) => {
                let point = self.bounds.clamp((x, y));
                self.state = SelectionState::Selecting {
                    start: point,
                    current: point,
                };
                None
            }
            (SelectionState::Selecting { start, .. }, PointerEvent::Move { x, y }) => {
                self.state = SelectionState::Selecting {
                    start,
                    current: self.bounds.clamp((x, y)),
                };
                None
            }
            (SelectionState::Selecting { start, .. }, PointerEvent::Up { x, y }) => {
                let rect = SelectionRectangle::from_corners(start, self.bounds.clamp((x, y)));
                if rect.is_empty() {
                    self.close(SelectionOutcome::Cancelled)
                } else {
                    self.close(SelectionOutcome::Selected(rect))
                }
            }
            // Moves and releases without a preceding press are noise.
            (SelectionState::Idle, PointerEvent::Move { .. } | PointerEvent::Up { .. }) => None,
        }
    }

    fn close(&mut self, outcome: SelectionOutcome) -> Option<SelectionOutcome> {
        self.state = SelectionState::Closed(outcome);
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> SelectionMachine {
        SelectionMachine::new(DisplayBounds::new(1920, 1080))
    }

    fn drag(m: &mut SelectionMachine, from: (i32, i32), to: (i32, i32)) -> Option<SelectionOutcome> {
        assert_eq!(m.handle(PointerEvent::Down { x: from.0, y: from.1 }), None);
        assert_eq!(m.handle(PointerEvent::Move { x: to.0, y: to.1 }), None);
        m.handle(PointerEvent::Up { x: to.0, y: to.1 })
    }

    #[test]
    fn drag_in_any_direction_yields_normalized_rectangle() {
        let points = [(10, 20), (300, 5), (0, 900), (1500, 1000)];
        for &a in &points {
            for &b in &points {
                if a.0 == b.0 || a.1 == b.1 {
                    continue;
                }
                let mut m = machine();
                let outcome = drag(&mut m, a, b);
                let expected = SelectionRectangle {
                    x0: a.0.min(b.0),
                    y0: a.1.min(b.1),
                    x1: a.0.max(b.0),
                    y1: a.1.max(b.1),
                };
                assert_eq!(outcome, Some(SelectionOutcome::Selected(expected)));
                assert!(m.is_closed());
            }
        }
    }

    #[test]
    fn degenerate_drags_are_cancelled() {
        for (from, to) in [((40, 40), (40, 40)), ((40, 40), (40, 200)), ((40, 40), (200, 40))] {
            let mut m = machine();
            assert_eq!(drag(&mut m, from, to), Some(SelectionOutcome::Cancelled));
        }
    }

    #[test]
    fn drag_beyond_screen_is_clamped() {
        let mut m = SelectionMachine::new(DisplayBounds::new(800, 600));
        let outcome = drag(&mut m, (100, 100), (5000, -300));
        assert_eq!(
            outcome,
            Some(SelectionOutcome::Selected(SelectionRectangle {
                x0: 100,
                y0: 0,
                x1: 800,
                y1: 100,
            }))
        );
    }

    #[test]
    fn drag_entirely_off_screen_collapses_to_cancel() {
        let mut m = SelectionMachine::new(DisplayBounds::new(800, 600));
        assert_eq!(
            drag(&mut m, (900, 100), (1200, 300)),
            Some(SelectionOutcome::Cancelled)
        );
    }

    #[test]
    fn abort_cancels_from_idle_and_from_selecting() {
        let mut idle = machine();
        assert_eq!(idle.handle(PointerEvent::Abort), Some(SelectionOutcome::Cancelled));

        let mut selecting = machine();
        selecting.handle(PointerEvent::Down { x: 1, y: 1 });
        assert_eq!(
            selecting.handle(PointerEvent::Abort),
            Some(SelectionOutcome::Cancelled)
        );
    }

    #[test]
    fn events_after_close_are_ignored() {
        let mut m = machine();
        drag(&mut m, (0, 0), (10, 10));
        assert_eq!(m.handle(PointerEvent::Down { x: 5, y: 5 }), None);
        assert_eq!(m.handle(PointerEvent::Abort), None);
        assert!(matches!(
            m.state(),
            SelectionState::Closed(SelectionOutcome::Selected(_))
        ));
    }

    #[test]
    fn move_and_up_without_press_do_nothing() {
        let mut m = machine();
        assert_eq!(m.handle(PointerEvent::Move { x: 3, y: 3 }), None);
        assert_eq!(m.handle(PointerEvent::Up { x: 3, y: 3 }), None);
        assert_eq!(m.state(), SelectionState::Idle);
    }

    #[test]
    fn live_rect_follows_pointer() {
        let mut m = machine();
        m.handle(PointerEvent::Down { x: 200, y: 200 });
        m.handle(PointerEvent::Move { x: 100, y: 250 });
        assert_eq!(
            m.live_rect(),
            Some(SelectionRectangle {
                x0: 100,
                y0: 200,
                x1: 200,
                y1: 250,
            })
        );
    }

    #[test]
    fn physical_region_applies_dpi_scale() {
        let rect = SelectionRectangle::from_corners((0, 0), (100, 100));
        assert_eq!(
            rect.to_physical(1.5),
            Some(PhysicalRegion {
                x: 0,
                y: 0,
                width: 150,
                height: 150,
            })
        );

        let offset = SelectionRectangle::from_corners((10, 20), (30, 50));
        assert_eq!(
            offset.to_physical(2.0),
            Some(PhysicalRegion {
                x: 20,
                y: 40,
                width: 40,
                height: 60,
            })
        );
    }

    #[test]
    fn physical_region_rejects_bad_scale() {
        let rect = SelectionRectangle::from_corners((0, 0), (100, 100));
        assert_eq!(rect.to_physical(0.0), None);
        assert_eq!(rect.to_physical(-1.0), None);
        assert_eq!(rect.to_physical(f64::NAN), None);
    }
}
