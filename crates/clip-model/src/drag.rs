//! Pointer dragging in normalized coordinates.
//!
//! The controller knows nothing about widgets: it is given the bounding
//! rectangle of the preview surface and a stream of pointer positions, and
//! yields overlay centers in the 0–100 space.

/// Screen-space rectangle of the preview surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Map a pointer position inside `bounds` to `(x, y)` percentages, clamped.
pub fn normalize_pointer(bounds: &Rect, pointer_x: f64, pointer_y: f64) -> Option<(f64, f64)> {
    if bounds.is_degenerate() {
        return None;
    }
    let x = (pointer_x - bounds.left) / bounds.width * 100.0;
    let y = (pointer_y - bounds.top) / bounds.height * 100.0;
    Some((x.clamp(0.0, 100.0), y.clamp(0.0, 100.0)))
}

/// Tracks one drag gesture on one overlay.
#[derive(Debug, Clone, Default)]
pub struct DragController {
    active: Option<(String, Rect)>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start dragging `overlay_id` over `bounds`. Replaces any drag in progress.
    pub fn begin(&mut self, overlay_id: impl Into<String>, bounds: Rect) {
        self.active = Some((overlay_id.into(), bounds));
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn overlay_id(&self) -> Option<&str> {
        self.active.as_ref().map(|(id, _)| id.as_str())
    }

    /// New overlay center for a pointer move, or `None` if nothing is dragged.
    pub fn pointer_moved(&self, pointer_x: f64, pointer_y: f64) -> Option<(&str, f64, f64)> {
        let (id, bounds) = self.active.as_ref()?;
        let (x, y) = normalize_pointer(bounds, pointer_x, pointer_y)?;
        Some((id.as_str(), x, y))
    }

    /// Finish the gesture. Returns the overlay that was being dragged.
    pub fn end(&mut self) -> Option<String> {
        self.active.take().map(|(id, _)| id)
    }
}
