//! Text overlays and their burn-in geometry.
//!
//! Overlay positions are the overlay's *center* as a percentage of the frame.
//! The live preview anchors text on its center, so burn-in must subtract half
//! the rendered text extent on both axes or the output drifts right and down.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Id given to an overlay converted from the legacy single-overlay value.
pub const LEGACY_OVERLAY_ID: &str = "legacy";

pub const DEFAULT_FONT_FAMILY: &str = "Impact";
pub const DEFAULT_FONT_SIZE: u32 = 50;

/// A positioned text annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOverlay {
    pub id: String,
    pub text: String,
    /// Horizontal center, 0–100.
    pub x: f64,
    /// Vertical center, 0–100.
    pub y: f64,
    pub font_size: u32,
    pub font_family: String,
    pub font_color: String,
    pub background_color: String,
    pub background_opacity: f64,
    pub show_background: bool,
}

impl Default for TextOverlay {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: String::new(),
            x: 50.0,
            y: 50.0,
            font_size: DEFAULT_FONT_SIZE,
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            font_color: "#ffffff".to_string(),
            background_color: "#000000".to_string(),
            background_opacity: 0.5,
            show_background: false,
        }
    }
}

impl TextOverlay {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Move the center, clamped to the normalized frame.
    pub fn set_position(&mut self, x: f64, y: f64) {
        self.x = clamp_percent(x);
        self.y = clamp_percent(y);
    }

    fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// The single-overlay shape older sessions stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyOverlay {
    pub text: String,
    pub x: f64,
    pub y: f64,
    #[serde(default = "legacy_font_size")]
    pub font_size: u32,
}

fn legacy_font_size() -> u32 {
    24
}

impl From<LegacyOverlay> for TextOverlay {
    fn from(legacy: LegacyOverlay) -> Self {
        Self {
            id: LEGACY_OVERLAY_ID.to_string(),
            text: legacy.text,
            x: clamp_percent(legacy.x),
            y: clamp_percent(legacy.y),
            font_size: legacy.font_size,
            show_background: true,
            ..Self::default()
        }
    }
}

/// Measures rendered text. Implementations must be deterministic.
pub trait TextMetrics {
    /// `(width, height)` in pixels of `text` set at `font_size`.
    fn measure(&self, text: &str, font_family: &str, font_size: u32) -> (f64, f64);
}

/// Fixed-advance approximation: each glyph is 0.6 em wide, one line is 1 em.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproximateMetrics;

impl TextMetrics for ApproximateMetrics {
    fn measure(&self, text: &str, _font_family: &str, font_size: u32) -> (f64, f64) {
        let size = font_size as f64;
        (text.chars().count() as f64 * size * 0.6, size)
    }
}

/// Absolute placement of one overlay on a concrete frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurnInstruction {
    pub overlay_id: String,
    pub text: String,
    pub font_family: String,
    pub font_size: u32,
    pub font_color: String,
    /// `(color, opacity)` when the background box is shown.
    pub background: Option<(String, f64)>,
    /// Normalized center, kept so engines that can evaluate expressions
    /// (measure text themselves) can place it exactly.
    pub center_x: f64,
    pub center_y: f64,
    /// Top-left pixel offset.
    pub x: f64,
    pub y: f64,
    pub text_width: f64,
    pub text_height: f64,
}

/// Top-left offset of a center-anchored box of `text_w`×`text_h` on a
/// `frame_w`×`frame_h` frame.
pub fn burn_offset(
    center_x: f64,
    center_y: f64,
    frame_w: u32,
    frame_h: u32,
    text_w: f64,
    text_h: f64,
) -> (f64, f64) {
    (
        center_x / 100.0 * frame_w as f64 - text_w / 2.0,
        center_y / 100.0 * frame_h as f64 - text_h / 2.0,
    )
}

/// Ordered overlay collection.
///
/// A legacy value is folded in as an ordinary overlay with id
/// [`LEGACY_OVERLAY_ID`] and is replaced by the first regular overlay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayModel {
    overlays: Vec<TextOverlay>,
}

impl OverlayModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh overlay with default styling. Not inserted until upserted.
    pub fn create(&self) -> TextOverlay {
        TextOverlay::default()
    }

    /// Insert or replace by id. Returns `false` when the overlay has no text.
    pub fn upsert(&mut self, mut overlay: TextOverlay) -> bool {
        if !overlay.has_text() {
            tracing::debug!(id = %overlay.id, "Ignoring overlay with empty text");
            return false;
        }
        overlay.set_position(overlay.x, overlay.y);
        if overlay.id != LEGACY_OVERLAY_ID {
            self.overlays.retain(|o| o.id != LEGACY_OVERLAY_ID);
        }
        match self.overlays.iter_mut().find(|o| o.id == overlay.id) {
            Some(existing) => *existing = overlay,
            None => self.overlays.push(overlay),
        }
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<TextOverlay> {
        let index = self.overlays.iter().position(|o| o.id == id)?;
        Some(self.overlays.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&TextOverlay> {
        self.overlays.iter().find(|o| o.id == id)
    }

    /// Reposition an overlay. Returns `false` if the id is unknown.
    pub fn move_to(&mut self, id: &str, x: f64, y: f64) -> bool {
        match self.overlays.iter_mut().find(|o| o.id == id) {
            Some(overlay) => {
                overlay.set_position(x, y);
                true
            }
            None => false,
        }
    }

    /// Fold a legacy value into the collection. Dropped when regular
    /// overlays already exist; `None` removes a previously folded value.
    pub fn set_legacy(&mut self, legacy: Option<LegacyOverlay>) {
        self.overlays.retain(|o| o.id != LEGACY_OVERLAY_ID);
        let Some(overlay) = legacy.map(TextOverlay::from).filter(TextOverlay::has_text) else {
            return;
        };
        if self.overlays.is_empty() {
            self.overlays.push(overlay);
        } else {
            tracing::debug!(count = self.overlays.len(), "Legacy overlay superseded by collection");
        }
    }

    /// Overlays that would be rendered right now.
    pub fn snapshot(&self) -> Vec<TextOverlay> {
        self.overlays.clone()
    }

    pub fn overlays(&self) -> &[TextOverlay] {
        &self.overlays
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn clear(&mut self) {
        self.overlays.clear();
    }

    /// Burn operations for the rendered overlays, in collection order.
    pub fn to_burn_instructions(
        &self,
        frame_w: u32,
        frame_h: u32,
        metrics: &dyn TextMetrics,
    ) -> Vec<BurnInstruction> {
        burn_instructions(&self.snapshot(), frame_w, frame_h, metrics)
    }
}

/// Burn operations for an already-taken overlay snapshot.
pub fn burn_instructions(
    overlays: &[TextOverlay],
    frame_w: u32,
    frame_h: u32,
    metrics: &dyn TextMetrics,
) -> Vec<BurnInstruction> {
    overlays
        .iter()
        .map(|overlay| {
            let (text_width, text_height) =
                metrics.measure(&overlay.text, &overlay.font_family, overlay.font_size);
            let (x, y) = burn_offset(
                overlay.x,
                overlay.y,
                frame_w,
                frame_h,
                text_width,
                text_height,
            );
            BurnInstruction {
                overlay_id: overlay.id.clone(),
                text: overlay.text.clone(),
                font_family: overlay.font_family.clone(),
                font_size: overlay.font_size,
                font_color: overlay.font_color.clone(),
                background: overlay
                    .show_background
                    .then(|| (overlay.background_color.clone(), overlay.background_opacity)),
                center_x: overlay.x,
                center_y: overlay.y,
                x,
                y,
                text_width,
                text_height,
            }
        })
        .collect()
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        50.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
