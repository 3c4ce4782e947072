//! Hover event types and screen geometry.
//!
//! The hosting surface translates its pointer events into [`HoverEvent`]s and
//! feeds them to the hover router. Rectangles are in layout pixels, viewport
//! relative; the tooltip controller applies scroll offsets when positioning.

use serde::{Deserialize, Serialize};

/// Minimum rendered size (both axes) for an image to be worth analyzing.
/// Anything smaller is treated as an icon or decoration.
pub const MIN_ANALYZABLE_DIMENSION: f32 = 50.0;

/// Screen rectangle of a rendered element, viewport relative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// The hosting surface's visible area and scroll position.
#[derive(Debug, Clone, Copy, Default)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scroll_x: f32,
    pub scroll_y: f32,
}

/// The image currently under the pointer. At most one is active at a time;
/// the hover router owns its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct HoverTarget {
    /// Host-assigned identity, used to tell re-entry of the same image apart
    /// from a move to a different one.
    pub id: u64,
    pub image_url: String,
    pub rect: Rect,
}

impl HoverTarget {
    /// Whether this target is large enough to analyze.
    pub fn qualifies(&self) -> bool {
        self.rect.width >= MIN_ANALYZABLE_DIMENSION
            && self.rect.height >= MIN_ANALYZABLE_DIMENSION
    }
}

/// Pointer activity reported by the hosting surface.
#[derive(Debug, Clone)]
pub enum HoverEvent {
    /// Pointer entered an image element.
    PointerEnter(HoverTarget),
    /// Pointer left the active image element.
    PointerLeave,
    /// Pointer entered the tooltip itself (pins it open).
    TooltipPointerEnter,
    /// Pointer left the tooltip (restarts the hide debounce).
    TooltipPointerLeave,
    /// User clicked the copy affordance.
    CopyRequested,
}

/// Cross-process message sent by the settings editor when the credential
/// changes. Instances with no active pipeline ignore it silently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notification {
    #[serde(rename = "API_KEY_UPDATED")]
    ApiKeyUpdated,
}
