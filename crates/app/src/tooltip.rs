//! Tooltip controller: the single floating panel and its state machine.
//!
//! One tooltip exists per session; it is repositioned across hovers, never
//! recreated. States move Hidden → Positioning → Loading → ShowingResult or
//! ShowingError, then back to Hidden through a debounced, fading hide that
//! the hover router drives. Hovering the tooltip itself pins it open.
//!
//! The controller is purely synchronous; all timing (fade-in delay, hide
//! debounce, fade-out) lives in the router's timer tasks. Pending hides are
//! identified by an epoch counter so a restarted hover or a pin replaces the
//! old timer instead of stacking a second one.

use shared::events::{Rect, Viewport};

pub const TOOLTIP_WIDTH: f32 = 280.0;
pub const TOOLTIP_PADDING: f32 = 20.0;

/// Which edge of the tooltip carries the arrow pointing at the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowSide {
    /// Tooltip sits right of the image; arrow on its left edge.
    Left,
    /// Tooltip sits left of the image; arrow on its right edge.
    Right,
}

/// Absolute screen placement (scroll offsets applied).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub arrow: ArrowSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TooltipState {
    Hidden,
    Positioning,
    Loading,
    ShowingResult,
    ShowingError,
}

pub struct TooltipController {
    state: TooltipState,
    placement: Option<Placement>,
    opacity: f32,
    text: String,
    copy_visible: bool,
    copied: bool,
    pinned: bool,
    hide_epoch: u64,
}

impl TooltipController {
    pub fn new() -> Self {
        Self {
            state: TooltipState::Hidden,
            placement: None,
            opacity: 0.0,
            text: String::new(),
            copy_visible: false,
            copied: false,
            pinned: false,
            hide_epoch: 0,
        }
    }

    pub fn state(&self) -> TooltipState {
        self.state
    }

    pub fn placement(&self) -> Option<Placement> {
        self.placement
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn copy_visible(&self) -> bool {
        self.copy_visible
    }

    pub fn copied(&self) -> bool {
        self.copied
    }

    pub fn pinned(&self) -> bool {
        self.pinned
    }

    pub fn hide_epoch(&self) -> u64 {
        self.hide_epoch
    }

    /// A qualifying hover started: place the tooltip next to the image and
    /// make it visible at zero opacity. Also invalidates any pending hide,
    /// so a re-hover before hide completes restarts cleanly.
    pub fn begin_positioning(&mut self, rect: &Rect, viewport: &Viewport) {
        self.state = TooltipState::Positioning;
        self.placement = Some(compute_placement(rect, viewport));
        self.opacity = 0.0;
        self.copied = false;
        self.hide_epoch += 1;
    }

    /// Display the loading indicator. The router fades opacity in shortly
    /// after, which avoids flicker on fast re-hovers.
    pub fn show_loading(&mut self) {
        self.state = TooltipState::Loading;
        self.text.clear();
        self.copy_visible = false;
    }

    /// Fade-in completion.
    pub fn reveal(&mut self) {
        if self.state != TooltipState::Hidden {
            self.opacity = 1.0;
        }
    }

    pub fn show_result(&mut self, text: String) {
        self.copy_visible = !text.starts_with("Error");
        self.text = text;
        self.state = TooltipState::ShowingResult;
    }

    pub fn show_error(&mut self, text: String) {
        self.text = text;
        self.copy_visible = false;
        self.state = TooltipState::ShowingError;
    }

    /// Pointer entered the tooltip: pin it open and drop any pending hide.
    pub fn pin(&mut self) {
        self.pinned = true;
        self.hide_epoch += 1;
    }

    pub fn unpin(&mut self) {
        self.pinned = false;
    }

    /// Start a new hide attempt, replacing any pending one. Returns the
    /// epoch the hide timer must present to proceed.
    pub fn begin_hide(&mut self) -> u64 {
        self.hide_epoch += 1;
        self.hide_epoch
    }

    pub fn start_fade_out(&mut self) {
        self.opacity = 0.0;
    }

    /// Fade-out completion: only actually hide if nothing raised the opacity
    /// again while the fade was running.
    pub fn finish_hide(&mut self) {
        if self.opacity == 0.0 {
            self.state = TooltipState::Hidden;
            self.placement = None;
            self.copied = false;
        }
    }

    pub fn set_copied(&mut self, copied: bool) {
        self.copied = copied;
    }
}

impl Default for TooltipController {
    fn default() -> Self {
        Self::new()
    }
}

/// Prefer placing the tooltip left of the image; if there is not enough
/// horizontal room, place it right. The arrow sits on the edge facing the
/// image either way.
fn compute_placement(rect: &Rect, viewport: &Viewport) -> Placement {
    let mut x = rect.x - TOOLTIP_WIDTH - TOOLTIP_PADDING;
    let arrow = if x < 0.0 {
        x = rect.right() + TOOLTIP_PADDING;
        ArrowSide::Left
    } else {
        ArrowSide::Right
    };
    Placement {
        x: x + viewport.scroll_x,
        y: rect.y + viewport.scroll_y,
        arrow,
    }
}
