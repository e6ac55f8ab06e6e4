//! Popup placement next to a marker.

use crate::geo::{ScreenPoint, ScreenSize};

/// Default popup size in logical pixels.
pub const DEFAULT_POPUP_SIZE: ScreenSize = ScreenSize::new(288.0, 400.0);

/// Which side of the marker the popup is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Above,
    Below,
}

/// Where to draw a popup: `x` is its horizontal centre, `y` the marker's
/// anchor, and `placement` the side it extends towards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopupPosition {
    pub x: f32,
    pub y: f32,
    pub placement: Placement,
}

/// Spacing rules around the marker and viewport edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopupLayout {
    /// Minimum gap to keep from the viewport edge.
    pub padding: f32,
    /// Gap between the marker and the popup.
    pub marker_offset: f32,
    /// Height of the marker glyph below its anchor.
    pub marker_height: f32,
}

impl Default for PopupLayout {
    fn default() -> Self {
        Self {
            padding: 16.0,
            marker_offset: 12.0,
            marker_height: 40.0,
        }
    }
}

impl PopupLayout {
    /// Places a popup of `popup` size for a marker at `anchor`.
    ///
    /// Horizontally the popup is centred on the anchor and shifted just
    /// inside whichever edge it would cross. Vertically it goes above when
    /// it fits, below when only that fits, and otherwise on the side with
    /// strictly more room (below on a tie), overflowing the viewport.
    pub fn compute(
        &self,
        anchor: ScreenPoint,
        popup: ScreenSize,
        viewport: ScreenSize,
    ) -> PopupPosition {
        let half = popup.w / 2.0;
        let x = if anchor.x - half < self.padding {
            half + self.padding
        } else if anchor.x + half > viewport.w - self.padding {
            viewport.w - half - self.padding
        } else {
            anchor.x
        };

        let y = anchor.y;
        let fits_above = y - popup.h - self.marker_offset >= self.padding;
        let fits_below =
            y + self.marker_height + self.marker_offset + popup.h <= viewport.h - self.padding;

        let placement = if fits_above {
            Placement::Above
        } else if fits_below {
            Placement::Below
        } else if y - self.padding > viewport.h - self.padding - y {
            Placement::Above
        } else {
            Placement::Below
        };

        PopupPosition { x, y, placement }
    }

    /// Top-left corner of the popup rectangle for a computed position.
    pub fn top_left(&self, position: &PopupPosition, popup: ScreenSize) -> ScreenPoint {
        let top = match position.placement {
            Placement::Above => position.y - self.marker_offset - popup.h,
            Placement::Below => position.y + self.marker_height + self.marker_offset,
        };
        ScreenPoint::new(position.x - popup.w / 2.0, top)
    }
}

/// Places a popup using the default layout.
pub fn compute_position(
    anchor: ScreenPoint,
    popup: ScreenSize,
    viewport: ScreenSize,
) -> PopupPosition {
    PopupLayout::default().compute(anchor, popup, viewport)
}
