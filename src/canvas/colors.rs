//! Color constants for the map canvas and panels.

use eframe::egui::Color32;

/// Map background and chrome.
pub mod map {
    use super::Color32;

    pub const BACKGROUND: Color32 = Color32::from_rgb(232, 236, 228);
    /// Faint lon/lat grid.
    pub const GRID: Color32 = Color32::from_rgba_premultiplied(0, 0, 0, 18);
}

/// Marker styles by status.
pub mod marker {
    use super::Color32;

    /// Verified and stale pins.
    pub const PIN: Color32 = Color32::from_rgb(45, 122, 62);
    /// Small grey dot for pending gems.
    pub const PENDING: Color32 = Color32::from_rgba_unmultiplied_const(128, 128, 128, 178);
    /// Badge drawn on stale pins.
    pub const STALE_BADGE: Color32 = Color32::from_rgb(255, 107, 53);
    pub const OUTLINE: Color32 = Color32::WHITE;
    pub const SELECTED: Color32 = Color32::from_rgb(255, 200, 60);
    /// Location being picked.
    pub const PICK: Color32 = Color32::from_rgb(239, 68, 68);
}

/// Cluster bubbles.
pub mod cluster {
    use super::Color32;

    pub const FILL: Color32 = Color32::from_rgb(45, 122, 62);
    pub const RING: Color32 = Color32::from_rgba_unmultiplied_const(45, 122, 62, 90);
    pub const TEXT: Color32 = Color32::WHITE;
}

/// Trails and the service-area outline.
pub mod line {
    use super::Color32;

    pub const TRAIL: Color32 = Color32::from_rgb(59, 130, 246);
    /// Trails drawn straight because routing failed.
    pub const TRAIL_UNROUTED: Color32 = Color32::from_rgb(120, 150, 200);
    pub const BOUNDARY: Color32 = Color32::from_rgb(59, 130, 246);
}

/// Status text.
pub mod status {
    use super::Color32;

    pub const OK: Color32 = Color32::from_rgb(100, 200, 100);
    pub const WARN: Color32 = Color32::from_rgb(255, 180, 50);
    pub const ERROR: Color32 = Color32::from_rgb(255, 80, 80);
    pub const MUTED: Color32 = Color32::from_rgb(120, 120, 130);
}
