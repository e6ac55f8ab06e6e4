//! Map projection and coordinate transformation.
//!
//! Handles converting between geographic coordinates (lon/lat) and screen
//! coordinates using web-mercator zoom levels, where the whole world is
//! `256 * 2^zoom` pixels wide.

use super::coord::Coordinate;
use eframe::egui::{Pos2, Rect, Vec2};
use std::f64::consts::PI;

const TILE_SIZE: f64 = 256.0;
/// Latitude limit of the web-mercator square.
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// Map projection for converting geographic to screen coordinates.
#[derive(Debug, Clone)]
pub struct MapProjection {
    /// Geographic point drawn at the centre of the screen rect
    pub center: Coordinate,
    /// Fractional web-mercator zoom level
    pub zoom: f64,
    /// Screen rectangle for the canvas
    pub screen_rect: Rect,
}

impl Default for MapProjection {
    fn default() -> Self {
        Self {
            center: Coordinate::new(123.8854, 10.3157),
            zoom: 13.0,
            screen_rect: Rect::from_min_size(Pos2::ZERO, Vec2::new(800.0, 600.0)),
        }
    }
}

impl MapProjection {
    pub fn new(center: Coordinate, zoom: f64) -> Self {
        Self {
            center,
            zoom,
            ..Default::default()
        }
    }

    /// Updates the projection with the current canvas rectangle.
    pub fn update(&mut self, screen_rect: Rect) {
        self.screen_rect = screen_rect;
    }

    fn world_size(&self) -> f64 {
        TILE_SIZE * 2f64.powf(self.zoom)
    }

    /// Projects to normalized mercator space, `[0, 1]` on both axes.
    fn to_mercator(coord: Coordinate) -> (f64, f64) {
        let lat = coord.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
        let x = (coord.lon + 180.0) / 360.0;
        let sin = lat.to_radians().sin();
        let y = 0.5 - ((1.0 + sin) / (1.0 - sin)).ln() / (4.0 * PI);
        (x, y)
    }

    fn from_mercator(x: f64, y: f64) -> Coordinate {
        let lon = x * 360.0 - 180.0;
        let n = PI - 2.0 * PI * y;
        let lat = n.sinh().atan().to_degrees();
        Coordinate::new(lon, lat)
    }

    /// Absolute pixel position of `coord` in the world square at `zoom`.
    pub fn world_pixel(coord: Coordinate, zoom: f64) -> (f64, f64) {
        let world = TILE_SIZE * 2f64.powf(zoom);
        let (x, y) = Self::to_mercator(coord);
        (x * world, y * world)
    }

    /// Converts a geographic coordinate to a screen position.
    pub fn geo_to_screen(&self, coord: Coordinate) -> Pos2 {
        let world = self.world_size();
        let (cx, cy) = Self::to_mercator(self.center);
        let (x, y) = Self::to_mercator(coord);
        let center = self.screen_rect.center();
        Pos2::new(
            center.x + ((x - cx) * world) as f32,
            center.y + ((y - cy) * world) as f32,
        )
    }

    /// Converts a screen position to a geographic coordinate.
    pub fn screen_to_geo(&self, pos: Pos2) -> Coordinate {
        let world = self.world_size();
        let (cx, cy) = Self::to_mercator(self.center);
        let center = self.screen_rect.center();
        let x = cx + (pos.x - center.x) as f64 / world;
        let y = cy + (pos.y - center.y) as f64 / world;
        Self::from_mercator(x, y)
    }

    /// Moves the centre so the map follows a drag of `delta` screen pixels.
    pub fn pan_by(&mut self, delta: Vec2) {
        let center = self.screen_rect.center();
        self.center = self.screen_to_geo(center - delta);
    }

    /// Zooms by `delta` levels keeping the geographic point under `anchor` fixed.
    pub fn zoom_around(&mut self, anchor: Pos2, delta: f64, min_zoom: f64, max_zoom: f64) {
        let before = self.screen_to_geo(anchor);
        self.zoom = (self.zoom + delta).clamp(min_zoom, max_zoom);
        let drift = self.geo_to_screen(before) - anchor;
        self.pan_by(-drift);
    }

    /// Returns the visible geographic bounds as `(west, south, east, north)`.
    pub fn visible_bounds(&self) -> (f64, f64, f64, f64) {
        let top_left = self.screen_to_geo(self.screen_rect.left_top());
        let bottom_right = self.screen_to_geo(self.screen_rect.right_bottom());

        (
            top_left.lon.min(bottom_right.lon),
            top_left.lat.min(bottom_right.lat),
            top_left.lon.max(bottom_right.lon),
            top_left.lat.max(bottom_right.lat),
        )
    }

    /// Checks if a coordinate is within the visible bounds, with a margin in pixels.
    pub fn is_visible(&self, coord: Coordinate, margin_px: f32) -> bool {
        self.screen_rect
            .expand(margin_px)
            .contains(self.geo_to_screen(coord))
    }
}
