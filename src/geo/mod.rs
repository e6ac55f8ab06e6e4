//! Geographic primitives for the map.
//!
//! This module provides coordinate types, the pure geometry used for
//! boundary checks and distances, the service-area polygon model and the
//! screen projection used by the canvas engine.

mod coord;
pub mod geometry;
mod polygon;
mod projection;

pub use coord::{round_to, Coordinate, ScreenPoint, ScreenSize};
pub use geometry::{
    bearing, compass_direction, distance, distance_to_path, format_distance, path_length,
    point_in_polygon,
};
pub use polygon::BoundaryPolygon;
pub use projection::MapProjection;
