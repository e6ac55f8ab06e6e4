//! Pure geometric functions over WGS84 coordinates.
//!
//! Distances use the haversine great-circle formula on a spherical earth,
//! which is accurate to well under a percent at city scale.

use super::coord::Coordinate;
use geo_types::{LineString, MultiPolygon};

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Tolerance, in degrees, under which a point counts as lying on an edge.
const EDGE_EPSILON: f64 = 1e-12;

/// Tests whether `point` lies inside `polygon`.
///
/// Every ring of every polygon (exteriors and holes alike) contributes to a
/// single even-odd crossing count, so a point inside a hole is outside and an
/// island inside a hole is inside again. Points on an edge or a vertex count
/// as inside. An empty polygon or a non-finite point yields `false`.
pub fn point_in_polygon(point: Coordinate, polygon: &MultiPolygon<f64>) -> bool {
    if !point.lon.is_finite() || !point.lat.is_finite() || polygon.0.is_empty() {
        return false;
    }

    let mut inside = false;
    for poly in &polygon.0 {
        for ring in std::iter::once(poly.exterior()).chain(poly.interiors()) {
            if on_ring_edge(point, ring) {
                return true;
            }
            if ray_crossings(point, ring) % 2 == 1 {
                inside = !inside;
            }
        }
    }
    inside
}

/// Counts crossings of a ray cast from `point` towards +x with `ring`.
fn ray_crossings(point: Coordinate, ring: &LineString<f64>) -> usize {
    let (px, py) = (point.lon, point.lat);
    ring.lines()
        .filter(|line| {
            let (a, b) = (line.start, line.end);
            // Half-open test on y so a vertex on the ray is counted once.
            if (a.y > py) == (b.y > py) {
                return false;
            }
            let x_at_py = a.x + (py - a.y) * (b.x - a.x) / (b.y - a.y);
            px < x_at_py
        })
        .count()
}

fn on_ring_edge(point: Coordinate, ring: &LineString<f64>) -> bool {
    let (px, py) = (point.lon, point.lat);
    ring.lines().any(|line| {
        let (a, b) = (line.start, line.end);
        let cross = (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x);
        if cross.abs() > EDGE_EPSILON {
            return false;
        }
        px >= a.x.min(b.x) - EDGE_EPSILON
            && px <= a.x.max(b.x) + EDGE_EPSILON
            && py >= a.y.min(b.y) - EDGE_EPSILON
            && py <= a.y.max(b.y) + EDGE_EPSILON
    })
}

/// Great-circle distance between two coordinates in meters.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_phi = (b.lat - a.lat).to_radians();
    let d_lambda = (b.lon - a.lon).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Initial bearing from `a` to `b` in degrees, `[0, 360)`, clockwise from north.
pub fn bearing(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_lambda = (b.lon - a.lon).to_radians();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();
    let deg = y.atan2(x).to_degrees();
    let normalized = (deg + 360.0) % 360.0;
    // (-tiny + 360) % 360 can round to exactly 360.0
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Formats a distance for display next to a marker.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{} m away", meters.round() as i64)
    } else {
        format!("{:.1} km away", meters / 1000.0)
    }
}

/// Eight-point compass label for a bearing in degrees.
pub fn compass_direction(bearing_deg: f64) -> &'static str {
    const DIRECTIONS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let normalized = bearing_deg.rem_euclid(360.0);
    let index = ((normalized + 22.5) / 45.0).floor() as usize % 8;
    DIRECTIONS[index]
}

/// Total length of a polyline in meters.
pub fn path_length(path: &[Coordinate]) -> f64 {
    path.windows(2).map(|w| distance(w[0], w[1])).sum()
}

/// Distance in meters from `point` to the nearest segment of `path`.
///
/// Segments are treated as straight in a local equirectangular frame centred
/// on `point`, which is plenty for city-scale polylines. Returns `None` for an
/// empty path.
pub fn distance_to_path(point: Coordinate, path: &[Coordinate]) -> Option<f64> {
    match path {
        [] => None,
        [only] => Some(distance(point, *only)),
        _ => path
            .windows(2)
            .map(|w| distance_to_segment(point, w[0], w[1]))
            .min_by(|a, b| a.total_cmp(b)),
    }
}

fn distance_to_segment(p: Coordinate, a: Coordinate, b: Coordinate) -> f64 {
    let lon_scale = p.lat.to_radians().cos();
    let to_local = |c: Coordinate| ((c.lon - p.lon) * lon_scale, c.lat - p.lat);

    let (ax, ay) = to_local(a);
    let (bx, by) = to_local(b);
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;

    let t = if len_sq == 0.0 {
        0.0
    } else {
        (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0)
    };

    let nearest = Coordinate::new(
        p.lon + (ax + t * dx) / lon_scale.max(f64::EPSILON),
        p.lat + ay + t * dy,
    );
    distance(p, nearest)
}
