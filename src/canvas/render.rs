//! Painting map features onto the egui canvas.

use super::cluster::{ClusterIndex, ClusterItem};
use super::colors;
use crate::geo::{BoundaryPolygon, Coordinate, MapProjection};
use crate::map::{ClickTarget, MarkerEntity, MarkerStatus, ResolvedTrail};
use eframe::egui::{Align2, Color32, FontId, Painter, Pos2, Shape, Stroke};

/// Radius of a verified or stale pin head.
const PIN_RADIUS: f32 = 9.0;
/// Radius of a pending dot.
const PENDING_RADIUS: f32 = 4.0;

/// A clickable region drawn this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HitRegion {
    pub pos: Pos2,
    pub radius: f32,
    pub target: ClickTarget,
}

/// Finds the top-most region under `pos`.
pub fn hit_test(regions: &[HitRegion], pos: Pos2) -> Option<&HitRegion> {
    regions
        .iter()
        .rev()
        .find(|r| r.pos.distance(pos) <= r.radius)
}

/// Draws a faint lon/lat grid so panning is visible without tiles.
pub fn render_grid(painter: &Painter, projection: &MapProjection) {
    let (west, south, east, north) = projection.visible_bounds();
    let span = (east - west).max(north - south);
    let step = grid_step(span);
    let stroke = Stroke::new(1.0, colors::map::GRID);
    let rect = projection.screen_rect;

    let mut lon = (west / step).floor() * step;
    while lon <= east {
        let x = projection.geo_to_screen(Coordinate::new(lon, south)).x;
        painter.line_segment(
            [Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())],
            stroke,
        );
        lon += step;
    }
    let mut lat = (south / step).floor() * step;
    while lat <= north {
        let y = projection.geo_to_screen(Coordinate::new(west, lat)).y;
        painter.line_segment(
            [Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)],
            stroke,
        );
        lat += step;
    }
}

/// Largest power-of-ten step giving at least four lines across `span` degrees.
fn grid_step(span: f64) -> f64 {
    let mut step = 10f64.powf(span.max(1e-6).log10().floor());
    while span / step < 4.0 {
        step /= 2.0;
    }
    step
}

/// Outlines the service area.
pub fn render_boundary(painter: &Painter, boundary: &BoundaryPolygon, projection: &MapProjection) {
    if let Some((w, s, e, n)) = boundary.bbox() {
        if !bbox_visible(projection, w, s, e, n) {
            return;
        }
    }
    let stroke = Stroke::new(2.0, colors::line::BOUNDARY);
    for ring in boundary.rings() {
        let points = project_path(projection, &ring);
        if points.len() >= 3 {
            painter.add(Shape::closed_line(points, stroke));
        }
    }
}

/// Draws trails; any trail with straight-line legs is dashed.
pub fn render_trails(painter: &Painter, trails: &[ResolvedTrail], projection: &MapProjection) {
    for trail in trails {
        let points = project_path(projection, &trail.path);
        if points.len() < 2 {
            continue;
        }
        if trail.routed {
            painter.add(Shape::line(points, Stroke::new(4.0, colors::line::TRAIL)));
        } else {
            let stroke = Stroke::new(3.0, colors::line::TRAIL_UNROUTED);
            painter.extend(Shape::dashed_line(&points, stroke, 8.0, 6.0));
        }
    }
}

/// Draws markers and clusters for the current zoom and returns their hit regions.
pub fn render_markers(
    painter: &Painter,
    index: &mut ClusterIndex,
    projection: &MapProjection,
    selected: Option<&str>,
) -> Vec<HitRegion> {
    let mut regions = Vec::new();
    let items = index.clusters(projection.zoom);
    for item in items.iter() {
        match item {
            ClusterItem::Cluster(node) => {
                if !projection.is_visible(node.center, 30.0) {
                    continue;
                }
                let pos = projection.geo_to_screen(node.center);
                let radius = cluster_radius(node.count);
                painter.circle_filled(pos, radius + 5.0, colors::cluster::RING);
                painter.circle_filled(pos, radius, colors::cluster::FILL);
                painter.text(
                    pos,
                    Align2::CENTER_CENTER,
                    node.count.to_string(),
                    FontId::proportional(13.0),
                    colors::cluster::TEXT,
                );
                regions.push(HitRegion {
                    pos,
                    radius: radius + 5.0,
                    target: ClickTarget::Cluster {
                        id: node.id,
                        center: node.center,
                        count: node.count,
                    },
                });
            }
            ClusterItem::Marker(i) => {
                let Some(marker) = index.marker(*i) else {
                    continue;
                };
                if !projection.is_visible(marker.coordinate, 20.0) {
                    continue;
                }
                let pos = projection.geo_to_screen(marker.coordinate);
                let is_selected = selected == Some(marker.id.as_str());
                let radius = render_marker(painter, marker, pos, is_selected);
                regions.push(HitRegion {
                    pos,
                    radius: radius + 4.0,
                    target: ClickTarget::Marker {
                        id: marker.id.clone(),
                    },
                });
            }
        }
    }
    regions
}

fn cluster_radius(count: usize) -> f32 {
    match count {
        0..=9 => 14.0,
        10..=49 => 18.0,
        _ => 22.0,
    }
}

/// Draws one marker and returns its radius.
fn render_marker(painter: &Painter, marker: &MarkerEntity, pos: Pos2, selected: bool) -> f32 {
    let outline = if selected {
        Stroke::new(3.0, colors::marker::SELECTED)
    } else {
        Stroke::new(1.5, colors::marker::OUTLINE)
    };

    match marker.status {
        MarkerStatus::Pending => {
            painter.circle(pos, PENDING_RADIUS, colors::marker::PENDING, outline);
            PENDING_RADIUS
        }
        MarkerStatus::Verified | MarkerStatus::Stale => {
            painter.circle(pos, PIN_RADIUS, colors::marker::PIN, outline);
            if marker.status == MarkerStatus::Stale {
                let badge = pos + eframe::egui::vec2(PIN_RADIUS * 0.8, -PIN_RADIUS * 0.8);
                painter.circle_filled(badge, 4.0, colors::marker::STALE_BADGE);
            }
            PIN_RADIUS
        }
    }
}

/// Draws the location being picked, tinted by its validation state.
pub fn render_pick(
    painter: &Painter,
    projection: &MapProjection,
    point: Coordinate,
    valid: Option<bool>,
) {
    let pos = projection.geo_to_screen(point);
    let color = match valid {
        Some(true) => colors::status::OK,
        Some(false) => colors::marker::PICK,
        None => colors::status::MUTED,
    };
    let stem = pos + eframe::egui::vec2(0.0, -18.0);
    painter.line_segment([pos, stem], Stroke::new(2.0, color));
    let head = pos + eframe::egui::vec2(0.0, -22.0);
    painter.circle(head, 6.0, color, Stroke::new(1.5, Color32::WHITE));
}

fn project_path(projection: &MapProjection, path: &[Coordinate]) -> Vec<Pos2> {
    let mut points: Vec<Pos2> = Vec::with_capacity(path.len());
    for c in path {
        let p = projection.geo_to_screen(*c);
        // Skip sub-pixel steps.
        if points.last().is_some_and(|last| last.distance_sq(p) < 0.5) {
            continue;
        }
        points.push(p);
    }
    points
}

fn bbox_visible(projection: &MapProjection, west: f64, south: f64, east: f64, north: f64) -> bool {
    let (vw, vs, ve, vn) = projection.visible_bounds();
    west <= ve && east >= vw && south <= vn && north >= vs
}
