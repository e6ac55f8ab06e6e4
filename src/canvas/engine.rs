//! A map engine painted with egui.
//!
//! Draws the service-area outline, trails, clustered markers and the pick
//! pin over a plain background grid. Pointer input pans and zooms the
//! camera; everything the host needs to know is queued as [`EngineEvent`]s
//! and returned from [`CanvasEngine::show`].

use super::cluster::ClusterIndex;
use super::colors;
use super::render::{self, HitRegion};
use crate::geo::{BoundaryPolygon, Coordinate, MapProjection, ScreenPoint, ScreenSize};
use crate::map::{
    Capabilities, ClickEvent, ClickTarget, EngineEvent, EngineFactory, EngineFailure,
    EngineOptions, MapEngine, MarkerEntity, ResolvedTrail, ViewportBounds,
};
use eframe::egui::{self, Pos2, Rect, Sense, Vec2};
use std::rc::Rc;
use web_time::Instant;

/// Zoom levels per unit of raw scroll delta.
const SCROLL_ZOOM_RATE: f64 = 0.005;

/// An in-progress camera animation.
#[derive(Debug, Clone, Copy)]
struct Ease {
    from_center: Coordinate,
    from_zoom: f64,
    to_center: Coordinate,
    to_zoom: f64,
    started: Instant,
    duration_ms: u64,
}

impl Ease {
    /// Camera at the current instant, and whether the animation is over.
    fn sample(&self) -> (Coordinate, f64, bool) {
        let elapsed = self.started.elapsed().as_millis() as f64;
        let t = (elapsed / self.duration_ms.max(1) as f64).min(1.0);
        // Ease-out cubic.
        let k = 1.0 - (1.0 - t).powi(3);
        let center = Coordinate::new(
            self.from_center.lon + (self.to_center.lon - self.from_center.lon) * k,
            self.from_center.lat + (self.to_center.lat - self.from_center.lat) * k,
        );
        let zoom = self.from_zoom + (self.to_zoom - self.from_zoom) * k;
        (center, zoom, t >= 1.0)
    }
}

/// The egui-painted engine.
pub struct CanvasEngine {
    projection: MapProjection,
    min_zoom: f64,
    max_zoom: f64,
    size: ScreenSize,
    index: ClusterIndex,
    trails: Vec<ResolvedTrail>,
    boundary: Option<Rc<BoundaryPolygon>>,
    hits: Vec<HitRegion>,
    events: Vec<EngineEvent>,
    ease: Option<Ease>,
    loaded: bool,
    /// Camera changed since the last `ViewportChanged`.
    unsettled: bool,
    selected: Option<String>,
    pick: Option<(Coordinate, Option<bool>)>,
}

impl CanvasEngine {
    pub fn new(options: &EngineOptions) -> Self {
        Self {
            projection: MapProjection::new(options.center, options.zoom),
            min_zoom: options.min_zoom,
            max_zoom: options.max_zoom,
            size: ScreenSize::default(),
            index: ClusterIndex::new(options.cluster),
            trails: Vec::new(),
            boundary: None,
            hits: Vec::new(),
            events: Vec::new(),
            ease: None,
            loaded: false,
            unsettled: false,
            selected: None,
            pick: None,
        }
    }

    /// Highlights the marker whose popup is open.
    pub fn set_selected(&mut self, id: Option<String>) {
        self.selected = id;
    }

    /// Shows the location being picked and its validation state.
    pub fn set_pick(&mut self, pick: Option<(Coordinate, Option<bool>)>) {
        self.pick = pick;
    }

    /// Top-left corner of the canvas in window coordinates.
    pub fn origin(&self) -> Pos2 {
        self.projection.screen_rect.min
    }

    pub fn zoom(&self) -> f64 {
        self.projection.zoom
    }

    /// Paints the map into `ui` and returns the events raised this frame.
    pub fn show(&mut self, ui: &mut egui::Ui) -> Vec<EngineEvent> {
        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let rect = response.rect;

        let size = ScreenSize::new(rect.width(), rect.height());
        self.projection.update(Rect::from_min_size(rect.min, self.projection.screen_rect.size()));
        if size != self.size {
            self.events.push(EngineEvent::Resized(size));
        }
        if !self.loaded {
            self.loaded = true;
            self.events.push(EngineEvent::Loaded);
        }

        self.step_ease(ui.ctx());
        let scrolled = self.handle_input(&response);

        painter.rect_filled(rect, 0.0, colors::map::BACKGROUND);
        let clipped = painter.with_clip_rect(rect);
        render::render_grid(&clipped, &self.projection);
        if let Some(boundary) = &self.boundary {
            render::render_boundary(&clipped, boundary, &self.projection);
        }
        render::render_trails(&clipped, &self.trails, &self.projection);
        self.hits = render::render_markers(
            &clipped,
            &mut self.index,
            &self.projection,
            self.selected.as_deref(),
        );
        if let Some((point, valid)) = self.pick {
            render::render_pick(&clipped, &self.projection, point, valid);
        }

        if self.unsettled && !response.dragged() && !scrolled && self.ease.is_none() {
            self.unsettled = false;
            self.events.push(EngineEvent::ViewportChanged(self.bounds()));
        }

        std::mem::take(&mut self.events)
    }

    fn step_ease(&mut self, ctx: &egui::Context) {
        let Some(ease) = self.ease else {
            return;
        };
        let (center, zoom, done) = ease.sample();
        self.projection.center = center;
        self.projection.zoom = zoom;
        self.unsettled = true;
        if done {
            self.ease = None;
        } else {
            ctx.request_repaint();
        }
    }

    /// Applies pan, zoom and click input. Returns true if the wheel moved.
    fn handle_input(&mut self, response: &egui::Response) -> bool {
        if response.dragged() {
            let delta = response.drag_delta();
            if delta != Vec2::ZERO {
                self.ease = None;
                self.projection.pan_by(delta);
                self.unsettled = true;
            }
        }

        let mut scrolled = false;
        if response.hovered() {
            let scroll = response.ctx.input(|i| i.raw_scroll_delta);
            if scroll.y != 0.0 {
                if let Some(anchor) = response.hover_pos() {
                    self.ease = None;
                    self.projection.zoom_around(
                        anchor,
                        scroll.y as f64 * SCROLL_ZOOM_RATE,
                        self.min_zoom,
                        self.max_zoom,
                    );
                    self.unsettled = true;
                    scrolled = true;
                }
            }
        }

        if response.double_clicked() {
            if let Some(anchor) = response.interact_pointer_pos() {
                self.projection
                    .zoom_around(anchor, 1.0, self.min_zoom, self.max_zoom);
                self.unsettled = true;
            }
        } else if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let event = self.click_at(pos);
                self.events.push(EngineEvent::Click(event));
            }
        }
        scrolled
    }

    fn click_at(&self, pos: Pos2) -> ClickEvent {
        let target = render::hit_test(&self.hits, pos)
            .map(|hit| hit.target.clone())
            .unwrap_or(ClickTarget::Map);
        let local = pos - self.origin();
        ClickEvent {
            point: ScreenPoint::new(local.x, local.y),
            coordinate: self.projection.screen_to_geo(pos),
            target,
        }
    }
}

impl MapEngine for CanvasEngine {
    fn resize(&mut self, size: ScreenSize) {
        self.size = size;
        let origin = self.origin();
        self.projection
            .update(Rect::from_min_size(origin, Vec2::new(size.w, size.h)));
        self.unsettled = true;
    }

    fn size(&self) -> ScreenSize {
        self.size
    }

    fn bounds(&self) -> ViewportBounds {
        let (west, south, east, north) = self.projection.visible_bounds();
        ViewportBounds::new(south, west, north, east, self.projection.zoom)
    }

    fn ease_to(&mut self, center: Coordinate, zoom: f64, duration_ms: u64) {
        let zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        if duration_ms == 0 {
            self.ease = None;
            self.projection.center = center;
            self.projection.zoom = zoom;
            self.unsettled = true;
            return;
        }
        self.ease = Some(Ease {
            from_center: self.projection.center,
            from_zoom: self.projection.zoom,
            to_center: center,
            to_zoom: zoom,
            started: Instant::now(),
            duration_ms,
        });
    }

    fn set_markers(&mut self, markers: &[MarkerEntity]) {
        self.index.load(markers);
    }

    fn set_trails(&mut self, trails: &[ResolvedTrail]) {
        self.trails = trails.to_vec();
    }

    fn set_boundary(&mut self, boundary: Option<Rc<BoundaryPolygon>>) {
        self.boundary = boundary;
    }

    fn cluster_expansion_zoom(&self, cluster_id: u64) -> Option<f64> {
        self.index.expansion_zoom(cluster_id, self.projection.zoom)
    }

    fn project(&self, coordinate: Coordinate) -> ScreenPoint {
        let pos = self.projection.geo_to_screen(coordinate) - self.origin();
        ScreenPoint::new(pos.x, pos.y)
    }
}

/// Creates [`CanvasEngine`]s sized to the central panel.
#[derive(Debug, Clone)]
pub struct CanvasEngineFactory {
    gpu_canvas: bool,
    container: ScreenSize,
}

impl CanvasEngineFactory {
    pub fn new(gpu_canvas: bool) -> Self {
        Self {
            gpu_canvas,
            container: ScreenSize::default(),
        }
    }

    /// Records the space the map panel currently offers.
    pub fn set_container_size(&mut self, size: ScreenSize) {
        self.container = size;
    }
}

impl EngineFactory for CanvasEngineFactory {
    type Engine = CanvasEngine;

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            gpu_canvas: self.gpu_canvas,
            requires_access_token: false,
        }
    }

    fn container_size(&self) -> ScreenSize {
        self.container
    }

    fn create(&mut self, options: &EngineOptions) -> Result<CanvasEngine, EngineFailure> {
        if !options.zoom.is_finite() || !options.center.is_valid() {
            return Err(EngineFailure::new(format!(
                "Invalid initial camera {} @ {}",
                options.center, options.zoom
            )));
        }
        log::info!(
            "Creating canvas engine at {} zoom {:.1}",
            options.center,
            options.zoom
        );
        Ok(CanvasEngine::new(options))
    }
}
