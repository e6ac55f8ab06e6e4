//! The eframe application.
//!
//! Wires the map host, the viewport, boundary and route controllers, the
//! geocoder and the panels together. Async work runs through
//! [`spawn_local`] and reports back over a channel that is drained at the
//! start of every frame, so all state changes happen on the update loop.

use crate::canvas::CanvasEngineFactory;
use crate::clock::{Clock, SystemClock, UnixMillis};
use crate::config::MapConfig;
use crate::error::FetchError;
use crate::geo::{format_distance, BoundaryPolygon, Coordinate, ScreenSize};
use crate::map::{
    BoundaryValidator, ClickEvent, ClickTarget, Debouncer, EngineOptions, FetchOutcome,
    HostPhase, MapEngine, MapEvent, MapHost, MarkerSet, PopupLayout, RequestSequencer,
    ResolvedTrail, RouteCache, ValidationResult, ViewportBounds, ViewportDataController,
};
use crate::net::{sample_krawl, GeocodeResult, Geocoder, GeolocationChannel, LocationResult};
use crate::runtime::spawn_local;
use crate::ui::{self, RetryInfo, UiState, POPUP_SIZE};
use crate::url_state::{self, MapUrlState};
use eframe::egui;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;

/// Zoom used when flying to a search result or the device location.
const FLY_TO_ZOOM: f64 = 16.0;

#[cfg(target_arch = "wasm32")]
mod platform {
    use crate::config::MapConfig;
    use crate::net::{BoundaryAsset, Directions, GemApi};

    pub type Markers = GemApi;
    pub type Boundary = BoundaryAsset;
    pub type Router = Directions;

    pub fn sources(config: &MapConfig) -> (Markers, Boundary, Router) {
        (
            GemApi::new(config.api_base_url.clone()),
            BoundaryAsset::new(config.boundary_url.clone()),
            Directions::new(
                config.directions_base_url.clone(),
                config.access_token.clone(),
            ),
        )
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod platform {
    use crate::config::MapConfig;
    use crate::net::{EmbeddedBoundary, OfflineRouter, SampleMarkerSource};

    pub type Markers = SampleMarkerSource;
    pub type Boundary = EmbeddedBoundary;
    pub type Router = OfflineRouter;

    pub fn sources(_config: &MapConfig) -> (Markers, Boundary, Router) {
        let markers = SampleMarkerSource::bundled().unwrap_or_else(|e| {
            log::error!("Failed to load sample gems: {}", e);
            SampleMarkerSource::new(Vec::new())
        });
        (markers, EmbeddedBoundary, OfflineRouter)
    }
}

/// Results delivered back to the update loop.
enum TaskResult {
    Markers(Result<FetchOutcome, FetchError>),
    Boundary(Option<Rc<BoundaryPolygon>>),
    Validation {
        seq: u64,
        point: Coordinate,
        result: ValidationResult,
    },
    Trail {
        seq: u64,
        trail: ResolvedTrail,
    },
    Search(Result<Vec<GeocodeResult>, FetchError>),
}

/// Main application state and logic.
pub struct KrawlApp {
    config: MapConfig,
    clock: SystemClock,
    state: UiState,

    host: MapHost<CanvasEngineFactory>,
    /// Host notifications queued by the subscription, drained each frame.
    host_events: Rc<RefCell<Vec<MapEvent>>>,

    viewport: Rc<ViewportDataController<platform::Markers>>,
    validator: Rc<BoundaryValidator<platform::Boundary>>,
    routes: Rc<RouteCache<platform::Router, SystemClock>>,
    geocoder: Rc<Geocoder>,
    geolocation: GeolocationChannel,

    task_tx: Sender<TaskResult>,
    task_rx: Receiver<TaskResult>,

    viewport_debounce: Debouncer<ViewportBounds>,
    pick_debounce: Debouncer<Coordinate>,
    url_debounce: Debouncer<MapUrlState>,
    pick_sequencer: RequestSequencer,
    trail_sequencer: RequestSequencer,
    popup_layout: PopupLayout,

    markers: MarkerSet,
    boundary: Option<Rc<BoundaryPolygon>>,
    trail: Option<ResolvedTrail>,
    selected: Option<String>,
    last_bounds: Option<ViewportBounds>,
    location: Option<Coordinate>,
    boundary_requested: bool,
}

impl KrawlApp {
    /// Creates the app with configuration for the current platform.
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let config = MapConfig::load();
        Self::with_config(config, cc.gl.is_some())
    }

    pub fn with_config(config: MapConfig, gpu_canvas: bool) -> Self {
        let (markers, boundary, router) = platform::sources(&config);
        let clock = SystemClock::new();

        let host = MapHost::new(
            CanvasEngineFactory::new(gpu_canvas),
            EngineOptions::from_config(&config),
            config.host.clone(),
        );
        let host_events = Rc::new(RefCell::new(Vec::new()));
        let queue = Rc::clone(&host_events);
        host.subscribe(move |event: &MapEvent| queue.borrow_mut().push(event.clone()));

        let geocoder = Geocoder::new(
            config.geocoding_base_url.clone(),
            config.access_token.clone(),
            config.initial_center,
            config.viewport.default_bounds,
        );
        let (task_tx, task_rx) = channel();

        Self {
            clock: clock.clone(),
            state: UiState::new(),
            host,
            host_events,
            viewport: Rc::new(ViewportDataController::new(
                markers,
                config.viewport.clone(),
            )),
            validator: Rc::new(BoundaryValidator::new(boundary)),
            routes: Rc::new(RouteCache::new(router, clock, config.routes)),
            geocoder: Rc::new(geocoder),
            geolocation: GeolocationChannel::new(),
            task_tx,
            task_rx,
            viewport_debounce: Debouncer::new(config.viewport.debounce_ms),
            pick_debounce: Debouncer::new(config.validation_debounce_ms),
            url_debounce: Debouncer::new(config.url_sync_debounce_ms),
            pick_sequencer: RequestSequencer::new(),
            trail_sequencer: RequestSequencer::new(),
            popup_layout: PopupLayout::default(),
            markers: Rc::from(Vec::new()),
            boundary: None,
            trail: None,
            selected: None,
            last_bounds: None,
            location: None,
            boundary_requested: false,
            config,
        }
    }

    /// Runs one frame of the app.
    pub fn show(&mut self, ctx: &egui::Context) {
        let now = self.clock.now();

        if !self.boundary_requested {
            self.boundary_requested = true;
            self.load_boundary(ctx);
        }

        self.process_tasks();
        if let Some(result) = self.geolocation.try_recv() {
            self.handle_location(result);
        }
        let host_deadline = self.host.poll(now);

        ui::render_top_bar(
            ctx,
            &self.state,
            self.host.phase(),
            self.viewport.is_fetching(),
        );
        ui::render_left_panel(ctx, &mut self.state, self.geolocation.is_pending());
        self.handle_requests(ctx);

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.render_map(ui, now));

        self.process_host_events(now);
        self.render_popup(ctx);

        if let Some(bounds) = self.viewport_debounce.poll(now) {
            self.fetch_markers(ctx, bounds);
        }
        if let Some(point) = self.pick_debounce.poll(now) {
            self.validate_pick(ctx, point);
        }
        if let Some(camera) = self.url_debounce.poll(now) {
            url_state::write_to_url(camera);
        }

        // Wake up for the nearest timer.
        let wake = [
            host_deadline.map(|deadline| deadline.millis_since(now)),
            self.viewport_debounce.remaining_ms(now),
            self.pick_debounce.remaining_ms(now),
            self.url_debounce.remaining_ms(now),
        ]
        .into_iter()
        .flatten()
        .min();
        if let Some(ms) = wake {
            ctx.request_repaint_after(Duration::from_millis(ms));
        }
    }

    fn process_tasks(&mut self) {
        while let Ok(result) = self.task_rx.try_recv() {
            match result {
                TaskResult::Markers(Ok(outcome)) => {
                    if let Some(markers) = outcome.markers() {
                        self.state.status_message = format!("{} gems in view", markers.len());
                        self.markers = Rc::clone(markers);
                        if let Some(engine) = self.host.engine_mut() {
                            engine.set_markers(&self.markers);
                        }
                    }
                }
                TaskResult::Markers(Err(e)) => {
                    log::error!("Failed to load gems: {}", e);
                    self.state.status_message = format!("Failed to load gems: {}", e);
                }
                TaskResult::Boundary(polygon) => {
                    self.boundary = polygon;
                    if let Some(engine) = self.host.engine_mut() {
                        engine.set_boundary(self.boundary.clone());
                    }
                }
                TaskResult::Validation { seq, point, result } => {
                    let current = self.state.pick.candidate == Some(point);
                    if self.pick_sequencer.is_latest(seq)
                        && self.pick_sequencer.try_apply(seq)
                        && current
                    {
                        self.state.pick.validation = Some(result);
                    } else {
                        log::debug!(
                            "Dropping stale validation #{} for {} (latest #{})",
                            seq,
                            point,
                            self.pick_sequencer.latest_issued()
                        );
                    }
                }
                TaskResult::Trail { seq, trail } => {
                    if !self.trail_sequencer.is_latest(seq) || !self.trail_sequencer.try_apply(seq)
                    {
                        continue;
                    }
                    let mut summary = format!("{:.1} km", trail.distance_m / 1000.0);
                    if let Some(seconds) = trail.duration_s {
                        summary.push_str(&format!(", about {} min", (seconds / 60.0).round()));
                    }
                    if trail.unrouted_legs > 0 {
                        summary.push_str(" (partly straight)");
                    } else if !trail.routed {
                        summary.push_str(" (straight line)");
                    }
                    self.state.trail_summary = Some(summary);
                    self.trail = Some(trail);
                    self.sync_trails();
                }
                TaskResult::Search(result) => {
                    let search = &mut self.state.search;
                    search.pending = false;
                    match result {
                        Ok(results) => {
                            search.error = results
                                .is_empty()
                                .then(|| "No places found".to_string());
                            search.results = results;
                        }
                        Err(FetchError::MissingCredential) => {
                            search.results.clear();
                            search.error = Some("Search needs a map access token".to_string());
                        }
                        Err(e) => {
                            log::warn!("Place search failed: {}", e);
                            search.results.clear();
                            search.error = Some(e.to_string());
                        }
                    }
                }
            }
        }
    }

    fn handle_location(&mut self, result: LocationResult) {
        match result {
            LocationResult::Found {
                coordinate,
                accuracy_m,
            } => {
                self.location = Some(coordinate);
                self.state.location_label = Some(format!(
                    "{:.5}, {:.5} (\u{00B1}{:.0} m)",
                    coordinate.lat, coordinate.lon, accuracy_m
                ));
                self.state.fly_to = Some(coordinate);
            }
            LocationResult::Denied => {
                self.location = None;
                self.state.location_label = Some("Location permission denied".to_string());
            }
            LocationResult::Unavailable(_) => {
                self.location = None;
                self.state.location_label = Some("Location unavailable".to_string());
            }
        }
    }

    /// Acts on the request flags the panels set this frame.
    fn handle_requests(&mut self, ctx: &egui::Context) {
        // All toggles made this frame become a single fetch.
        if std::mem::take(&mut self.state.filters_changed) {
            let bounds = self
                .last_bounds
                .or_else(|| self.host.engine().map(|e| e.bounds()));
            if let Some(bounds) = bounds {
                self.viewport_debounce.cancel();
                self.fetch_markers(ctx, bounds);
            }
        }

        if std::mem::take(&mut self.state.search_requested) {
            self.search(ctx);
        }

        if std::mem::take(&mut self.state.locate_requested) {
            self.geolocation.request(ctx.clone());
        }

        if std::mem::take(&mut self.state.trail_requested) {
            self.request_trail(ctx);
        }

        if let Some(target) = self.state.fly_to.take() {
            let duration = self.config.host.ease_duration_ms;
            if let (true, Some(engine)) = (self.host.is_ready(), self.host.engine_mut()) {
                engine.ease_to(target, FLY_TO_ZOOM, duration);
            }
        }

        if !self.state.pick.active && self.pick_debounce.is_pending() {
            self.pick_debounce.cancel();
        }
    }

    fn render_map(&mut self, ui: &mut egui::Ui, now: UnixMillis) {
        let available = ui.available_size();
        self.host
            .factory_mut()
            .set_container_size(ScreenSize::new(available.x, available.y));

        if *self.host.phase() == HostPhase::Uninitialized && !self.host.retry_pending() {
            self.host.start(now);
        }

        if let HostPhase::Error(error) = self.host.phase().clone() {
            let info = RetryInfo {
                attempt: self.host.retry_count(),
                max_attempts: self.config.host.retry.max_attempts,
            };
            if ui::render_error_panel(ui, &error, info) && !self.host.retry(now) {
                log::warn!("Map retry refused for {}", error.code);
            }
            return;
        }

        let pick = if self.state.pick.active {
            let valid = self.state.pick.validation.as_ref().map(|v| v.is_valid);
            self.state.pick.candidate.map(|point| (point, valid))
        } else {
            None
        };
        let selected = self.selected.clone();

        let events = match self.host.engine_mut() {
            Some(engine) => {
                engine.set_selected(selected);
                engine.set_pick(pick);
                engine.show(ui)
            }
            None => {
                ui.centered_and_justified(|ui| {
                    ui.spinner();
                });
                Vec::new()
            }
        };
        for event in events {
            self.host.handle_engine_event(event);
        }
    }

    fn process_host_events(&mut self, now: UnixMillis) {
        let events = std::mem::take(&mut *self.host_events.borrow_mut());
        for event in events {
            match event {
                MapEvent::PhaseChanged(HostPhase::Ready) => {
                    self.state.status_message = "Map ready".to_string();
                    self.sync_engine();
                }
                MapEvent::PhaseChanged(HostPhase::Error(error)) => {
                    self.state.status_message = error.to_string();
                    self.viewport_debounce.cancel();
                    self.selected = None;
                }
                MapEvent::PhaseChanged(phase) => {
                    self.state.status_message = format!("Map {}", phase.name());
                }
                MapEvent::ViewportChanged(bounds) => {
                    self.viewport_debounce.schedule(bounds, now);
                    let camera = MapUrlState {
                        center: bounds.center(),
                        zoom: bounds.zoom,
                    };
                    self.url_debounce.schedule(camera, now);
                }
                MapEvent::Click(click) => self.handle_click(click, now),
            }
        }
    }

    /// Pushes everything already loaded into a freshly created engine.
    fn sync_engine(&mut self) {
        let Some(engine) = self.host.engine_mut() else {
            return;
        };
        engine.set_markers(&self.markers);
        engine.set_boundary(self.boundary.clone());
        self.sync_trails();
    }

    fn sync_trails(&mut self) {
        let trails: Vec<ResolvedTrail> = self
            .trail
            .iter()
            .filter(|_| self.state.show_trail)
            .cloned()
            .collect();
        if let Some(engine) = self.host.engine_mut() {
            engine.set_trails(&trails);
        }
    }

    fn handle_click(&mut self, click: ClickEvent, now: UnixMillis) {
        if self.state.pick.active {
            self.state.pick.candidate = Some(click.coordinate);
            self.state.pick.validation = None;
            self.pick_debounce.schedule(click.coordinate, now);
            return;
        }

        match click.target {
            ClickTarget::Marker { id } => {
                log::debug!("Selected gem {}", id);
                self.selected = Some(id);
            }
            ClickTarget::Cluster { id, center, count } => {
                self.selected = None;
                if let Some(expansion) = self.host.expand_cluster(id, center) {
                    log::debug!(
                        "Expanding cluster of {} to zoom {:.1}",
                        count,
                        expansion.zoom
                    );
                }
            }
            ClickTarget::Map => self.selected = None,
        }
    }

    fn render_popup(&mut self, ctx: &egui::Context) {
        let Some(id) = self.selected.as_deref() else {
            return;
        };
        let Some(marker) = self.markers.iter().find(|m| m.id == id) else {
            // The gem left the loaded set.
            self.selected = None;
            return;
        };
        let Some(engine) = self.host.engine().filter(|_| self.host.is_ready()) else {
            return;
        };

        let anchor = engine.project(marker.coordinate);
        let position = self.popup_layout.compute(anchor, POPUP_SIZE, engine.size());
        let top_left = self.popup_layout.top_left(&position, POPUP_SIZE);
        let away = self
            .location
            .map(|here| format_distance(crate::geo::distance(here, marker.coordinate)));

        if ui::render_marker_popup(ctx, engine.origin(), top_left, marker, away) {
            self.selected = None;
        }
    }

    fn fetch_markers(&mut self, ctx: &egui::Context, bounds: ViewportBounds) {
        self.last_bounds = Some(bounds);
        let controller = Rc::clone(&self.viewport);
        let filters = self.state.filters.clone();
        let tx = self.task_tx.clone();
        let ctx = ctx.clone();
        spawn_local(async move {
            let result = controller.fetch(bounds, &filters).await;
            let _ = tx.send(TaskResult::Markers(result));
            ctx.request_repaint();
        });
    }

    fn load_boundary(&mut self, ctx: &egui::Context) {
        let validator = Rc::clone(&self.validator);
        let tx = self.task_tx.clone();
        let ctx = ctx.clone();
        spawn_local(async move {
            validator.preload().await;
            let _ = tx.send(TaskResult::Boundary(validator.polygon()));
            ctx.request_repaint();
        });
    }

    fn validate_pick(&mut self, ctx: &egui::Context, point: Coordinate) {
        let seq = self.pick_sequencer.issue();
        let validator = Rc::clone(&self.validator);
        let tx = self.task_tx.clone();
        let ctx = ctx.clone();
        spawn_local(async move {
            let result = validator.validate(point).await;
            let _ = tx.send(TaskResult::Validation { seq, point, result });
            ctx.request_repaint();
        });
    }

    fn request_trail(&mut self, ctx: &egui::Context) {
        if !self.state.show_trail {
            // Invalidate anything still resolving.
            self.trail_sequencer.issue();
            self.state.trail_summary = None;
            self.sync_trails();
            return;
        }

        let seq = self.trail_sequencer.issue();
        let routes = Rc::clone(&self.routes);
        let profile = self.state.profile;
        let tx = self.task_tx.clone();
        let ctx = ctx.clone();
        spawn_local(async move {
            let trail = routes.resolve_trail(&sample_krawl(), profile).await;
            let _ = tx.send(TaskResult::Trail { seq, trail });
            ctx.request_repaint();
        });
    }

    fn search(&mut self, ctx: &egui::Context) {
        let query = self.state.search.query.trim().to_string();
        if query.is_empty() {
            self.state.search.results.clear();
            self.state.search.error = None;
            return;
        }
        self.state.search.pending = true;

        let geocoder = Rc::clone(&self.geocoder);
        let tx = self.task_tx.clone();
        let ctx = ctx.clone();
        spawn_local(async move {
            let result = geocoder.forward(&query).await;
            let _ = tx.send(TaskResult::Search(result));
            ctx.request_repaint();
        });
    }
}

impl eframe::App for KrawlApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.show(ctx);
    }
}
