//! Scripted fakes for the async seams.
//!
//! Each fake answers from a FIFO of scripted replies and falls back to a
//! default answer when the queue is empty. A deferred reply is a oneshot
//! sender the test resolves whenever it wants, which is how tests hold a
//! request in flight.

use crate::clock::{Clock, UnixMillis};
use crate::error::FetchError;
use crate::geo::{BoundaryPolygon, Coordinate, ScreenPoint, ScreenSize};
use crate::map::{
    BoundarySource, Capabilities, EngineFactory, EngineFailure, EngineOptions, MapEngine,
    MarkerEntity, MarkerPage, MarkerQuery, MarkerSource, ResolvedTrail, RouteProvider,
    RouteResponse, TravelProfile, ViewportBounds,
};
use futures_channel::oneshot;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::rc::Rc;

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<i64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms as i64);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> UnixMillis {
        UnixMillis(self.now.get())
    }
}

enum Reply<T> {
    Ready(Result<T, FetchError>),
    Deferred(oneshot::Receiver<Result<T, FetchError>>),
}

/// FIFO of scripted replies shared by the source fakes.
struct Script<T> {
    replies: RefCell<VecDeque<Reply<T>>>,
    calls: Cell<usize>,
}

impl<T> Script<T> {
    fn new() -> Self {
        Self {
            replies: RefCell::new(VecDeque::new()),
            calls: Cell::new(0),
        }
    }

    fn push(&self, result: Result<T, FetchError>) {
        self.replies.borrow_mut().push_back(Reply::Ready(result));
    }

    fn defer(&self) -> oneshot::Sender<Result<T, FetchError>> {
        let (tx, rx) = oneshot::channel();
        self.replies.borrow_mut().push_back(Reply::Deferred(rx));
        tx
    }

    /// Counts the call and takes the next scripted reply, if any.
    fn next(&self) -> Option<Reply<T>> {
        self.calls.set(self.calls.get() + 1);
        self.replies.borrow_mut().pop_front()
    }

    async fn answer(
        reply: Option<Reply<T>>,
        default: impl FnOnce() -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        match reply {
            Some(Reply::Ready(result)) => result,
            Some(Reply::Deferred(rx)) => rx.await.unwrap_or(Err(FetchError::Aborted)),
            None => default(),
        }
    }
}

/// Marker source that returns a fixed set of markers by default.
pub struct FakeMarkerSource {
    markers: Vec<MarkerEntity>,
    script: Script<MarkerPage>,
    queries: RefCell<Vec<MarkerQuery>>,
}

impl FakeMarkerSource {
    pub fn new() -> Self {
        Self::with_markers(Vec::new())
    }

    pub fn with_markers(markers: Vec<MarkerEntity>) -> Self {
        Self {
            markers,
            script: Script::new(),
            queries: RefCell::new(Vec::new()),
        }
    }

    pub fn defer(&self) -> oneshot::Sender<Result<MarkerPage, FetchError>> {
        self.script.defer()
    }

    pub fn push_result(&self, result: Result<MarkerPage, FetchError>) {
        self.script.push(result);
    }

    pub fn call_count(&self) -> usize {
        self.script.calls.get()
    }

    pub fn queries(&self) -> Vec<MarkerQuery> {
        self.queries.borrow().clone()
    }
}

impl MarkerSource for FakeMarkerSource {
    fn fetch_markers(
        &self,
        query: &MarkerQuery,
    ) -> impl Future<Output = Result<MarkerPage, FetchError>> {
        self.queries.borrow_mut().push(query.clone());
        let reply = self.script.next();
        let markers = self.markers.clone();
        Script::answer(reply, move || {
            let total = markers.len();
            Ok(MarkerPage { markers, total })
        })
    }
}

/// Routing service that echoes the waypoints back as the path.
pub struct FakeRouteProvider {
    script: Script<RouteResponse>,
    last_waypoints: RefCell<Option<Vec<Coordinate>>>,
}

impl FakeRouteProvider {
    pub const DISTANCE_M: f64 = 1_234.0;
    pub const DURATION_S: f64 = 900.0;

    pub fn new() -> Self {
        Self {
            script: Script::new(),
            last_waypoints: RefCell::new(None),
        }
    }

    /// The default answer for `waypoints`.
    pub fn response_for(waypoints: &[Coordinate]) -> RouteResponse {
        RouteResponse {
            path: waypoints.to_vec(),
            distance_m: Some(Self::DISTANCE_M),
            duration_s: Some(Self::DURATION_S),
            unrouted_legs: 0,
        }
    }

    pub fn defer(&self) -> oneshot::Sender<Result<RouteResponse, FetchError>> {
        self.script.defer()
    }

    pub fn push_result(&self, result: Result<RouteResponse, FetchError>) {
        self.script.push(result);
    }

    pub fn call_count(&self) -> usize {
        self.script.calls.get()
    }

    pub fn last_waypoints(&self) -> Option<Vec<Coordinate>> {
        self.last_waypoints.borrow().clone()
    }
}

impl RouteProvider for FakeRouteProvider {
    fn route(
        &self,
        waypoints: &[Coordinate],
        _profile: TravelProfile,
    ) -> impl Future<Output = Result<RouteResponse, FetchError>> {
        *self.last_waypoints.borrow_mut() = Some(waypoints.to_vec());
        let reply = self.script.next();
        let response = Self::response_for(waypoints);
        Script::answer(reply, move || Ok(response))
    }
}

/// Boundary source with a fixed polygon.
pub struct FakeBoundarySource {
    polygon: BoundaryPolygon,
    script: Script<BoundaryPolygon>,
}

impl FakeBoundarySource {
    pub fn with_polygon(polygon: BoundaryPolygon) -> Self {
        Self {
            polygon,
            script: Script::new(),
        }
    }

    pub fn defer(&self) -> oneshot::Sender<Result<BoundaryPolygon, FetchError>> {
        self.script.defer()
    }

    pub fn push_result(&self, result: Result<BoundaryPolygon, FetchError>) {
        self.script.push(result);
    }

    pub fn call_count(&self) -> usize {
        self.script.calls.get()
    }
}

impl BoundarySource for FakeBoundarySource {
    fn load_boundary(&self) -> impl Future<Output = Result<BoundaryPolygon, FetchError>> {
        let reply = self.script.next();
        let polygon = self.polygon.clone();
        Script::answer(reply, move || Ok(polygon))
    }
}

/// Span of the fake viewport in degrees at zoom 0.
const FAKE_SPAN_DEG: f64 = 360.0;

/// Engine that records calls instead of drawing.
#[derive(Debug)]
pub struct FakeEngine {
    size: ScreenSize,
    center: Coordinate,
    zoom: f64,
    resize_calls: usize,
    last_ease: Option<(Coordinate, f64, u64)>,
    expansion: HashMap<u64, f64>,
    markers: Vec<MarkerEntity>,
    trails: usize,
    boundary: Option<Rc<BoundaryPolygon>>,
}

impl FakeEngine {
    pub fn resize_calls(&self) -> usize {
        self.resize_calls
    }

    pub fn last_ease(&self) -> Option<(Coordinate, f64, u64)> {
        self.last_ease
    }

    pub fn set_expansion_zoom(&mut self, cluster_id: u64, zoom: f64) {
        self.expansion.insert(cluster_id, zoom);
    }

    pub fn markers(&self) -> &[MarkerEntity] {
        &self.markers
    }

    pub fn trail_count(&self) -> usize {
        self.trails
    }

    pub fn has_boundary(&self) -> bool {
        self.boundary.is_some()
    }
}

impl MapEngine for FakeEngine {
    fn resize(&mut self, size: ScreenSize) {
        self.resize_calls += 1;
        self.size = size;
    }

    fn size(&self) -> ScreenSize {
        self.size
    }

    fn bounds(&self) -> ViewportBounds {
        let half = FAKE_SPAN_DEG / 2f64.powf(self.zoom) / 2.0;
        ViewportBounds::new(
            self.center.lat - half,
            self.center.lon - half,
            self.center.lat + half,
            self.center.lon + half,
            self.zoom,
        )
    }

    fn ease_to(&mut self, center: Coordinate, zoom: f64, duration_ms: u64) {
        self.center = center;
        self.zoom = zoom;
        self.last_ease = Some((center, zoom, duration_ms));
    }

    fn set_markers(&mut self, markers: &[MarkerEntity]) {
        self.markers = markers.to_vec();
    }

    fn set_trails(&mut self, trails: &[ResolvedTrail]) {
        self.trails = trails.len();
    }

    fn set_boundary(&mut self, boundary: Option<Rc<BoundaryPolygon>>) {
        self.boundary = boundary;
    }

    fn cluster_expansion_zoom(&self, cluster_id: u64) -> Option<f64> {
        self.expansion.get(&cluster_id).copied()
    }

    fn project(&self, coordinate: Coordinate) -> ScreenPoint {
        let b = self.bounds();
        let x = (coordinate.lon - b.west) / (b.east - b.west) * self.size.w as f64;
        let y = (b.north - coordinate.lat) / (b.north - b.south) * self.size.h as f64;
        ScreenPoint::new(x as f32, y as f32)
    }
}

/// Factory for [`FakeEngine`]s with configurable platform answers.
#[derive(Debug)]
pub struct FakeEngineFactory {
    capabilities: Capabilities,
    container: ScreenSize,
    fail_next: Option<EngineFailure>,
    created: usize,
}

impl FakeEngineFactory {
    pub fn new() -> Self {
        Self {
            capabilities: Capabilities {
                gpu_canvas: true,
                requires_access_token: false,
            },
            container: ScreenSize::new(800.0, 600.0),
            fail_next: None,
            created: 0,
        }
    }

    pub fn without_gpu(mut self) -> Self {
        self.capabilities.gpu_canvas = false;
        self
    }

    pub fn requiring_token(mut self) -> Self {
        self.capabilities.requires_access_token = true;
        self
    }

    pub fn with_container(mut self, size: ScreenSize) -> Self {
        self.container = size;
        self
    }

    /// Makes the next `create` call fail with `failure`.
    pub fn failing_with(mut self, failure: EngineFailure) -> Self {
        self.fail_next = Some(failure);
        self
    }

    pub fn set_container(&mut self, size: ScreenSize) {
        self.container = size;
    }

    /// Number of create attempts, failed ones included.
    pub fn created(&self) -> usize {
        self.created
    }
}

impl EngineFactory for FakeEngineFactory {
    type Engine = FakeEngine;

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn container_size(&self) -> ScreenSize {
        self.container
    }

    fn create(&mut self, options: &EngineOptions) -> Result<FakeEngine, EngineFailure> {
        self.created += 1;
        if let Some(failure) = self.fail_next.take() {
            return Err(failure);
        }
        Ok(FakeEngine {
            size: ScreenSize::new(0.0, 0.0),
            center: options.center,
            zoom: options.zoom,
            resize_calls: 0,
            last_ease: None,
            expansion: HashMap::new(),
            markers: Vec::new(),
            trails: 0,
            boundary: None,
        })
    }
}
