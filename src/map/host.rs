//! Map engine lifecycle.
//!
//! [`MapHost`] owns the single engine instance and walks it through
//! `Uninitialized -> CheckingCapabilities -> Loading -> Ready`, with `Error`
//! reachable from every step. It never sleeps: time-based behaviour
//! (container polling, the load timeout, scheduled retries) is driven by
//! [`MapHost::poll`] with the current time, and engine notifications are fed
//! in through [`MapHost::handle_engine_event`].

use super::engine::{
    ClickEvent, EngineEvent, EngineFactory, EngineFailure, EngineOptions, MapEngine,
};
use super::events::{EventBus, SubscriptionId};
use super::viewport::{ClusterExpansion, ViewportBounds};
use crate::clock::UnixMillis;
use crate::config::HostConfig;
use crate::geo::{Coordinate, ScreenSize};
use std::fmt;

/// Classified map failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapErrorCode {
    CapabilityUnsupported,
    InvalidCredential,
    Network,
    RateLimited,
    StyleLoadFailure,
    ZeroSizeContainer,
    InitializationError,
    Unknown,
}

impl MapErrorCode {
    /// Short title for the error panel.
    pub fn title(&self) -> &'static str {
        match self {
            MapErrorCode::CapabilityUnsupported => "Map not supported",
            MapErrorCode::InvalidCredential => "Map configuration error",
            MapErrorCode::Network => "Connection problem",
            MapErrorCode::RateLimited => "Too many requests",
            MapErrorCode::StyleLoadFailure => "Map style failed to load",
            MapErrorCode::ZeroSizeContainer => "Map container not ready",
            MapErrorCode::InitializationError => "Map failed to start",
            MapErrorCode::Unknown => "Something went wrong",
        }
    }
}

impl fmt::Display for MapErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MapErrorCode::CapabilityUnsupported => "CAPABILITY_UNSUPPORTED",
            MapErrorCode::InvalidCredential => "INVALID_CREDENTIAL",
            MapErrorCode::Network => "NETWORK_ERROR",
            MapErrorCode::RateLimited => "RATE_LIMITED",
            MapErrorCode::StyleLoadFailure => "STYLE_LOAD_FAILURE",
            MapErrorCode::ZeroSizeContainer => "ZERO_SIZE_CONTAINER",
            MapErrorCode::InitializationError => "INITIALIZATION_ERROR",
            MapErrorCode::Unknown => "UNKNOWN",
        };
        write!(f, "{}", s)
    }
}

/// A classified, user-presentable map failure.
#[derive(Debug, Clone, PartialEq)]
pub struct MapError {
    pub code: MapErrorCode,
    pub message: String,
    pub retryable: bool,
}

impl MapError {
    pub fn new(code: MapErrorCode, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            retryable,
        }
    }
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for MapError {}

/// Minimum length of the random part of a public access token.
const TOKEN_BODY_MIN_LEN: usize = 50;

/// Checks the shape of a public access token: `pk.` followed by at least 50
/// characters from `[A-Za-z0-9_-]`.
pub fn is_valid_access_token(token: &str) -> bool {
    match token.strip_prefix("pk.") {
        Some(body) => {
            body.len() >= TOKEN_BODY_MIN_LEN
                && body
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        None => false,
    }
}

/// Maps a raw engine failure onto the error taxonomy.
///
/// Rules are checked in order: network, rate limit, credential, style.
/// Anything unrecognised is `Unknown` and not retryable.
pub fn classify_engine_failure(failure: &EngineFailure) -> MapError {
    let msg = failure.message.as_str();
    let status = failure.status;

    if msg.contains("Failed to fetch")
        || msg.contains("NetworkError")
        || msg.contains("Network request failed")
    {
        return MapError::new(
            MapErrorCode::Network,
            "Network error occurred while loading the map",
            true,
        );
    }

    if status == Some(429) || msg.to_ascii_lowercase().contains("rate limit") {
        return MapError::new(
            MapErrorCode::RateLimited,
            "Map service rate limit exceeded",
            true,
        );
    }

    if matches!(status, Some(401) | Some(403))
        || msg.contains("Unauthorized")
        || msg.contains("Invalid token")
    {
        return MapError::new(
            MapErrorCode::InvalidCredential,
            "Invalid or expired map access token",
            false,
        );
    }

    if msg.contains("style") || msg.contains("Style") {
        return MapError::new(
            MapErrorCode::StyleLoadFailure,
            "Failed to load map style",
            true,
        );
    }

    let message = if msg.is_empty() {
        "An unknown error occurred".to_string()
    } else {
        msg.to_string()
    };
    MapError::new(MapErrorCode::Unknown, message, false)
}

/// Lifecycle phase of the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostPhase {
    Uninitialized,
    CheckingCapabilities,
    Loading,
    Ready,
    Error(MapError),
}

impl HostPhase {
    pub fn name(&self) -> &'static str {
        match self {
            HostPhase::Uninitialized => "uninitialized",
            HostPhase::CheckingCapabilities => "checkingCapabilities",
            HostPhase::Loading => "loading",
            HostPhase::Ready => "ready",
            HostPhase::Error(_) => "error",
        }
    }
}

/// Notifications published to host subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    PhaseChanged(HostPhase),
    ViewportChanged(ViewportBounds),
    Click(ClickEvent),
}

/// Pending timers, all expressed as absolute deadlines.
#[derive(Debug, Default)]
struct Timers {
    container_poll: Option<(UnixMillis, u32)>,
    load_deadline: Option<UnixMillis>,
    retry_at: Option<UnixMillis>,
}

/// Owns the engine instance and its initialization state machine.
pub struct MapHost<F: EngineFactory> {
    factory: F,
    options: EngineOptions,
    config: HostConfig,
    phase: HostPhase,
    engine: Option<F::Engine>,
    timers: Timers,
    retry_count: u32,
    events: EventBus<MapEvent>,
}

impl<F: EngineFactory> MapHost<F> {
    pub fn new(factory: F, options: EngineOptions, config: HostConfig) -> Self {
        Self {
            factory,
            options,
            config,
            phase: HostPhase::Uninitialized,
            engine: None,
            timers: Timers::default(),
            retry_count: 0,
            events: EventBus::new(),
        }
    }

    pub fn phase(&self) -> &HostPhase {
        &self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == HostPhase::Ready
    }

    pub fn error(&self) -> Option<&MapError> {
        match &self.phase {
            HostPhase::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// True while a retry is scheduled but has not started yet.
    pub fn retry_pending(&self) -> bool {
        self.timers.retry_at.is_some()
    }

    /// The engine, once it has been created.
    pub fn engine(&self) -> Option<&F::Engine> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut F::Engine> {
        self.engine.as_mut()
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    pub fn subscribe(&self, listener: impl Fn(&MapEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    fn set_phase(&mut self, phase: HostPhase) {
        if self.phase == phase {
            return;
        }
        log::info!("Map host: {} -> {}", self.phase.name(), phase.name());
        self.phase = phase.clone();
        self.events.emit(&MapEvent::PhaseChanged(phase));
    }

    fn fail(&mut self, error: MapError) {
        log::error!(
            "Map error {} (retryable: {}, attempt {}): {}",
            error.code,
            error.retryable,
            self.retry_count,
            error.message
        );
        self.engine = None;
        self.timers = Timers::default();
        self.set_phase(HostPhase::Error(error));
    }

    /// Begins initialization. Only valid from `Uninitialized`.
    pub fn start(&mut self, now: UnixMillis) {
        if self.phase != HostPhase::Uninitialized {
            log::debug!("Ignoring start in phase {}", self.phase.name());
            return;
        }
        self.timers.retry_at = None;
        self.set_phase(HostPhase::CheckingCapabilities);

        let caps = self.factory.capabilities();
        if !caps.gpu_canvas {
            self.fail(MapError::new(
                MapErrorCode::CapabilityUnsupported,
                "Your browser does not support hardware-accelerated maps",
                false,
            ));
            return;
        }

        if caps.requires_access_token {
            let token_ok = self
                .options
                .access_token
                .as_deref()
                .is_some_and(is_valid_access_token);
            if !token_ok {
                self.fail(MapError::new(
                    MapErrorCode::InvalidCredential,
                    "Map access token is missing or malformed",
                    false,
                ));
                return;
            }
        }

        if self.factory.container_size().is_empty() {
            log::debug!("Map container has no size yet, polling");
            self.timers.container_poll = Some((now.plus_ms(self.config.container_poll_ms), 0));
            return;
        }

        self.create_engine(now);
    }

    fn create_engine(&mut self, now: UnixMillis) {
        self.timers.container_poll = None;
        self.set_phase(HostPhase::Loading);
        match self.factory.create(&self.options) {
            Ok(mut engine) => {
                engine.resize(self.factory.container_size());
                self.engine = Some(engine);
                self.timers.load_deadline = Some(now.plus_ms(self.config.load_timeout_ms));
            }
            Err(failure) => {
                let error = classify_engine_failure(&failure);
                self.fail(error);
            }
        }
    }

    /// Advances timers. Returns the next deadline the caller should wake at.
    pub fn poll(&mut self, now: UnixMillis) -> Option<UnixMillis> {
        if let Some((due, polls)) = self.timers.container_poll {
            if now >= due {
                let polls = polls + 1;
                if !self.factory.container_size().is_empty() {
                    self.create_engine(now);
                } else if polls >= self.config.max_container_polls.max(1) {
                    self.fail(MapError::new(
                        MapErrorCode::ZeroSizeContainer,
                        "Map container has zero width or height",
                        true,
                    ));
                } else {
                    self.timers.container_poll =
                        Some((now.plus_ms(self.config.container_poll_ms), polls));
                }
            }
        }

        if let Some(deadline) = self.timers.load_deadline {
            if now >= deadline && self.phase == HostPhase::Loading {
                self.fail(MapError::new(
                    MapErrorCode::Network,
                    "Map loading timeout exceeded",
                    true,
                ));
            }
        }

        if let Some(due) = self.timers.retry_at {
            if now >= due {
                log::info!("Retrying map initialization (attempt {})", self.retry_count);
                self.start(now);
            }
        }

        self.next_deadline()
    }

    fn next_deadline(&self) -> Option<UnixMillis> {
        [
            self.timers.container_poll.map(|(due, _)| due),
            self.timers.load_deadline,
            self.timers.retry_at,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Feeds an engine notification into the state machine.
    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Loaded => {
                if self.phase != HostPhase::Loading {
                    return;
                }
                self.timers.load_deadline = None;
                self.retry_count = 0;
                self.set_phase(HostPhase::Ready);
                if let Some(bounds) = self.engine.as_ref().map(|e| e.bounds()) {
                    self.events.emit(&MapEvent::ViewportChanged(bounds));
                }
            }
            EngineEvent::Failed(failure) => {
                if matches!(self.phase, HostPhase::Loading | HostPhase::Ready) {
                    let error = classify_engine_failure(&failure);
                    self.fail(error);
                } else {
                    log::debug!(
                        "Engine failure in phase {}: {}",
                        self.phase.name(),
                        failure.message
                    );
                }
            }
            EngineEvent::ViewportChanged(bounds) => {
                if self.is_ready() {
                    self.events.emit(&MapEvent::ViewportChanged(bounds));
                }
            }
            EngineEvent::Click(click) => {
                if self.is_ready() {
                    self.events.emit(&MapEvent::Click(click));
                }
            }
            EngineEvent::Resized(size) => self.resize(size),
        }
    }

    /// Forwards a container size change to the engine.
    pub fn resize(&mut self, size: ScreenSize) {
        if size.is_empty() {
            return;
        }
        if let Some(engine) = self.engine.as_mut() {
            if engine.size() != size {
                log::debug!("Resizing map to {}x{}", size.w, size.h);
                engine.resize(size);
            }
        }
    }

    /// User-initiated retry from the error state.
    ///
    /// Schedules re-initialization after `base_delay * attempt`. Returns false
    /// if the error is not retryable or the attempt budget is spent, in which
    /// case the host moves to a terminal error.
    pub fn retry(&mut self, now: UnixMillis) -> bool {
        let retryable = match &self.phase {
            HostPhase::Error(e) => e.retryable,
            _ => return false,
        };
        if !retryable {
            return false;
        }

        let policy = self.config.retry;
        if self.retry_count >= policy.max_attempts {
            self.fail(MapError::new(
                MapErrorCode::InitializationError,
                "Maximum retry attempts exceeded",
                false,
            ));
            return false;
        }

        self.retry_count += 1;
        let delay = policy.delay_for(self.retry_count);
        log::info!(
            "Map retry {}/{} scheduled in {} ms",
            self.retry_count,
            policy.max_attempts,
            delay
        );
        self.set_phase(HostPhase::Uninitialized);
        self.timers.retry_at = Some(now.plus_ms(delay));
        true
    }

    /// Zooms into a clicked cluster until its members separate.
    pub fn expand_cluster(
        &mut self,
        cluster_id: u64,
        center: Coordinate,
    ) -> Option<ClusterExpansion> {
        if !self.is_ready() {
            return None;
        }
        let max_zoom = self.options.max_zoom;
        let duration = self.config.ease_duration_ms;
        let engine = self.engine.as_mut()?;

        let split = engine.cluster_expansion_zoom(cluster_id);
        let expansion = ClusterExpansion::resolve(center, split, engine.bounds().zoom, max_zoom);
        log::debug!(
            "Expanding cluster {} to zoom {:.2} (engine answer {:?})",
            cluster_id,
            expansion.zoom,
            split
        );
        engine.ease_to(expansion.center, expansion.zoom, duration);
        Some(expansion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use crate::geo::ScreenPoint;
    use crate::map::engine::ClickTarget;
    use crate::testing::FakeEngineFactory;
    use std::cell::RefCell;
    use std::rc::Rc;

    const CLUSTER_CENTER: Coordinate = Coordinate::new(123.9, 10.3);
    const VALID_TOKEN: &str = "pk.abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-";

    fn host_with(factory: FakeEngineFactory) -> MapHost<FakeEngineFactory> {
        let mut config = MapConfig::default();
        config.access_token = Some(VALID_TOKEN.to_string());
        MapHost::new(factory, EngineOptions::from_config(&config), config.host)
    }

    fn record(host: &MapHost<FakeEngineFactory>) -> Rc<RefCell<Vec<MapEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        host.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    fn phases(events: &[MapEvent]) -> Vec<&'static str> {
        events
            .iter()
            .filter_map(|e| match e {
                MapEvent::PhaseChanged(p) => Some(p.name()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_happy_path_reaches_ready() {
        let mut host = host_with(FakeEngineFactory::new());
        let events = record(&host);

        host.start(UnixMillis(0));
        assert_eq!(host.phase(), &HostPhase::Loading);
        assert!(host.engine().is_some());

        host.handle_engine_event(EngineEvent::Loaded);
        assert!(host.is_ready());
        assert_eq!(host.poll(UnixMillis(60_000)), None);
        assert!(host.is_ready());

        let events = events.borrow();
        assert_eq!(
            phases(&events),
            vec!["checkingCapabilities", "loading", "ready"]
        );
        assert!(matches!(events.last(), Some(MapEvent::ViewportChanged(_))));
    }

    #[test]
    fn test_missing_gpu_is_fatal() {
        let mut host = host_with(FakeEngineFactory::new().without_gpu());
        host.start(UnixMillis(0));
        let err = host.error().unwrap();
        assert_eq!(err.code, MapErrorCode::CapabilityUnsupported);
        assert!(!err.retryable);
        assert!(!host.retry(UnixMillis(1)));
        assert_eq!(host.factory_mut().created(), 0);
    }

    #[test]
    fn test_malformed_token_is_fatal() {
        let mut config = MapConfig::default();
        config.access_token = Some("sk.secret".to_string());
        let mut host = MapHost::new(
            FakeEngineFactory::new().requiring_token(),
            EngineOptions::from_config(&config),
            config.host,
        );
        host.start(UnixMillis(0));
        assert_eq!(host.error().unwrap().code, MapErrorCode::InvalidCredential);
        assert!(!host.error().unwrap().retryable);
    }

    #[test]
    fn test_token_not_checked_when_engine_needs_none() {
        let config = MapConfig::default();
        let mut host = MapHost::new(
            FakeEngineFactory::new(),
            EngineOptions::from_config(&config),
            config.host,
        );
        host.start(UnixMillis(0));
        assert_eq!(host.phase(), &HostPhase::Loading);
    }

    #[test]
    fn test_load_timeout_is_retryable_network_error() {
        let mut host = host_with(FakeEngineFactory::new());
        host.start(UnixMillis(0));
        assert_eq!(host.poll(UnixMillis(14_999)), Some(UnixMillis(15_000)));
        assert_eq!(host.phase(), &HostPhase::Loading);

        host.poll(UnixMillis(15_000));
        let err = host.error().unwrap();
        assert_eq!(err.code, MapErrorCode::Network);
        assert_eq!(err.message, "Map loading timeout exceeded");
        assert!(err.retryable);
        assert!(host.engine().is_none());

        // A late load event is ignored.
        host.handle_engine_event(EngineEvent::Loaded);
        assert!(host.error().is_some());
    }

    #[test]
    fn test_zero_size_container_polls_then_succeeds() {
        let mut host =
            host_with(FakeEngineFactory::new().with_container(ScreenSize::new(0.0, 0.0)));
        host.start(UnixMillis(0));
        assert_eq!(host.phase(), &HostPhase::CheckingCapabilities);
        assert_eq!(host.poll(UnixMillis(50)), Some(UnixMillis(100)));

        host.poll(UnixMillis(100));
        assert_eq!(host.phase(), &HostPhase::CheckingCapabilities);

        host.factory_mut()
            .set_container(ScreenSize::new(800.0, 600.0));
        host.poll(UnixMillis(200));
        assert_eq!(host.phase(), &HostPhase::Loading);
        assert_eq!(host.engine().unwrap().size(), ScreenSize::new(800.0, 600.0));
    }

    #[test]
    fn test_zero_size_container_gives_up_after_max_polls() {
        let mut host =
            host_with(FakeEngineFactory::new().with_container(ScreenSize::new(0.0, 300.0)));
        host.start(UnixMillis(0));
        host.poll(UnixMillis(100));
        host.poll(UnixMillis(200));
        host.poll(UnixMillis(300));
        let err = host.error().unwrap();
        assert_eq!(err.code, MapErrorCode::ZeroSizeContainer);
        assert!(err.retryable);
    }

    #[test]
    fn test_retry_backoff_and_terminal_error() {
        let mut host = host_with(FakeEngineFactory::new());
        let mut now = UnixMillis(0);
        host.start(now);

        for attempt in 1..=3u32 {
            now = now.plus_ms(15_000);
            host.poll(now);
            assert!(host.error().unwrap().retryable);

            assert!(host.retry(now));
            assert_eq!(host.retry_count(), attempt);
            assert!(host.retry_pending());
            assert_eq!(host.phase(), &HostPhase::Uninitialized);

            let delay = 1_000 * attempt as u64;
            host.poll(now.plus_ms(delay - 1));
            assert_eq!(host.phase(), &HostPhase::Uninitialized);
            now = now.plus_ms(delay);
            host.poll(now);
            assert_eq!(host.phase(), &HostPhase::Loading);
        }

        now = now.plus_ms(15_000);
        host.poll(now);
        assert!(!host.retry(now));
        let err = host.error().unwrap();
        assert_eq!(err.code, MapErrorCode::InitializationError);
        assert_eq!(err.message, "Maximum retry attempts exceeded");
        assert!(!err.retryable);
        assert_eq!(host.factory_mut().created(), 4);
    }

    #[test]
    fn test_successful_load_resets_retry_budget() {
        let mut host = host_with(FakeEngineFactory::new());
        host.start(UnixMillis(0));
        host.poll(UnixMillis(15_000));
        assert!(host.retry(UnixMillis(15_000)));
        host.poll(UnixMillis(16_000));
        host.handle_engine_event(EngineEvent::Loaded);
        assert!(host.is_ready());
        assert_eq!(host.retry_count(), 0);
    }

    #[test]
    fn test_create_failure_is_classified() {
        let failure = EngineFailure::with_status(429, "Too Many Requests");
        let mut host = host_with(FakeEngineFactory::new().failing_with(failure));
        host.start(UnixMillis(0));
        let err = host.error().unwrap();
        assert_eq!(err.code, MapErrorCode::RateLimited);
        assert!(err.retryable);
    }

    #[test]
    fn test_engine_failure_while_loading() {
        let mut host = host_with(FakeEngineFactory::new());
        host.start(UnixMillis(0));
        host.handle_engine_event(EngineEvent::Failed(EngineFailure::new(
            "Failed to load style: 404",
        )));
        let err = host.error().unwrap();
        assert_eq!(err.code, MapErrorCode::StyleLoadFailure);
        assert!(err.retryable);
    }

    #[test]
    fn test_events_forwarded_only_when_ready() {
        let mut host = host_with(FakeEngineFactory::new());
        let events = record(&host);
        let click = ClickEvent {
            point: ScreenPoint::new(10.0, 10.0),
            coordinate: Coordinate::new(123.9, 10.3),
            target: ClickTarget::Map,
        };

        host.start(UnixMillis(0));
        host.handle_engine_event(EngineEvent::Click(click.clone()));
        let clicked = events
            .borrow()
            .iter()
            .any(|e| matches!(e, MapEvent::Click(_)));
        assert!(!clicked);

        host.handle_engine_event(EngineEvent::Loaded);
        host.handle_engine_event(EngineEvent::Click(click.clone()));
        assert!(events.borrow().contains(&MapEvent::Click(click)));
    }

    #[test]
    fn test_resize_is_forwarded_to_engine() {
        let mut host = host_with(FakeEngineFactory::new());
        host.start(UnixMillis(0));
        host.handle_engine_event(EngineEvent::Loaded);
        host.handle_engine_event(EngineEvent::Resized(ScreenSize::new(1280.0, 720.0)));
        assert_eq!(
            host.engine().unwrap().size(),
            ScreenSize::new(1280.0, 720.0)
        );
        assert_eq!(host.engine().unwrap().resize_calls(), 2);

        // Zero-size and unchanged sizes are ignored.
        host.resize(ScreenSize::new(0.0, 720.0));
        host.resize(ScreenSize::new(1280.0, 720.0));
        assert_eq!(host.engine().unwrap().resize_calls(), 2);
    }

    #[test]
    fn test_cluster_expansion_moves_camera() {
        let mut host = host_with(FakeEngineFactory::new());
        host.start(UnixMillis(0));
        assert!(host.expand_cluster(7, CLUSTER_CENTER).is_none());

        host.handle_engine_event(EngineEvent::Loaded);
        host.engine_mut().unwrap().set_expansion_zoom(7, 15.5);
        let expansion = host.expand_cluster(7, CLUSTER_CENTER).unwrap();
        assert_eq!(expansion.zoom, 15.5);
        assert_eq!(
            host.engine().unwrap().last_ease(),
            Some((Coordinate::new(123.9, 10.3), 15.5, 500))
        );

        // Unknown cluster: fall back to current zoom + 2.
        let current = host.engine().unwrap().bounds().zoom;
        let fallback = host.expand_cluster(99, CLUSTER_CENTER).unwrap();
        assert_eq!(fallback.zoom, (current + 2.0).min(18.0));
    }

    #[test]
    fn test_token_format() {
        assert!(is_valid_access_token(VALID_TOKEN));
        assert!(!is_valid_access_token("pk.short"));
        assert!(!is_valid_access_token(&format!("sk.{}", "a".repeat(60))));
        assert!(!is_valid_access_token(&format!("pk.{}!", "a".repeat(60))));
        assert!(is_valid_access_token(&format!("pk.{}", "a".repeat(50))));
        assert!(!is_valid_access_token(&format!("pk.{}", "a".repeat(49))));
    }

    #[test]
    fn test_classification_rules() {
        let classify = |status: Option<u16>, msg: &str| {
            classify_engine_failure(&EngineFailure {
                status,
                message: msg.to_string(),
            })
        };
        assert_eq!(
            classify(None, "TypeError: Failed to fetch").code,
            MapErrorCode::Network
        );
        assert_eq!(
            classify(None, "NetworkError when attempting").code,
            MapErrorCode::Network
        );
        assert_eq!(classify(Some(429), "").code, MapErrorCode::RateLimited);
        assert_eq!(
            classify(None, "hit the rate limit").code,
            MapErrorCode::RateLimited
        );
        assert_eq!(
            classify(Some(401), "").code,
            MapErrorCode::InvalidCredential
        );
        assert_eq!(
            classify(Some(403), "Forbidden").code,
            MapErrorCode::InvalidCredential
        );
        assert_eq!(
            classify(None, "Invalid token").code,
            MapErrorCode::InvalidCredential
        );
        assert_eq!(
            classify(None, "Style is not done loading").code,
            MapErrorCode::StyleLoadFailure
        );

        let unknown = classify(Some(500), "WebGL context lost");
        assert_eq!(unknown.code, MapErrorCode::Unknown);
        assert!(!unknown.retryable);
        assert_eq!(unknown.message, "WebGL context lost");
    }
}
