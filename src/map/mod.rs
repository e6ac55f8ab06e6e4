//! Map core: data loading, validation, routing and engine lifecycle.
//!
//! Everything in here is platform-neutral. Network access goes through the
//! [`MarkerSource`], [`RouteProvider`] and [`BoundarySource`] traits and the
//! rendering engine through [`EngineFactory`], so the same components run
//! against the browser, the native canvas and test fakes.

mod boundary;
mod engine;
mod events;
mod host;
mod popup;
mod route_cache;
mod sequence;
mod types;
pub mod viewport;

pub use boundary::{BoundarySource, BoundaryValidator, ValidationResult, UNABLE_TO_VALIDATE};
pub use engine::{
    Capabilities, ClickEvent, ClickTarget, EngineEvent, EngineFactory, EngineFailure,
    EngineOptions, MapEngine,
};
pub use events::{EventBus, SubscriptionId};
pub use host::{
    classify_engine_failure, is_valid_access_token, HostPhase, MapError, MapErrorCode, MapEvent,
    MapHost,
};
pub use popup::{compute_position, Placement, PopupLayout, PopupPosition, DEFAULT_POPUP_SIZE};
pub use route_cache::{
    straight_line, CacheEntry, ResolvedTrail, RouteCache, RouteCacheStats, RouteKey,
    RouteProvider, RouteResponse, TrailRoute,
};
pub use sequence::{Debouncer, RequestSequencer};
pub use types::{
    MarkerEntity, MarkerFilters, MarkerPage, MarkerStatus, TravelProfile, PENDING_MIN_ZOOM,
};
pub use viewport::{
    ClusterExpansion, FetchOutcome, MarkerQuery, MarkerSet, MarkerSource, MarkerUpdate,
    ViewportBounds, ViewportDataController, ViewportFingerprint,
};
