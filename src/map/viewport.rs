//! Viewport-driven marker loading.
//!
//! [`ViewportDataController`] turns the engine's settled viewport into a
//! scoped marker set. Requests are tagged by a [`RequestSequencer`] so that a
//! response overtaken by a newer request is dropped no matter when it
//! arrives; the superseded request is also aborted, but correctness never
//! depends on the abort landing in time.

use super::events::{EventBus, SubscriptionId};
use super::sequence::RequestSequencer;
use super::types::{MarkerEntity, MarkerFilters, MarkerPage};
use crate::config::ViewportConfig;
use crate::error::FetchError;
use crate::geo::{round_to, Coordinate};
use futures_util::future::{AbortHandle, Abortable};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

/// The geographic rectangle visible on screen plus the zoom it was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
    pub zoom: f64,
}

impl ViewportBounds {
    pub const fn new(south: f64, west: f64, north: f64, east: f64, zoom: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
            zoom,
        }
    }

    /// True when the bounds cannot describe a real view: non-finite values
    /// or zero (or negative) area, as engines report during initial layout.
    pub fn is_degenerate(&self) -> bool {
        let values = [self.south, self.west, self.north, self.east];
        values.iter().any(|v| !v.is_finite()) || self.north <= self.south || self.east <= self.west
    }

    /// Inclusive containment test.
    pub fn contains(&self, c: Coordinate) -> bool {
        c.lat >= self.south && c.lat <= self.north && c.lon >= self.west && c.lon <= self.east
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.west + self.east) / 2.0,
            (self.south + self.north) / 2.0,
        )
    }
}

/// Quantized identity of a fetch: bounds, zoom and categories.
///
/// Two viewports that differ only by floating-point jitter below the
/// configured precision share a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewportFingerprint(String);

impl ViewportFingerprint {
    pub fn new(bounds: &ViewportBounds, filters: &MarkerFilters, precision: u32) -> Self {
        let p = precision as usize;
        let q = |v: f64| round_to(v, precision) + 0.0;
        Self(format!(
            "{:.p$},{:.p$},{:.p$},{:.p$}|z{:.2}|{}",
            q(bounds.south),
            q(bounds.west),
            q(bounds.north),
            q(bounds.east),
            round_to(bounds.zoom, 2) + 0.0,
            filters.categories().join(","),
            p = p,
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Parameters of one marker request.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerQuery {
    pub bounds: ViewportBounds,
    /// Sorted category list; empty means every category.
    pub categories: Vec<String>,
}

/// Source of markers for a viewport.
///
/// Not `Send`: sources run on the UI thread next to browser handles.
pub trait MarkerSource {
    fn fetch_markers(
        &self,
        query: &MarkerQuery,
    ) -> impl Future<Output = Result<MarkerPage, FetchError>>;
}

impl<S: MarkerSource + ?Sized> MarkerSource for Rc<S> {
    fn fetch_markers(
        &self,
        query: &MarkerQuery,
    ) -> impl Future<Output = Result<MarkerPage, FetchError>> {
        (**self).fetch_markers(query)
    }
}

/// Shared, immutable marker set.
pub type MarkerSet = Rc<[MarkerEntity]>;

/// What a call to [`ViewportDataController::fetch`] ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// A network response was applied and listeners were notified.
    Applied(MarkerSet),
    /// The fingerprint matched the last applied fetch; no request was made.
    Cached(MarkerSet),
    /// An identical request is already outstanding; its result will be applied.
    InFlight,
    /// A newer request overtook this one; its result was discarded.
    Superseded,
}

impl FetchOutcome {
    pub fn markers(&self) -> Option<&MarkerSet> {
        match self {
            FetchOutcome::Applied(m) | FetchOutcome::Cached(m) => Some(m),
            FetchOutcome::InFlight | FetchOutcome::Superseded => None,
        }
    }
}

/// Notification sent to `on_update` listeners after a response is applied.
#[derive(Debug, Clone)]
pub struct MarkerUpdate {
    pub seq: u64,
    pub bounds: ViewportBounds,
    pub markers: MarkerSet,
}

struct PendingFetch {
    seq: u64,
    fingerprint: ViewportFingerprint,
    abort: AbortHandle,
}

struct ControllerState {
    markers: MarkerSet,
    last_fingerprint: Option<ViewportFingerprint>,
    pending: Option<PendingFetch>,
}

/// Fetches the markers for the current viewport with last-issued-wins ordering.
pub struct ViewportDataController<S> {
    source: S,
    config: ViewportConfig,
    sequencer: RequestSequencer,
    state: RefCell<ControllerState>,
    updates: EventBus<MarkerUpdate>,
}

impl<S: MarkerSource> ViewportDataController<S> {
    pub fn new(source: S, config: ViewportConfig) -> Self {
        Self {
            source,
            config,
            sequencer: RequestSequencer::new(),
            state: RefCell::new(ControllerState {
                markers: Rc::from(Vec::new()),
                last_fingerprint: None,
                pending: None,
            }),
            updates: EventBus::new(),
        }
    }

    /// Replaces unusable bounds with the configured service area.
    pub fn effective_bounds(&self, bounds: ViewportBounds) -> ViewportBounds {
        if bounds.is_degenerate() {
            let mut fallback = self.config.default_bounds;
            if bounds.zoom.is_finite() {
                fallback.zoom = bounds.zoom;
            }
            log::debug!(
                "Degenerate viewport {:?}, using default service-area bounds",
                bounds
            );
            fallback
        } else {
            bounds
        }
    }

    /// Loads the markers for `bounds` under `filters`.
    ///
    /// Only network and decoding failures of the newest request surface as
    /// errors; overtaken or aborted requests resolve to
    /// [`FetchOutcome::Superseded`].
    pub async fn fetch(
        &self,
        bounds: ViewportBounds,
        filters: &MarkerFilters,
    ) -> Result<FetchOutcome, FetchError> {
        let bounds = self.effective_bounds(bounds);
        let fingerprint = ViewportFingerprint::new(&bounds, filters, self.config.precision);

        // Check-and-register happens under one borrow with no suspension.
        let (seq, registration) = {
            let mut state = self.state.borrow_mut();

            if state.last_fingerprint.as_ref() == Some(&fingerprint) {
                // The view returned to what is already shown; anything still
                // outstanding is now stale.
                if let Some(pending) = state.pending.take() {
                    pending.abort.abort();
                }
                let seq = self.sequencer.issue();
                self.sequencer.try_apply(seq);
                log::debug!(
                    "Viewport unchanged ({}), skipping fetch",
                    fingerprint.as_str()
                );
                return Ok(FetchOutcome::Cached(Rc::clone(&state.markers)));
            }

            if let Some(pending) = &state.pending {
                if pending.fingerprint == fingerprint {
                    log::debug!(
                        "Identical viewport fetch #{} already in flight",
                        pending.seq
                    );
                    return Ok(FetchOutcome::InFlight);
                }
            }

            if let Some(pending) = state.pending.take() {
                log::debug!("Aborting superseded viewport fetch #{}", pending.seq);
                pending.abort.abort();
            }

            let seq = self.sequencer.issue();
            let (abort, registration) = AbortHandle::new_pair();
            state.pending = Some(PendingFetch {
                seq,
                fingerprint: fingerprint.clone(),
                abort,
            });
            (seq, registration)
        };

        let query = MarkerQuery {
            bounds,
            categories: filters.categories().to_vec(),
        };
        log::debug!(
            "Viewport fetch #{} for {} (zoom {:.2})",
            seq,
            fingerprint.as_str(),
            bounds.zoom
        );
        let result = Abortable::new(self.source.fetch_markers(&query), registration).await;

        {
            let mut state = self.state.borrow_mut();
            if state.pending.as_ref().map(|p| p.seq) == Some(seq) {
                state.pending = None;
            }
        }

        let page = match result {
            Err(_aborted) => {
                log::debug!("Viewport fetch #{} aborted", seq);
                return Ok(FetchOutcome::Superseded);
            }
            Ok(Err(e)) if e.is_aborted() || !self.sequencer.is_latest(seq) => {
                log::debug!(
                    "Viewport fetch #{} failed after being superseded: {}",
                    seq,
                    e
                );
                return Ok(FetchOutcome::Superseded);
            }
            Ok(Err(e)) => {
                log::warn!("Viewport fetch #{} failed: {}", seq, e);
                return Err(e);
            }
            Ok(Ok(page)) => page,
        };

        if !self.sequencer.try_apply(seq) {
            log::debug!(
                "Discarding stale viewport response #{} (latest applied #{})",
                seq,
                self.sequencer.latest_applied()
            );
            return Ok(FetchOutcome::Superseded);
        }

        let received = page.markers.len();
        let markers: MarkerSet = page
            .markers
            .into_iter()
            .filter(|m| bounds.contains(m.coordinate) && filters.matches(m))
            .collect();
        log::info!(
            "Applied viewport fetch #{}: {} markers ({} received, {} total)",
            seq,
            markers.len(),
            received,
            page.total
        );

        {
            let mut state = self.state.borrow_mut();
            state.markers = Rc::clone(&markers);
            state.last_fingerprint = Some(fingerprint);
        }

        self.updates.emit(&MarkerUpdate {
            seq,
            bounds,
            markers: Rc::clone(&markers),
        });
        Ok(FetchOutcome::Applied(markers))
    }

    /// The most recently applied marker set.
    pub fn markers(&self) -> MarkerSet {
        Rc::clone(&self.state.borrow().markers)
    }

    pub fn is_fetching(&self) -> bool {
        self.state.borrow().pending.is_some()
    }

    /// Forgets the last fingerprint so the next fetch goes to the network,
    /// e.g. after a gem was created.
    pub fn invalidate(&self) {
        self.state.borrow_mut().last_fingerprint = None;
    }

    /// Aborts any outstanding request and drops its eventual result.
    pub fn cancel(&self) {
        if let Some(pending) = self.state.borrow_mut().pending.take() {
            pending.abort.abort();
        }
        // Bump the sequence so a response already past the abort point is stale.
        let seq = self.sequencer.issue();
        self.sequencer.try_apply(seq);
    }

    pub fn on_update(&self, listener: impl Fn(&MarkerUpdate) + 'static) -> SubscriptionId {
        self.updates.subscribe(listener)
    }

    pub fn remove_listener(&self, id: SubscriptionId) -> bool {
        self.updates.unsubscribe(id)
    }

    pub fn config(&self) -> &ViewportConfig {
        &self.config
    }
}

/// Camera move that splits a clicked cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterExpansion {
    pub center: Coordinate,
    pub zoom: f64,
}

impl ClusterExpansion {
    /// Zoom levels added when the engine cannot tell where a cluster splits.
    pub const FALLBACK_ZOOM_STEP: f64 = 2.0;

    /// Resolves the target zoom for expanding a cluster at `center`.
    ///
    /// `split_zoom` is the engine's answer for where the cluster's members
    /// separate; without one, zooms in by a fixed step. Never zooms out and
    /// never exceeds `max_zoom`.
    pub fn resolve(
        center: Coordinate,
        split_zoom: Option<f64>,
        current_zoom: f64,
        max_zoom: f64,
    ) -> Self {
        let target = split_zoom
            .filter(|z| z.is_finite())
            .unwrap_or(current_zoom + Self::FALLBACK_ZOOM_STEP);
        Self {
            center,
            zoom: target.max(current_zoom).min(max_zoom),
        }
    }
}
