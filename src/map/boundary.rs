//! Service-area validation for picked locations.
//!
//! The boundary polygon is loaded lazily on the first validation and kept
//! for the session. Concurrent first calls share one load; a failed load is
//! not remembered, so the next call tries again.

use crate::error::FetchError;
use crate::geo::{BoundaryPolygon, Coordinate};
use futures_util::future::{FutureExt, LocalBoxFuture, Shared};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

/// Message shown when the boundary could not be loaded.
pub const UNABLE_TO_VALIDATE: &str =
    "Unable to validate this location right now. Please try again.";

const DEFAULT_AREA_NAME: &str = "the service area";

/// Where the boundary polygon comes from.
pub trait BoundarySource {
    fn load_boundary(&self) -> impl Future<Output = Result<BoundaryPolygon, FetchError>>;
}

impl<S: BoundarySource + ?Sized> BoundarySource for Rc<S> {
    fn load_boundary(&self) -> impl Future<Output = Result<BoundaryPolygon, FetchError>> {
        (**self).load_boundary()
    }
}

/// Outcome of validating one point.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub message: Option<String>,
    /// Distance to the nearest boundary edge when the point is outside.
    pub distance_m: Option<f64>,
}

impl ValidationResult {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
            distance_m: None,
        }
    }
}

type PendingLoad = Shared<LocalBoxFuture<'static, Result<Rc<BoundaryPolygon>, FetchError>>>;

#[derive(Default)]
struct ValidatorState {
    polygon: Option<Rc<BoundaryPolygon>>,
    loading: Option<PendingLoad>,
    /// Bumped by `invalidate` so a load started earlier does not repopulate.
    generation: u64,
}

/// Answers whether a coordinate lies inside the service-area boundary.
pub struct BoundaryValidator<S> {
    source: Rc<S>,
    state: Rc<RefCell<ValidatorState>>,
}

impl<S: BoundarySource + 'static> BoundaryValidator<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Rc::new(source),
            state: Rc::new(RefCell::new(ValidatorState::default())),
        }
    }

    /// Validates `point` against the boundary, loading it if needed.
    ///
    /// Never fails: range errors and load failures become an invalid result
    /// with a user-facing message.
    pub async fn validate(&self, point: Coordinate) -> ValidationResult {
        if !point.lon.is_finite() || !point.lat.is_finite() {
            return ValidationResult::invalid("Coordinates must be numbers.");
        }
        if !point.is_valid() {
            return ValidationResult::invalid("Coordinates are out of valid range.");
        }

        let polygon = match self.polygon_or_load().await {
            Ok(polygon) => polygon,
            Err(e) => {
                log::warn!("Boundary unavailable, cannot validate {}: {}", point, e);
                return ValidationResult::invalid(UNABLE_TO_VALIDATE);
            }
        };

        let area = polygon.name().unwrap_or(DEFAULT_AREA_NAME);
        if polygon.contains(point) {
            ValidationResult {
                is_valid: true,
                message: Some(format!("Location is within {}.", area)),
                distance_m: None,
            }
        } else {
            ValidationResult {
                is_valid: false,
                message: Some(format!(
                    "Location is outside {}. Please select a location within {}.",
                    area, area
                )),
                distance_m: polygon.distance_to_edge(point),
            }
        }
    }

    /// Returns the cached polygon or joins/starts the shared load.
    async fn polygon_or_load(&self) -> Result<Rc<BoundaryPolygon>, FetchError> {
        let load = {
            let mut state = self.state.borrow_mut();
            if let Some(polygon) = &state.polygon {
                return Ok(Rc::clone(polygon));
            }
            if let Some(pending) = state.loading.clone() {
                pending
            } else {
                let load = Self::load(
                    Rc::clone(&self.source),
                    Rc::clone(&self.state),
                    state.generation,
                )
                .boxed_local()
                .shared();
                state.loading = Some(load.clone());
                load
            }
        };
        load.await
    }

    async fn load(
        source: Rc<S>,
        state: Rc<RefCell<ValidatorState>>,
        generation: u64,
    ) -> Result<Rc<BoundaryPolygon>, FetchError> {
        log::debug!("Loading service-area boundary");
        let result = source.load_boundary().await.map(Rc::new);

        let mut state = state.borrow_mut();
        if state.generation != generation {
            return result;
        }
        state.loading = None;
        match &result {
            Ok(polygon) => {
                log::info!(
                    "Loaded boundary {} ({} part(s))",
                    polygon.name().unwrap_or(DEFAULT_AREA_NAME),
                    polygon.shape().0.len()
                );
                state.polygon = Some(Rc::clone(polygon));
            }
            Err(e) => log::warn!("Failed to load boundary: {}", e),
        }
        result
    }

    /// Synchronous check against an already-loaded boundary; `false` if not loaded.
    pub fn is_point_in_boundary(&self, point: Coordinate) -> bool {
        self.state
            .borrow()
            .polygon
            .as_ref()
            .is_some_and(|p| p.contains(point))
    }

    /// The loaded polygon, for drawing the boundary outline.
    pub fn polygon(&self) -> Option<Rc<BoundaryPolygon>> {
        self.state.borrow().polygon.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.borrow().polygon.is_some()
    }

    /// Forgets the cached polygon so the next validation reloads it.
    pub fn invalidate(&self) {
        let mut state = self.state.borrow_mut();
        state.polygon = None;
        state.loading = None;
        state.generation += 1;
        log::debug!("Boundary cache cleared");
    }

    /// Starts loading without validating anything, e.g. when a picker opens.
    pub async fn preload(&self) -> bool {
        self.polygon_or_load().await.is_ok()
    }
}
