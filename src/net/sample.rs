//! Offline sources used by the native build and for demos.

use crate::error::FetchError;
use crate::geo::{BoundaryPolygon, Coordinate};
use crate::map::{
    BoundarySource, MarkerEntity, MarkerPage, MarkerQuery, MarkerSource, RouteProvider,
    RouteResponse, TravelProfile,
};
use std::future::ready;
use std::future::Future;

// Embedded at compile time so the native build needs no network.
static BOUNDARY_GEOJSON: &str = include_str!("../../assets/cebu-city-boundary.geojson");
static SAMPLE_GEMS_JSON: &str = include_str!("../../assets/sample-gems.json");

/// In-memory gem catalogue answering viewport queries like the API would.
#[derive(Debug, Clone)]
pub struct SampleMarkerSource {
    markers: Vec<MarkerEntity>,
}

impl SampleMarkerSource {
    pub fn new(markers: Vec<MarkerEntity>) -> Self {
        Self { markers }
    }

    /// The bundled Cebu City sample gems.
    pub fn bundled() -> Result<Self, FetchError> {
        let page: MarkerPage = serde_json::from_str(SAMPLE_GEMS_JSON)?;
        log::info!("Loaded {} sample gems", page.markers.len());
        Ok(Self::new(page.markers))
    }

    pub fn markers(&self) -> &[MarkerEntity] {
        &self.markers
    }

    fn query(&self, query: &MarkerQuery) -> MarkerPage {
        let markers: Vec<MarkerEntity> = self
            .markers
            .iter()
            .filter(|m| query.bounds.contains(m.coordinate))
            .filter(|m| query.categories.is_empty() || query.categories.contains(&m.category))
            .cloned()
            .collect();
        let total = markers.len();
        MarkerPage { markers, total }
    }
}

impl MarkerSource for SampleMarkerSource {
    fn fetch_markers(
        &self,
        query: &MarkerQuery,
    ) -> impl Future<Output = Result<MarkerPage, FetchError>> {
        ready(Ok(self.query(query)))
    }
}

/// Boundary parsed from the bundled GeoJSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedBoundary;

impl BoundarySource for EmbeddedBoundary {
    fn load_boundary(&self) -> impl Future<Output = Result<BoundaryPolygon, FetchError>> {
        ready(BoundaryPolygon::from_geojson(BOUNDARY_GEOJSON))
    }
}

/// Router for builds without a routing service; every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineRouter;

impl RouteProvider for OfflineRouter {
    fn route(
        &self,
        _waypoints: &[Coordinate],
        _profile: TravelProfile,
    ) -> impl Future<Output = Result<RouteResponse, FetchError>> {
        ready(Err(FetchError::Unavailable(
            "No routing service in offline mode".to_string(),
        )))
    }
}

/// A downtown heritage krawl through the sample gems.
pub fn sample_krawl() -> Vec<Coordinate> {
    vec![
        Coordinate::new(123.8868, 10.2925),
        Coordinate::new(123.8897, 10.2933),
        Coordinate::new(123.8897, 10.2942),
        Coordinate::new(123.8912, 10.2998),
        Coordinate::new(123.8956, 10.2978),
    ]
}
