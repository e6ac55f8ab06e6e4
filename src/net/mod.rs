//! Transports behind the map core's source traits.
//!
//! In the browser, markers come from the gem API, the boundary from a static
//! GeoJSON asset, and routes and place search from the Mapbox web services.
//! Native builds use the bundled sample data instead.

mod api;
mod geolocation;
mod http;
mod mapbox;
mod sample;

pub use api::{BoundaryAsset, GemApi};
pub use geolocation::{GeolocationChannel, LocationResult};
pub use http::{redact, HttpClient};
pub use mapbox::{
    parse_directions, parse_geocoding, Directions, GeocodeResult, Geocoder,
    MAX_WAYPOINTS_PER_REQUEST,
};
pub use sample::{sample_krawl, EmbeddedBoundary, OfflineRouter, SampleMarkerSource};
