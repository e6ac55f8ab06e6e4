//! Map configuration.
//!
//! Every field has a default so a partial JSON document (or none at all) is
//! enough. Native builds take overrides from `KRAWL_*` environment variables;
//! the web build reads a JSON document from localStorage, then the camera
//! from the page URL.

use crate::geo::Coordinate;
use crate::map::viewport::ViewportBounds;
use crate::url_state::{self, MapUrlState};
use serde::{Deserialize, Serialize};

/// Cebu City, the default map centre.
pub const CEBU_CITY_CENTER: Coordinate = Coordinate::new(123.8854, 10.3157);

/// Bounding box of the Cebu City service area.
pub const CEBU_CITY_BOUNDS: ViewportBounds = ViewportBounds {
    south: 10.24,
    west: 123.75,
    north: 10.50,
    east: 124.00,
    zoom: 12.0,
};

/// Top-level configuration for the map subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Public access token for the tile, routing and geocoding services.
    pub access_token: Option<String>,
    pub style_url: String,
    /// Base URL of the gem API (empty means same origin).
    pub api_base_url: String,
    pub boundary_url: String,
    pub directions_base_url: String,
    pub geocoding_base_url: String,
    pub initial_center: Coordinate,
    pub initial_zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub host: HostConfig,
    pub viewport: ViewportConfig,
    pub routes: RouteCacheConfig,
    /// Debounce applied by pickers before validating a candidate point.
    pub validation_debounce_ms: u64,
    /// Delay before a settled camera is written to the URL.
    pub url_sync_debounce_ms: u64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            style_url: "mapbox://styles/mapbox/streets-v12".to_string(),
            api_base_url: String::new(),
            boundary_url: "/data/cebu-city-boundary.geojson".to_string(),
            directions_base_url: "https://api.mapbox.com/directions/v5/mapbox".to_string(),
            geocoding_base_url: "https://api.mapbox.com/geocoding/v5/mapbox.places".to_string(),
            initial_center: CEBU_CITY_CENTER,
            initial_zoom: 13.0,
            min_zoom: 10.0,
            max_zoom: 18.0,
            host: HostConfig::default(),
            viewport: ViewportConfig::default(),
            routes: RouteCacheConfig::default(),
            validation_debounce_ms: 300,
            url_sync_debounce_ms: 1000,
        }
    }
}

/// Initialization timing and retry behaviour of the map host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub load_timeout_ms: u64,
    pub container_poll_ms: u64,
    pub max_container_polls: u32,
    pub retry: RetryPolicy,
    /// Camera animation length for cluster expansion.
    pub ease_duration_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: 15_000,
            container_poll_ms: 100,
            max_container_polls: 3,
            retry: RetryPolicy::default(),
            ease_duration_ms: 500,
        }
    }
}

/// Linear backoff: attempt `n` waits `base_delay_ms * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> u64 {
        self.base_delay_ms.saturating_mul(attempt.max(1) as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub debounce_ms: u64,
    /// Decimal places kept when fingerprinting bounds.
    pub precision: u32,
    pub default_bounds: ViewportBounds,
    pub cluster: ClusterConfig,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            precision: 4,
            default_bounds: CEBU_CITY_BOUNDS,
            cluster: ClusterConfig::default(),
        }
    }
}

/// Parameters handed to the engine's clustering index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub radius_px: f32,
    /// Zoom above which points are never clustered.
    pub max_zoom: f64,
    pub min_points: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            radius_px: 50.0,
            max_zoom: 14.0,
            min_points: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteCacheConfig {
    pub ttl_ms: u64,
    pub capacity: usize,
    /// Decimal places kept when keying waypoints.
    pub precision: u32,
}

impl Default for RouteCacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 5 * 60 * 1000,
            capacity: 64,
            precision: 6,
        }
    }
}

impl MapConfig {
    /// localStorage key for persisted configuration.
    #[cfg(target_arch = "wasm32")]
    const STORAGE_KEY: &'static str = "krawl_map_config";

    /// Loads configuration for the current platform.
    pub fn load() -> Self {
        #[cfg(target_arch = "wasm32")]
        let mut config = Self::load_from_local_storage();
        #[cfg(not(target_arch = "wasm32"))]
        let mut config = {
            let mut config = Self::default();
            config.apply_overrides(|key| std::env::var(key).ok());
            config
        };

        if let Some(state) = url_state::read_from_url() {
            config.apply_url_state(state);
        }
        config
    }

    #[cfg(target_arch = "wasm32")]
    fn load_from_local_storage() -> Self {
        let window = match web_sys::window() {
            Some(w) => w,
            None => return Self::default(),
        };

        let storage = match window.local_storage() {
            Ok(Some(s)) => s,
            _ => return Self::default(),
        };

        let json = match storage.get_item(Self::STORAGE_KEY) {
            Ok(Some(s)) => s,
            _ => return Self::default(),
        };

        Self::from_json(&json)
    }

    /// Parses a JSON document, falling back to defaults if it is malformed.
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str::<Self>(json) {
            Ok(config) => {
                log::info!("Loaded map configuration");
                config.sanitized()
            }
            Err(e) => {
                log::warn!("Failed to parse map configuration: {}", e);
                Self::default()
            }
        }
    }

    /// Applies `KRAWL_*` overrides read through `lookup`.
    ///
    /// Unparseable numeric values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup("KRAWL_MAPBOX_TOKEN").filter(|t| !t.is_empty()) {
            self.access_token = Some(token);
        }
        if let Some(base) = lookup("KRAWL_API_BASE") {
            self.api_base_url = base;
        }

        let number = |key: &str| -> Option<f64> {
            let raw = lookup(key)?;
            match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => Some(v),
                _ => {
                    log::warn!("Ignoring invalid {}={:?}", key, raw);
                    None
                }
            }
        };

        if let Some(lat) = number("KRAWL_MAP_LAT") {
            self.initial_center.lat = lat;
        }
        if let Some(lon) = number("KRAWL_MAP_LON") {
            self.initial_center.lon = lon;
        }
        if let Some(zoom) = number("KRAWL_MAP_ZOOM") {
            self.initial_zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        }
    }

    /// Starts the camera where the URL says.
    pub fn apply_url_state(&mut self, state: MapUrlState) {
        self.initial_center = state.center;
        self.initial_zoom = state.zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Resets an unusable zoom range to the defaults and keeps the initial
    /// zoom inside the range.
    fn sanitized(mut self) -> Self {
        let valid = self.min_zoom.is_finite()
            && self.max_zoom.is_finite()
            && self.min_zoom <= self.max_zoom;
        if !valid {
            let defaults = Self::default();
            log::warn!(
                "Ignoring zoom range {}..{}, using {}..{}",
                self.min_zoom,
                self.max_zoom,
                defaults.min_zoom,
                defaults.max_zoom
            );
            self.min_zoom = defaults.min_zoom;
            self.max_zoom = defaults.max_zoom;
        }
        if !self.initial_zoom.is_finite() {
            self.initial_zoom = Self::default().initial_zoom;
        }
        self.initial_zoom = self.initial_zoom.clamp(self.min_zoom, self.max_zoom);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = MapConfig::default();
        assert_eq!(config.host.load_timeout_ms, 15_000);
        assert_eq!(config.host.retry.max_attempts, 3);
        assert_eq!(config.viewport.cluster.radius_px, 50.0);
        assert_eq!(config.routes.ttl_ms, 300_000);
        assert_eq!(config.initial_center, CEBU_CITY_CENTER);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            MapConfig::from_json(r#"{ "host": { "load_timeout_ms": 5000 }, "max_zoom": 17 }"#);
        assert_eq!(config.host.load_timeout_ms, 5_000);
        assert_eq!(config.host.container_poll_ms, 100);
        assert_eq!(config.max_zoom, 17.0);
        assert_eq!(config.viewport.precision, 4);
    }

    #[test]
    fn test_malformed_json_falls_back() {
        assert_eq!(MapConfig::from_json("{ nope"), MapConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("KRAWL_MAPBOX_TOKEN", "pk.test"),
            ("KRAWL_MAP_LAT", "10.5"),
            ("KRAWL_MAP_LON", "not-a-number"),
            ("KRAWL_MAP_ZOOM", "25"),
        ]
        .into_iter()
        .collect();

        let mut config = MapConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.access_token.as_deref(), Some("pk.test"));
        assert_eq!(config.initial_center.lat, 10.5);
        assert_eq!(config.initial_center.lon, CEBU_CITY_CENTER.lon);
        assert_eq!(config.initial_zoom, 18.0);
    }

    #[test]
    fn test_inverted_zoom_range_is_reset() {
        let config =
            MapConfig::from_json(r#"{ "min_zoom": 16, "max_zoom": 4, "initial_zoom": 20 }"#);
        assert_eq!(config.min_zoom, 10.0);
        assert_eq!(config.max_zoom, 18.0);
        assert_eq!(config.initial_zoom, 18.0);
        assert_eq!(12.0f64.clamp(config.min_zoom, config.max_zoom), 12.0);
    }

    #[test]
    fn test_url_state_overrides_camera() {
        let mut config = MapConfig::default();
        config.apply_url_state(MapUrlState {
            center: Coordinate::new(123.9, 10.3),
            zoom: 30.0,
        });
        assert_eq!(config.initial_center, Coordinate::new(123.9, 10.3));
        assert_eq!(config.initial_zoom, 18.0);
    }

    #[test]
    fn test_retry_delay_is_linear() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), 1_000);
        assert_eq!(policy.delay_for(2), 2_000);
        assert_eq!(policy.delay_for(3), 3_000);
    }
}
