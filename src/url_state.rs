//! Map camera in the URL query string.
//!
//! The center and zoom are written as `center=lon,lat&zoom=z` so reloading
//! or sharing the page restores the view. Other query parameters are kept.

use crate::geo::Coordinate;

/// Camera position carried in the URL.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapUrlState {
    pub center: Coordinate,
    pub zoom: f64,
}

/// Reads the camera from a query string, with or without the leading `?`.
///
/// Both `center` and `zoom` must be present and valid.
pub fn parse_query(query: &str) -> Option<MapUrlState> {
    let mut center = None;
    let mut zoom = None;

    for pair in query.trim_start_matches('?').split('&') {
        let mut kv = pair.splitn(2, '=');
        let key = kv.next().unwrap_or("");
        let value = kv.next().unwrap_or("");
        let Ok(value) = urlencoding::decode(value) else {
            continue;
        };
        match key {
            "center" => {
                let (lon, lat) = value.split_once(',')?;
                let lon: f64 = lon.trim().parse().ok()?;
                let lat: f64 = lat.trim().parse().ok()?;
                center = Some(Coordinate::new(lon, lat));
            }
            "zoom" => zoom = value.trim().parse::<f64>().ok(),
            _ => {}
        }
    }

    let center = center.filter(|c| c.is_valid())?;
    let zoom = zoom.filter(|z| z.is_finite())?;
    Some(MapUrlState { center, zoom })
}

/// Rewrites `query` with the camera from `state`.
pub fn format_query(query: &str, state: MapUrlState) -> String {
    let mut pairs: Vec<String> = query
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or("");
            !pair.is_empty() && key != "center" && key != "zoom"
        })
        .map(str::to_string)
        .collect();
    let center = format!("center={:.6},{:.6}", state.center.lon, state.center.lat);
    pairs.push(center);
    pairs.push(format!("zoom={:.2}", state.zoom));
    format!("?{}", pairs.join("&"))
}

/// Camera from the current browser URL.
#[cfg(target_arch = "wasm32")]
pub fn read_from_url() -> Option<MapUrlState> {
    let search = web_sys::window()?.location().search().ok()?;
    let state = parse_query(&search);
    if let Some(state) = state {
        log::info!(
            "Restoring map at {} zoom {:.2} from URL",
            state.center,
            state.zoom
        );
    }
    state
}

/// Native builds have no URL.
#[cfg(not(target_arch = "wasm32"))]
pub fn read_from_url() -> Option<MapUrlState> {
    None
}

/// Replaces the browser URL's camera parameters without navigating.
#[cfg(target_arch = "wasm32")]
pub fn write_to_url(state: MapUrlState) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let current = window.location().search().unwrap_or_default();
    let query = format_query(&current, state);
    if query == current {
        return;
    }
    let Ok(history) = window.history() else {
        return;
    };
    if let Err(e) =
        history.replace_state_with_url(&wasm_bindgen::JsValue::NULL, "", Some(&query))
    {
        log::warn!("Failed to update URL: {:?}", e);
    }
}

/// No-op stub for native builds.
#[cfg(not(target_arch = "wasm32"))]
pub fn write_to_url(_state: MapUrlState) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let state = parse_query("?center=123.885400,10.315700&zoom=14.50").unwrap();
        assert_eq!(state.center, Coordinate::new(123.8854, 10.3157));
        assert_eq!(state.zoom, 14.5);

        let encoded = parse_query("zoom=12&center=123.9%2C10.3").unwrap();
        assert_eq!(encoded.center, Coordinate::new(123.9, 10.3));
    }

    #[test]
    fn test_incomplete_or_invalid_query_is_ignored() {
        assert_eq!(parse_query(""), None);
        assert_eq!(parse_query("?center=123.9,10.3"), None);
        assert_eq!(parse_query("?zoom=12"), None);
        assert_eq!(parse_query("?center=abc,10.3&zoom=12"), None);
        assert_eq!(parse_query("?center=123.9,95&zoom=12"), None);
        assert_eq!(parse_query("?center=123.9,10.3&zoom=NaN"), None);
    }

    #[test]
    fn test_format_query_keeps_other_params() {
        let state = MapUrlState {
            center: Coordinate::new(123.8854, 10.3157),
            zoom: 13.0,
        };
        assert_eq!(
            format_query("?krawl=k1&zoom=3&center=1,2", state),
            "?krawl=k1&center=123.885400,10.315700&zoom=13.00"
        );
        assert_eq!(
            format_query("", state),
            "?center=123.885400,10.315700&zoom=13.00"
        );
        assert_eq!(parse_query(&format_query("", state)), Some(state));
    }
}
