//! Routing and geocoding against the Mapbox web services.

use super::http::HttpClient;
use crate::error::FetchError;
use crate::geo::{path_length, Coordinate};
use crate::map::{RouteProvider, RouteResponse, TravelProfile, ViewportBounds};
use serde::Deserialize;
use std::future::Future;

/// Most waypoints the directions service accepts in one request.
pub const MAX_WAYPOINTS_PER_REQUEST: usize = 25;

/// Candidates requested from forward geocoding.
const FORWARD_LIMIT: usize = 5;

#[derive(Debug, Deserialize)]
struct DirectionsBody {
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    geometry: LineGeometry,
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct LineGeometry {
    coordinates: Vec<Coordinate>,
}

/// Parses a directions response body into the first route.
pub fn parse_directions(body: &str) -> Result<RouteResponse, FetchError> {
    let parsed: DirectionsBody = serde_json::from_str(body)?;
    let route = parsed.routes.into_iter().next().ok_or_else(|| {
        FetchError::Decode(
            parsed
                .message
                .unwrap_or_else(|| "No route found between waypoints".to_string()),
        )
    })?;
    Ok(RouteResponse {
        path: route.geometry.coordinates,
        distance_m: route.distance,
        duration_s: route.duration,
        unrouted_legs: 0,
    })
}

/// Joins per-leg results into one path.
///
/// Legs that failed are drawn straight; their length still counts towards
/// the distance, their duration is unknown. Fails when no leg was routed.
pub fn stitch_legs<I>(legs: I) -> Result<RouteResponse, FetchError>
where
    I: IntoIterator<Item = (Vec<Coordinate>, Result<RouteResponse, FetchError>)>,
{
    let mut path: Vec<Coordinate> = Vec::new();
    let mut distance = 0.0;
    let mut duration = Some(0.0);
    let mut routed_legs = 0;
    let mut unrouted_legs = 0;

    for (leg, result) in legs {
        let (leg_path, leg_distance, leg_duration) = match result {
            Ok(r) if r.path.len() >= 2 => {
                routed_legs += 1;
                let d = r.distance_m.unwrap_or_else(|| path_length(&r.path));
                (r.path, d, r.duration_s)
            }
            Ok(_) | Err(_) => {
                unrouted_legs += 1;
                if let [from, to] = leg.as_slice() {
                    log::debug!("Leg {} -> {} unrouted, drawing straight", from, to);
                }
                let d = path_length(&leg);
                (leg, d, None)
            }
        };

        let skip = usize::from(!path.is_empty());
        path.extend(leg_path.into_iter().skip(skip));
        distance += leg_distance;
        duration = match (duration, leg_duration) {
            (Some(total), Some(d)) => Some(total + d),
            _ => None,
        };
    }

    if routed_legs == 0 {
        return Err(FetchError::Network(
            "No leg of the trail could be routed".to_string(),
        ));
    }
    log::info!(
        "Routed {}/{} legs of a trail",
        routed_legs,
        routed_legs + unrouted_legs
    );
    Ok(RouteResponse {
        path,
        distance_m: Some(distance),
        duration_s: duration,
        unrouted_legs,
    })
}

/// Directions client implementing [`RouteProvider`].
#[derive(Debug, Clone)]
pub struct Directions {
    http: HttpClient,
    base_url: String,
    access_token: Option<String>,
}

impl Directions {
    pub fn new(base_url: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.filter(|t| !t.is_empty()),
        }
    }

    /// Request URL for one directions call.
    pub fn route_url(
        &self,
        waypoints: &[Coordinate],
        profile: TravelProfile,
        token: &str,
    ) -> String {
        let coords = waypoints
            .iter()
            .map(|c| format!("{},{}", c.lon, c.lat))
            .collect::<Vec<_>>()
            .join(";");
        format!(
            "{}/{}/{}?geometries=geojson&overview=full&access_token={}",
            self.base_url,
            profile.as_str(),
            coords,
            urlencoding::encode(token)
        )
    }

    async fn request(
        &self,
        waypoints: &[Coordinate],
        profile: TravelProfile,
        token: &str,
    ) -> Result<RouteResponse, FetchError> {
        let url = self.route_url(waypoints, profile, token);
        let body = self.http.get_text(&url).await?;
        parse_directions(&body)
    }

    /// Routes long trails one leg at a time.
    async fn route_by_leg(
        &self,
        waypoints: &[Coordinate],
        profile: TravelProfile,
        token: &str,
    ) -> Result<RouteResponse, FetchError> {
        let mut legs = Vec::with_capacity(waypoints.len().saturating_sub(1));
        for leg in waypoints.windows(2) {
            let result = self.request(leg, profile, token).await;
            legs.push((leg.to_vec(), result));
        }
        stitch_legs(legs)
    }
}

impl RouteProvider for Directions {
    fn route(
        &self,
        waypoints: &[Coordinate],
        profile: TravelProfile,
    ) -> impl Future<Output = Result<RouteResponse, FetchError>> {
        let client = self.clone();
        let waypoints = waypoints.to_vec();
        async move {
            let token = client
                .access_token
                .clone()
                .ok_or(FetchError::MissingCredential)?;
            if waypoints.len() <= MAX_WAYPOINTS_PER_REQUEST {
                client.request(&waypoints, profile, &token).await
            } else {
                client.route_by_leg(&waypoints, profile, &token).await
            }
        }
    }
}

/// One geocoding candidate.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeocodeResult {
    pub text: String,
    pub place_name: String,
    pub center: Coordinate,
}

#[derive(Debug, Deserialize)]
struct GeocodeBody {
    #[serde(default)]
    features: Vec<GeocodeResult>,
}

/// Parses a geocoding response body into its candidates.
pub fn parse_geocoding(body: &str) -> Result<Vec<GeocodeResult>, FetchError> {
    let parsed: GeocodeBody = serde_json::from_str(body)?;
    Ok(parsed.features)
}

/// Forward and reverse geocoding, biased towards the service area.
#[derive(Debug, Clone)]
pub struct Geocoder {
    http: HttpClient,
    base_url: String,
    access_token: Option<String>,
    proximity: Coordinate,
    bbox: ViewportBounds,
}

impl Geocoder {
    pub fn new(
        base_url: impl Into<String>,
        access_token: Option<String>,
        proximity: Coordinate,
        bbox: ViewportBounds,
    ) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.filter(|t| !t.is_empty()),
            proximity,
            bbox,
        }
    }

    fn token(&self) -> Result<&str, FetchError> {
        self.access_token
            .as_deref()
            .ok_or(FetchError::MissingCredential)
    }

    pub fn forward_url(&self, query: &str, token: &str) -> String {
        format!(
            "{}/{}.json?access_token={}&proximity={},{}&bbox={},{},{},{}&limit={}&autocomplete=true",
            self.base_url,
            urlencoding::encode(query),
            urlencoding::encode(token),
            self.proximity.lon,
            self.proximity.lat,
            self.bbox.west,
            self.bbox.south,
            self.bbox.east,
            self.bbox.north,
            FORWARD_LIMIT
        )
    }

    pub fn reverse_url(&self, point: Coordinate, token: &str) -> String {
        format!(
            "{}/{},{}.json?access_token={}&limit=1",
            self.base_url,
            point.lon,
            point.lat,
            urlencoding::encode(token)
        )
    }

    /// Text search. Blank queries return no candidates without a request.
    pub async fn forward(&self, query: &str) -> Result<Vec<GeocodeResult>, FetchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.forward_url(query, self.token()?);
        let body = self.http.get_text(&url).await?;
        parse_geocoding(&body)
    }

    /// The best candidate for a coordinate, if any.
    pub async fn reverse(&self, point: Coordinate) -> Result<Option<GeocodeResult>, FetchError> {
        let url = self.reverse_url(point, self.token()?);
        let body = self.http.get_text(&url).await?;
        Ok(parse_geocoding(&body)?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CEBU_CITY_BOUNDS, CEBU_CITY_CENTER};

    const BASE: &str = "https://api.mapbox.com/directions/v5/mapbox";

    #[test]
    fn test_route_url() {
        let client = Directions::new(BASE, Some("pk.token".into()));
        let url = client.route_url(
            &[Coordinate::new(123.88, 10.31), Coordinate::new(123.89, 10.32)],
            TravelProfile::Cycling,
            "pk.token",
        );
        assert_eq!(
            url,
            "https://api.mapbox.com/directions/v5/mapbox/cycling/123.88,10.31;123.89,10.32\
             ?geometries=geojson&overview=full&access_token=pk.token"
        );
    }

    #[test]
    fn test_parse_directions() {
        let body = r#"{"routes":[{"geometry":{"type":"LineString",
            "coordinates":[[123.88,10.31],[123.885,10.315],[123.89,10.32]]},
            "distance":1520.4,"duration":1100.0}],"code":"Ok"}"#;
        let route = parse_directions(body).unwrap();
        assert_eq!(route.path.len(), 3);
        assert_eq!(route.distance_m, Some(1520.4));
        assert_eq!(route.duration_s, Some(1100.0));
    }

    #[test]
    fn test_parse_directions_without_routes() {
        let err = parse_directions(r#"{"code":"NoRoute","message":"No route found","routes":[]}"#)
            .unwrap_err();
        assert_eq!(err, FetchError::Decode("No route found".to_string()));
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let client = Directions::new(BASE, Some(String::new()));
        let waypoints = [Coordinate::new(123.88, 10.31), Coordinate::new(123.89, 10.32)];
        let result = pollster::block_on(client.route(&waypoints, TravelProfile::Walking));
        assert_eq!(result, Err(FetchError::MissingCredential));
    }

    #[test]
    fn test_long_trail_falls_back_per_leg() {
        // Natively every leg fails, so the whole trail is unroutable.
        let client = Directions::new(BASE, Some("pk.token".into()));
        let waypoints: Vec<Coordinate> = (0..30)
            .map(|i| Coordinate::new(123.88 + i as f64 * 0.001, 10.31))
            .collect();
        let result = pollster::block_on(client.route(&waypoints, TravelProfile::Walking));
        assert!(result.is_err());
    }

    #[test]
    fn test_stitched_route_counts_straight_legs() {
        let a = Coordinate::new(123.880, 10.31);
        let b = Coordinate::new(123.885, 10.31);
        let c = Coordinate::new(123.890, 10.31);
        let routed = RouteResponse {
            path: vec![a, Coordinate::new(123.882, 10.312), b],
            distance_m: Some(700.0),
            duration_s: Some(500.0),
            unrouted_legs: 0,
        };
        let legs = vec![
            (vec![a, b], Ok(routed)),
            (vec![b, c], Err(FetchError::Network("timeout".into()))),
        ];

        let stitched = stitch_legs(legs).unwrap();
        assert_eq!(stitched.unrouted_legs, 1);
        assert_eq!(stitched.path.len(), 4);
        assert_eq!(stitched.path.last(), Some(&c));
        assert_eq!(stitched.duration_s, None);
        assert!(stitched.distance_m.unwrap() > 700.0);
    }

    #[test]
    fn test_stitching_without_routed_legs_fails() {
        let a = Coordinate::new(123.880, 10.31);
        let b = Coordinate::new(123.885, 10.31);
        let legs = vec![(vec![a, b], Err(FetchError::Network("offline".into())))];
        assert!(stitch_legs(legs).is_err());
    }

    #[test]
    fn test_forward_url_is_biased_to_service_area() {
        let geocoder = Geocoder::new(
            "https://api.mapbox.com/geocoding/v5/mapbox.places",
            Some("pk.token".into()),
            CEBU_CITY_CENTER,
            CEBU_CITY_BOUNDS,
        );
        let url = geocoder.forward_url("Fort San Pedro", "pk.token");
        assert!(url.contains("/Fort%20San%20Pedro.json?"));
        assert!(url.contains("&proximity=123.8854,10.3157"));
        assert!(url.contains("&bbox=123.75,10.24,124,10.5"));
        assert!(url.ends_with("&limit=5&autocomplete=true"));

        let reverse = geocoder.reverse_url(Coordinate::new(123.9, 10.3), "pk.token");
        assert!(reverse.ends_with("/123.9,10.3.json?access_token=pk.token&limit=1"));
    }

    #[test]
    fn test_blank_query_skips_request() {
        let geocoder = Geocoder::new("", None, CEBU_CITY_CENTER, CEBU_CITY_BOUNDS);
        assert_eq!(pollster::block_on(geocoder.forward("   ")), Ok(Vec::new()));
        assert_eq!(
            pollster::block_on(geocoder.forward("cafe")),
            Err(FetchError::MissingCredential)
        );
    }

    #[test]
    fn test_parse_geocoding() {
        let body = r#"{"type":"FeatureCollection","features":[
            {"id":"poi.1","text":"Fort San Pedro","place_name":"Fort San Pedro, Cebu City",
             "center":[123.8868,10.2925]}]}"#;
        let results = parse_geocoding(body).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].center, Coordinate::new(123.8868, 10.2925));
    }
}
