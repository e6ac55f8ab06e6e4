//! Clients for the gem API and the boundary asset.

use super::http::HttpClient;
use crate::error::FetchError;
use crate::geo::BoundaryPolygon;
use crate::map::{BoundarySource, MarkerPage, MarkerQuery, MarkerSource};
use std::future::Future;

/// Marker source backed by `GET {base}/api/gems`.
#[derive(Debug, Clone)]
pub struct GemApi {
    http: HttpClient,
    base_url: String,
}

impl GemApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Builds the request URL for a viewport query.
    pub fn query_url(&self, query: &MarkerQuery) -> String {
        let b = &query.bounds;
        let mut url = format!(
            "{}/api/gems?north={}&south={}&east={}&west={}&zoom={}",
            self.base_url, b.north, b.south, b.east, b.west, b.zoom
        );
        if !query.categories.is_empty() {
            url.push_str("&categories=");
            url.push_str(&urlencoding::encode(&query.categories.join(",")));
        }
        url
    }
}

impl MarkerSource for GemApi {
    fn fetch_markers(
        &self,
        query: &MarkerQuery,
    ) -> impl Future<Output = Result<MarkerPage, FetchError>> {
        let url = self.query_url(query);
        let http = self.http;
        async move { http.get_json::<MarkerPage>(&url).await }
    }
}

/// Boundary source that downloads a GeoJSON document.
#[derive(Debug, Clone)]
pub struct BoundaryAsset {
    http: HttpClient,
    url: String,
}

impl BoundaryAsset {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: HttpClient::new(),
            url: url.into(),
        }
    }
}

impl BoundarySource for BoundaryAsset {
    fn load_boundary(&self) -> impl Future<Output = Result<BoundaryPolygon, FetchError>> {
        let url = self.url.clone();
        let http = self.http;
        async move {
            let text = http.get_text(&url).await?;
            BoundaryPolygon::from_geojson(&text)
        }
    }
}
