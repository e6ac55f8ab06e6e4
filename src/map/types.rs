//! Domain types shared by the map components.

use crate::geo::Coordinate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Zoom level from which pending gems are drawn.
pub const PENDING_MIN_ZOOM: f64 = 12.0;

/// Lifecycle status of a gem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerStatus {
    Pending,
    Verified,
    Stale,
}

impl MarkerStatus {
    /// Minimum zoom at which markers with this status are drawn.
    pub fn min_zoom(&self) -> Option<f64> {
        match self {
            MarkerStatus::Pending => Some(PENDING_MIN_ZOOM),
            MarkerStatus::Verified | MarkerStatus::Stale => None,
        }
    }

    pub fn visible_at(&self, zoom: f64) -> bool {
        self.min_zoom().map_or(true, |min| zoom >= min)
    }
}

impl fmt::Display for MarkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarkerStatus::Pending => "pending",
            MarkerStatus::Verified => "verified",
            MarkerStatus::Stale => "stale",
        };
        write!(f, "{}", s)
    }
}

/// A gem as delivered by the marker API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerEntity {
    pub id: String,
    #[serde(alias = "coordinates")]
    pub coordinate: Coordinate,
    pub category: String,
    pub status: MarkerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vouch_count: Option<u32>,
}

impl MarkerEntity {
    /// Creates a marker with no display metadata.
    pub fn new(
        id: impl Into<String>,
        coordinate: Coordinate,
        category: impl Into<String>,
        status: MarkerStatus,
    ) -> Self {
        Self {
            id: id.into(),
            coordinate,
            category: category.into(),
            status,
            name: None,
            district: None,
            short_description: None,
            thumbnail_url: None,
            rating: None,
            vouch_count: None,
        }
    }

    /// Name to show in popups, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Response body of the marker endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerPage {
    #[serde(alias = "gems")]
    pub markers: Vec<MarkerEntity>,
    #[serde(default)]
    pub total: usize,
}

/// Filters applied to marker fetches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerFilters {
    categories: Vec<String>,
}

impl MarkerFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds filters from a category list; order and duplicates are ignored.
    pub fn with_categories<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut categories: Vec<String> = categories.into_iter().map(Into::into).collect();
        categories.sort();
        categories.dedup();
        Self { categories }
    }

    /// Sorted, de-duplicated category list.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    fn position(&self, category: &str) -> Result<usize, usize> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(category))
    }

    pub fn toggle(&mut self, category: &str) {
        match self.position(category) {
            Ok(idx) => {
                self.categories.remove(idx);
            }
            Err(idx) => self.categories.insert(idx, category.to_string()),
        }
    }

    pub fn contains(&self, category: &str) -> bool {
        self.position(category).is_ok()
    }

    /// True when a marker passes the filter; no categories means all pass.
    pub fn matches(&self, marker: &MarkerEntity) -> bool {
        self.categories.is_empty() || self.contains(&marker.category)
    }
}

/// Travel profile used when routing a krawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelProfile {
    #[default]
    Walking,
    Cycling,
    Driving,
}

impl TravelProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelProfile::Walking => "walking",
            TravelProfile::Cycling => "cycling",
            TravelProfile::Driving => "driving",
        }
    }
}

impl fmt::Display for TravelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
