//! Panels around the map.
//!
//! The UI is split into distinct panels:
//! - Top bar: title and status line
//! - Left panel: place search, category filters, location picking, krawl trail
//! - Central area: the map, or the error panel while the map is down
//! - Popup: details for the selected gem, anchored to its marker
//!
//! Panels only edit [`UiState`]; the app reacts to the request flags they set.

mod error_panel;
mod left_panel;
mod popup;
mod top_bar;

pub use error_panel::{render_error_panel, RetryInfo};
pub use left_panel::render_left_panel;
pub use popup::{render_marker_popup, POPUP_SIZE};
pub use top_bar::render_top_bar;

use crate::geo::Coordinate;
use crate::map::{MarkerFilters, TravelProfile, ValidationResult};
use crate::net::GeocodeResult;

/// Categories offered as filter toggles.
pub const CATEGORIES: &[&str] = &[
    "Art",
    "Food & Drink",
    "Historical Landmark",
    "Market",
    "Monument",
    "Nature",
    "Park",
    "Religious Site",
    "Shopping",
    "Viewpoint",
];

/// Location picking, as for placing a new gem.
#[derive(Debug, Clone, Default)]
pub struct PickState {
    pub active: bool,
    pub candidate: Option<Coordinate>,
    /// Result for `candidate`; `None` while validation is outstanding.
    pub validation: Option<ValidationResult>,
}

/// Place search through the geocoder.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub query: String,
    pub pending: bool,
    pub results: Vec<GeocodeResult>,
    pub error: Option<String>,
}

/// State shared between the panels and the app.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub status_message: String,
    pub filters: MarkerFilters,
    pub pick: PickState,
    pub search: SearchState,
    pub show_trail: bool,
    pub profile: TravelProfile,
    /// Summary of the resolved trail for the left panel.
    pub trail_summary: Option<String>,
    /// Text describing the device location, if known.
    pub location_label: Option<String>,

    pub filters_changed: bool,
    pub search_requested: bool,
    pub locate_requested: bool,
    pub trail_requested: bool,
    pub fly_to: Option<Coordinate>,
}

impl UiState {
    pub fn new() -> Self {
        Self {
            status_message: "Starting map...".to_string(),
            show_trail: true,
            trail_requested: true,
            ..Default::default()
        }
    }
}
