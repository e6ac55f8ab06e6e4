//! The seam between the map host and a rendering engine.
//!
//! An engine draws tiles, markers and trails, owns the camera and runs the
//! clustering index. The host never touches an engine before it is created
//! through an [`EngineFactory`], and engines report back through
//! [`EngineEvent`]s that the embedding code forwards to the host.

use super::route_cache::ResolvedTrail;
use super::types::MarkerEntity;
use super::viewport::ViewportBounds;
use crate::config::{ClusterConfig, MapConfig};
use crate::geo::{BoundaryPolygon, Coordinate, ScreenPoint, ScreenSize};
use std::rc::Rc;

/// What the current platform can do for an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Hardware-accelerated canvas (WebGL or equivalent) is available.
    pub gpu_canvas: bool,
    /// The engine fetches vendor tiles and needs a public access token.
    pub requires_access_token: bool,
}

/// Everything an engine needs at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub access_token: Option<String>,
    pub style_url: String,
    pub center: Coordinate,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub cluster: ClusterConfig,
}

impl EngineOptions {
    pub fn from_config(config: &MapConfig) -> Self {
        Self {
            access_token: config.access_token.clone(),
            style_url: config.style_url.clone(),
            center: config.initial_center,
            zoom: config.initial_zoom,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            cluster: config.viewport.cluster,
        }
    }
}

/// A raw failure reported by an engine, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineFailure {
    pub status: Option<u16>,
    pub message: String,
}

impl EngineFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

/// What was under the pointer on a click.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickTarget {
    Map,
    Marker { id: String },
    Cluster {
        id: u64,
        center: Coordinate,
        count: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClickEvent {
    pub point: ScreenPoint,
    pub coordinate: Coordinate,
    pub target: ClickTarget,
}

/// Notifications an engine raises.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Style and initial tiles are ready.
    Loaded,
    Failed(EngineFailure),
    /// The camera settled after a pan, zoom or resize.
    ViewportChanged(ViewportBounds),
    Click(ClickEvent),
    /// The hosting container changed size.
    Resized(ScreenSize),
}

/// A live map engine instance.
pub trait MapEngine {
    /// Adapts the drawing surface to a new container size.
    fn resize(&mut self, size: ScreenSize);

    fn size(&self) -> ScreenSize;

    /// Current visible bounds and zoom.
    fn bounds(&self) -> ViewportBounds;

    /// Animates the camera to `center` at `zoom`.
    fn ease_to(&mut self, center: Coordinate, zoom: f64, duration_ms: u64);

    /// Replaces the point features fed to the clustering index.
    fn set_markers(&mut self, markers: &[MarkerEntity]);

    fn set_trails(&mut self, trails: &[ResolvedTrail]);

    fn set_boundary(&mut self, boundary: Option<Rc<BoundaryPolygon>>);

    /// Zoom at which the members of `cluster_id` stop being clustered.
    fn cluster_expansion_zoom(&self, cluster_id: u64) -> Option<f64>;

    /// Screen position of a coordinate under the current camera.
    fn project(&self, coordinate: Coordinate) -> ScreenPoint;
}

/// Creates engines and answers questions about the hosting container.
pub trait EngineFactory {
    type Engine: MapEngine;

    fn capabilities(&self) -> Capabilities;

    /// Current size of the hosting container.
    fn container_size(&self) -> ScreenSize;

    fn create(&mut self, options: &EngineOptions) -> Result<Self::Engine, EngineFailure>;
}
