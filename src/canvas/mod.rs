//! Map engine drawn directly with egui.
//!
//! Used by the binary so the app runs without a vendor map SDK: markers are
//! clustered in [`cluster`], painted by [`render`] and driven by
//! [`CanvasEngine`], which implements the host's engine seam.

mod cluster;
pub mod colors;
mod engine;
mod render;

pub use cluster::{ClusterIndex, ClusterItem, ClusterNode};
pub use engine::{CanvasEngine, CanvasEngineFactory};
pub use render::{hit_test, HitRegion};
