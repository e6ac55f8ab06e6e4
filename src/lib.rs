#![warn(clippy::all)]

//! Krawl Map - the interactive map core for browsing gems and krawl trails.
//!
//! The [`map`] module holds the platform-neutral core: viewport-driven marker
//! loading, service-area validation, route caching, popup placement and the
//! map host lifecycle. [`net`] supplies the browser transports and offline
//! sample sources, [`canvas`] an egui-painted engine, and [`app`] the eframe
//! application that ties them together.

pub mod app;
pub mod canvas;
pub mod clock;
pub mod config;
pub mod error;
pub mod geo;
pub mod map;
pub mod net;
pub mod runtime;
pub mod ui;
pub mod url_state;

#[cfg(test)]
mod testing;

pub use app::KrawlApp;
