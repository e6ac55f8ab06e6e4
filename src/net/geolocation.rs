//! One-shot device location lookup.
//!
//! The browser answers through callbacks; results are passed back to the
//! update loop through a channel and picked up with [`GeolocationChannel::try_recv`].

use crate::geo::Coordinate;
use eframe::egui;
use std::sync::mpsc::{channel, Receiver, Sender};

/// Result of a location request.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationResult {
    Found {
        coordinate: Coordinate,
        accuracy_m: f64,
    },
    /// The user refused the permission prompt.
    Denied,
    /// No position could be determined, or the platform has no geolocation.
    Unavailable(String),
}

impl LocationResult {
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            LocationResult::Found { coordinate, .. } => Some(*coordinate),
            _ => None,
        }
    }
}

/// Channel delivering the device position to the UI thread.
pub struct GeolocationChannel {
    sender: Sender<LocationResult>,
    receiver: Receiver<LocationResult>,
    pending: bool,
}

impl Default for GeolocationChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl GeolocationChannel {
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self {
            sender,
            receiver,
            pending: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Asks for the current position. Ignored while a request is pending.
    pub fn request(&mut self, ctx: egui::Context) {
        if self.pending {
            return;
        }
        self.pending = true;
        request_position(self.sender.clone(), ctx);
    }

    /// Non-blocking check for an answer.
    pub fn try_recv(&mut self) -> Option<LocationResult> {
        let result = self.receiver.try_recv().ok()?;
        self.pending = false;
        match &result {
            LocationResult::Found {
                coordinate,
                accuracy_m,
            } => log::info!("Device location {} (±{:.0} m)", coordinate, accuracy_m),
            LocationResult::Denied => log::info!("Location permission denied"),
            LocationResult::Unavailable(reason) => log::warn!("Location unavailable: {}", reason),
        }
        Some(result)
    }
}

#[cfg(target_arch = "wasm32")]
fn request_position(sender: Sender<LocationResult>, ctx: egui::Context) {
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::JsCast;
    use web_sys::{GeolocationPosition, GeolocationPositionError, PositionOptions};

    // Browsers report PERMISSION_DENIED as code 1.
    const PERMISSION_DENIED: u16 = 1;

    let geolocation = match web_sys::window().map(|w| w.navigator().geolocation()) {
        Some(Ok(g)) => g,
        _ => {
            let _ = sender.send(LocationResult::Unavailable(
                "Geolocation is not supported".to_string(),
            ));
            ctx.request_repaint();
            return;
        }
    };

    let on_success = {
        let sender = sender.clone();
        let ctx = ctx.clone();
        Closure::once_into_js(move |position: GeolocationPosition| {
            let coords = position.coords();
            let _ = sender.send(LocationResult::Found {
                coordinate: Coordinate::new(coords.longitude(), coords.latitude()),
                accuracy_m: coords.accuracy(),
            });
            ctx.request_repaint();
        })
    };

    let on_error = {
        let sender = sender.clone();
        let ctx = ctx.clone();
        Closure::once_into_js(move |error: GeolocationPositionError| {
            let result = if error.code() == PERMISSION_DENIED {
                LocationResult::Denied
            } else {
                LocationResult::Unavailable(error.message())
            };
            let _ = sender.send(result);
            ctx.request_repaint();
        })
    };

    let options = PositionOptions::new();
    options.set_enable_high_accuracy(true);
    options.set_timeout(10_000);
    options.set_maximum_age(60_000);

    if let Err(e) = geolocation.get_current_position_with_error_callback_and_options(
        on_success.unchecked_ref(),
        Some(on_error.unchecked_ref()),
        &options,
    ) {
        let _ = sender.send(LocationResult::Unavailable(format!("{:?}", e)));
        ctx.request_repaint();
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn request_position(sender: Sender<LocationResult>, ctx: egui::Context) {
    let _ = sender.send(LocationResult::Unavailable(
        "Geolocation is only available in the browser build".to_string(),
    ));
    ctx.request_repaint();
}
