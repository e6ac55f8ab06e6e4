//! Time source abstraction.
//!
//! Components with deadlines or TTLs take a [`Clock`] so tests can drive
//! time explicitly instead of sleeping.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Unix timestamp in milliseconds.
///
/// Using milliseconds keeps compatibility with JavaScript `Date.now()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnixMillis(pub i64);

impl UnixMillis {
    pub fn now() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            Self(js_sys::Date::now() as i64)
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            use std::time::{SystemTime, UNIX_EPOCH};
            let duration = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();
            Self(duration.as_millis() as i64)
        }
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Returns this instant shifted forward by `ms` milliseconds.
    pub fn plus_ms(self, ms: u64) -> Self {
        Self(self.0.saturating_add(ms as i64))
    }

    /// Milliseconds elapsed since `earlier` (zero if `earlier` is in the future).
    pub fn millis_since(&self, earlier: UnixMillis) -> u64 {
        self.0.saturating_sub(earlier.0).max(0) as u64
    }
}

impl fmt::Display for UnixMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of the current time.
pub trait Clock {
    fn now(&self) -> UnixMillis;
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now(&self) -> UnixMillis {
        (**self).now()
    }
}

/// Wall clock anchored once, then advanced by a monotonic instant.
///
/// Wall-clock adjustments after startup do not move TTLs or deadlines.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: web_time::Instant,
    origin_wall: UnixMillis,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: web_time::Instant::now(),
            origin_wall: UnixMillis::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> UnixMillis {
        let elapsed = self.origin.elapsed().as_millis() as u64;
        self.origin_wall.plus_ms(elapsed)
    }
}
