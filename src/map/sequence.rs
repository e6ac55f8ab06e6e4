//! Ordering helpers for rapid-fire asynchronous requests.

use crate::clock::UnixMillis;
use std::cell::Cell;

/// Monotonic request tagging with last-issued-wins application.
///
/// Every request takes a number from [`issue`](Self::issue) before it
/// suspends. When it resumes, [`try_apply`](Self::try_apply) admits it only
/// if no request with a higher number has been applied already, so a slow
/// response can never overwrite a newer one regardless of arrival order.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    issued: Cell<u64>,
    applied: Cell<u64>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags a new request. Numbers start at 1 and strictly increase.
    pub fn issue(&self) -> u64 {
        let seq = self.issued.get() + 1;
        self.issued.set(seq);
        seq
    }

    /// Records `seq` as applied if it is the highest seen so far.
    pub fn try_apply(&self, seq: u64) -> bool {
        if seq > self.applied.get() {
            self.applied.set(seq);
            true
        } else {
            false
        }
    }

    /// True if no request was issued after `seq`.
    pub fn is_latest(&self, seq: u64) -> bool {
        seq == self.issued.get()
    }

    pub fn latest_issued(&self) -> u64 {
        self.issued.get()
    }

    pub fn latest_applied(&self) -> u64 {
        self.applied.get()
    }
}

/// Trailing-edge debouncer driven by explicit timestamps.
///
/// Each [`schedule`](Self::schedule) replaces the pending value and pushes
/// the deadline out; [`poll`](Self::poll) releases the value once the
/// deadline has passed.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay_ms: u64,
    pending: Option<(T, UnixMillis)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    pub fn schedule(&mut self, value: T, now: UnixMillis) {
        self.pending = Some((value, now.plus_ms(self.delay_ms)));
    }

    /// Returns the pending value if its deadline is at or before `now`.
    pub fn poll(&mut self, now: UnixMillis) -> Option<T> {
        match &self.pending {
            Some((_, deadline)) if now >= *deadline => self.pending.take().map(|(v, _)| v),
            _ => None,
        }
    }

    /// Milliseconds until the pending value fires, for repaint scheduling.
    pub fn remaining_ms(&self, now: UnixMillis) -> Option<u64> {
        self.pending
            .as_ref()
            .map(|(_, deadline)| deadline.millis_since(now))
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
