//! Sliding-window alert deduplication.
//!
//! The server re-emits an alert every time the underlying stock row is
//! touched, so a burst of scans produces a burst of identical alerts. Keys
//! live in an [`IndexMap`] in insertion order; the front is always the
//! oldest entry, which makes both expiry and cap eviction a pop from the
//! front.

use indexmap::IndexMap;
use std::time::{Duration, Instant};

pub struct Deduplicator {
    window: Duration,
    cap: usize,
    seen: IndexMap<String, Instant>,
}

impl Deduplicator {
    pub fn new(window: Duration, cap: usize) -> Self {
        Self {
            window,
            cap: cap.max(1),
            seen: IndexMap::new(),
        }
    }

    /// Returns true when the key is fresh and the alert should be delivered.
    /// A duplicate inside the window is suppressed without refreshing its
    /// timestamp, so a steady stream of duplicates still gets through once
    /// per window.
    pub fn check(&mut self, key: &str, now: Instant) -> bool {
        self.expire_front(now);

        if self.seen.contains_key(key) {
            return false;
        }

        self.seen.insert(key.to_string(), now);
        while self.seen.len() > self.cap {
            self.seen.shift_remove_index(0);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn expire_front(&mut self, now: Instant) {
        while let Some((_, stored)) = self.seen.get_index(0) {
            if now.duration_since(*stored) >= self.window {
                self.seen.shift_remove_index(0);
            } else {
                break;
            }
        }
    }
}
