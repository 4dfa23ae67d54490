//! Time-boxed cache entries.
//!
//! One staleness abstraction shared by the export-bundle cache and the
//! session store adapter, instead of ad hoc timestamp comparisons in each.

use std::time::{Duration, Instant};

/// A cached value with its creation instant and freshness window.
#[derive(Debug, Clone)]
pub struct TimeBoxed<T> {
    value: T,
    created_at: Instant,
    ttl: Duration,
}

impl<T> TimeBoxed<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
        }
    }

    /// The value, regardless of freshness. Callers gate on [`is_fresh`]
    /// first when staleness matters.
    ///
    /// [`is_fresh`]: TimeBoxed::is_fresh
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn is_fresh(&self) -> bool {
        self.created_at.elapsed() < self.ttl
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Restart the freshness window without replacing the value.
    pub fn refresh(&mut self) {
        self.created_at = Instant::now();
    }
}
