//! Minimal in-process counters, exposed for a health endpoint or a
//! periodic log line. Not a full metrics pipeline — no histograms, no
//! exporter wiring — just enough for an operator to see the engine is
//! making progress.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Counters {
    pub events_received: AtomicU64,
    pub orders_placed: AtomicU64,
    pub orders_rejected: AtomicU64,
    pub reconnects: AtomicU64,
    pub rate_limit_delays: AtomicU64,
}

impl Counters {
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            orders_placed: self.orders_placed.load(Ordering::Relaxed),
            orders_rejected: self.orders_rejected.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            rate_limit_delays: self.rate_limit_delays.load(Ordering::Relaxed),
        }
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CountersSnapshot {
    pub events_received: u64,
    pub orders_placed: u64,
    pub orders_rejected: u64,
    pub reconnects: u64,
    pub rate_limit_delays: u64,
}
