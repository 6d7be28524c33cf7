use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

use gate_core_types::RequestKind;

#[derive(Default)]
struct Counters {
    dispatched_send: AtomicU64,
    dispatched_fetch: AtomicU64,
    deferred: AtomicU64,
    released: AtomicU64,
    abandoned: AtomicU64,
    flushes: AtomicU64,
}

static COUNTERS: Lazy<Counters> = Lazy::new(Counters::default);

fn increment(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

pub fn record_dispatched(kind: RequestKind) {
    match kind {
        RequestKind::Send => increment(&COUNTERS.dispatched_send, 1),
        RequestKind::Fetch => increment(&COUNTERS.dispatched_fetch, 1),
    }
}

pub fn record_deferred() {
    increment(&COUNTERS.deferred, 1);
}

pub fn record_released() {
    increment(&COUNTERS.released, 1);
}

pub fn record_abandoned(count: usize) {
    increment(&COUNTERS.abandoned, count as u64);
}

pub fn record_flush() {
    increment(&COUNTERS.flushes, 1);
}

/// Process-wide totals across every installed gate.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GateMetricsSnapshot {
    pub dispatched_send: u64,
    pub dispatched_fetch: u64,
    pub deferred: u64,
    pub released: u64,
    pub abandoned: u64,
    pub flushes: u64,
}

pub fn snapshot() -> GateMetricsSnapshot {
    GateMetricsSnapshot {
        dispatched_send: COUNTERS.dispatched_send.load(Ordering::Relaxed),
        dispatched_fetch: COUNTERS.dispatched_fetch.load(Ordering::Relaxed),
        deferred: COUNTERS.deferred.load(Ordering::Relaxed),
        released: COUNTERS.released.load(Ordering::Relaxed),
        abandoned: COUNTERS.abandoned.load(Ordering::Relaxed),
        flushes: COUNTERS.flushes.load(Ordering::Relaxed),
    }
}
