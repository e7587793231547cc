//! Cost & latency accounting.
//!
//! Process-wide counters consumed by every other component. Counts are
//! atomics so concurrent message tasks can record without coordination; the
//! running cost total is an exact `Decimal` behind a short-lived mutex.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Price of one cheap classifier call.
pub const CHEAP_CALL_COST: Decimal = dec!(0.00001);

/// Price of one expensive generation/assessment call.
pub const EXPENSIVE_CALL_COST: Decimal = dec!(0.02);

/// Process-wide cost tracker.
#[derive(Debug, Default)]
pub struct CostTracker {
    cheap_calls: AtomicU64,
    expensive_calls: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    total_cost: Mutex<Decimal>,
}

/// Snapshot returned by [`CostTracker::report`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostReport {
    pub cheap_calls: u64,
    pub expensive_calls: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_cost: Decimal,
    /// hits / (hits + misses); 0 when no lookups have happened.
    pub cache_hit_rate: f64,
    /// total / (cheap + expensive); 0 when no calls have happened.
    pub average_cost_per_message: Decimal,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cheap_call(&self) {
        self.cheap_calls.fetch_add(1, Ordering::Relaxed);
        self.add_cost(CHEAP_CALL_COST);
    }

    pub fn record_expensive_call(&self) {
        self.expensive_calls.fetch_add(1, Ordering::Relaxed);
        self.add_cost(EXPENSIVE_CALL_COST);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    fn add_cost(&self, amount: Decimal) {
        let mut total = self.total_cost.lock().expect("cost mutex poisoned");
        *total += amount;
    }

    /// Snapshot the counters. Purely a read; calling it twice without
    /// intervening events returns identical reports.
    pub fn report(&self) -> CostReport {
        let cheap_calls = self.cheap_calls.load(Ordering::Relaxed);
        let expensive_calls = self.expensive_calls.load(Ordering::Relaxed);
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let total_cost = *self.total_cost.lock().expect("cost mutex poisoned");

        let lookups = cache_hits + cache_misses;
        let cache_hit_rate = if lookups == 0 {
            0.0
        } else {
            cache_hits as f64 / lookups as f64
        };

        let calls = cheap_calls + expensive_calls;
        let average_cost_per_message = if calls == 0 {
            Decimal::ZERO
        } else {
            total_cost / Decimal::from(calls)
        };

        CostReport {
            cheap_calls,
            expensive_calls,
            cache_hits,
            cache_misses,
            total_cost,
            cache_hit_rate,
            average_cost_per_message,
        }
    }
}

/// Convert a decimal cost to the `f64` cost units exposed on outcomes.
pub fn cost_units(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or(0.0)
}
