//! Idempotency guard over source transaction identifiers.
//!
//! Suppresses duplicate delivery of the same notification while a payout
//! attempt is in flight or recently completed. The record set is volatile
//! and cleared wholesale on a fixed interval; absence of an identifier does
//! not mean "never processed" after expiry. The guard's only job is to stop
//! immediate duplicates, not to be a ledger.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// Shared set of claimed source transaction identifiers.
///
/// Invariant: an identifier present in the set has a payout attempt either
/// in flight or already confirmed. Safe under concurrent batches; the inner
/// mutex is the only cross-batch coordination point in the core.
#[derive(Clone, Default)]
pub struct IdempotencyGuard {
    claimed: Arc<Mutex<HashSet<String>>>,
}

impl IdempotencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id` and return true iff it was not already recorded.
    pub fn claim(&self, id: &str) -> bool {
        self.lock().insert(id.to_string())
    }

    /// Remove `id` unconditionally, allowing a redelivered notification to
    /// reprocess. Called when payout submission fails.
    pub fn release(&self, id: &str) {
        self.lock().remove(id);
    }

    /// Whether `id` is currently claimed.
    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    /// Wipe all records.
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Background task clearing the whole record set every `interval`.
    /// Wholesale expiry is the documented policy; per-entry TTLs would buy
    /// nothing for duplicate suppression.
    pub async fn run_expiry(self, interval: Duration) {
        info!(
            interval_secs = interval.as_secs(),
            "Idempotency guard expiry task started"
        );
        let mut ticker = tokio::time::interval(interval);
        // The first tick of a tokio interval fires immediately; skip it so
        // the initial window gets its full duration.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let released = self.len();
            self.clear();
            debug!(released, "Idempotency records expired wholesale");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        match self.claimed.lock() {
            Ok(guard) => guard,
            // A poisoned set is still a valid dedup set; losing a panicked
            // writer's partial state only risks an extra skip or retry.
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
