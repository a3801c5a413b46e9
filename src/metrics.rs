//! Prometheus metrics for the payout relayer.
//!
//! Exposed on the /metrics endpoint for scraping.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, Counter,
    CounterVec, Gauge, GaugeVec,
};

lazy_static! {
    // Inbound pipeline
    pub static ref BATCHES_RECEIVED: CounterVec = register_counter_vec!(
        "relayer_batches_received_total",
        "Total number of notification batches received",
        &["network"]
    ).unwrap();

    pub static ref EVENTS_SKIPPED: CounterVec = register_counter_vec!(
        "relayer_events_skipped_total",
        "Notifications skipped before payout",
        &["reason"]
    ).unwrap();

    pub static ref EVENTS_REJECTED: CounterVec = register_counter_vec!(
        "relayer_events_rejected_total",
        "Notifications rejected before any claim was taken",
        &["reason"]
    ).unwrap();

    pub static ref DUPLICATES_SUPPRESSED: Counter = register_counter!(
        "relayer_duplicates_suppressed_total",
        "Notifications rejected by the idempotency guard"
    ).unwrap();

    // Payout pipeline
    pub static ref PAYOUTS_SUBMITTED: CounterVec = register_counter_vec!(
        "relayer_payouts_submitted_total",
        "Payout submissions by mode and outcome",
        &["mode", "status"]
    ).unwrap();

    pub static ref PAYOUTS_CONFIRMED: CounterVec = register_counter_vec!(
        "relayer_payouts_confirmed_total",
        "Payouts confirmed on the destination chain",
        &["mode"]
    ).unwrap();

    pub static ref MONITOR_TIMEOUTS: Counter = register_counter!(
        "relayer_monitor_timeouts_total",
        "Confirmation monitors that exhausted their attempt budget"
    ).unwrap();

    pub static ref MONITORS_ACTIVE: Gauge = register_gauge!(
        "relayer_monitors_active",
        "Confirmation monitors currently polling"
    ).unwrap();

    pub static ref LAST_SCANNED_HEIGHT: GaugeVec = register_gauge_vec!(
        "relayer_last_scanned_height",
        "Highest destination block height scanned per chain",
        &["chain"]
    ).unwrap();

    // RPC
    pub static ref RPC_RETRIES: Counter = register_counter!(
        "relayer_rpc_retries_total",
        "RPC calls retried after a rate-limit response"
    ).unwrap();

    // Health
    pub static ref UP: Gauge = register_gauge!(
        "relayer_up",
        "Whether the relayer is up and running"
    ).unwrap();
}

pub fn record_batch_received(network: &str) {
    BATCHES_RECEIVED.with_label_values(&[network]).inc();
}

pub fn record_skip(reason: &str) {
    EVENTS_SKIPPED.with_label_values(&[reason]).inc();
}

pub fn record_rejection(reason: &str) {
    EVENTS_REJECTED.with_label_values(&[reason]).inc();
}

pub fn record_duplicate_suppressed() {
    DUPLICATES_SUPPRESSED.inc();
}

pub fn record_payout_submitted(native: bool, success: bool) {
    let mode = if native { "native" } else { "token" };
    let status = if success { "success" } else { "failure" };
    PAYOUTS_SUBMITTED.with_label_values(&[mode, status]).inc();
}

pub fn record_payout_confirmed(native: bool) {
    let mode = if native { "native" } else { "token" };
    PAYOUTS_CONFIRMED.with_label_values(&[mode]).inc();
}

pub fn record_monitor_timeout() {
    MONITOR_TIMEOUTS.inc();
}

pub fn record_scanned_height(chain: &str, height: u64) {
    LAST_SCANNED_HEIGHT
        .with_label_values(&[chain])
        .set(height as f64);
}

pub fn record_rpc_retry() {
    RPC_RETRIES.inc();
}
