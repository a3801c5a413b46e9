//! Confirmation monitor: verifies that a submitted payout actually landed
//! on the destination chain.
//!
//! One monitor per in-flight payout, polling on a fixed interval with a
//! bounded attempt budget. Native payouts are found by balance-delta plus a
//! chunked block scan; token payouts by transfer-event log filtering. In
//! both modes a candidate must carry the exact expected amount and strictly
//! postdate the source-chain event, otherwise an earlier unrelated transfer
//! of the same amount would be misread as confirmation.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::amount;
use crate::error::{RpcError, TranslateError};
use crate::metrics;
use crate::rpc::{with_backoff, RetryPolicy, TransferLog, TxRecord};
use crate::types::{ChainEndpoint, PendingConfirmation};

/// Polling parameters for confirmation monitors.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    /// Ticks before the monitor gives up.
    pub max_attempts: u32,
    /// Blocks fetched concurrently per scan batch; bounds RPC pressure on
    /// rate-limited public nodes.
    pub scan_chunk: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_attempts: 30,
            scan_chunk: 5,
        }
    }
}

/// Monitor state. `AwaitingConfirmation` is the only non-terminal state;
/// cancellation is expressed as a transition to a terminal state, never as
/// an external signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    AwaitingConfirmation,
    /// Matching destination transaction found.
    Confirmed { tx_id: String },
    /// Attempt budget exhausted without observing the payout. The
    /// idempotency claim stays held: the payout did land on-chain even
    /// though confirmation was never observed, so reprocessing would
    /// double-pay.
    TimedOut,
}

impl ConfirmationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::AwaitingConfirmation)
    }
}

/// What one completed scan observed. Used to commit state only after every
/// RPC call of the tick succeeded.
enum ScanOutcome {
    /// Native mode: recipient balance unchanged since baseline, nothing to
    /// scan.
    BalanceUnchanged,
    Scanned {
        matched: Option<String>,
        new_baseline: Option<u128>,
    },
}

/// Polling state machine for one pending payout. Exclusively owns its
/// [`PendingConfirmation`]; the scan cursor never moves backwards.
pub struct ConfirmationMonitor {
    pending: PendingConfirmation,
    endpoint: ChainEndpoint,
    /// The bridge's paying wallet on the destination chain; matches must
    /// originate from it.
    bridge_wallet: String,
    /// Expected on-chain value in destination base units.
    expected_value: u128,
    config: MonitorConfig,
    retry: RetryPolicy,
    state: ConfirmationStatus,
}

impl ConfirmationMonitor {
    pub fn new(
        pending: PendingConfirmation,
        endpoint: ChainEndpoint,
        bridge_wallet: &str,
        config: MonitorConfig,
        retry: RetryPolicy,
    ) -> Result<Self, TranslateError> {
        let expected_value = if pending.asset.native_on_destination {
            let translated = amount::translate(
                &pending.amount,
                pending.asset.source_decimals,
                endpoint.native_decimals,
            )?;
            amount::to_base_units(&translated, endpoint.native_decimals)?
        } else {
            amount::to_base_units(&pending.amount, pending.asset.source_decimals)?
        };

        Ok(Self {
            pending,
            endpoint,
            bridge_wallet: bridge_wallet.to_string(),
            expected_value,
            config,
            retry,
            state: ConfirmationStatus::AwaitingConfirmation,
        })
    }

    /// Drive the monitor to a terminal state. Errored ticks leave the state
    /// machine untouched and are simply retried on the next interval.
    pub async fn run(mut self) -> ConfirmationStatus {
        metrics::MONITORS_ACTIVE.inc();
        info!(
            source_tx = %self.pending.source_tx_id,
            wallet = %self.pending.destination_wallet,
            symbol = %self.pending.asset.symbol,
            native = self.pending.asset.native_on_destination,
            expected_value = self.expected_value,
            "Confirmation monitor started"
        );

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        let outcome = loop {
            ticker.tick().await;
            match self.tick().await {
                Ok(status) if status.is_terminal() => break status,
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        source_tx = %self.pending.source_tx_id,
                        error = %e,
                        "Monitor tick aborted, no state change"
                    );
                }
            }
        };
        metrics::MONITORS_ACTIVE.dec();

        match &outcome {
            ConfirmationStatus::Confirmed { tx_id } => {
                metrics::record_payout_confirmed(self.pending.asset.native_on_destination);
                info!(
                    source_tx = %self.pending.source_tx_id,
                    dest_tx = %tx_id,
                    "Payout confirmed on destination chain"
                );
            }
            ConfirmationStatus::TimedOut => {
                metrics::record_monitor_timeout();
                warn!(
                    source_tx = %self.pending.source_tx_id,
                    attempts = self.pending.attempts,
                    "Confirmation not observed within attempt budget; claim retained"
                );
            }
            ConfirmationStatus::AwaitingConfirmation => unreachable!("loop exits on terminal"),
        }
        outcome
    }

    /// One polling step. On RPC failure the pending state (attempts,
    /// cursor, baseline) is left exactly as it was.
    pub async fn tick(&mut self) -> Result<ConfirmationStatus, RpcError> {
        if self.state.is_terminal() {
            return Ok(self.state.clone());
        }

        if self.pending.attempts >= self.config.max_attempts {
            self.state = ConfirmationStatus::TimedOut;
            return Ok(self.state.clone());
        }

        let head = with_backoff(&self.retry, || self.endpoint.client.get_block_height()).await?;

        let outcome = if self.pending.asset.native_on_destination {
            self.scan_native(head).await?
        } else {
            self.scan_token(head).await?
        };

        // Every RPC call of this tick succeeded; commit.
        self.pending.attempts += 1;
        match outcome {
            ScanOutcome::BalanceUnchanged => {
                debug!(
                    source_tx = %self.pending.source_tx_id,
                    attempt = self.pending.attempts,
                    "Recipient balance unchanged, skipping scan"
                );
            }
            ScanOutcome::Scanned {
                matched,
                new_baseline,
            } => {
                self.pending.last_scanned_height = self.pending.last_scanned_height.max(head);
                if new_baseline.is_some() {
                    self.pending.baseline_balance = new_baseline;
                }
                metrics::record_scanned_height(
                    &self.endpoint.chain,
                    self.pending.last_scanned_height,
                );
                if let Some(tx_id) = matched {
                    self.state = ConfirmationStatus::Confirmed { tx_id };
                }
            }
        }

        Ok(self.state.clone())
    }

    pub fn status(&self) -> &ConfirmationStatus {
        &self.state
    }

    pub fn last_scanned_height(&self) -> u64 {
        self.pending.last_scanned_height
    }

    /// Native mode: balance-delta short-circuit, then scan new blocks in
    /// bounded chunks for a transaction from the bridge wallet to the
    /// recipient carrying the exact expected value.
    async fn scan_native(&self, head: u64) -> Result<ScanOutcome, RpcError> {
        let balance = with_backoff(&self.retry, || {
            self.endpoint
                .client
                .get_balance(&self.pending.destination_wallet)
        })
        .await?;

        // No new funds arrived; nothing can have matched.
        if self.pending.baseline_balance == Some(balance) {
            return Ok(ScanOutcome::BalanceUnchanged);
        }

        let start = self.pending.last_scanned_height + 1;
        if start > head {
            return Ok(ScanOutcome::Scanned {
                matched: None,
                new_baseline: Some(balance),
            });
        }

        let heights: Vec<u64> = (start..=head).collect();
        for chunk in heights.chunks(self.config.scan_chunk.max(1) as usize) {
            let blocks = futures::future::try_join_all(chunk.iter().map(|&height| {
                let client = self.endpoint.client.clone();
                let retry = self.retry.clone();
                async move { with_backoff(&retry, || client.get_block(height)).await }
            }))
            .await?;

            for block in blocks.into_iter().flatten() {
                for tx_ref in &block.tx_refs {
                    let tx = with_backoff(&self.retry, || {
                        self.endpoint.client.get_transaction(tx_ref)
                    })
                    .await?;
                    if let Some(tx) = tx {
                        if self.matches_native(&tx, block.timestamp) {
                            return Ok(ScanOutcome::Scanned {
                                matched: Some(tx_ref.clone()),
                                new_baseline: Some(balance),
                            });
                        }
                    }
                }
            }
        }

        Ok(ScanOutcome::Scanned {
            matched: None,
            new_baseline: Some(balance),
        })
    }

    /// Token mode: filter the destination contract's transfer-event log for
    /// `(bridge wallet → recipient)` over a bounded recent range.
    async fn scan_token(&self, head: u64) -> Result<ScanOutcome, RpcError> {
        let contract = self
            .pending
            .asset
            .destination_contract
            .as_deref()
            .ok_or_else(|| {
                RpcError::Fatal(format!(
                    "asset {} in token mode without destination contract",
                    self.pending.asset.symbol
                ))
            })?;

        let from_height = (self.pending.last_scanned_height + 1)
            .max(head.saturating_sub(self.config.scan_chunk));
        if from_height > head {
            return Ok(ScanOutcome::Scanned {
                matched: None,
                new_baseline: None,
            });
        }

        let logs = with_backoff(&self.retry, || {
            self.endpoint.client.query_transfer_logs(
                contract,
                &self.bridge_wallet,
                &self.pending.destination_wallet,
                from_height,
                head,
            )
        })
        .await?;

        for log in logs {
            if !self.matches_token(&log) {
                continue;
            }
            // The log filter cannot see timestamps; fetch the block to
            // apply the gate.
            let block = with_backoff(&self.retry, || {
                self.endpoint.client.get_block(log.block_height)
            })
            .await?;
            if let Some(block) = block {
                if block.timestamp > self.pending.source_timestamp {
                    return Ok(ScanOutcome::Scanned {
                        matched: Some(log.tx_id),
                        new_baseline: None,
                    });
                }
            }
        }

        Ok(ScanOutcome::Scanned {
            matched: None,
            new_baseline: None,
        })
    }

    fn matches_native(&self, tx: &TxRecord, block_timestamp: i64) -> bool {
        tx.to
            .eq_ignore_ascii_case(&self.pending.destination_wallet)
            && tx.from.eq_ignore_ascii_case(&self.bridge_wallet)
            && tx.value > 0
            && tx.value == self.expected_value
            && block_timestamp > self.pending.source_timestamp
    }

    fn matches_token(&self, log: &TransferLog) -> bool {
        log.to
            .eq_ignore_ascii_case(&self.pending.destination_wallet)
            && log.from.eq_ignore_ascii_case(&self.bridge_wallet)
            && log.value > 0
            && log.value == self.expected_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{Block, ChainClient, Receipt};
    use crate::types::{AssetDescriptor, FeeParams};
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Client stub for constructing monitors in predicate tests; every
    /// call fails.
    struct NullClient;

    #[async_trait]
    impl ChainClient for NullClient {
        async fn get_balance(&self, _: &str) -> Result<u128, RpcError> {
            Err(RpcError::fatal("null client"))
        }
        async fn get_block_height(&self) -> Result<u64, RpcError> {
            Err(RpcError::fatal("null client"))
        }
        async fn get_block(&self, _: u64) -> Result<Option<Block>, RpcError> {
            Err(RpcError::fatal("null client"))
        }
        async fn get_transaction(&self, _: &str) -> Result<Option<TxRecord>, RpcError> {
            Err(RpcError::fatal("null client"))
        }
        async fn query_transfer_logs(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: u64,
            _: u64,
        ) -> Result<Vec<TransferLog>, RpcError> {
            Err(RpcError::fatal("null client"))
        }
        async fn submit_native_transfer(
            &self,
            _: &str,
            _: u128,
            _: &FeeParams,
        ) -> Result<String, RpcError> {
            Err(RpcError::fatal("null client"))
        }
        async fn submit_contract_transfer(
            &self,
            _: &str,
            _: &str,
            _: u128,
            _: &FeeParams,
        ) -> Result<String, RpcError> {
            Err(RpcError::fatal("null client"))
        }
        async fn await_confirmation(&self, _: &str, _: u32) -> Result<Receipt, RpcError> {
            Err(RpcError::fatal("null client"))
        }
    }

    fn native_monitor() -> ConfirmationMonitor {
        let asset = AssetDescriptor {
            symbol: "WBTC".to_string(),
            source_contract: "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599".to_string(),
            destination_contract: None,
            source_decimals: 8,
            native_on_destination: true,
        };
        let pending = PendingConfirmation {
            amount: "0.00500000".to_string(),
            asset,
            destination_wallet: "0xRecipient".to_string(),
            source_timestamp: 1_700_000_000,
            source_tx_id: "0xsrc".to_string(),
            attempts: 0,
            last_scanned_height: 100,
            baseline_balance: Some(0),
        };
        let endpoint = ChainEndpoint {
            chain: "destination".to_string(),
            client: Arc::new(NullClient),
            submitter: Some("0xBridge".to_string()),
            fee_params: FeeParams {
                gas_limit: 21_000,
                gas_price: 1_000_000_000,
            },
            native_decimals: 18,
        };
        ConfirmationMonitor::new(
            pending,
            endpoint,
            "0xBridge",
            MonitorConfig::default(),
            RetryPolicy::default(),
        )
        .unwrap()
    }

    fn candidate(value: u128) -> TxRecord {
        TxRecord {
            from: "0xbridge".to_string(),
            to: "0xrecipient".to_string(),
            value,
            block_height: 101,
        }
    }

    #[test]
    fn test_expected_value_translated_to_native_precision() {
        // 0.005 of an 8-decimal asset paid out at 18 decimals
        assert_eq!(native_monitor().expected_value, 5_000_000_000_000_000);
    }

    #[test]
    fn test_match_requires_exact_value() {
        let monitor = native_monitor();
        assert!(monitor.matches_native(&candidate(5_000_000_000_000_000), 1_700_000_100));
        assert!(!monitor.matches_native(&candidate(5_000_000_000_000_001), 1_700_000_100));
        assert!(!monitor.matches_native(&candidate(0), 1_700_000_100));
    }

    #[test]
    fn test_timestamp_gate_is_strict() {
        let monitor = native_monitor();
        let tx = candidate(5_000_000_000_000_000);
        // At or before the source event: never a match, even with exact
        // amount and parties.
        assert!(!monitor.matches_native(&tx, 1_700_000_000));
        assert!(!monitor.matches_native(&tx, 1_699_999_999));
        assert!(monitor.matches_native(&tx, 1_700_000_001));
    }

    #[test]
    fn test_match_requires_both_parties() {
        let monitor = native_monitor();
        let mut wrong_sender = candidate(5_000_000_000_000_000);
        wrong_sender.from = "0xstranger".to_string();
        assert!(!monitor.matches_native(&wrong_sender, 1_700_000_100));

        let mut wrong_recipient = candidate(5_000_000_000_000_000);
        wrong_recipient.to = "0xstranger".to_string();
        assert!(!monitor.matches_native(&wrong_recipient, 1_700_000_100));
    }

    #[test]
    fn test_status_terminality() {
        assert!(!ConfirmationStatus::AwaitingConfirmation.is_terminal());
        assert!(ConfirmationStatus::TimedOut.is_terminal());
        assert!(ConfirmationStatus::Confirmed {
            tx_id: "0x1".to_string()
        }
        .is_terminal());
    }
}
