//! Notification dispatcher: drives the guard → executor → monitor pipeline
//! for each inbound batch.
//!
//! Events within a batch are processed strictly in array order, one payout
//! at a time; predictable ordering and failure isolation are worth more
//! here than throughput. Batches may run concurrently and coordinate only
//! through the idempotency guard.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::amount;
use crate::error::RpcError;
use crate::executor::PayoutExecutor;
use crate::guard::IdempotencyGuard;
use crate::metrics;
use crate::monitor::{ConfirmationMonitor, MonitorConfig};
use crate::registry::Registry;
use crate::rpc::{with_backoff, RetryPolicy};
use crate::types::{
    AssetDescriptor, BatchOutcome, ChainEndpoint, InboundTransferEvent, NotificationBatch,
    PendingConfirmation, NATIVE_MARKER,
};

pub struct Dispatcher {
    registry: Arc<Registry>,
    guard: IdempotencyGuard,
    executor: PayoutExecutor,
    destination: ChainEndpoint,
    monitor_config: MonitorConfig,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        guard: IdempotencyGuard,
        destination: ChainEndpoint,
        monitor_config: MonitorConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            guard,
            executor: PayoutExecutor::new(retry.clone()),
            destination,
            monitor_config,
            retry,
        }
    }

    /// Process one delivery. Returns once every event has been dispatched;
    /// confirmation continues asynchronously in detached monitor tasks.
    pub async fn handle_batch(&self, batch: NotificationBatch) -> BatchOutcome {
        metrics::record_batch_received(&batch.source_network);
        info!(
            batch_id = %batch.batch_id,
            delivery_id = %batch.delivery_id,
            network = %batch.source_network,
            events = batch.events.len(),
            "Processing notification batch"
        );

        let mut outcome = BatchOutcome::default();
        for event in &batch.events {
            match self.handle_event(event).await {
                Dispatch::Accepted => outcome.accepted += 1,
                Dispatch::Skipped => outcome.skipped += 1,
                Dispatch::Failed => outcome.failed += 1,
            }
        }

        info!(
            batch_id = %batch.batch_id,
            accepted = outcome.accepted,
            skipped = outcome.skipped,
            failed = outcome.failed,
            "Batch dispatched"
        );
        outcome
    }

    async fn handle_event(&self, event: &InboundTransferEvent) -> Dispatch {
        // Already claimed: a payout attempt is in flight or done.
        if self.guard.contains(&event.source_tx_id) {
            metrics::record_duplicate_suppressed();
            debug!(source_tx = %event.source_tx_id, "Duplicate notification suppressed");
            return Dispatch::Skipped;
        }

        if !self.registry.is_receiving_wallet(&event.to_address) {
            metrics::record_skip("wrong_wallet");
            debug!(
                source_tx = %event.source_tx_id,
                to = %event.to_address,
                "Not addressed to the bridge wallet"
            );
            return Dispatch::Skipped;
        }

        let asset_key = event
            .contract_meta
            .as_ref()
            .map(|meta| meta.address.as_str())
            .unwrap_or(NATIVE_MARKER);
        let Some(asset) = self.registry.resolve_asset(asset_key) else {
            metrics::record_skip("unknown_asset");
            debug!(
                source_tx = %event.source_tx_id,
                asset = %asset_key,
                hint = %event.asset_hint,
                "No registered asset matches, skipping"
            );
            return Dispatch::Skipped;
        };

        // Malformed amounts are rejected before any claim is taken, so a
        // corrected redelivery can still be processed.
        if let Err(e) = amount::validate(&event.amount) {
            metrics::record_rejection("invalid_amount");
            warn!(
                source_tx = %event.source_tx_id,
                amount = %event.amount,
                error = %e,
                "Rejecting event with malformed amount"
            );
            return Dispatch::Failed;
        }

        if !self.guard.claim(&event.source_tx_id) {
            // Lost the race against a concurrently delivered duplicate.
            metrics::record_duplicate_suppressed();
            return Dispatch::Skipped;
        }

        match self.process_claimed(event, asset).await {
            Ok(()) => Dispatch::Accepted,
            Err(e) => {
                self.guard.release(&event.source_tx_id);
                error!(
                    source_tx = %event.source_tx_id,
                    symbol = %asset.symbol,
                    error = %e,
                    "Payout not achieved, claim released for redelivery"
                );
                Dispatch::Failed
            }
        }
    }

    /// Submit the payout and start its confirmation monitor. The claim is
    /// already held; any error here makes the caller release it.
    async fn process_claimed(
        &self,
        event: &InboundTransferEvent,
        asset: &AssetDescriptor,
    ) -> eyre::Result<()> {
        // The balance baseline must predate the payout, otherwise the
        // monitor's balance-delta short-circuit would never see a change.
        let baseline_balance = if asset.native_on_destination {
            Some(self.recipient_balance(&event.from_address).await?)
        } else {
            None
        };

        let source_timestamp = event.timestamp.unwrap_or_else(|| Utc::now().timestamp());

        // Captured before submission so the payout's own block is inside
        // the monitor's first scan range. Nothing is submitted yet, so a
        // failure here releases the claim and a redelivery retries cleanly.
        let head =
            with_backoff(&self.retry, || self.destination.client.get_block_height()).await?;

        let tx_id = self
            .executor
            .execute(event, asset, &self.destination)
            .await?;

        let pending = PendingConfirmation {
            amount: event.amount.clone(),
            asset: asset.clone(),
            destination_wallet: event.from_address.clone(),
            source_timestamp,
            source_tx_id: event.source_tx_id.clone(),
            attempts: 0,
            // Start scanning where the chain was at submission time; the
            // payout cannot be in an older block.
            last_scanned_height: head.saturating_sub(1),
            baseline_balance,
        };

        let bridge_wallet = self
            .destination
            .submitter
            .as_deref()
            .unwrap_or_default()
            .to_string();
        let monitor = ConfirmationMonitor::new(
            pending,
            self.destination.clone(),
            &bridge_wallet,
            self.monitor_config.clone(),
            self.retry.clone(),
        )?;

        info!(
            source_tx = %event.source_tx_id,
            payout_tx = %tx_id,
            symbol = %asset.symbol,
            "Payout submitted, monitor spawned"
        );
        tokio::spawn(monitor.run());
        Ok(())
    }

    async fn recipient_balance(&self, recipient: &str) -> Result<u128, RpcError> {
        with_backoff(&self.retry, || {
            self.destination.client.get_balance(recipient)
        })
        .await
    }

    pub fn guard(&self) -> &IdempotencyGuard {
        &self.guard
    }
}

enum Dispatch {
    Accepted,
    Skipped,
    Failed,
}
