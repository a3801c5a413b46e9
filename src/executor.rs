//! Destination-chain payout execution.
//!
//! Submits either a native-currency transfer or a token contract `transfer`
//! call for an accepted notification and waits for one confirmation. The
//! executor itself never retries; rate-limit handling lives in the RPC
//! wrapper, and the dispatcher decides what to do with the idempotency
//! claim on failure.

use tracing::{debug, info};

use crate::amount;
use crate::error::{ExecutionError, RpcError};
use crate::metrics;
use crate::rpc::{with_backoff, RetryPolicy};
use crate::types::{AssetDescriptor, ChainEndpoint, InboundTransferEvent};

pub struct PayoutExecutor {
    retry: RetryPolicy,
}

impl PayoutExecutor {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// Perform the destination payout for one accepted notification.
    ///
    /// Native mode translates the amount into the destination chain's
    /// native precision; token mode passes the amount in the asset's source
    /// decimals untranslated, since the two chains' token contracts share
    /// denomination. Both modes pay the original sender and wait for one
    /// confirmation.
    pub async fn execute(
        &self,
        event: &InboundTransferEvent,
        asset: &AssetDescriptor,
        destination: &ChainEndpoint,
    ) -> Result<String, ExecutionError> {
        let recipient = &event.from_address;

        let tx_id = if asset.native_on_destination {
            let translated = amount::translate(
                &event.amount,
                asset.source_decimals,
                destination.native_decimals,
            )?;
            let value = amount::to_base_units(&translated, destination.native_decimals)?;
            debug!(
                symbol = %asset.symbol,
                amount = %event.amount,
                translated = %translated,
                value,
                recipient = %recipient,
                "Submitting native payout"
            );
            with_backoff(&self.retry, || {
                destination
                    .client
                    .submit_native_transfer(recipient, value, &destination.fee_params)
            })
            .await
            .map_err(submission_failed)?
        } else {
            let contract = asset
                .destination_contract
                .as_deref()
                .ok_or_else(|| ExecutionError::Unconfigured(asset.symbol.clone()))?;
            let value = amount::to_base_units(&event.amount, asset.source_decimals)?;
            debug!(
                symbol = %asset.symbol,
                amount = %event.amount,
                value,
                contract = %contract,
                recipient = %recipient,
                "Submitting token payout"
            );
            with_backoff(&self.retry, || {
                destination.client.submit_contract_transfer(
                    contract,
                    recipient,
                    value,
                    &destination.fee_params,
                )
            })
            .await
            .map_err(submission_failed)?
        };

        let receipt = with_backoff(&self.retry, || {
            destination.client.await_confirmation(&tx_id, 1)
        })
        .await
        .map_err(submission_failed)?;

        if !receipt.succeeded {
            metrics::record_payout_submitted(asset.native_on_destination, false);
            return Err(ExecutionError::Reverted(tx_id));
        }

        metrics::record_payout_submitted(asset.native_on_destination, true);
        info!(
            tx_id = %tx_id,
            block_height = receipt.block_height,
            symbol = %asset.symbol,
            source_tx = %event.source_tx_id,
            "Payout confirmed once, handing off to monitor"
        );
        Ok(tx_id)
    }
}

fn submission_failed(error: RpcError) -> ExecutionError {
    ExecutionError::SubmissionFailed(error.to_string())
}
