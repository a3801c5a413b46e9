//! Data model for the relay-and-confirm pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::rpc::ChainClient;

/// Marker used in notification payloads and registry keys for the source
/// chain's native currency (no contract address).
pub const NATIVE_MARKER: &str = "native";

/// Immutable description of a supported asset.
///
/// Invariant: exactly one of `destination_contract` / `native_on_destination`
/// holds. Enforced by [`AssetDescriptor::validate`] at registry construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub symbol: String,
    /// Source-chain contract address, or [`NATIVE_MARKER`].
    pub source_contract: String,
    /// Destination-chain contract address. Absent when the payout is made
    /// in the destination chain's native currency.
    pub destination_contract: Option<String>,
    /// Decimal precision of the asset on the source chain.
    pub source_decimals: u32,
    /// Pay out in native currency on the destination chain instead of a
    /// contract transfer.
    pub native_on_destination: bool,
}

impl AssetDescriptor {
    /// Check the payout-mode invariant.
    pub fn validate(&self) -> Result<(), String> {
        match (self.destination_contract.is_some(), self.native_on_destination) {
            (true, false) | (false, true) => Ok(()),
            (true, true) => Err(format!(
                "asset {}: destination contract and native_on_destination are mutually exclusive",
                self.symbol
            )),
            (false, false) => Err(format!(
                "asset {}: needs either a destination contract or native_on_destination",
                self.symbol
            )),
        }
    }
}

/// Fee parameters applied to destination-chain submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeParams {
    pub gas_limit: u64,
    pub gas_price: u128,
}

/// One chain endpoint: identifier, RPC capability and, for the destination
/// chain only, the submission account. The submitter is fixed at
/// construction and never attached afterwards; a `None` endpoint is
/// read-only.
#[derive(Clone)]
pub struct ChainEndpoint {
    pub chain: String,
    pub client: Arc<dyn ChainClient>,
    /// Address of the node-managed account used for payout submission.
    pub submitter: Option<String>,
    pub fee_params: FeeParams,
    /// Decimal precision of the chain's native currency.
    pub native_decimals: u32,
}

impl ChainEndpoint {
    pub fn can_submit(&self) -> bool {
        self.submitter.is_some()
    }
}

impl fmt::Debug for ChainEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainEndpoint")
            .field("chain", &self.chain)
            .field("submitter", &self.submitter)
            .field("fee_params", &self.fee_params)
            .field("native_decimals", &self.native_decimals)
            .finish_non_exhaustive()
    }
}

/// Contract metadata attached to token-transfer notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMeta {
    pub address: String,
    pub decimals: u32,
    pub raw_integer_value: String,
}

/// One inbound transfer notification. Constructed from the transport
/// payload, consumed once by the dispatcher, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundTransferEvent {
    pub from_address: String,
    pub to_address: String,
    /// Decimal amount string in source asset units, as received.
    pub amount: String,
    pub asset_hint: String,
    pub category: String,
    pub source_tx_id: String,
    /// Unix seconds of the source-chain event. When the transport omits it,
    /// the dispatcher stamps the time of acceptance instead.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub contract_meta: Option<ContractMeta>,
}

/// One delivery from the notification transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationBatch {
    pub batch_id: String,
    pub delivery_id: String,
    pub source_network: String,
    pub events: Vec<InboundTransferEvent>,
}

/// Per-batch processing summary returned to the transport. Acknowledgment
/// means every event was dispatched; confirmation is asynchronous and out
/// of band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Payout submitted and a confirmation monitor started.
    pub accepted: usize,
    /// Not addressed to us, unknown asset, or duplicate delivery.
    pub skipped: usize,
    /// Rejected before a claim was taken, or claimed but the payout not
    /// achieved (claim released). Eligible for redelivery either way.
    pub failed: usize,
}

/// State carried by one confirmation monitor from payout submission until a
/// terminal outcome. Exclusively owned by its monitor; nothing else reads
/// or mutates it.
#[derive(Debug, Clone)]
pub struct PendingConfirmation {
    /// Amount in source asset units, as received.
    pub amount: String,
    pub asset: AssetDescriptor,
    /// Wallet the payout was sent to on the destination chain.
    pub destination_wallet: String,
    /// Source-chain event time; matching destination transactions must
    /// strictly postdate this.
    pub source_timestamp: i64,
    pub source_tx_id: String,
    /// Ticks consumed so far, bounded by the monitor's attempt budget.
    pub attempts: u32,
    /// Highest destination block height already inspected. Never decreases.
    pub last_scanned_height: u64,
    /// Destination balance of the recipient before the payout
    /// (native mode only).
    pub baseline_balance: Option<u128>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wbtc() -> AssetDescriptor {
        AssetDescriptor {
            symbol: "WBTC".to_string(),
            source_contract: "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599".to_string(),
            destination_contract: None,
            source_decimals: 8,
            native_on_destination: true,
        }
    }

    #[test]
    fn test_asset_invariant_native() {
        assert!(wbtc().validate().is_ok());
    }

    #[test]
    fn test_asset_invariant_token() {
        let mut asset = wbtc();
        asset.native_on_destination = false;
        asset.destination_contract =
            Some("0x00000000000000000000000000000000000000aa".to_string());
        assert!(asset.validate().is_ok());
    }

    #[test]
    fn test_asset_invariant_rejects_both_and_neither() {
        let mut both = wbtc();
        both.destination_contract =
            Some("0x00000000000000000000000000000000000000aa".to_string());
        assert!(both.validate().is_err());

        let mut neither = wbtc();
        neither.native_on_destination = false;
        assert!(neither.validate().is_err());
    }

    #[test]
    fn test_batch_payload_shape() {
        let payload = serde_json::json!({
            "batchId": "b-1",
            "deliveryId": "d-1",
            "sourceNetwork": "mainnet",
            "events": [{
                "fromAddress": "0xabc",
                "toAddress": "0xdef",
                "amount": "0.00500000",
                "assetHint": "WBTC",
                "category": "token",
                "sourceTxId": "0x1111",
                "contractMeta": {
                    "address": "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599",
                    "decimals": 8,
                    "rawIntegerValue": "500000"
                }
            }]
        });
        let batch: NotificationBatch = serde_json::from_value(payload).unwrap();
        assert_eq!(batch.events.len(), 1);
        let event = &batch.events[0];
        assert_eq!(event.amount, "0.00500000");
        assert_eq!(event.contract_meta.as_ref().unwrap().decimals, 8);
        assert!(event.timestamp.is_none());
    }
}
