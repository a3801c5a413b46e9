//! JSON-RPC HTTP implementation of [`ChainClient`].
//!
//! Speaks the Ethereum JSON-RPC surface directly over reqwest. Submission
//! uses `eth_sendTransaction` against a node-managed account; key custody
//! and local signing stay outside this crate.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::{is_rate_limit_message, RpcError};
use crate::rpc::{Block, ChainClient, Receipt, TransferLog, TxRecord};
use crate::types::FeeParams;

/// keccak256("Transfer(address,address,uint256)") — the ERC-20 transfer
/// event signature.
const TRANSFER_TOPIC: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

/// ERC-20 `transfer(address,uint256)` selector.
const TRANSFER_SELECTOR: &str = "a9059cbb";

/// JSON-RPC error code some providers use for rate limiting.
const RATE_LIMIT_CODE: i64 = -32005;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const RECEIPT_POLL_LIMIT: u32 = 60;

/// JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

/// JSON-RPC error body
#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcBlock {
    timestamp: String,
    /// Transaction hashes (blocks are fetched without full bodies).
    transactions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RpcTransaction {
    from: String,
    to: Option<String>,
    value: String,
    #[serde(rename = "blockNumber")]
    block_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcLog {
    topics: Vec<String>,
    data: String,
    #[serde(rename = "transactionHash")]
    transaction_hash: String,
    #[serde(rename = "blockNumber")]
    block_number: String,
}

#[derive(Debug, Deserialize)]
struct RpcReceipt {
    #[serde(rename = "blockNumber")]
    block_number: Option<String>,
    status: Option<String>,
}

/// JSON-RPC client for one chain endpoint.
pub struct HttpChainClient {
    rpc_url: String,
    client: Client,
    /// Node-managed account for `eth_sendTransaction`. `None` makes the
    /// endpoint read-only.
    submitter: Option<String>,
}

impl HttpChainClient {
    pub fn new(rpc_url: &str, submitter: Option<String>) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(RpcError::fatal)?;

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            client,
            submitter,
        })
    }

    /// Issue one JSON-RPC call. Rate-limit responses (HTTP 429 or the
    /// provider's error code/message) map to [`RpcError::RateLimited`];
    /// everything else is fatal for this call.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, RpcError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(RpcError::fatal)?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(RpcError::RateLimited(format!("{method}: HTTP 429")));
        }

        let parsed: RpcResponse<T> = response.json().await.map_err(RpcError::fatal)?;

        if let Some(error) = parsed.error {
            let message = format!("{method}: {} - {}", error.code, error.message);
            if error.code == RATE_LIMIT_CODE || is_rate_limit_message(&error.message) {
                return Err(RpcError::RateLimited(message));
            }
            return Err(RpcError::Fatal(message));
        }

        Ok(parsed.result)
    }

    async fn required<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, RpcError> {
        self.call(method, params)
            .await?
            .ok_or_else(|| RpcError::Fatal(format!("{method}: empty result")))
    }

    fn submitter(&self) -> Result<&str, RpcError> {
        self.submitter
            .as_deref()
            .ok_or_else(|| RpcError::Fatal("endpoint is read-only: no submission account".into()))
    }

    async fn send_transaction(&self, tx: serde_json::Value) -> Result<String, RpcError> {
        let tx_id: String = self
            .required("eth_sendTransaction", serde_json::json!([tx]))
            .await?;
        debug!(tx_id = %tx_id, "Transaction submitted");
        Ok(tx_id)
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn get_balance(&self, address: &str) -> Result<u128, RpcError> {
        let hex: String = self
            .required("eth_getBalance", serde_json::json!([address, "latest"]))
            .await?;
        parse_hex_u128(&hex)
    }

    async fn get_block_height(&self) -> Result<u64, RpcError> {
        let hex: String = self
            .required("eth_blockNumber", serde_json::json!([]))
            .await?;
        parse_hex_u64(&hex)
    }

    async fn get_block(&self, height: u64) -> Result<Option<Block>, RpcError> {
        let block: Option<RpcBlock> = self
            .call(
                "eth_getBlockByNumber",
                serde_json::json!([format!("0x{height:x}"), false]),
            )
            .await?;

        match block {
            Some(block) => Ok(Some(Block {
                height,
                timestamp: parse_hex_u64(&block.timestamp)? as i64,
                tx_refs: block.transactions,
            })),
            None => Ok(None),
        }
    }

    async fn get_transaction(&self, tx_ref: &str) -> Result<Option<TxRecord>, RpcError> {
        let tx: Option<RpcTransaction> = self
            .call("eth_getTransactionByHash", serde_json::json!([tx_ref]))
            .await?;

        let Some(tx) = tx else { return Ok(None) };
        // Pending transactions and contract creations cannot be payout
        // matches; report them as absent.
        let (Some(to), Some(block_number)) = (tx.to, tx.block_number) else {
            return Ok(None);
        };

        Ok(Some(TxRecord {
            from: tx.from,
            to,
            value: parse_hex_u128(&tx.value)?,
            block_height: parse_hex_u64(&block_number)?,
        }))
    }

    async fn query_transfer_logs(
        &self,
        contract: &str,
        from: &str,
        to: &str,
        from_height: u64,
        to_height: u64,
    ) -> Result<Vec<TransferLog>, RpcError> {
        let filter = serde_json::json!({
            "address": contract,
            "fromBlock": format!("0x{from_height:x}"),
            "toBlock": format!("0x{to_height:x}"),
            "topics": [TRANSFER_TOPIC, address_topic(from), address_topic(to)],
        });
        let logs: Vec<RpcLog> = self
            .required("eth_getLogs", serde_json::json!([filter]))
            .await?;

        logs.into_iter()
            .map(|log| {
                if log.topics.len() < 3 {
                    return Err(RpcError::Fatal(format!(
                        "transfer log {} missing indexed topics",
                        log.transaction_hash
                    )));
                }
                Ok(TransferLog {
                    from: topic_to_address(&log.topics[1]),
                    to: topic_to_address(&log.topics[2]),
                    value: parse_hex_u128(&log.data)?,
                    tx_id: log.transaction_hash,
                    block_height: parse_hex_u64(&log.block_number)?,
                })
            })
            .collect()
    }

    async fn submit_native_transfer(
        &self,
        to: &str,
        value: u128,
        fee: &FeeParams,
    ) -> Result<String, RpcError> {
        let tx = serde_json::json!({
            "from": self.submitter()?,
            "to": to,
            "value": format!("0x{value:x}"),
            "gas": format!("0x{:x}", fee.gas_limit),
            "gasPrice": format!("0x{:x}", fee.gas_price),
        });
        self.send_transaction(tx).await
    }

    async fn submit_contract_transfer(
        &self,
        contract: &str,
        to: &str,
        value: u128,
        fee: &FeeParams,
    ) -> Result<String, RpcError> {
        let tx = serde_json::json!({
            "from": self.submitter()?,
            "to": contract,
            "value": "0x0",
            "gas": format!("0x{:x}", fee.gas_limit),
            "gasPrice": format!("0x{:x}", fee.gas_price),
            "data": transfer_calldata(to, value)?,
        });
        self.send_transaction(tx).await
    }

    async fn await_confirmation(
        &self,
        tx_id: &str,
        confirmations: u32,
    ) -> Result<Receipt, RpcError> {
        for _ in 0..RECEIPT_POLL_LIMIT {
            let receipt: Option<RpcReceipt> = self
                .call("eth_getTransactionReceipt", serde_json::json!([tx_id]))
                .await?;

            if let Some(receipt) = receipt {
                if let Some(block_number) = receipt.block_number {
                    let tx_block = parse_hex_u64(&block_number)?;
                    let head = self.get_block_height().await?;
                    let confirmed = head.saturating_sub(tx_block) + 1;
                    if confirmed >= confirmations as u64 {
                        return Ok(Receipt {
                            tx_id: tx_id.to_string(),
                            block_height: tx_block,
                            succeeded: receipt.status.as_deref() != Some("0x0"),
                        });
                    }
                }
            }

            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }

        Err(RpcError::Fatal(format!(
            "transaction {tx_id} not confirmed after {RECEIPT_POLL_LIMIT} polls"
        )))
    }
}

fn parse_hex_u64(hex: &str) -> Result<u64, RpcError> {
    u64::from_str_radix(hex.trim_start_matches("0x"), 16)
        .map_err(|e| RpcError::Fatal(format!("invalid hex quantity {hex:?}: {e}")))
}

fn parse_hex_u128(hex: &str) -> Result<u128, RpcError> {
    u128::from_str_radix(hex.trim_start_matches("0x"), 16)
        .map_err(|e| RpcError::Fatal(format!("invalid hex quantity {hex:?}: {e}")))
}

/// Left-pad an address to the 32-byte topic encoding.
fn address_topic(address: &str) -> String {
    format!(
        "0x{:0>64}",
        address.trim_start_matches("0x").to_lowercase()
    )
}

/// Recover the address from a 32-byte indexed topic.
fn topic_to_address(topic: &str) -> String {
    let trimmed = topic.trim_start_matches("0x");
    let start = trimmed.len().saturating_sub(40);
    format!("0x{}", &trimmed[start..].to_lowercase())
}

/// ABI-encode `transfer(to, value)`.
fn transfer_calldata(to: &str, value: u128) -> Result<String, RpcError> {
    let to_hex = to.trim_start_matches("0x").to_lowercase();
    if to_hex.len() != 40 || hex::decode(&to_hex).is_err() {
        return Err(RpcError::Fatal(format!("invalid recipient address {to:?}")));
    }
    Ok(format!("0x{TRANSFER_SELECTOR}{to_hex:0>64}{value:064x}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_parsing() {
        assert_eq!(parse_hex_u64("0x10").unwrap(), 16);
        assert_eq!(parse_hex_u128("0x11c37937e08000").unwrap(), 5_000_000_000_000_000);
        assert!(parse_hex_u64("0xzz").is_err());
    }

    #[test]
    fn test_address_topic_round_trip() {
        let address = "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599";
        let topic = address_topic(address);
        assert_eq!(topic.len(), 66);
        assert_eq!(topic_to_address(&topic), address);
    }

    #[test]
    fn test_transfer_calldata_layout() {
        let data =
            transfer_calldata("0x00000000000000000000000000000000000000aa", 500_000).unwrap();
        assert!(data.starts_with("0xa9059cbb"));
        // selector + two 32-byte words
        assert_eq!(data.len(), 2 + 8 + 64 + 64);
        assert!(data.ends_with("7a120"));
    }

    #[test]
    fn test_transfer_calldata_rejects_bad_address() {
        assert!(transfer_calldata("0x1234", 1).is_err());
        assert!(transfer_calldata("not-an-address-at-all-not-an-address-at-", 1).is_err());
    }

    #[test]
    fn test_read_only_endpoint_refuses_submission() {
        let client = HttpChainClient::new("http://localhost:8545", None).unwrap();
        assert!(client.submitter().is_err());
    }
}
