//! Abstract blockchain client capability.
//!
//! The core never talks to a chain directly; everything goes through
//! [`ChainClient`], and every call site wraps its calls in
//! [`retry::with_backoff`]. The bundled [`http::HttpChainClient`] speaks raw
//! JSON-RPC against public nodes; a signing-capable implementation can be
//! swapped in without touching the core.

use async_trait::async_trait;

use crate::error::RpcError;
use crate::types::FeeParams;

pub mod http;
pub mod retry;

pub use http::HttpChainClient;
pub use retry::{with_backoff, RetryPolicy};

/// One block, reduced to what confirmation scanning needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub height: u64,
    /// Unix seconds.
    pub timestamp: i64,
    /// Transaction references contained in the block, in order.
    pub tx_refs: Vec<String>,
}

/// A mined value-transfer transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRecord {
    pub from: String,
    pub to: String,
    /// Value in the chain's native base units.
    pub value: u128,
    pub block_height: u64,
}

/// One entry from a token contract's transfer-event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferLog {
    pub from: String,
    pub to: String,
    /// Value in the token's base units.
    pub value: u128,
    pub tx_id: String,
    pub block_height: u64,
}

/// Receipt returned once a submitted transaction has the requested number
/// of confirmations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_id: String,
    pub block_height: u64,
    /// False when the receipt indicates an on-chain revert.
    pub succeeded: bool,
}

/// Per-chain RPC capability. Read methods are available on every endpoint;
/// the submit methods only work on an endpoint constructed with a
/// submission account.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current balance of `address` in native base units.
    async fn get_balance(&self, address: &str) -> Result<u128, RpcError>;

    /// Current chain head height.
    async fn get_block_height(&self) -> Result<u64, RpcError>;

    /// Fetch one block by height. `None` when the height does not exist.
    async fn get_block(&self, height: u64) -> Result<Option<Block>, RpcError>;

    /// Fetch a mined transaction. `None` when unknown or still pending.
    async fn get_transaction(&self, tx_ref: &str) -> Result<Option<TxRecord>, RpcError>;

    /// Transfer-event log entries for `contract` filtered to
    /// `(from, to)` over `[from_height, to_height]` inclusive.
    async fn query_transfer_logs(
        &self,
        contract: &str,
        from: &str,
        to: &str,
        from_height: u64,
        to_height: u64,
    ) -> Result<Vec<TransferLog>, RpcError>;

    /// Submit a native-currency transfer. Destination endpoints only.
    async fn submit_native_transfer(
        &self,
        to: &str,
        value: u128,
        fee: &FeeParams,
    ) -> Result<String, RpcError>;

    /// Submit a token contract `transfer(to, value)` call.
    /// Destination endpoints only.
    async fn submit_contract_transfer(
        &self,
        contract: &str,
        to: &str,
        value: u128,
        fee: &FeeParams,
    ) -> Result<String, RpcError>;

    /// Wait until `tx_id` has at least `confirmations` confirmations.
    async fn await_confirmation(
        &self,
        tx_id: &str,
        confirmations: u32,
    ) -> Result<Receipt, RpcError>;
}
