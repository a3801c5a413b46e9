//! Relay-and-confirm core for cross-chain token payouts.
//!
//! Inbound transfer notifications are filtered and deduplicated by the
//! [`dispatcher`], paid out on the destination chain by the [`executor`],
//! and independently verified by per-payout [`monitor`] tasks scanning the
//! destination chain through a rate-limit-aware [`rpc`] layer.

pub mod amount;
pub mod api;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod guard;
pub mod metrics;
pub mod monitor;
pub mod registry;
pub mod rpc;
pub mod types;

pub use dispatcher::Dispatcher;
pub use error::{ExecutionError, RpcError, TranslateError};
pub use guard::IdempotencyGuard;
pub use monitor::{ConfirmationMonitor, ConfirmationStatus, MonitorConfig};
pub use registry::Registry;
pub use types::{
    AssetDescriptor, BatchOutcome, ChainEndpoint, InboundTransferEvent, NotificationBatch,
    PendingConfirmation,
};
