//! Error taxonomy for the relay-and-confirm core.
//!
//! The only locally recovered error is [`RpcError::RateLimited`], which the
//! call wrapper in `rpc::retry` retries with backoff. Everything else
//! surfaces to the dispatcher or the operator.

use thiserror::Error;

/// Amount translation failures. Raised before any idempotency claim is made,
/// so a rejected event can be redelivered and reprocessed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("invalid amount {0:?}: not a well-formed non-negative decimal")]
    InvalidAmount(String),
    #[error("amount {0:?} exceeds the representable range at precision {1}")]
    Overflow(String, u32),
}

/// Payout submission failures. None of these are retried by the executor;
/// the dispatcher releases the idempotency claim so a redelivered
/// notification can try again.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// RPC or signing error before the transaction landed.
    #[error("payout submission failed: {0}")]
    SubmissionFailed(String),
    /// The transaction landed but its receipt indicates failure.
    #[error("payout transaction {0} reverted on the destination chain")]
    Reverted(String),
    /// Token payout requested but the asset has no destination contract.
    #[error("asset {0} has no destination contract configured")]
    Unconfigured(String),
    /// The event amount could not be translated.
    #[error(transparent)]
    InvalidAmount(#[from] TranslateError),
}

/// Errors from the chain client capability.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// The node is rate limiting us. Retried internally by
    /// [`crate::rpc::retry::with_backoff`], never surfaced past it unless
    /// the retry budget is exhausted.
    #[error("rate limited by RPC node: {0}")]
    RateLimited(String),
    /// Any other RPC failure. Propagates immediately and aborts the current
    /// executor call or monitor tick.
    #[error("rpc error: {0}")]
    Fatal(String),
}

impl RpcError {
    pub fn fatal(msg: impl std::fmt::Display) -> Self {
        Self::Fatal(msg.to_string())
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

/// Substrings that identify a rate-limit response from a public node.
/// Any other error text is treated as fatal for the current call.
pub fn is_rate_limit_message(error: &str) -> bool {
    let error_lower = error.to_lowercase();
    error_lower.contains("rate limit")
        || error_lower.contains("too many requests")
        || error_lower.contains("429")
        || error_lower.contains("exceeded")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_classification() {
        assert!(is_rate_limit_message("429 Too Many Requests"));
        assert!(is_rate_limit_message("daily request count exceeded"));
        assert!(!is_rate_limit_message("execution reverted"));
        assert!(!is_rate_limit_message("connection refused"));
    }

    #[test]
    fn test_rpc_error_helpers() {
        assert!(RpcError::RateLimited("slow down".into()).is_rate_limited());
        assert!(!RpcError::fatal("boom").is_rate_limited());
    }
}
