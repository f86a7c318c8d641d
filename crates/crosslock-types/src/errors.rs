//! # Error Taxonomy
//!
//! The single error sum type every subsystem speaks. Adapters map wire
//! errors into it; the orchestrator's branching is a match on it; only
//! the orchestrator turns errors into terminal statuses.

use crate::entities::{OrderId, SwapStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while coordinating a swap.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SwapError {
    /// Malformed input; recovered by the caller, no state change.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Chain not in the supported set or no adapter registered.
    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    /// Order id not present in the store.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// RPC down or unreachable; retry with backoff, never a transition.
    #[error("chain unavailable: {0}")]
    ChainUnavailable(String),

    /// External call exceeded its deadline; outcome indeterminate.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Deterministic on-chain rejection.
    #[error("contract reverted: {0}")]
    ContractReverted(String),

    /// Signer balance cannot cover amount plus safety deposit.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Refund attempted before the side's cancellation deadline.
    #[error("timelock not expired: now={now}, ready at {ready_at}")]
    TimelockNotExpired {
        /// Chain block timestamp at the attempt.
        now: u64,
        /// Earliest chain timestamp at which the refund is legal.
        ready_at: u64,
    },

    /// Secret does not hash to the committed hashlock. Checked locally;
    /// no transaction is ever sent.
    #[error("invalid secret")]
    InvalidSecret,

    /// Transaction submitted but the outcome could not be read back.
    /// The orchestrator reconciles via `get_escrow_by_order_id` before
    /// declaring anything.
    #[error("receipt indeterminate: {0}")]
    ReceiptIndeterminate(String),

    /// State-machine violation. Programmer error; panics tests and is
    /// surfaced loudly in production.
    #[error("illegal transition: {from} -> {to}")]
    IllegalTransition {
        /// Status on record.
        from: SwapStatus,
        /// Status that was requested.
        to: SwapStatus,
    },

    /// On-chain state contradicts stored state. No automatic recovery.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// Persistence layer failure.
    #[error("store error: {0}")]
    Store(String),
}

impl SwapError {
    /// Coarse kind for user-visible responses and retry policy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SwapError::Validation(_)
            | SwapError::UnsupportedChain(_)
            | SwapError::OrderNotFound(_) => ErrorKind::Validation,
            SwapError::ChainUnavailable(_) | SwapError::Timeout(_) => ErrorKind::ChainUnavailable,
            SwapError::ContractReverted(_) | SwapError::InsufficientFunds => {
                ErrorKind::ContractReverted
            }
            SwapError::TimelockNotExpired { .. } => ErrorKind::TimelockNotExpired,
            SwapError::InvalidSecret => ErrorKind::InvalidSecret,
            SwapError::ReceiptIndeterminate(_) => ErrorKind::ReceiptIndeterminate,
            SwapError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            SwapError::IntegrityViolation(_) => ErrorKind::IntegrityViolation,
            SwapError::Store(_) => ErrorKind::Store,
        }
    }

    /// Whether a retry of the same call can succeed without outside help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SwapError::ChainUnavailable(_)
                | SwapError::Timeout(_)
                | SwapError::TimelockNotExpired { .. }
        )
    }
}

/// User-visible error classification carried in `SwapOutcome`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input; nothing changed.
    Validation,
    /// Transient transport failure.
    ChainUnavailable,
    /// Deterministic on-chain rejection.
    ContractReverted,
    /// Operation attempted before its deadline.
    TimelockNotExpired,
    /// Pre-image does not match the hashlock.
    InvalidSecret,
    /// Submitted, outcome unknown.
    ReceiptIndeterminate,
    /// State-machine violation.
    IllegalTransition,
    /// Chain and store disagree.
    IntegrityViolation,
    /// Persistence failure.
    Store,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            SwapError::Validation("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            SwapError::ChainUnavailable("rpc down".into()).kind(),
            ErrorKind::ChainUnavailable
        );
        assert_eq!(SwapError::InvalidSecret.kind(), ErrorKind::InvalidSecret);
        assert_eq!(
            SwapError::IllegalTransition {
                from: SwapStatus::Created,
                to: SwapStatus::Completed,
            }
            .kind(),
            ErrorKind::IllegalTransition
        );
    }

    #[test]
    fn test_retryable() {
        assert!(SwapError::ChainUnavailable("x".into()).is_retryable());
        assert!(SwapError::Timeout("x".into()).is_retryable());
        assert!(SwapError::TimelockNotExpired { now: 1, ready_at: 2 }.is_retryable());
        assert!(!SwapError::InvalidSecret.is_retryable());
        assert!(!SwapError::ContractReverted("bad-amount".into()).is_retryable());
    }

    #[test]
    fn test_display_carries_detail() {
        let err = SwapError::ContractReverted("bad-amount".into());
        assert!(err.to_string().contains("bad-amount"));

        let err = SwapError::TimelockNotExpired { now: 10, ready_at: 90 };
        assert!(err.to_string().contains("90"));
    }
}
