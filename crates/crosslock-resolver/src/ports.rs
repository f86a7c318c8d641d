//! # Inbound Port
//!
//! What callers can ask the resolver to do. The HTTP/CLI shells drive
//! this trait and carry no state or logic of their own.

use crate::retry::RetryPolicy;
use async_trait::async_trait;
use crosslock_engine::timelock;
use crosslock_types::{
    Amount, ChainId, ErrorKind, OrderId, SafetyDeposit, SwapError, SwapState, TimelockSchedule,
    TokenId,
};
use serde::{Deserialize, Serialize};

/// Parameters for creating a swap.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateSwapRequest {
    /// Chain the maker's funds leave from.
    pub src_chain: ChainId,
    /// Chain the maker receives on.
    pub dst_chain: ChainId,
    /// Token offered on the source chain.
    pub src_token: TokenId,
    /// Token wanted on the destination chain.
    pub dst_token: TokenId,
    /// Amount offered, src-chain smallest units.
    pub src_amount: Amount,
    /// Amount wanted, dst-chain smallest units.
    pub dst_amount: Amount,
    /// Maker's receiving address on the destination chain.
    pub maker: String,
}

/// Result surface of the driver operations.
///
/// Terminal failures always carry the last successfully persisted
/// state so the caller can resume or investigate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwapOutcome {
    /// Whether the operation reached its goal.
    pub success: bool,
    /// Coarse error classification when it did not.
    pub error_kind: Option<ErrorKind>,
    /// Opaque detail string for operators.
    pub detail: Option<String>,
    /// Last persisted state.
    pub state: SwapState,
}

impl SwapOutcome {
    /// Successful outcome around a state snapshot.
    pub fn ok(state: SwapState) -> Self {
        Self {
            success: true,
            error_kind: None,
            detail: None,
            state,
        }
    }

    /// Failed outcome carrying the error and the last persisted state.
    pub fn err(error: &SwapError, state: SwapState) -> Self {
        Self {
            success: false,
            error_kind: Some(error.kind()),
            detail: Some(error.to_string()),
            state,
        }
    }
}

/// Orchestrator tuning.
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    /// Deadline schedule stamped into new orders.
    pub timelock: TimelockSchedule,
    /// Safety deposits stamped into new orders.
    pub safety_deposit: SafetyDeposit,
    /// Backoff policy for transient chain failures.
    pub retry: RetryPolicy,
    /// How often timelock waits re-read the chain clock, milliseconds.
    pub chain_poll_interval_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timelock: timelock::default_schedule(),
            safety_deposit: SafetyDeposit::default(),
            retry: RetryPolicy::default(),
            chain_poll_interval_ms: 5_000,
        }
    }
}

impl ResolverConfig {
    /// Fast polls and a compressed schedule for test environments.
    pub fn for_testing() -> Self {
        Self {
            timelock: TimelockSchedule {
                src_withdrawal: 0,
                src_public_withdrawal: 30,
                src_cancellation: 60,
                src_public_cancellation: 90,
                dst_withdrawal: 0,
                dst_public_withdrawal: 20,
                dst_cancellation: 40,
            },
            safety_deposit: SafetyDeposit::default(),
            retry: RetryPolicy::for_testing(),
            chain_poll_interval_ms: 10,
        }
    }
}

/// The resolver's driver surface. No other surface is part of the core.
#[async_trait]
pub trait ResolverApi: Send + Sync {
    /// Validate, mint a secret, persist `CREATED`. No chain calls.
    async fn create_swap(&self, request: CreateSwapRequest) -> Result<SwapState, SwapError>;

    /// Like `create_swap`, but split into `part_count` independent
    /// parts (2..=10), each with its own secret.
    async fn create_partial_swap(
        &self,
        request: CreateSwapRequest,
        part_count: u8,
    ) -> Result<SwapState, SwapError>;

    /// Drive a `CREATED` order to a terminal state.
    async fn execute_swap(&self, order_id: OrderId) -> Result<SwapOutcome, SwapError>;

    /// Drive selected parts of a partial order; all parts when `None`.
    async fn execute_partial_swap(
        &self,
        order_id: OrderId,
        part_ids: Option<Vec<u8>>,
    ) -> Result<SwapOutcome, SwapError>;

    /// Refund every locked side whose cancellation deadline has passed.
    async fn cancel_swap(&self, order_id: OrderId) -> Result<SwapOutcome, SwapError>;

    /// Current state of an order.
    async fn get(&self, order_id: OrderId) -> Result<Option<SwapState>, SwapError>;

    /// All orders, newest first.
    async fn list(&self) -> Result<Vec<SwapState>, SwapError>;

    /// Balance query through the chain's adapter.
    async fn get_balance(
        &self,
        chain: ChainId,
        address: &str,
        token: &TokenId,
    ) -> Result<Amount, SwapError>;
}
