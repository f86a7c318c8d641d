//! # Resolver Service
//!
//! The orchestration protocol. Each step is checkpointed through the
//! store before the next begins, so a crashed or re-entered run
//! resumes from the last persisted status instead of repeating chain
//! calls; the adapters' idempotent locks absorb the rest.
//!
//! Claim ordering is load-bearing: `claim(dst)` publishes the secret
//! on the destination chain, after which the source leg is claimable
//! by the resolver (or, past the public window, by anyone). Claiming
//! the source first would leak the secret without guaranteeing the
//! maker their destination leg.

use crate::ports::{CreateSwapRequest, ResolverApi, ResolverConfig, SwapOutcome};
use async_trait::async_trait;
use crosslock_chains::{AdapterRegistry, ChainAdapter};
use crosslock_engine::state_machine::Transition;
use crosslock_engine::{invariants, secret, timelock};
use crosslock_store::{KeyValueStore, SwapStore, TimeSource};
use crosslock_types::{
    Amount, ChainId, EscrowRecord, EscrowSide, EscrowStatus, FillPart, OrderId, ReceiptEntry,
    SwapError, SwapOrder, SwapState, SwapStatus, TokenId, TxReceipt,
};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Upper bound on clock polls during a timelock wait; a wait that
/// spins this long means the chain clock is not advancing.
const MAX_CLOCK_POLLS: u32 = 10_000;

/// The resolver orchestrator.
pub struct ResolverService<KV, TS>
where
    KV: KeyValueStore,
    TS: TimeSource,
{
    store: Arc<SwapStore<KV, TS>>,
    registry: Arc<AdapterRegistry>,
    config: ResolverConfig,
}

impl<KV, TS> ResolverService<KV, TS>
where
    KV: KeyValueStore,
    TS: TimeSource,
{
    /// Wire the orchestrator to its store and adapter registry.
    pub fn new(
        store: Arc<SwapStore<KV, TS>>,
        registry: Arc<AdapterRegistry>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    pub(crate) fn store(&self) -> &Arc<SwapStore<KV, TS>> {
        &self.store
    }

    pub(crate) fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Mark an order FAILED because on-chain state contradicts the
    /// store. Surfaced, never auto-recovered.
    pub async fn report_integrity_violation(
        &self,
        order_id: OrderId,
        detail: String,
    ) -> Result<SwapState, SwapError> {
        let err = SwapError::IntegrityViolation(detail);
        self.fail(order_id, &err).await
    }

    fn validate_request(&self, request: &CreateSwapRequest) -> Result<(), SwapError> {
        if request.src_chain == request.dst_chain {
            return Err(SwapError::Validation(format!(
                "src and dst chain must differ (both {})",
                request.src_chain
            )));
        }
        for chain in [request.src_chain, request.dst_chain] {
            if !self.registry.supports(chain) {
                return Err(SwapError::UnsupportedChain(chain.to_string()));
            }
        }
        if request.src_amount.is_zero() || request.dst_amount.is_zero() {
            return Err(SwapError::Validation("amounts must be positive".into()));
        }
        if request.maker.trim().is_empty() {
            return Err(SwapError::Validation("maker address is empty".into()));
        }
        Ok(())
    }

    fn build_order(
        &self,
        request: &CreateSwapRequest,
        fill_parts: Vec<FillPart>,
    ) -> Result<SwapOrder, SwapError> {
        let (secret, secret_hash) = secret::mint();
        let order = SwapOrder {
            order_id: OrderId::random(),
            maker: request.maker.clone(),
            src_chain: request.src_chain,
            dst_chain: request.dst_chain,
            src_token: request.src_token.clone(),
            dst_token: request.dst_token.clone(),
            src_amount: request.src_amount,
            dst_amount: request.dst_amount,
            secret,
            secret_hash,
            timelock: self.config.timelock,
            safety_deposit: self.config.safety_deposit,
            fill_parts,
        };

        invariants::invariant_chains_distinct(&order)?;
        invariants::invariant_secret_binding(&order)?;
        invariants::invariant_timelock_asymmetry(&order.timelock)?;
        invariants::invariant_parts_sum(&order)?;
        Ok(order)
    }

    /// Apply a transition, tolerating a concurrent run having already
    /// applied the same one.
    async fn checkpoint(
        &self,
        order_id: OrderId,
        transition: Transition,
    ) -> Result<SwapState, SwapError> {
        let target = transition.to;
        match self.store.update_status(order_id, transition).await {
            Ok(state) => Ok(state),
            Err(SwapError::IllegalTransition { .. }) => {
                let current = self.store.get_required(order_id).await?;
                if current.status == target {
                    Ok(current)
                } else {
                    Err(SwapError::IllegalTransition {
                        from: current.status,
                        to: target,
                    })
                }
            }
            Err(other) => Err(other),
        }
    }

    /// Mark an order FAILED and hand back the persisted state.
    async fn fail(&self, order_id: OrderId, err: &SwapError) -> Result<SwapState, SwapError> {
        error!(order_id = %order_id, error = %err, "swap failed");
        self.checkpoint(order_id, Transition::to(SwapStatus::Failed))
            .await
    }

    /// Append a receipt and flip the escrow's status in one store
    /// write, so journal order is persistence order.
    async fn journal(
        &self,
        order_id: OrderId,
        op: &str,
        side: EscrowSide,
        part_id: Option<u8>,
        receipt: Option<TxReceipt>,
        escrow_status: EscrowStatus,
    ) -> Result<SwapState, SwapError> {
        let op = op.to_string();
        self.store
            .update(order_id, move |state| {
                if let Some(receipt) = receipt {
                    state.receipts.push(ReceiptEntry {
                        op,
                        side,
                        part_id,
                        receipt,
                    });
                }
                let escrow = match part_id {
                    None => match side {
                        EscrowSide::Src => state.src_escrow.as_mut(),
                        EscrowSide::Dst => state.dst_escrow.as_mut(),
                    },
                    Some(pid) => state.part_state_mut(pid).and_then(|p| match side {
                        EscrowSide::Src => p.src_escrow.as_mut(),
                        EscrowSide::Dst => p.dst_escrow.as_mut(),
                    }),
                };
                if let Some(escrow) = escrow {
                    escrow.status = escrow_status;
                }
                Ok(())
            })
            .await
    }

    /// Suspend until `chain`'s clock reaches `ready_at`.
    async fn wait_for_chain_time(
        &self,
        adapter: &Arc<dyn ChainAdapter>,
        ready_at: u64,
    ) -> Result<(), SwapError> {
        let poll = Duration::from_millis(self.config.chain_poll_interval_ms);
        for _ in 0..MAX_CLOCK_POLLS {
            let now = self
                .config
                .retry
                .run("block_timestamp", || adapter.block_timestamp())
                .await?;
            if now >= ready_at {
                return Ok(());
            }
            tokio::time::sleep(poll).await;
        }
        Err(SwapError::Timeout(format!(
            "chain {} clock never reached {ready_at}",
            adapter.chain_id()
        )))
    }

    /// Lock one leg, absorbing transient failures and reconciling
    /// ambiguous outcomes through the order-id lookup.
    async fn lock_leg(
        &self,
        adapter: &Arc<dyn ChainAdapter>,
        order: &SwapOrder,
        side: EscrowSide,
    ) -> Result<EscrowRecord, SwapError> {
        let result = self
            .config
            .retry
            .run("lock", || adapter.lock(order, side))
            .await;

        match result {
            Ok(escrow) => Ok(escrow),
            Err(err @ (SwapError::Timeout(_) | SwapError::ReceiptIndeterminate(_))) => {
                // The submission is indeterminate: query before judging.
                warn!(order_id = %order.order_id, %side, error = %err, "lock indeterminate, reconciling");
                let found = self
                    .config
                    .retry
                    .run("get_escrow_by_order_id", || {
                        adapter.get_escrow_by_order_id(order.order_id, side)
                    })
                    .await?;
                match found {
                    Some(escrow) => {
                        info!(order_id = %order.order_id, %side, "reconciliation found the escrow");
                        Ok(escrow)
                    }
                    None => Err(err),
                }
            }
            Err(other) => Err(other),
        }
    }

    /// Claim one leg. `Ok(None)` means reconciliation confirmed the
    /// escrow is already claimed but no fresh receipt exists.
    async fn claim_leg(
        &self,
        adapter: &Arc<dyn ChainAdapter>,
        order_id: OrderId,
        escrow: &EscrowRecord,
        secret: &crosslock_types::SecretBytes,
    ) -> Result<Option<TxReceipt>, SwapError> {
        let result = self
            .config
            .retry
            .run("claim", || adapter.claim(escrow, secret))
            .await;

        match result {
            Ok(receipt) => Ok(Some(receipt)),
            Err(err @ (SwapError::Timeout(_) | SwapError::ReceiptIndeterminate(_))) => {
                let found = adapter.get_escrow_by_order_id(order_id, escrow.side).await?;
                match found {
                    Some(current) if current.status == EscrowStatus::Claimed => Ok(None),
                    _ => Err(err),
                }
            }
            Err(other) => Err(other),
        }
    }

    /// Refund one leg once its deadline has passed. `Ok(None)` means
    /// the escrow turned out already refunded.
    async fn refund_leg(
        &self,
        adapter: &Arc<dyn ChainAdapter>,
        order_id: OrderId,
        escrow: &EscrowRecord,
        timelock: &crosslock_types::TimelockSchedule,
    ) -> Result<Option<TxReceipt>, SwapError> {
        let result = self
            .config
            .retry
            .run("refund", || adapter.refund(escrow, timelock))
            .await;

        match result {
            Ok(receipt) => Ok(Some(receipt)),
            Err(err @ (SwapError::Timeout(_) | SwapError::ReceiptIndeterminate(_))) => {
                let found = adapter.get_escrow_by_order_id(order_id, escrow.side).await?;
                match found {
                    Some(current) if current.status == EscrowStatus::Refunded => Ok(None),
                    _ => Err(err),
                }
            }
            Err(other) => Err(other),
        }
    }

    /// The timelock path: wait out each locked side's cancellation
    /// deadline on its own chain, refund it, and close the order as
    /// CANCELLED. The last line of defence after any claim-path
    /// failure.
    async fn escalate_cancel(
        &self,
        order_id: OrderId,
        cause: &SwapError,
    ) -> Result<SwapOutcome, SwapError> {
        warn!(order_id = %order_id, cause = %cause, "escalating to timelock cancellation");
        let state = self.store.get_required(order_id).await?;
        let schedule = state.order.timelock;

        for side in [EscrowSide::Src, EscrowSide::Dst] {
            let escrow = match side {
                EscrowSide::Src => state.src_escrow.clone(),
                EscrowSide::Dst => state.dst_escrow.clone(),
            };
            let Some(escrow) = escrow else { continue };
            if escrow.status != EscrowStatus::Locked {
                continue;
            }

            let adapter = self.registry.get(escrow.chain)?;
            let ready_at = timelock::refundable_at(&schedule, &escrow);
            self.wait_for_chain_time(&adapter, ready_at).await?;

            match self.refund_leg(&adapter, order_id, &escrow, &schedule).await {
                Ok(receipt) => {
                    self.journal(order_id, "refund", side, None, receipt, EscrowStatus::Refunded)
                        .await?;
                }
                Err(err) => {
                    let failed = self.fail(order_id, &err).await?;
                    return Ok(SwapOutcome::err(&err, failed));
                }
            }
        }

        let cancelled = self
            .checkpoint(order_id, Transition::to(SwapStatus::Cancelled))
            .await?;
        Ok(SwapOutcome::err(cause, cancelled))
    }

    /// Timelock path for a single part: each of the part's locked
    /// escrows refunds after its own deadline, independently of the
    /// part's siblings.
    async fn escalate_cancel_part(
        &self,
        order_id: OrderId,
        part_id: u8,
        sub_order: &SwapOrder,
        cause: &SwapError,
    ) -> Result<(), SwapError> {
        warn!(order_id = %order_id, part = part_id, cause = %cause, "part escalating to timelock cancellation");
        let state = self.store.get_required(order_id).await?;
        let part = state
            .part_state(part_id)
            .cloned()
            .ok_or_else(|| SwapError::Validation(format!("unknown part id {part_id}")))?;
        let schedule = state.order.timelock;

        for side in [EscrowSide::Src, EscrowSide::Dst] {
            let escrow = match side {
                EscrowSide::Src => part.src_escrow.clone(),
                EscrowSide::Dst => part.dst_escrow.clone(),
            };
            let Some(escrow) = escrow else { continue };
            if escrow.status != EscrowStatus::Locked {
                continue;
            }

            let adapter = self.registry.get(escrow.chain)?;
            let ready_at = timelock::refundable_at(&schedule, &escrow);
            self.wait_for_chain_time(&adapter, ready_at).await?;

            let receipt = self
                .refund_leg(&adapter, sub_order.order_id, &escrow, &schedule)
                .await?;
            self.journal(order_id, "refund", side, Some(part_id), receipt, EscrowStatus::Refunded)
                .await?;
        }

        self.transition(order_id, Some(part_id), Transition::to(SwapStatus::Cancelled))
            .await?;
        Ok(())
    }

    /// Execute the two-leg protocol for one (possibly sub-) order,
    /// journaling under `part_id` when driving a part.
    async fn run_protocol(
        &self,
        aggregate_id: OrderId,
        order: &SwapOrder,
        part_id: Option<u8>,
    ) -> Result<(), ProtocolAbort> {
        let src_adapter = self.registry.get(order.src_chain).map_err(ProtocolAbort::fatal)?;
        let dst_adapter = self.registry.get(order.dst_chain).map_err(ProtocolAbort::fatal)?;

        let current = self
            .load_status(aggregate_id, part_id)
            .await
            .map_err(ProtocolAbort::fatal)?;

        // Step 2: source lock.
        let src_escrow = if current == SwapStatus::Created {
            let escrow = match self.lock_leg(&src_adapter, order, EscrowSide::Src).await {
                Ok(escrow) => escrow,
                Err(err @ SwapError::ChainUnavailable(_)) => {
                    // Never transitions the state machine; retry later.
                    return Err(ProtocolAbort::transient(err));
                }
                // Includes a reconciled-absent lock: submitted,
                // confirmed missing, declared failed.
                Err(err) => return Err(ProtocolAbort::fatal(err)),
            };
            let lock_receipt = TxReceipt {
                chain: escrow.chain,
                tx_hash: escrow.tx_hash.clone(),
                explorer_url: escrow.explorer_url.clone(),
            };
            self.transition(
                aggregate_id,
                part_id,
                Transition::with_escrow(SwapStatus::SrcDeployed, escrow.clone()),
            )
            .await
            .map_err(ProtocolAbort::fatal)?;
            self.journal(
                aggregate_id,
                "lock",
                EscrowSide::Src,
                part_id,
                Some(lock_receipt),
                EscrowStatus::Locked,
            )
            .await
            .map_err(ProtocolAbort::fatal)?;
            escrow
        } else {
            self.escrow_for(aggregate_id, part_id, EscrowSide::Src)
                .await
                .map_err(ProtocolAbort::fatal)?
        };

        // Step 3: destination lock. Failure here routes to the refund
        // path; the source leg must come home.
        let status_now = self
            .load_status(aggregate_id, part_id)
            .await
            .map_err(ProtocolAbort::fatal)?;
        let dst_escrow = if status_now == SwapStatus::SrcDeployed {
            let escrow = match self.lock_leg(&dst_adapter, order, EscrowSide::Dst).await {
                Ok(escrow) => escrow,
                Err(err @ SwapError::ChainUnavailable(_)) => {
                    return Err(ProtocolAbort::transient(err));
                }
                Err(err) => return Err(ProtocolAbort::cancel(err)),
            };
            let lock_receipt = TxReceipt {
                chain: escrow.chain,
                tx_hash: escrow.tx_hash.clone(),
                explorer_url: escrow.explorer_url.clone(),
            };
            self.transition(
                aggregate_id,
                part_id,
                Transition::with_escrow(SwapStatus::DstDeployed, escrow.clone()),
            )
            .await
            .map_err(ProtocolAbort::fatal)?;
            self.journal(
                aggregate_id,
                "lock",
                EscrowSide::Dst,
                part_id,
                Some(lock_receipt),
                EscrowStatus::Locked,
            )
            .await
            .map_err(ProtocolAbort::fatal)?;
            escrow
        } else {
            self.escrow_for(aggregate_id, part_id, EscrowSide::Dst)
                .await
                .map_err(ProtocolAbort::fatal)?
        };

        // Step 4: application-level finality locks on both sides.
        let schedule = &order.timelock;
        self.wait_for_chain_time(&dst_adapter, timelock::claimable_at(schedule, &dst_escrow))
            .await
            .map_err(ProtocolAbort::transient)?;
        self.wait_for_chain_time(&src_adapter, timelock::claimable_at(schedule, &src_escrow))
            .await
            .map_err(ProtocolAbort::transient)?;

        // Step 5: claims, destination strictly first.
        match self
            .claim_leg(&dst_adapter, order.order_id, &dst_escrow, &order.secret)
            .await
        {
            Ok(receipt) => {
                self.journal(
                    aggregate_id,
                    "claim",
                    EscrowSide::Dst,
                    part_id,
                    receipt,
                    EscrowStatus::Claimed,
                )
                .await
                .map_err(ProtocolAbort::fatal)?;
            }
            Err(err) => return Err(ProtocolAbort::cancel(err)),
        }

        match self
            .claim_leg(&src_adapter, order.order_id, &src_escrow, &order.secret)
            .await
        {
            Ok(receipt) => {
                self.journal(
                    aggregate_id,
                    "claim",
                    EscrowSide::Src,
                    part_id,
                    receipt,
                    EscrowStatus::Claimed,
                )
                .await
                .map_err(ProtocolAbort::fatal)?;
            }
            // Any claim failure escalates to the timelock path. The
            // destination leg is already claimed, so only the source
            // leg is left to come home after its deadline.
            Err(err) => return Err(ProtocolAbort::cancel(err)),
        }

        // Step 6: done.
        self.transition(aggregate_id, part_id, Transition::to(SwapStatus::Completed))
            .await
            .map_err(ProtocolAbort::fatal)?;
        Ok(())
    }

    async fn load_status(
        &self,
        order_id: OrderId,
        part_id: Option<u8>,
    ) -> Result<SwapStatus, SwapError> {
        let state = self.store.get_required(order_id).await?;
        match part_id {
            None => Ok(state.status),
            Some(pid) => state
                .part_state(pid)
                .map(|p| p.status)
                .ok_or_else(|| SwapError::Validation(format!("unknown part id {pid}"))),
        }
    }

    async fn escrow_for(
        &self,
        order_id: OrderId,
        part_id: Option<u8>,
        side: EscrowSide,
    ) -> Result<EscrowRecord, SwapError> {
        let state = self.store.get_required(order_id).await?;
        let escrow = match part_id {
            None => match side {
                EscrowSide::Src => state.src_escrow,
                EscrowSide::Dst => state.dst_escrow,
            },
            Some(pid) => state.part_state(pid).and_then(|p| match side {
                EscrowSide::Src => p.src_escrow.clone(),
                EscrowSide::Dst => p.dst_escrow.clone(),
            }),
        };
        escrow.ok_or_else(|| {
            SwapError::IntegrityViolation(format!(
                "status implies a {side} escrow for {order_id}, none recorded"
            ))
        })
    }

    async fn transition(
        &self,
        order_id: OrderId,
        part_id: Option<u8>,
        transition: Transition,
    ) -> Result<SwapState, SwapError> {
        match part_id {
            None => self.checkpoint(order_id, transition).await,
            Some(pid) => {
                self.store
                    .update_part_status(order_id, pid, transition)
                    .await
            }
        }
    }

    /// Mark one part FAILED. A store refusal here is a state-machine
    /// defect, not an expected outcome; it is logged at error level
    /// rather than discarded.
    async fn fail_part(&self, order_id: OrderId, part_id: u8) {
        if let Err(err) = self
            .transition(order_id, Some(part_id), Transition::to(SwapStatus::Failed))
            .await
        {
            error!(order_id = %order_id, part = part_id, error = %err, "part could not be marked FAILED");
        }
    }

    /// Advance the aggregate status of a partial order along with its
    /// most advanced part.
    async fn advance_aggregate(&self, order_id: OrderId, to: SwapStatus) -> Result<(), SwapError> {
        let state = self.store.get_required(order_id).await?;
        if state.status == to || state.status.is_terminal() {
            return Ok(());
        }
        if state.status.can_transition_to(to) {
            self.checkpoint(order_id, Transition::to(to)).await?;
        }
        Ok(())
    }
}

/// How a protocol run ended short of completion.
struct ProtocolAbort {
    error: SwapError,
    route: AbortRoute,
}

enum AbortRoute {
    /// No transition; the order can be re-executed later.
    Transient,
    /// Route to the timelock refund path.
    Cancel,
    /// Terminal failure.
    Fatal,
}

impl ProtocolAbort {
    fn transient(error: SwapError) -> Self {
        Self {
            error,
            route: AbortRoute::Transient,
        }
    }

    fn cancel(error: SwapError) -> Self {
        Self {
            error,
            route: AbortRoute::Cancel,
        }
    }

    fn fatal(error: SwapError) -> Self {
        Self {
            error,
            route: AbortRoute::Fatal,
        }
    }
}

#[async_trait]
impl<KV, TS> ResolverApi for ResolverService<KV, TS>
where
    KV: KeyValueStore,
    TS: TimeSource,
{
    async fn create_swap(&self, request: CreateSwapRequest) -> Result<SwapState, SwapError> {
        self.validate_request(&request)?;
        let order = self.build_order(&request, Vec::new())?;
        let state = SwapState::new(order, self.store.now());
        self.store.put(&state).await?;
        info!(order_id = %state.order.order_id, src = %request.src_chain, dst = %request.dst_chain, "swap created");
        Ok(state)
    }

    async fn create_partial_swap(
        &self,
        request: CreateSwapRequest,
        part_count: u8,
    ) -> Result<SwapState, SwapError> {
        if !(2..=10).contains(&part_count) {
            return Err(SwapError::Validation(format!(
                "part_count must be in 2..=10, got {part_count}"
            )));
        }
        self.validate_request(&request)?;

        let src_parts = split_amount(request.src_amount, part_count);
        let dst_parts = split_amount(request.dst_amount, part_count);
        let fill_parts = src_parts
            .into_iter()
            .zip(dst_parts)
            .enumerate()
            .map(|(i, (src_amount, dst_amount))| {
                let (secret, secret_hash) = secret::mint();
                FillPart {
                    part_id: (i + 1) as u8,
                    src_amount,
                    dst_amount,
                    secret,
                    secret_hash,
                }
            })
            .collect();

        let order = self.build_order(&request, fill_parts)?;
        let state = SwapState::new(order, self.store.now());
        self.store.put(&state).await?;
        info!(order_id = %state.order.order_id, parts = part_count, "partial swap created");
        Ok(state)
    }

    async fn execute_swap(&self, order_id: OrderId) -> Result<SwapOutcome, SwapError> {
        let state = self.store.get_required(order_id).await?;
        if state.order.is_partial() {
            return Err(SwapError::Validation(
                "partial orders execute through execute_partial_swap".into(),
            ));
        }
        if state.status.is_terminal() {
            return Err(SwapError::Validation(format!(
                "order {order_id} already terminal ({})",
                state.status
            )));
        }

        let order = state.order.clone();
        match self.run_protocol(order_id, &order, None).await {
            Ok(()) => {
                let state = self.store.get_required(order_id).await?;
                info!(order_id = %order_id, "swap completed");
                Ok(SwapOutcome::ok(state))
            }
            Err(abort) => match abort.route {
                AbortRoute::Transient => {
                    let state = self.store.get_required(order_id).await?;
                    Ok(SwapOutcome::err(&abort.error, state))
                }
                AbortRoute::Cancel => self.escalate_cancel(order_id, &abort.error).await,
                AbortRoute::Fatal => {
                    let state = self.fail(order_id, &abort.error).await?;
                    Ok(SwapOutcome::err(&abort.error, state))
                }
            },
        }
    }

    async fn execute_partial_swap(
        &self,
        order_id: OrderId,
        part_ids: Option<Vec<u8>>,
    ) -> Result<SwapOutcome, SwapError> {
        let state = self.store.get_required(order_id).await?;
        if !state.order.is_partial() {
            return Err(SwapError::Validation(
                "not a partial order; use execute_swap".into(),
            ));
        }
        if state.status.is_terminal() {
            return Err(SwapError::Validation(format!(
                "order {order_id} already terminal ({})",
                state.status
            )));
        }

        let selected: Vec<u8> = match part_ids {
            Some(ids) => ids,
            None => state.order.fill_parts.iter().map(|p| p.part_id).collect(),
        };
        for pid in &selected {
            if state.order.part(*pid).is_none() {
                return Err(SwapError::Validation(format!("unknown part id {pid}")));
            }
        }

        let order = state.order.clone();
        let mut first_error: Option<SwapError> = None;

        for pid in selected {
            let part = order
                .part(pid)
                .ok_or_else(|| SwapError::Validation(format!("unknown part id {pid}")))?;
            let part_state = self
                .store
                .get_required(order_id)
                .await?
                .part_state(pid)
                .cloned()
                .ok_or_else(|| SwapError::Validation(format!("unknown part id {pid}")))?;
            if part_state.status.is_terminal() {
                continue;
            }

            let sub_order = part_sub_order(&order, part);
            match self.run_protocol(order_id, &sub_order, Some(pid)).await {
                Ok(()) => {
                    // A filled part advances the aggregate through
                    // SRC_DEPLOYED into DST_DEPLOYED, where it stays
                    // while siblings remain open.
                    self.advance_aggregate(order_id, SwapStatus::SrcDeployed).await?;
                    self.advance_aggregate(order_id, SwapStatus::DstDeployed).await?;
                }
                Err(abort) => {
                    warn!(order_id = %order_id, part = pid, error = %abort.error, "part execution failed");
                    // A failed part never alters its siblings.
                    match abort.route {
                        AbortRoute::Transient => {}
                        AbortRoute::Cancel => {
                            if let Err(err) = self
                                .escalate_cancel_part(order_id, pid, &sub_order, &abort.error)
                                .await
                            {
                                error!(order_id = %order_id, part = pid, error = %err, "part refund path failed");
                                self.fail_part(order_id, pid).await;
                            }
                        }
                        AbortRoute::Fatal => {
                            self.fail_part(order_id, pid).await;
                        }
                    }
                    first_error.get_or_insert(abort.error);
                }
            }
        }

        let state = self.store.get_required(order_id).await?;
        let all_done = state.parts.iter().all(|p| p.withdrawn);
        if all_done {
            self.advance_aggregate(order_id, SwapStatus::Completed).await?;
        }

        let state = self.store.get_required(order_id).await?;
        Ok(match first_error {
            None => SwapOutcome::ok(state),
            Some(err) => SwapOutcome::err(&err, state),
        })
    }

    async fn cancel_swap(&self, order_id: OrderId) -> Result<SwapOutcome, SwapError> {
        let state = self.store.get_required(order_id).await?;
        if state.status.is_terminal() {
            return Ok(SwapOutcome::ok(state));
        }
        let schedule = state.order.timelock;

        let mut blocked: Option<SwapError> = None;
        for side in [EscrowSide::Src, EscrowSide::Dst] {
            let escrow = match side {
                EscrowSide::Src => state.src_escrow.clone(),
                EscrowSide::Dst => state.dst_escrow.clone(),
            };
            let Some(escrow) = escrow else { continue };
            if escrow.status != EscrowStatus::Locked {
                continue;
            }

            let adapter = self.registry.get(escrow.chain)?;
            match self.refund_leg(&adapter, order_id, &escrow, &schedule).await {
                Ok(receipt) => {
                    self.journal(order_id, "refund", side, None, receipt, EscrowStatus::Refunded)
                        .await?;
                }
                Err(err @ SwapError::TimelockNotExpired { .. }) => {
                    // Not yet safe on this side's chain; next safe
                    // transition point is later.
                    blocked.get_or_insert(err);
                }
                Err(err) => {
                    let failed = self.fail(order_id, &err).await?;
                    return Ok(SwapOutcome::err(&err, failed));
                }
            }
        }

        if let Some(err) = blocked {
            let state = self.store.get_required(order_id).await?;
            return Ok(SwapOutcome::err(&err, state));
        }

        let cancelled = self
            .checkpoint(order_id, Transition::to(SwapStatus::Cancelled))
            .await?;
        info!(order_id = %order_id, "swap cancelled");
        Ok(SwapOutcome::ok(cancelled))
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<SwapState>, SwapError> {
        self.store.get(order_id).await
    }

    async fn list(&self) -> Result<Vec<SwapState>, SwapError> {
        self.store.list().await
    }

    async fn get_balance(
        &self,
        chain: ChainId,
        address: &str,
        token: &TokenId,
    ) -> Result<Amount, SwapError> {
        let adapter = self.registry.get(chain)?;
        adapter.balance(address, token).await
    }
}

/// Split `total` into `count` parts that sum exactly; the remainder
/// lands on the last part.
fn split_amount(total: Amount, count: u8) -> Vec<Amount> {
    let count_u = Amount::from(count);
    let base = total / count_u;
    let mut parts = vec![base; count as usize];
    let distributed = base * count_u;
    if let Some(last) = parts.last_mut() {
        *last = base + (total - distributed);
    }
    parts
}

/// Derived sub-order for one part: its own 128-bit id (so adapters
/// key independent escrows), its own secret, its own amounts.
fn part_sub_order(order: &SwapOrder, part: &FillPart) -> SwapOrder {
    let mut hasher = Sha256::new();
    hasher.update(b"crosslock/part/v1");
    hasher.update(order.order_id.as_bytes());
    hasher.update([part.part_id]);
    let digest = hasher.finalize();
    let mut id = [0u8; 16];
    id.copy_from_slice(&digest[..16]);

    SwapOrder {
        order_id: OrderId(id),
        maker: order.maker.clone(),
        src_chain: order.src_chain,
        dst_chain: order.dst_chain,
        src_token: order.src_token.clone(),
        dst_token: order.dst_token.clone(),
        src_amount: part.src_amount,
        dst_amount: part.dst_amount,
        secret: part.secret.clone(),
        secret_hash: part.secret_hash,
        timelock: order.timelock,
        safety_deposit: order.safety_deposit,
        fill_parts: Vec::new(),
    }
}
