//! # Mock Chain Adapter
//!
//! In-memory HTLC chain with a controllable clock and programmable
//! faults. Drives the orchestrator's unit and integration tests; it
//! enforces the same local rules as the real adapters (secret
//! precheck, refund gating, idempotent lock), so scheduling bugs show
//! up here before they would on a live chain.

use crate::adapter::{
    derive_escrow_id, precheck_claim, precheck_refund, ChainAdapter,
};
use async_trait::async_trait;
use crosslock_types::{
    Amount, ChainId, EscrowRecord, EscrowSide, EscrowStatus, OrderId, SecretBytes, SwapError,
    SwapOrder, TimelockSchedule, TokenId, TxReceipt,
};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// One recorded chain operation, for cross-adapter ordering asserts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpRecord {
    /// Chain the operation ran on.
    pub chain: ChainId,
    /// Operation name: `lock`, `claim`, `refund`.
    pub op: &'static str,
    /// Side of the escrow involved.
    pub side: EscrowSide,
    /// Order the escrow belongs to.
    pub order_id: OrderId,
}

/// Shared journal two mock adapters can append to, so tests can assert
/// the relative order of operations across chains.
pub type OpJournal = Arc<RwLock<Vec<OpRecord>>>;

/// Fault programmed for the next matching operation.
#[derive(Clone, Debug)]
enum Fault {
    /// Fail the call with this error. If `escrow_anyway` is set the
    /// escrow is still created first (ambiguous-timeout simulation).
    Fail {
        error: SwapError,
        escrow_anyway: bool,
    },
}

#[derive(Clone)]
struct MockEscrow {
    record: EscrowRecord,
    order_id: OrderId,
    /// Address the funds pay out to on claim.
    receiver: String,
    amount: Amount,
    secret_seen: Option<SecretBytes>,
}

/// In-memory HTLC chain.
pub struct MockChainAdapter {
    chain: ChainId,
    supported: AtomicBool,
    clock: AtomicU64,
    escrows: RwLock<HashMap<[u8; 32], MockEscrow>>,
    lock_faults: RwLock<HashMap<EscrowSide, Vec<Fault>>>,
    claim_faults: RwLock<Vec<SwapError>>,
    refund_faults: RwLock<Vec<SwapError>>,
    lock_attempts: AtomicU64,
    balances: RwLock<HashMap<(String, String), Amount>>,
    resolver_address: String,
    journal: Option<OpJournal>,
}

impl MockChainAdapter {
    /// Fresh mock chain at timestamp 1_700_000_000.
    pub fn new(chain: ChainId) -> Self {
        Self {
            chain,
            supported: AtomicBool::new(true),
            clock: AtomicU64::new(1_700_000_000),
            escrows: RwLock::new(HashMap::new()),
            lock_faults: RwLock::new(HashMap::new()),
            claim_faults: RwLock::new(Vec::new()),
            refund_faults: RwLock::new(Vec::new()),
            lock_attempts: AtomicU64::new(0),
            balances: RwLock::new(HashMap::new()),
            resolver_address: format!("resolver@{chain}"),
            journal: None,
        }
    }

    /// Attach a shared journal for cross-adapter ordering asserts.
    pub fn with_journal(mut self, journal: OpJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Toggle `chain_supported`.
    pub fn set_supported(&self, supported: bool) {
        self.supported.store(supported, Ordering::SeqCst);
    }

    /// Pin the chain clock.
    pub fn set_time(&self, time: u64) {
        self.clock.store(time, Ordering::SeqCst);
    }

    /// Advance the chain clock.
    pub fn advance_time(&self, secs: u64) {
        self.clock.fetch_add(secs, Ordering::SeqCst);
    }

    /// Current mock chain time.
    pub fn current_time(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    /// Program the next `lock` on `side` to fail with `error`.
    pub fn fail_next_lock(&self, side: EscrowSide, error: SwapError) {
        self.lock_faults.write().entry(side).or_default().push(Fault::Fail {
            error,
            escrow_anyway: false,
        });
    }

    /// Program the next `lock` on `side` to create the escrow and then
    /// report `error` anyway — the ambiguous-timeout case the
    /// orchestrator must reconcile by order-id lookup.
    pub fn fail_next_lock_after_escrow(&self, side: EscrowSide, error: SwapError) {
        self.lock_faults.write().entry(side).or_default().push(Fault::Fail {
            error,
            escrow_anyway: true,
        });
    }

    /// Program the next `claim` to fail.
    pub fn fail_next_claim(&self, error: SwapError) {
        self.claim_faults.write().push(error);
    }

    /// Program the next `refund` to fail.
    pub fn fail_next_refund(&self, error: SwapError) {
        self.refund_faults.write().push(error);
    }

    /// How many lock calls the adapter has seen.
    pub fn lock_attempts(&self) -> u64 {
        self.lock_attempts.load(Ordering::SeqCst)
    }

    /// How many escrows exist.
    pub fn escrow_count(&self) -> usize {
        self.escrows.read().len()
    }

    /// Seed a balance for `balance()` queries.
    pub fn set_balance(&self, address: &str, token: &TokenId, amount: Amount) {
        self.balances
            .write()
            .insert((address.to_string(), token.as_str().to_string()), amount);
    }

    /// The receiver recorded for an escrow, for receiver-rule asserts.
    pub fn escrow_receiver(&self, order_id: OrderId, side: EscrowSide) -> Option<String> {
        let id = derive_escrow_id(order_id, side);
        self.escrows.read().get(&id).map(|e| e.receiver.clone())
    }

    /// The amount locked in an escrow.
    pub fn escrow_amount(&self, order_id: OrderId, side: EscrowSide) -> Option<Amount> {
        let id = derive_escrow_id(order_id, side);
        self.escrows.read().get(&id).map(|e| e.amount)
    }

    /// The secret presented on claim, if the escrow was claimed.
    pub fn revealed_secret(&self, order_id: OrderId, side: EscrowSide) -> Option<SecretBytes> {
        let id = derive_escrow_id(order_id, side);
        self.escrows.read().get(&id).and_then(|e| e.secret_seen.clone())
    }

    fn journal_push(&self, op: &'static str, side: EscrowSide, order_id: OrderId) {
        if let Some(journal) = &self.journal {
            journal.write().push(OpRecord {
                chain: self.chain,
                op,
                side,
                order_id,
            });
        }
    }

    fn tx_hash(&self, escrow_id: &[u8; 32], op: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(escrow_id);
        hasher.update(op.as_bytes());
        hasher.update(self.current_time().to_le_bytes());
        format!("0x{}", hex::encode(hasher.finalize()))
    }

    fn make_escrow(&self, order: &SwapOrder, side: EscrowSide, hash: [u8; 32]) -> MockEscrow {
        let escrow_id = derive_escrow_id(order.order_id, side);
        let (amount, receiver) = match side {
            EscrowSide::Src => (order.src_amount, self.resolver_address.clone()),
            EscrowSide::Dst => (order.dst_amount, order.maker.clone()),
        };
        MockEscrow {
            record: EscrowRecord {
                side,
                chain: self.chain,
                address: format!("mock:{}:{}", self.chain, hex::encode(&escrow_id[..8])),
                secret_hash: hash,
                deploy_time: self.current_time(),
                tx_hash: self.tx_hash(&escrow_id, "lock"),
                explorer_url: None,
                status: EscrowStatus::Locked,
            },
            order_id: order.order_id,
            receiver,
            amount,
            secret_seen: None,
        }
    }
}

#[async_trait]
impl ChainAdapter for MockChainAdapter {
    fn chain_id(&self) -> ChainId {
        self.chain
    }

    fn chain_supported(&self) -> bool {
        self.supported.load(Ordering::SeqCst)
    }

    async fn lock(&self, order: &SwapOrder, side: EscrowSide) -> Result<EscrowRecord, SwapError> {
        self.lock_attempts.fetch_add(1, Ordering::SeqCst);
        let escrow_id = derive_escrow_id(order.order_id, side);

        // Idempotency: a retry lands on the existing escrow.
        if let Some(existing) = self.escrows.read().get(&escrow_id) {
            debug!(chain = %self.chain, order_id = %order.order_id, %side, "lock retry hit existing escrow");
            return Ok(existing.record.clone());
        }

        let fault = self.lock_faults.write().get_mut(&side).and_then(|q| {
            if q.is_empty() { None } else { Some(q.remove(0)) }
        });

        if let Some(Fault::Fail { error, escrow_anyway }) = fault {
            if escrow_anyway {
                let escrow = self.make_escrow(order, side, order.secret_hash);
                self.escrows.write().insert(escrow_id, escrow);
            }
            return Err(error);
        }

        let escrow = self.make_escrow(order, side, order.secret_hash);
        let record = escrow.record.clone();
        self.escrows.write().insert(escrow_id, escrow);
        self.journal_push("lock", side, order.order_id);
        Ok(record)
    }

    async fn claim(
        &self,
        escrow: &EscrowRecord,
        secret: &SecretBytes,
    ) -> Result<TxReceipt, SwapError> {
        // Local precondition: never send a transaction for a bad secret.
        precheck_claim(escrow, secret)?;

        if let Some(error) = {
            let mut faults = self.claim_faults.write();
            if faults.is_empty() { None } else { Some(faults.remove(0)) }
        } {
            return Err(error);
        }

        let mut escrows = self.escrows.write();
        let entry = escrows
            .values_mut()
            .find(|e| e.record.address == escrow.address)
            .ok_or_else(|| {
                SwapError::IntegrityViolation(format!("no escrow at {}", escrow.address))
            })?;

        if entry.record.status != EscrowStatus::Locked {
            return Err(SwapError::ContractReverted(format!(
                "escrow not claimable in status {:?}",
                entry.record.status
            )));
        }

        entry.record.status = EscrowStatus::Claimed;
        entry.secret_seen = Some(secret.clone());
        let order_id = entry.order_id;
        let escrow_id = derive_escrow_id(order_id, entry.record.side);
        let receipt = TxReceipt {
            chain: self.chain,
            tx_hash: self.tx_hash(&escrow_id, "claim"),
            explorer_url: None,
        };
        drop(escrows);

        self.journal_push("claim", escrow.side, order_id);
        Ok(receipt)
    }

    async fn refund(
        &self,
        escrow: &EscrowRecord,
        timelock: &TimelockSchedule,
    ) -> Result<TxReceipt, SwapError> {
        precheck_refund(escrow, timelock, self.current_time())?;

        if let Some(error) = {
            let mut faults = self.refund_faults.write();
            if faults.is_empty() { None } else { Some(faults.remove(0)) }
        } {
            return Err(error);
        }

        let mut escrows = self.escrows.write();
        let entry = escrows
            .values_mut()
            .find(|e| e.record.address == escrow.address)
            .ok_or_else(|| {
                SwapError::IntegrityViolation(format!("no escrow at {}", escrow.address))
            })?;

        if entry.record.status != EscrowStatus::Locked {
            return Err(SwapError::ContractReverted(format!(
                "escrow not refundable in status {:?}",
                entry.record.status
            )));
        }

        entry.record.status = EscrowStatus::Refunded;
        let order_id = entry.order_id;
        let escrow_id = derive_escrow_id(order_id, entry.record.side);
        let receipt = TxReceipt {
            chain: self.chain,
            tx_hash: self.tx_hash(&escrow_id, "refund"),
            explorer_url: None,
        };
        drop(escrows);

        self.journal_push("refund", escrow.side, order_id);
        Ok(receipt)
    }

    async fn balance(&self, address: &str, token: &TokenId) -> Result<Amount, SwapError> {
        Ok(self
            .balances
            .read()
            .get(&(address.to_string(), token.as_str().to_string()))
            .copied()
            .unwrap_or_else(Amount::zero))
    }

    async fn block_timestamp(&self) -> Result<u64, SwapError> {
        Ok(self.current_time())
    }

    async fn get_escrow_by_order_id(
        &self,
        order_id: OrderId,
        side: EscrowSide,
    ) -> Result<Option<EscrowRecord>, SwapError> {
        let escrow_id = derive_escrow_id(order_id, side);
        Ok(self.escrows.read().get(&escrow_id).map(|e| e.record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosslock_engine::{default_schedule, mint};
    use crosslock_types::SafetyDeposit;

    fn order() -> SwapOrder {
        let (secret, hash) = mint();
        SwapOrder {
            order_id: OrderId::random(),
            maker: "maker@sui".to_string(),
            src_chain: ChainId::Base,
            dst_chain: ChainId::Sui,
            src_token: TokenId::native(ChainId::Base),
            dst_token: TokenId::native(ChainId::Sui),
            src_amount: 1_000u64.into(),
            dst_amount: 1_000u64.into(),
            secret,
            secret_hash: hash,
            timelock: default_schedule(),
            safety_deposit: SafetyDeposit::default(),
            fill_parts: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_lock_idempotent() {
        let chain = MockChainAdapter::new(ChainId::Base);
        let order = order();

        let first = chain.lock(&order, EscrowSide::Src).await.unwrap();
        let second = chain.lock(&order, EscrowSide::Src).await.unwrap();
        assert_eq!(first.address, second.address);
        assert_eq!(chain.escrow_count(), 1);
        assert_eq!(chain.lock_attempts(), 2);
    }

    #[tokio::test]
    async fn test_receiver_rule() {
        let chain = MockChainAdapter::new(ChainId::Sui);
        let order = order();

        chain.lock(&order, EscrowSide::Src).await.unwrap();
        chain.lock(&order, EscrowSide::Dst).await.unwrap();

        // Source pays the resolver; destination pays the maker.
        assert_eq!(
            chain.escrow_receiver(order.order_id, EscrowSide::Src).unwrap(),
            "resolver@sui"
        );
        assert_eq!(
            chain.escrow_receiver(order.order_id, EscrowSide::Dst).unwrap(),
            "maker@sui"
        );
    }

    #[tokio::test]
    async fn test_claim_wrong_secret_no_state_change() {
        let chain = MockChainAdapter::new(ChainId::Base);
        let order = order();
        let escrow = chain.lock(&order, EscrowSide::Src).await.unwrap();

        let wrong = SecretBytes::new([0xFFu8; 32]);
        let err = chain.claim(&escrow, &wrong).await.unwrap_err();
        assert!(matches!(err, SwapError::InvalidSecret));

        // Escrow untouched.
        let current = chain
            .get_escrow_by_order_id(order.order_id, EscrowSide::Src)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.status, EscrowStatus::Locked);
    }

    #[tokio::test]
    async fn test_claim_then_double_claim_reverts() {
        let chain = MockChainAdapter::new(ChainId::Base);
        let order = order();
        let escrow = chain.lock(&order, EscrowSide::Src).await.unwrap();

        chain.claim(&escrow, &order.secret).await.unwrap();
        let err = chain.claim(&escrow, &order.secret).await.unwrap_err();
        assert!(matches!(err, SwapError::ContractReverted(_)));
    }

    #[tokio::test]
    async fn test_refund_gated_then_allowed() {
        let chain = MockChainAdapter::new(ChainId::Base);
        let order = order();
        let escrow = chain.lock(&order, EscrowSide::Src).await.unwrap();

        let err = chain.refund(&escrow, &order.timelock).await.unwrap_err();
        assert!(matches!(err, SwapError::TimelockNotExpired { .. }));

        chain.advance_time(order.timelock.src_cancellation);
        chain.refund(&escrow, &order.timelock).await.unwrap();
    }

    #[tokio::test]
    async fn test_ambiguous_lock_leaves_escrow_behind() {
        let chain = MockChainAdapter::new(ChainId::Base);
        let order = order();
        chain.fail_next_lock_after_escrow(
            EscrowSide::Src,
            SwapError::Timeout("rpc deadline".into()),
        );

        let err = chain.lock(&order, EscrowSide::Src).await.unwrap_err();
        assert!(matches!(err, SwapError::Timeout(_)));

        // Reconciliation path finds it.
        let found = chain
            .get_escrow_by_order_id(order.order_id, EscrowSide::Src)
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_balance_defaults_zero() {
        let chain = MockChainAdapter::new(ChainId::Base);
        let token = TokenId::native(ChainId::Base);
        assert_eq!(chain.balance("0xnobody", &token).await.unwrap(), Amount::zero());

        chain.set_balance("0xsomebody", &token, 42u64.into());
        assert_eq!(
            chain.balance("0xsomebody", &token).await.unwrap(),
            Amount::from(42u64)
        );
    }
}
