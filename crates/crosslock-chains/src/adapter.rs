//! # Chain Adapter Port
//!
//! The capability set every chain variant lifts its HTLC primitives
//! into. Variants differ only in how they encode these operations on
//! the wire.

use async_trait::async_trait;
use crosslock_types::{
    Amount, ChainId, EscrowRecord, EscrowSide, OrderId, SecretBytes, SwapError, SwapOrder,
    TimelockSchedule, TokenId, TxReceipt,
};
use sha2::{Digest, Sha256};

/// Uniform HTLC capability set.
///
/// ## Contracts
///
/// - `lock` is idempotent by `(order_id, side)`: retrying after an
///   ambiguous timeout must not create a second escrow. Adapters
///   achieve this with deterministic id derivation
///   ([`derive_escrow_id`]) and a pre-flight existence query.
/// - `claim` verifies the secret against the escrow's committed
///   hashlock locally and fails with `InvalidSecret` before sending
///   any transaction on mismatch.
/// - `refund` is permitted only after the side's cancellation deadline
///   has passed on the escrow chain's own clock; `TimelockNotExpired`
///   otherwise.
/// - Receiver rule: the source escrow pays out to the resolver's
///   address on that chain; the destination escrow pays out to the
///   maker's address. Getting this backwards makes a leg lootable.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Chain this adapter speaks for.
    fn chain_id(&self) -> ChainId;

    /// Whether the adapter is wired and able to serve calls.
    fn chain_supported(&self) -> bool {
        true
    }

    /// Bind the order's hashlock and the side's timelock on-chain,
    /// transferring the side's amount (plus safety deposit) from the
    /// signer into the chain's HTLC primitive.
    ///
    /// Returns once the lock transaction is in a block the adapter
    /// considers final for its chain; the application-level finality
    /// lock is the scheduler's job.
    async fn lock(&self, order: &SwapOrder, side: EscrowSide) -> Result<EscrowRecord, SwapError>;

    /// Present a pre-image and transfer the locked funds to the
    /// receiver encoded at lock time. After success the secret is
    /// public on this chain.
    async fn claim(
        &self,
        escrow: &EscrowRecord,
        secret: &SecretBytes,
    ) -> Result<TxReceipt, SwapError>;

    /// Return the locked funds to the sender. Legal only after the
    /// side's cancellation deadline under this chain's block clock.
    async fn refund(
        &self,
        escrow: &EscrowRecord,
        timelock: &TimelockSchedule,
    ) -> Result<TxReceipt, SwapError>;

    /// Balance of `address` in `token` smallest units. No side effects.
    async fn balance(&self, address: &str, token: &TokenId) -> Result<Amount, SwapError>;

    /// Current block (or ledger) timestamp. No side effects.
    async fn block_timestamp(&self) -> Result<u64, SwapError>;

    /// Look up an escrow by the deterministic `(order_id, side)`
    /// binding. The reconciliation path after an ambiguous lock.
    async fn get_escrow_by_order_id(
        &self,
        order_id: OrderId,
        side: EscrowSide,
    ) -> Result<Option<EscrowRecord>, SwapError>;
}

/// Deterministic 32-byte escrow id for `(order_id, side)`.
///
/// Every adapter derives its on-chain escrow identifier from this
/// value, which is what makes `lock` retries collapse onto the same
/// escrow instead of creating a second one.
pub fn derive_escrow_id(order_id: OrderId, side: EscrowSide) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"crosslock/escrow/v1");
    hasher.update(order_id.as_bytes());
    hasher.update(side.as_str().as_bytes());
    hasher.finalize().into()
}

/// Local claim precondition shared by all adapters: the pre-image must
/// hash to the escrow's committed hashlock before anything is signed
/// or sent.
pub fn precheck_claim(escrow: &EscrowRecord, secret: &SecretBytes) -> Result<(), SwapError> {
    if !crosslock_engine::verify_secret(secret, &escrow.secret_hash) {
        return Err(SwapError::InvalidSecret);
    }
    Ok(())
}

/// Local refund precondition shared by all adapters: the side's
/// cancellation deadline must have passed at `chain_now`.
pub fn precheck_refund(
    escrow: &EscrowRecord,
    timelock: &TimelockSchedule,
    chain_now: u64,
) -> Result<(), SwapError> {
    if !crosslock_engine::can_refund(timelock, escrow, chain_now) {
        return Err(SwapError::TimelockNotExpired {
            now: chain_now,
            ready_at: crosslock_engine::refundable_at(timelock, escrow),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosslock_types::EscrowStatus;

    #[test]
    fn test_escrow_id_deterministic() {
        let id = OrderId::random();
        assert_eq!(
            derive_escrow_id(id, EscrowSide::Src),
            derive_escrow_id(id, EscrowSide::Src)
        );
    }

    #[test]
    fn test_escrow_id_side_separated() {
        let id = OrderId::random();
        assert_ne!(
            derive_escrow_id(id, EscrowSide::Src),
            derive_escrow_id(id, EscrowSide::Dst)
        );
    }

    #[test]
    fn test_escrow_id_order_separated() {
        assert_ne!(
            derive_escrow_id(OrderId::random(), EscrowSide::Src),
            derive_escrow_id(OrderId::random(), EscrowSide::Src)
        );
    }

    #[test]
    fn test_precheck_claim() {
        let (secret, hash) = crosslock_engine::mint();
        let escrow = EscrowRecord {
            side: EscrowSide::Src,
            chain: ChainId::Base,
            address: "0xabc:1".to_string(),
            secret_hash: hash,
            deploy_time: 0,
            tx_hash: "0x1".to_string(),
            explorer_url: None,
            status: EscrowStatus::Locked,
        };
        assert!(precheck_claim(&escrow, &secret).is_ok());

        let wrong = SecretBytes::new([0x99u8; 32]);
        assert!(matches!(
            precheck_claim(&escrow, &wrong),
            Err(SwapError::InvalidSecret)
        ));
    }

    #[test]
    fn test_precheck_refund_gating() {
        let schedule = crosslock_engine::default_schedule();
        let escrow = EscrowRecord {
            side: EscrowSide::Dst,
            chain: ChainId::Sui,
            address: "0xobj".to_string(),
            secret_hash: [0u8; 32],
            deploy_time: 1_000,
            tx_hash: "0x1".to_string(),
            explorer_url: None,
            status: EscrowStatus::Locked,
        };

        let err = precheck_refund(&escrow, &schedule, 1_050).unwrap_err();
        assert!(matches!(err, SwapError::TimelockNotExpired { ready_at: 1_120, .. }));
        assert!(precheck_refund(&escrow, &schedule, 1_120).is_ok());
    }
}
