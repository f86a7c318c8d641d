//! # Swap Store Service
//!
//! The mapping from `order_id` to `SwapState`, and the single
//! serialisation point for a given order: concurrent mutations of one
//! id are linearised through a per-key async lock while different ids
//! proceed in parallel.
//!
//! `update_status` is the only mutator of `status`; every other write
//! path refuses to change it.

use crate::codec::{decode_state, encode_state, swap_key, SWAP_PREFIX};
use crate::ports::{KeyValueStore, TimeSource};
use crosslock_engine::state_machine::{
    apply_part_transition, apply_transition, Transition,
};
use crosslock_types::{OrderId, SwapError, SwapState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Durable swap-state store.
///
/// Generic over the backend and the wall clock so tests can inject
/// both.
pub struct SwapStore<KV, TS>
where
    KV: KeyValueStore,
    TS: TimeSource,
{
    kv: KV,
    time_source: TS,
    /// Per-order locks; entries are created on first touch and kept
    /// for the process lifetime (orders are never deleted).
    locks: Mutex<HashMap<OrderId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<KV, TS> SwapStore<KV, TS>
where
    KV: KeyValueStore,
    TS: TimeSource,
{
    /// Create a store over the given backend.
    pub fn new(kv: KV, time_source: TS) -> Self {
        Self {
            kv,
            time_source,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn key_lock(&self, order_id: OrderId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Wall clock reading used for `updated_at`.
    pub fn now(&self) -> u64 {
        self.time_source.now_unix()
    }

    /// Insert or overwrite a full state record.
    ///
    /// All field changes land together: the record is encoded once and
    /// written in a single backend put.
    pub async fn put(&self, state: &SwapState) -> Result<(), SwapError> {
        let lock = self.key_lock(state.order.order_id);
        let _guard = lock.lock().await;

        let bytes = encode_state(state)?;
        self.kv.put(&swap_key(&state.order.order_id), &bytes)?;
        debug!(order_id = %state.order.order_id, status = %state.status, "state persisted");
        Ok(())
    }

    /// Load a state record.
    pub async fn get(&self, order_id: OrderId) -> Result<Option<SwapState>, SwapError> {
        match self.kv.get(&swap_key(&order_id))? {
            Some(bytes) => Ok(Some(decode_state(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load a state record or fail with `OrderNotFound`.
    pub async fn get_required(&self, order_id: OrderId) -> Result<SwapState, SwapError> {
        self.get(order_id)
            .await?
            .ok_or(SwapError::OrderNotFound(order_id))
    }

    /// All swaps, newest first (`created_at` descending).
    pub async fn list(&self) -> Result<Vec<SwapState>, SwapError> {
        let mut states = Vec::new();
        for (_, bytes) in self.kv.prefix_scan(SWAP_PREFIX)? {
            states.push(decode_state(&bytes)?);
        }
        states.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(states)
    }

    /// Apply a state-machine transition: the sole mutator of `status`.
    ///
    /// The transition (new status plus optional escrow metadata) is
    /// validated against the legal edge set, applied, and persisted
    /// atomically under the order's key lock. Returns the new state.
    pub async fn update_status(
        &self,
        order_id: OrderId,
        transition: Transition,
    ) -> Result<SwapState, SwapError> {
        let lock = self.key_lock(order_id);
        let _guard = lock.lock().await;

        let mut state = self
            .get_unlocked(order_id)?
            .ok_or(SwapError::OrderNotFound(order_id))?;
        let from = state.status;

        apply_transition(&mut state, transition, self.time_source.now_unix())?;

        let bytes = encode_state(&state)?;
        self.kv.put(&swap_key(&order_id), &bytes)?;
        debug!(order_id = %order_id, from = %from, to = %state.status, "status transition");
        Ok(state)
    }

    /// Apply a transition to one part of a partial-fill order.
    pub async fn update_part_status(
        &self,
        order_id: OrderId,
        part_id: u8,
        transition: Transition,
    ) -> Result<SwapState, SwapError> {
        let lock = self.key_lock(order_id);
        let _guard = lock.lock().await;

        let mut state = self
            .get_unlocked(order_id)?
            .ok_or(SwapError::OrderNotFound(order_id))?;

        apply_part_transition(&mut state, part_id, transition, self.time_source.now_unix())?;

        let bytes = encode_state(&state)?;
        self.kv.put(&swap_key(&order_id), &bytes)?;
        Ok(state)
    }

    /// Read-modify-write for non-status fields (escrow receipts,
    /// flags). The closure must leave `status` untouched; a status
    /// change through this path is a programmer error and is rejected
    /// as `IllegalTransition`.
    pub async fn update<F>(&self, order_id: OrderId, mutate: F) -> Result<SwapState, SwapError>
    where
        F: FnOnce(&mut SwapState) -> Result<(), SwapError>,
    {
        let lock = self.key_lock(order_id);
        let _guard = lock.lock().await;

        let mut state = self
            .get_unlocked(order_id)?
            .ok_or(SwapError::OrderNotFound(order_id))?;
        let status_before = state.status;

        mutate(&mut state)?;

        if state.status != status_before {
            warn!(order_id = %order_id, "update() attempted a status change; rejected");
            return Err(SwapError::IllegalTransition {
                from: status_before,
                to: state.status,
            });
        }

        state.updated_at = self.time_source.now_unix();
        let bytes = encode_state(&state)?;
        self.kv.put(&swap_key(&order_id), &bytes)?;
        Ok(state)
    }

    fn get_unlocked(&self, order_id: OrderId) -> Result<Option<SwapState>, SwapError> {
        match self.kv.get(&swap_key(&order_id))? {
            Some(bytes) => Ok(Some(decode_state(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryKv;
    use crate::ports::TimeSource;
    use crosslock_types::{
        ChainId, EscrowRecord, EscrowSide, EscrowStatus, SafetyDeposit, SecretBytes, SwapOrder,
        SwapStatus, TokenId,
    };
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Deterministic ticking clock for tests.
    struct TickingClock(AtomicU64);

    impl TimeSource for TickingClock {
        fn now_unix(&self) -> u64 {
            self.0.fetch_add(1, Ordering::SeqCst)
        }
    }

    fn test_store() -> SwapStore<InMemoryKv, TickingClock> {
        SwapStore::new(InMemoryKv::new(), TickingClock(AtomicU64::new(1_000)))
    }

    fn sample_order() -> SwapOrder {
        let (secret, hash) = crosslock_engine::mint();
        SwapOrder {
            order_id: OrderId::random(),
            maker: "0x2222222222222222222222222222222222222222".to_string(),
            src_chain: ChainId::Base,
            dst_chain: ChainId::Stellar,
            src_token: TokenId::native(ChainId::Base),
            dst_token: TokenId::native(ChainId::Stellar),
            src_amount: 5_000u64.into(),
            dst_amount: 5_000u64.into(),
            secret,
            secret_hash: hash,
            timelock: crosslock_engine::default_schedule(),
            safety_deposit: SafetyDeposit::default(),
            fill_parts: Vec::new(),
        }
    }

    fn escrow(side: EscrowSide) -> EscrowRecord {
        EscrowRecord {
            side,
            chain: ChainId::Base,
            address: "0xfeed:7".to_string(),
            secret_hash: [0u8; 32],
            deploy_time: 9_000,
            tx_hash: "0x123".to_string(),
            explorer_url: None,
            status: EscrowStatus::Locked,
        }
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let store = test_store();
        let state = SwapState::new(sample_order(), 500);
        store.put(&state).await.unwrap();

        let loaded = store.get(state.order.order_id).await.unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = test_store();
        assert!(store.get(OrderId::random()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_status_legal() {
        let store = test_store();
        let state = SwapState::new(sample_order(), 500);
        let id = state.order.order_id;
        store.put(&state).await.unwrap();

        let updated = store
            .update_status(
                id,
                Transition::with_escrow(SwapStatus::SrcDeployed, escrow(EscrowSide::Src)),
            )
            .await
            .unwrap();
        assert_eq!(updated.status, SwapStatus::SrcDeployed);
        assert!(updated.src_escrow.is_some());

        // Persisted, not just returned
        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SwapStatus::SrcDeployed);
    }

    #[tokio::test]
    async fn test_update_status_illegal_leaves_store_unchanged() {
        let store = test_store();
        let state = SwapState::new(sample_order(), 500);
        let id = state.order.order_id;
        store.put(&state).await.unwrap();

        let err = store
            .update_status(id, Transition::to(SwapStatus::Completed))
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::IllegalTransition { .. }));

        let loaded = store.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SwapStatus::Created);
        assert_eq!(loaded.updated_at, 500);
    }

    #[tokio::test]
    async fn test_update_rejects_status_change() {
        let store = test_store();
        let state = SwapState::new(sample_order(), 500);
        let id = state.order.order_id;
        store.put(&state).await.unwrap();

        let err = store
            .update(id, |s| {
                s.status = SwapStatus::Completed;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = test_store();

        let older = SwapState::new(sample_order(), 100);
        let newer = SwapState::new(sample_order(), 200);
        store.put(&older).await.unwrap();
        store.put(&newer).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].order.order_id, newer.order.order_id);
        assert_eq!(all[1].order.order_id, older.order.order_id);
    }

    #[tokio::test]
    async fn test_same_order_mutations_linearised() {
        let store = Arc::new(test_store());
        let state = SwapState::new(sample_order(), 100);
        let id = state.order.order_id;
        store.put(&state).await.unwrap();

        // Race two identical CREATED -> SRC_DEPLOYED transitions.
        // Exactly one may win; the loser must see IllegalTransition.
        let s1 = store.clone();
        let s2 = store.clone();
        let t1 = tokio::spawn(async move {
            s1.update_status(
                id,
                Transition::with_escrow(SwapStatus::SrcDeployed, escrow(EscrowSide::Src)),
            )
            .await
        });
        let t2 = tokio::spawn(async move {
            s2.update_status(
                id,
                Transition::with_escrow(SwapStatus::SrcDeployed, escrow(EscrowSide::Src)),
            )
            .await
        });

        let results = [t1.await.unwrap(), t2.await.unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
    }
}
