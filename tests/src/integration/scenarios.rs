//! End-to-end swap scenarios against mock chains.

use super::harness::Harness;
use crosslock_resolver::ResolverApi;
use crosslock_types::{
    Amount, EscrowSide, EscrowStatus, SecretBytes, SwapError, SwapStatus,
};

/// S1: both adapters succeed; the swap completes with claim(dst)
/// recorded before claim(src) and the secret published on both chains.
#[tokio::test]
async fn s1_happy_path_completes() {
    let h = Harness::new();
    let state = h.resolver.create_swap(h.request()).await.unwrap();
    let id = state.order.order_id;

    let outcome = h.resolver.execute_swap(id).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.state.status, SwapStatus::Completed);

    // Claim order in the persisted journal: dst strictly first.
    let claims: Vec<_> = outcome
        .state
        .receipts
        .iter()
        .filter(|r| r.op == "claim")
        .collect();
    assert_eq!(claims.len(), 2);
    assert_eq!(claims[0].side, EscrowSide::Dst);
    assert_eq!(claims[1].side, EscrowSide::Src);

    // Same order on the wire.
    let ops = h.journal.read();
    let claim_ops: Vec<_> = ops.iter().filter(|r| r.op == "claim").collect();
    assert_eq!(claim_ops.len(), 2);
    assert_eq!(claim_ops[0].side, EscrowSide::Dst);
    assert_eq!(claim_ops[1].side, EscrowSide::Src);

    // Secret revealed on both chains, and it is the order secret.
    let revealed_dst = h.dst.revealed_secret(id, EscrowSide::Dst).unwrap();
    let revealed_src = h.src.revealed_secret(id, EscrowSide::Src).unwrap();
    assert_eq!(revealed_dst, outcome.state.order.secret);
    assert_eq!(revealed_src, outcome.state.order.secret);
}

/// S2: the destination lock reverts deterministically; after the
/// source cancellation deadline the swap ends CANCELLED with the src
/// refund journaled and no dst escrow recorded.
#[tokio::test]
async fn s2_dst_lock_fails_src_refunded() {
    let h = Harness::new();
    let state = h.resolver.create_swap(h.request()).await.unwrap();
    let id = state.order.order_id;

    h.dst.fail_next_lock(
        EscrowSide::Dst,
        SwapError::ContractReverted("bad-amount".into()),
    );

    let clocks = h.drive_clocks();
    let outcome = h.resolver.execute_swap(id).await.unwrap();
    clocks.abort();

    assert!(!outcome.success);
    assert_eq!(outcome.state.status, SwapStatus::Cancelled);
    assert_eq!(
        outcome.state.src_escrow.as_ref().unwrap().status,
        EscrowStatus::Refunded
    );
    assert!(outcome.state.dst_escrow.is_none());
    assert!(outcome
        .state
        .receipts
        .iter()
        .any(|r| r.op == "refund" && r.side == EscrowSide::Src));
    assert_eq!(h.dst.escrow_count(), 0);
}

/// S3: the source lock times out but the escrow exists on chain; the
/// order-id lookup reconciles, the swap transitions to SRC_DEPLOYED
/// and continues normally without a duplicate lock.
#[tokio::test]
async fn s3_receipt_indeterminate_reconciles() {
    let h = Harness::new();
    let state = h.resolver.create_swap(h.request()).await.unwrap();
    let id = state.order.order_id;

    h.src.fail_next_lock_after_escrow(
        EscrowSide::Src,
        SwapError::Timeout("rpc deadline exceeded".into()),
    );

    let outcome = h.resolver.execute_swap(id).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.state.status, SwapStatus::Completed);
    assert_eq!(h.src.escrow_count(), 1);
}

/// S4: a 4-part order executes parts {1,3}; the aggregate sits at
/// DST_DEPLOYED, parts 1 and 3 are withdrawn, 2 and 4 untouched, and
/// the filled source amount is exactly half.
#[tokio::test]
async fn s4_partial_fill_two_of_four() {
    let h = Harness::new();
    let mut request = h.request();
    request.src_amount = Amount::from(4_000u64);
    request.dst_amount = Amount::from(4_000u64);

    let state = h.resolver.create_partial_swap(request, 4).await.unwrap();
    let id = state.order.order_id;

    let outcome = h
        .resolver
        .execute_partial_swap(id, Some(vec![1, 3]))
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.state.status, SwapStatus::DstDeployed);

    assert!(outcome.state.part_state(1).unwrap().withdrawn);
    assert!(outcome.state.part_state(3).unwrap().withdrawn);
    assert_eq!(outcome.state.part_state(2).unwrap().status, SwapStatus::Created);
    assert_eq!(outcome.state.part_state(4).unwrap().status, SwapStatus::Created);

    let filled = outcome
        .state
        .parts
        .iter()
        .filter(|p| p.withdrawn)
        .filter_map(|p| outcome.state.order.part(p.part_id))
        .fold(Amount::zero(), |acc, fp| acc + fp.src_amount);
    assert_eq!(filled, Amount::from(2_000u64));

    // Four escrows on the wire: src+dst for each executed part.
    assert_eq!(h.src.escrow_count(), 2);
    assert_eq!(h.dst.escrow_count(), 2);
}

/// S5: an illegal transition is rejected and the store is unchanged.
#[tokio::test]
async fn s5_illegal_transition_guard() {
    let h = Harness::new();
    let state = h.resolver.create_swap(h.request()).await.unwrap();
    let id = state.order.order_id;

    let err = h
        .store
        .update_status(
            id,
            crosslock_engine::state_machine::Transition::to(SwapStatus::Completed),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SwapError::IllegalTransition { .. }));

    let reloaded = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, SwapStatus::Created);
    assert_eq!(reloaded, state);
}

/// S6: a claim with a wrong secret fails locally with InvalidSecret;
/// no transaction is submitted and the escrow is unchanged.
#[tokio::test]
async fn s6_wrong_secret_rejected_locally() {
    use crosslock_chains::ChainAdapter;

    let h = Harness::new();
    let state = h.resolver.create_swap(h.request()).await.unwrap();
    let order = state.order.clone();

    let escrow = h.src.lock(&order, EscrowSide::Src).await.unwrap();
    let journal_len_before = h.journal.read().len();

    let wrong = SecretBytes::new([0x5Au8; 32]);
    let err = h.src.claim(&escrow, &wrong).await.unwrap_err();
    assert!(matches!(err, SwapError::InvalidSecret));

    // No wire operation happened.
    assert_eq!(h.journal.read().len(), journal_len_before);

    // Escrow untouched.
    let current = h
        .src
        .get_escrow_by_order_id(order.order_id, EscrowSide::Src)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.status, EscrowStatus::Locked);
}

/// A swap that completed stays completed: re-execution is rejected and
/// nothing new lands on chain.
#[tokio::test]
async fn terminal_states_are_final() {
    let h = Harness::new();
    let state = h.resolver.create_swap(h.request()).await.unwrap();
    let id = state.order.order_id;

    h.resolver.execute_swap(id).await.unwrap();
    let escrows_after = h.src.escrow_count() + h.dst.escrow_count();

    assert!(h.resolver.execute_swap(id).await.is_err());
    assert!(h.resolver.cancel_swap(id).await.unwrap().success);
    assert_eq!(h.src.escrow_count() + h.dst.escrow_count(), escrows_after);

    let final_state = h.resolver.get(id).await.unwrap().unwrap();
    assert_eq!(final_state.status, SwapStatus::Completed);
}

/// Orders are independent: one order's failure leaves a concurrent
/// order's path untouched.
#[tokio::test]
async fn independent_orders_run_in_parallel() {
    let h = Harness::new();
    let state_a = h.resolver.create_swap(h.request()).await.unwrap();
    let state_b = h.resolver.create_swap(h.request()).await.unwrap();

    h.src.fail_next_lock(
        EscrowSide::Src,
        SwapError::ContractReverted("bad-amount".into()),
    );

    // Order A absorbs the programmed fault; order B completes.
    let outcome_a = h.resolver.execute_swap(state_a.order.order_id).await.unwrap();
    let outcome_b = h.resolver.execute_swap(state_b.order.order_id).await.unwrap();

    assert_eq!(outcome_a.state.status, SwapStatus::Failed);
    assert_eq!(outcome_b.state.status, SwapStatus::Completed);
}
