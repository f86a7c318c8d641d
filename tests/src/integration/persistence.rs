//! Store round-trips against the durable backend.

use crosslock_engine::state_machine::Transition;
use crosslock_engine::{default_schedule, mint};
use crosslock_store::{RocksDbConfig, RocksKv, SwapStore, SystemTimeSource};
use crosslock_types::{
    Amount, ChainId, EscrowRecord, EscrowSide, EscrowStatus, OrderId, SafetyDeposit, SwapOrder,
    SwapState, SwapStatus, TokenId,
};

fn sample_state() -> SwapState {
    let (secret, secret_hash) = mint();
    let order = SwapOrder {
        order_id: OrderId::random(),
        maker: "0x9999999999999999999999999999999999999999".to_string(),
        src_chain: ChainId::Arbitrum,
        dst_chain: ChainId::Ton,
        src_token: TokenId::from("0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"),
        dst_token: TokenId::native(ChainId::Ton),
        src_amount: Amount::from_dec_str("1000000000000000").unwrap(),
        dst_amount: Amount::MAX,
        secret,
        secret_hash,
        timelock: default_schedule(),
        safety_deposit: SafetyDeposit {
            src: Amount::from(5u64),
            dst: Amount::from(7u64),
        },
        fill_parts: Vec::new(),
    };
    SwapState::new(order, 1_700_000_000)
}

fn escrow(side: EscrowSide, secret_hash: [u8; 32]) -> EscrowRecord {
    EscrowRecord {
        side,
        chain: ChainId::Arbitrum,
        address: "0x0000000000000000000000000000000000000aaa:0011".to_string(),
        secret_hash,
        deploy_time: 1_700_000_100,
        tx_hash: "0xdeadbeef".to_string(),
        explorer_url: Some("https://arbiscan.io/tx/0xdeadbeef".to_string()),
        status: EscrowStatus::Locked,
    }
}

/// Round-trip: persist, reopen the database, reload, compare equal —
/// byte-for-byte on 256-bit numbers, canonical on hex fields.
#[tokio::test]
async fn rocksdb_round_trip_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_string_lossy().to_string();
    let state = sample_state();
    let id = state.order.order_id;

    {
        let store = SwapStore::new(
            RocksKv::open(RocksDbConfig::for_testing(path.clone())).unwrap(),
            SystemTimeSource,
        );
        store.put(&state).await.unwrap();
    }

    // Process restart: reopen and reload.
    let store = SwapStore::new(
        RocksKv::open(RocksDbConfig::for_testing(path)).unwrap(),
        SystemTimeSource,
    );
    let reloaded = store.get(id).await.unwrap().unwrap();
    assert_eq!(reloaded, state);
    assert_eq!(reloaded.order.dst_amount, Amount::MAX);
    assert_eq!(reloaded.order.secret, state.order.secret);
}

/// Status transitions persisted through RocksDB survive restart with
/// escrow metadata intact.
#[tokio::test]
async fn rocksdb_transition_durable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_string_lossy().to_string();
    let state = sample_state();
    let id = state.order.order_id;
    let hash = state.order.secret_hash;

    {
        let store = SwapStore::new(
            RocksKv::open(RocksDbConfig::for_testing(path.clone())).unwrap(),
            SystemTimeSource,
        );
        store.put(&state).await.unwrap();
        store
            .update_status(
                id,
                Transition::with_escrow(SwapStatus::SrcDeployed, escrow(EscrowSide::Src, hash)),
            )
            .await
            .unwrap();
    }

    let store = SwapStore::new(
        RocksKv::open(RocksDbConfig::for_testing(path)).unwrap(),
        SystemTimeSource,
    );
    let reloaded = store.get(id).await.unwrap().unwrap();
    assert_eq!(reloaded.status, SwapStatus::SrcDeployed);
    let src = reloaded.src_escrow.unwrap();
    assert_eq!(src.secret_hash, hash);
    assert_eq!(src.tx_hash, "0xdeadbeef");
}

/// `list` ordering holds across backends.
#[tokio::test]
async fn rocksdb_list_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = SwapStore::new(
        RocksKv::open(RocksDbConfig::for_testing(
            dir.path().to_string_lossy().to_string(),
        ))
        .unwrap(),
        SystemTimeSource,
    );

    let mut older = sample_state();
    older.created_at = 100;
    let mut newer = sample_state();
    newer.created_at = 200;

    store.put(&older).await.unwrap();
    store.put(&newer).await.unwrap();

    let all = store.list().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].order.order_id, newer.order.order_id);
}
