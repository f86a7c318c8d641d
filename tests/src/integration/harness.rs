//! Shared fixture: a resolver wired to two mock chains with a common
//! operation journal, an in-memory store, and a compressed schedule.

use crosslock_chains::{AdapterRegistry, MockChainAdapter, OpJournal};
use crosslock_resolver::{CreateSwapRequest, ResolverConfig, ResolverService};
use crosslock_store::{InMemoryKv, SwapStore, SystemTimeSource};
use crosslock_types::{Amount, ChainId, TokenId};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

pub type TestResolver = ResolverService<InMemoryKv, SystemTimeSource>;

pub struct Harness {
    pub resolver: TestResolver,
    pub store: Arc<SwapStore<InMemoryKv, SystemTimeSource>>,
    pub src: Arc<MockChainAdapter>,
    pub dst: Arc<MockChainAdapter>,
    pub journal: OpJournal,
}

impl Harness {
    /// Resolver over mock Base (src) and Stellar (dst) chains.
    pub fn new() -> Self {
        let journal: OpJournal = Arc::new(RwLock::new(Vec::new()));
        let src =
            Arc::new(MockChainAdapter::new(ChainId::Base).with_journal(journal.clone()));
        let dst =
            Arc::new(MockChainAdapter::new(ChainId::Stellar).with_journal(journal.clone()));

        let mut registry = AdapterRegistry::new();
        registry.register(src.clone());
        registry.register(dst.clone());

        let store = Arc::new(SwapStore::new(InMemoryKv::new(), SystemTimeSource));
        let resolver = ResolverService::new(
            store.clone(),
            Arc::new(registry),
            ResolverConfig::for_testing(),
        );

        Self {
            resolver,
            store,
            src,
            dst,
            journal,
        }
    }

    /// A plain native-for-native request.
    pub fn request(&self) -> CreateSwapRequest {
        CreateSwapRequest {
            src_chain: ChainId::Base,
            dst_chain: ChainId::Stellar,
            src_token: TokenId::native(ChainId::Base),
            dst_token: TokenId::native(ChainId::Stellar),
            src_amount: Amount::from(1_000_000_000_000_000u64),
            dst_amount: Amount::from(1_000_000_000_000_000u64),
            maker: "GMAKER".to_string(),
        }
    }

    /// Keep both mock chain clocks ticking so timelock waits resolve.
    pub fn drive_clocks(&self) -> tokio::task::JoinHandle<()> {
        let src = self.src.clone();
        let dst = self.dst.clone();
        tokio::spawn(async move {
            for _ in 0..4_000 {
                tokio::time::sleep(Duration::from_millis(5)).await;
                src.advance_time(10);
                dst.advance_time(10);
            }
        })
    }
}
