//! # Swap Monitor
//!
//! Background sweep over non-terminal orders. After a crash or a long
//! outage the orchestrator's in-flight tasks are gone; the monitor is
//! what picks the survivors back up:
//!
//! - locked legs whose cancellation deadline has passed are pushed
//!   through `cancel_swap` (the timelock path needs no live executor),
//! - recorded escrows that no longer exist on their chain mark the
//!   swap FAILED as an integrity violation.
//!
//! The monitor never writes statuses itself; everything goes through
//! the orchestrator's own operations.

use crate::ports::ResolverApi;
use crate::service::ResolverService;
use crosslock_engine::timelock;
use crosslock_store::{KeyValueStore, TimeSource};
use crosslock_types::{EscrowRecord, EscrowStatus, SwapError, SwapState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Monitoring configuration.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// How often to sweep the store.
    pub poll_interval: Duration,
    /// Push expired locked legs through the refund path.
    pub auto_refund: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            auto_refund: true,
        }
    }
}

/// What one sweep did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Non-terminal orders examined.
    pub scanned: usize,
    /// Orders pushed through `cancel_swap`.
    pub refund_attempts: usize,
    /// Orders failed for chain/store disagreement.
    pub integrity_failures: usize,
}

/// Signals a running monitor to stop.
pub struct MonitorHandle {
    stop_tx: watch::Sender<bool>,
}

impl MonitorHandle {
    /// Stop the monitor loop after its current sweep.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Background sweeper over the swap store.
pub struct SwapMonitor<KV, TS>
where
    KV: KeyValueStore,
    TS: TimeSource,
{
    resolver: Arc<ResolverService<KV, TS>>,
    config: MonitorConfig,
    stop_rx: watch::Receiver<bool>,
}

impl<KV, TS> SwapMonitor<KV, TS>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource + 'static,
{
    /// Create a monitor and its stop handle.
    pub fn new(
        resolver: Arc<ResolverService<KV, TS>>,
        config: MonitorConfig,
    ) -> (Self, MonitorHandle) {
        let (stop_tx, stop_rx) = watch::channel(false);
        (
            Self {
                resolver,
                config,
                stop_rx,
            },
            MonitorHandle { stop_tx },
        )
    }

    /// Run sweeps until stopped.
    pub async fn run(mut self) {
        info!(interval = ?self.config.poll_interval, "swap monitor started");
        loop {
            if *self.stop_rx.borrow() {
                break;
            }
            match self.sweep().await {
                Ok(report) if report.refund_attempts + report.integrity_failures > 0 => {
                    info!(?report, "sweep acted");
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "sweep failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = self.stop_rx.changed() => {}
            }
        }
        info!("swap monitor stopped");
    }

    /// One pass over every non-terminal order. One order's failure
    /// never starves the rest of the pass.
    pub async fn sweep(&self) -> Result<SweepReport, SwapError> {
        let mut report = SweepReport::default();

        for state in self.resolver.store().list().await? {
            if state.status.is_terminal() {
                continue;
            }
            report.scanned += 1;

            if let Err(err) = self.sweep_order(&state, &mut report).await {
                warn!(order_id = %state.order.order_id, error = %err, "sweep skipped order");
            }
        }

        Ok(report)
    }

    async fn sweep_order(
        &self,
        state: &SwapState,
        report: &mut SweepReport,
    ) -> Result<(), SwapError> {
        if let Some(detail) = self.find_integrity_violation(state).await {
            warn!(order_id = %state.order.order_id, detail, "integrity violation");
            self.resolver
                .report_integrity_violation(state.order.order_id, detail)
                .await?;
            report.integrity_failures += 1;
            return Ok(());
        }

        if self.config.auto_refund && self.has_expired_lock(state).await {
            // cancel_swap refunds whatever is past its deadline and
            // closes the order once nothing is left locked.
            let outcome = self.resolver.cancel_swap(state.order.order_id).await?;
            if outcome.success || outcome.state.status.is_terminal() {
                info!(order_id = %state.order.order_id, "expired swap cancelled");
            }
            report.refund_attempts += 1;
        }

        Ok(())
    }

    /// A recorded locked escrow the chain has no record of means the
    /// store and the chain disagree.
    async fn find_integrity_violation(&self, state: &SwapState) -> Option<String> {
        for escrow in self.locked_escrows(state) {
            let Ok(adapter) = self.resolver.registry().get(escrow.chain) else {
                continue;
            };
            match adapter
                .get_escrow_by_order_id(state.order.order_id, escrow.side)
                .await
            {
                Ok(None) => {
                    return Some(format!(
                        "recorded {} escrow {} does not exist on {}",
                        escrow.side, escrow.address, escrow.chain
                    ));
                }
                // Transient failures are not evidence of anything.
                Ok(Some(_)) | Err(_) => {}
            }
        }
        None
    }

    /// Whether any locked leg is past its cancellation deadline on its
    /// own chain's clock.
    async fn has_expired_lock(&self, state: &SwapState) -> bool {
        for escrow in self.locked_escrows(state) {
            let Ok(adapter) = self.resolver.registry().get(escrow.chain) else {
                continue;
            };
            let Ok(chain_now) = adapter.block_timestamp().await else {
                continue;
            };
            if timelock::can_refund(&state.order.timelock, escrow, chain_now) {
                return true;
            }
        }
        false
    }

    fn locked_escrows<'a>(&self, state: &'a SwapState) -> impl Iterator<Item = &'a EscrowRecord> {
        state
            .src_escrow
            .iter()
            .chain(state.dst_escrow.iter())
            .filter(|e| e.status == EscrowStatus::Locked)
    }
}
