//! Background watcher that reclaims idle capacity.
//!
//! Additive-decrease policy: once per tick, if fewer acquire requests
//! arrived than there are idle resources, close exactly one idle
//! resource (the FIFO head). The request counter resets every tick
//! either way. Demand is measured per tick, not per-resource idle
//! duration, so a pool that is touched at least once per interval
//! keeps its capacity even without concurrent bursts.

use std::sync::{Arc, Weak};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::pool::{PoolCore, close_quietly};
use crate::resource::Factory;

/// Spawn the watcher task for a pool.
///
/// The watcher holds the pool weakly: if every clone of the pool is
/// dropped without a shutdown, the next wake-up finds nothing to
/// reclaim and the task exits on its own.
pub(crate) fn spawn<F: Factory>(
    core: Weak<PoolCore<F>>,
    nudge: Arc<Notify>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run(core, nudge, cancel))
}

async fn run<F: Factory>(core: Weak<PoolCore<F>>, nudge: Arc<Notify>, cancel: CancellationToken) {
    loop {
        // Hold the pool only long enough to read the current period,
        // so an abandoned pool can be freed while the watcher sleeps.
        let Some(interval) = core.upgrade().map(|pool| pool.current_reclaim_interval()) else {
            break;
        };

        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            // A configuration nudge re-checks state immediately rather
            // than letting the stale period run out.
            () = nudge.notified() => {}
            () = cancel.cancelled() => break,
        }

        let Some(pool) = core.upgrade() else { break };
        if pool.is_shut_down() {
            break;
        }
        if let Some(mut resource) = pool.take_reclaimable() {
            tracing::debug!("closing one idle resource past demand");
            close_quietly(&mut resource, "idle reclamation").await;
        }
    }
}
