//! The resource pool: acquire/release/shutdown state machine.
//!
//! All mutable state lives behind one mutex (`PoolState`), paired with
//! one [`Notify`] for parked acquirers. A single lock keeps the
//! idle/in-use bookkeeping free of lock-ordering hazards; the lock is
//! never held across an `.await`.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{MIN_RECLAIM_INTERVAL, PoolConfig};
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::reclaim;
use crate::resource::{Factory, Resource};

/// An idle pool entry, queued FIFO.
struct IdleEntry<R> {
    id: u64,
    resource: R,
}

/// Running counters, kept under the pool lock.
#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    acquisitions: u64,
    releases: u64,
    created: u64,
    closed: u64,
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Successful acquisitions handed out.
    pub acquisitions: u64,
    /// Borrows returned through the tracked release path.
    pub releases: u64,
    /// Resources created by the factory for this pool.
    pub created: u64,
    /// Resources closed by the pool.
    pub closed: u64,
    /// Resources currently idle.
    pub idle: usize,
    /// Resources currently borrowed.
    pub in_use: usize,
}

/// Mutable pool state. Invariant outside of an operation:
/// `count == idle.len() + in_use.len()` and `count <= max_size`
/// (except transiently after the cap is lowered below `count`).
struct PoolState<R> {
    idle: VecDeque<IdleEntry<R>>,
    in_use: HashSet<u64>,
    count: usize,
    /// Acquire attempts since the watcher's last tick.
    requests_since_tick: u64,
    next_id: u64,
    max_size: usize,
    reclaim_interval: Duration,
    shut_down: bool,
    stats: Counters,
}

/// Outcome of one pass over the acquire predicate.
enum Claim<R> {
    /// An idle resource was dequeued and recorded as borrowed.
    Reuse { id: u64, resource: R },
    /// A slot was reserved; the factory still has to fill it.
    Fresh { id: u64 },
}

/// Shared pool internals; handles and the watcher hold references.
pub(crate) struct PoolCore<F: Factory> {
    factory: F,
    state: Mutex<PoolState<F::Resource>>,
    /// Parks acquirers waiting for a release, shutdown, or new headroom.
    available: Notify,
    /// Nudges the reclaim watcher out of its sleep.
    reclaim_nudge: Arc<Notify>,
    cancel: CancellationToken,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl<F: Factory> PoolCore<F> {
    /// One pass over the acquire predicate, entirely under the lock.
    fn try_claim(&self) -> Result<Option<Claim<F::Resource>>> {
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(Error::unavailable("pool is shut down"));
        }
        // Every pass counts as demand, retries after a wake included.
        state.requests_since_tick += 1;
        if let Some(entry) = state.idle.pop_front() {
            state.in_use.insert(entry.id);
            state.stats.acquisitions += 1;
            return Ok(Some(Claim::Reuse {
                id: entry.id,
                resource: entry.resource,
            }));
        }
        if state.count < state.max_size {
            state.count += 1;
            let id = state.next_id;
            state.next_id += 1;
            return Ok(Some(Claim::Fresh { id }));
        }
        Ok(None)
    }

    /// Take a returned borrow back into the pool.
    ///
    /// Never waits for capacity. An id the pool does not currently
    /// track (shut down since the borrow, or a handle it never issued)
    /// means the resource is closed directly with no bookkeeping
    /// change.
    pub(crate) async fn return_resource(&self, id: u64, mut resource: F::Resource) {
        let tracked = self.state.lock().in_use.remove(&id);
        if !tracked {
            tracing::debug!(id, "closing untracked returned resource");
            close_quietly(&mut resource, "untracked return").await;
            return;
        }

        let open = resource.is_open();
        let mut resource = Some(resource);
        let discarded: Option<&'static str> = {
            let mut state = self.state.lock();
            state.stats.releases += 1;
            if state.shut_down {
                // Shutdown won the race since we left `in_use`; it has
                // already zeroed the count.
                state.stats.closed += 1;
                Some("pool shut down")
            } else if open {
                if let Some(resource) = resource.take() {
                    state.idle.push_back(IdleEntry { id, resource });
                }
                None
            } else {
                state.count -= 1;
                state.stats.closed += 1;
                Some("no longer open")
            }
        };

        match discarded {
            None => tracing::debug!(id, "returned resource to idle queue"),
            Some(reason) => {
                if let Some(mut resource) = resource.take() {
                    tracing::debug!(id, reason, "discarding returned resource");
                    close_quietly(&mut resource, reason).await;
                }
            }
        }
        // A requeued resource or a freed slot can unblock a waiter.
        self.available.notify_one();
    }

    /// Drop the pool's claim on a borrowed entry without closing it.
    pub(crate) fn forget(&self, id: u64) {
        {
            let mut state = self.state.lock();
            if state.in_use.remove(&id) {
                state.count -= 1;
            }
        }
        self.available.notify_one();
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }

    pub(crate) fn current_reclaim_interval(&self) -> Duration {
        self.state.lock().reclaim_interval
    }

    /// One watcher tick: evict the idle head when demand this tick ran
    /// behind the idle surplus. The demand counter resets either way.
    pub(crate) fn take_reclaimable(&self) -> Option<F::Resource> {
        let mut state = self.state.lock();
        let surplus = state.requests_since_tick < state.idle.len() as u64;
        state.requests_since_tick = 0;
        if !surplus {
            return None;
        }
        let entry = state.idle.pop_front()?;
        state.count -= 1;
        state.stats.closed += 1;
        Some(entry.resource)
    }
}

/// Rolls back a reserved allocation slot if the factory call fails or
/// is cancelled before the new resource is committed.
struct SlotGuard<'a, F: Factory> {
    core: &'a PoolCore<F>,
    armed: bool,
}

impl<F: Factory> SlotGuard<'_, F> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<F: Factory> Drop for SlotGuard<'_, F> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut state = self.core.state.lock();
            if !state.shut_down {
                state.count -= 1;
            }
        }
        // The freed slot may unblock a waiter.
        self.core.available.notify_one();
    }
}

/// Bounded pool of reusable resources.
///
/// Cheap to clone; clones share the same pool. Construction spawns the
/// reclaim watcher, so a pool must be created inside a tokio runtime.
/// Call [`shutdown`](Pool::shutdown) when done: merely dropping every
/// clone stops the watcher but abandons graceful teardown of idle
/// resources.
pub struct Pool<F: Factory> {
    core: Arc<PoolCore<F>>,
}

impl<F: Factory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<F: Factory> fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("stats", &self.stats())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl<F: Factory> Pool<F> {
    /// Create a pool and start its reclaim watcher.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if `config` is invalid.
    pub fn new(factory: F, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let core = Arc::new(PoolCore {
            factory,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                in_use: HashSet::new(),
                count: 0,
                requests_since_tick: 0,
                next_id: 0,
                max_size: config.max_size,
                reclaim_interval: config.reclaim_interval,
                shut_down: false,
                stats: Counters::default(),
            }),
            available: Notify::new(),
            reclaim_nudge: Arc::new(Notify::new()),
            cancel: CancellationToken::new(),
            watcher: Mutex::new(None),
        });
        let watcher = reclaim::spawn(
            Arc::downgrade(&core),
            Arc::clone(&core.reclaim_nudge),
            core.cancel.clone(),
        );
        *core.watcher.lock() = Some(watcher);
        Ok(Self { core })
    }

    /// Acquire a resource, waiting if the pool is at capacity.
    ///
    /// Hands out the head of the idle queue when one exists, creates a
    /// new resource when under the cap, and otherwise parks until a
    /// release, a raised cap, or shutdown. Dropping the returned
    /// future mid-wait leaks nothing.
    ///
    /// # Errors
    /// [`Error::Unavailable`] if the pool is (or becomes) shut down;
    /// [`Error::Connect`] if the factory fails. Factory failures are
    /// not retried.
    pub async fn acquire(&self) -> Result<Handle<F>> {
        loop {
            // Park-interest is registered before the state check so a
            // release landing in between cannot be missed.
            let mut permit = pin!(self.core.available.notified());
            permit.as_mut().enable();

            match self.core.try_claim()? {
                Some(Claim::Reuse { id, resource }) => {
                    tracing::debug!(id, "reusing idle resource");
                    return Ok(Handle::new(Arc::clone(&self.core), id, resource));
                }
                Some(Claim::Fresh { id }) => return self.connect_fresh(id).await,
                None => permit.await,
            }
        }
    }

    /// [`acquire`](Pool::acquire), but give up after `limit`.
    ///
    /// # Errors
    /// [`Error::Unavailable`] when the limit elapses first, plus
    /// everything `acquire` can return.
    pub async fn acquire_timeout(&self, limit: Duration) -> Result<Handle<F>> {
        match tokio::time::timeout(limit, self.acquire()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::unavailable("timed out waiting for a resource")),
        }
    }

    /// Fill a reserved slot through the factory.
    async fn connect_fresh(&self, id: u64) -> Result<Handle<F>> {
        let core = &self.core;
        let slot = SlotGuard {
            core: &*self.core,
            armed: true,
        };

        let resource = match core.factory.create().await {
            Ok(resource) => resource,
            Err(error) => {
                tracing::warn!(error = %error, "factory failed to produce a resource");
                // SlotGuard rolls the reservation back and wakes a waiter.
                return Err(error);
            }
        };

        let entered = {
            let mut state = core.state.lock();
            state.stats.created += 1;
            if state.shut_down {
                state.stats.closed += 1;
                false
            } else {
                state.in_use.insert(id);
                state.stats.acquisitions += 1;
                true
            }
        };
        slot.disarm();

        if entered {
            tracing::debug!(id, "created new resource");
            Ok(Handle::new(Arc::clone(core), id, resource))
        } else {
            // Shutdown won the race while we were connecting; the
            // resource never entered the pool.
            let mut resource = resource;
            close_quietly(&mut resource, "pool shut down during connect").await;
            Err(Error::unavailable("pool is shut down"))
        }
    }

    /// Return a borrowed resource to the pool.
    ///
    /// Equivalent to [`Handle::release`], with one addition: a handle
    /// issued by a different pool is recognized and its resource is
    /// closed outright, without touching this pool's bookkeeping.
    pub async fn release(&self, handle: Handle<F>) {
        if handle.is_from(&self.core) {
            handle.release().await;
        } else if let Some((id, mut resource)) = handle.take_parts() {
            tracing::debug!(id, "closing resource from a foreign handle");
            close_quietly(&mut resource, "foreign handle").await;
        }
    }

    /// Shut the pool down. Idempotent, safe to call from any task,
    /// including while other tasks are mid-`acquire`.
    ///
    /// Wakes every parked acquirer (they observe `Unavailable`), stops
    /// the watcher, and closes every idle resource. Resources that are
    /// mid-borrow are closed when their handles are released or
    /// dropped.
    pub async fn shutdown(&self) {
        let drained = {
            let mut state = self.core.state.lock();
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            state.in_use.clear();
            state.count = 0;
            state.stats.closed += state.idle.len() as u64;
            std::mem::take(&mut state.idle)
        };
        tracing::debug!(draining = drained.len(), "shutting pool down");
        self.core.cancel.cancel();
        self.core.available.notify_waiters();

        for mut entry in drained {
            close_quietly(&mut entry.resource, "pool shutdown").await;
        }

        let watcher = self.core.watcher.lock().take();
        if let Some(watcher) = watcher {
            let _ = watcher.await;
        }
    }

    /// Number of resources currently allocated (idle plus borrowed).
    pub fn size(&self) -> usize {
        self.core.state.lock().count
    }

    /// Whether [`shutdown`](Pool::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.core.is_shut_down()
    }

    /// Current allocation cap.
    pub fn max_size(&self) -> usize {
        self.core.state.lock().max_size
    }

    /// Change the allocation cap.
    ///
    /// Takes effect for future allocations only: lowering the cap does
    /// not close existing excess resources. Raising it wakes parked
    /// acquirers so they can use the new headroom.
    ///
    /// # Errors
    /// [`Error::Configuration`] if `max_size < 1`; the previous cap is
    /// left unchanged.
    pub fn set_max_size(&self, max_size: usize) -> Result<()> {
        if max_size < 1 {
            return Err(Error::configuration("max_size must be at least 1"));
        }
        let raised = {
            let mut state = self.core.state.lock();
            let raised = max_size > state.max_size;
            state.max_size = max_size;
            raised
        };
        if raised {
            self.core.available.notify_waiters();
        }
        Ok(())
    }

    /// Current reclaim watcher period.
    pub fn reclaim_interval(&self) -> Duration {
        self.core.state.lock().reclaim_interval
    }

    /// Change the reclaim watcher period.
    ///
    /// The watcher is woken immediately so the new period applies on
    /// its next tick rather than after the stale one elapses.
    ///
    /// # Errors
    /// [`Error::Configuration`] if `interval` is shorter than
    /// [`MIN_RECLAIM_INTERVAL`]; the previous period is left unchanged.
    pub fn set_reclaim_interval(&self, interval: Duration) -> Result<()> {
        if interval < MIN_RECLAIM_INTERVAL {
            return Err(Error::configuration(format!(
                "reclaim_interval must be at least {}ms",
                MIN_RECLAIM_INTERVAL.as_millis()
            )));
        }
        self.core.state.lock().reclaim_interval = interval;
        self.core.reclaim_nudge.notify_one();
        Ok(())
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        let state = self.core.state.lock();
        PoolStats {
            acquisitions: state.stats.acquisitions,
            releases: state.stats.releases,
            created: state.stats.created,
            closed: state.stats.closed,
            idle: state.idle.len(),
            in_use: state.in_use.len(),
        }
    }
}

/// Close a resource, logging and swallowing any teardown error.
/// Bookkeeping integrity outweighs reporting teardown noise.
pub(crate) async fn close_quietly<R: Resource>(resource: &mut R, context: &'static str) {
    if let Err(error) = resource.close().await {
        tracing::warn!(error = %error, context, "resource did not close cleanly");
    }
}
