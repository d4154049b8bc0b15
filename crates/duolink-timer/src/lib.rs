//! Keyed, cancellable one-shot timeouts for Duolink.
//!
//! A [`TimeoutSupervisor`] runs a deferred action once after a delay unless
//! the returned [`TimeoutHandle`] is cancelled first. Each timeout is a
//! small Tokio task that sleeps and then calls the action with its key and
//! [`TimerId`].
//!
//! # Serializing with the owner's state
//!
//! The action runs on the timer task, outside whatever lock guards the
//! owner's state. Keep it tiny (post an event on a channel) and let the
//! owner apply the event under its own lock, comparing the [`TimerId`] with
//! the one it still holds:
//!
//! ```ignore
//! let handle = timers.schedule(code.clone(), delay, move |code, id| {
//!     let _ = tx.send(Expired { code, id });
//! });
//! // later, under the owner's lock:
//! if room.pending.as_ref().map(TimeoutHandle::id) == Some(event.id) { /* expire */ }
//! ```
//!
//! A cancel that wins the lock clears the stored handle, so an event that
//! was already in flight no longer matches and is ignored.

use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identifies one scheduled timeout. Unique per supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// A pending (or already fired) timeout.
///
/// Dropping the handle does **not** cancel the timeout; cancellation is
/// always explicit through [`TimeoutSupervisor::cancel`].
#[derive(Debug)]
pub struct TimeoutHandle<K> {
    id: TimerId,
    key: K,
    task: JoinHandle<()>,
}

impl<K> TimeoutHandle<K> {
    /// The timer's id, as passed to the action when it fires.
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Returns `true` once the action has run or the task was aborted.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters kept by a supervisor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeoutMetrics {
    /// Timeouts scheduled so far.
    pub scheduled: u64,
    /// Timeouts cancelled before they fired.
    pub cancelled: u64,
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// Schedules and cancels one-shot deferred actions keyed by `K`.
///
/// Not thread-safe by itself: it lives inside the owner's state, behind the
/// same lock as everything the actions eventually touch.
pub struct TimeoutSupervisor<K> {
    next_id: u64,
    metrics: TimeoutMetrics,
    _key: PhantomData<fn() -> K>,
}

impl<K> TimeoutSupervisor<K>
where
    K: Clone + fmt::Debug + Send + 'static,
{
    /// Creates a supervisor with no pending timeouts.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            metrics: TimeoutMetrics::default(),
            _key: PhantomData,
        }
    }

    /// Runs `action(key, id)` once after `delay`, unless cancelled first.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule<F>(
        &mut self,
        key: K,
        delay: Duration,
        action: F,
    ) -> TimeoutHandle<K>
    where
        F: FnOnce(K, TimerId) + Send + 'static,
    {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.metrics.scheduled += 1;

        let task_key = key.clone();
        let task = tokio::spawn(async move {
            time::sleep(delay).await;
            trace!(%id, key = ?task_key, "timeout fired");
            action(task_key, id);
        });

        debug!(%id, ?key, delay_ms = delay.as_millis() as u64, "timeout scheduled");

        TimeoutHandle { id, key, task }
    }

    /// Prevents a pending timeout from firing.
    ///
    /// Returns `false` if it had already fired (or was already aborted), in
    /// which case this is a no-op.
    pub fn cancel(&mut self, handle: TimeoutHandle<K>) -> bool {
        if handle.task.is_finished() {
            return false;
        }
        handle.task.abort();
        self.metrics.cancelled += 1;
        debug!(id = %handle.id, key = ?handle.key, "timeout cancelled");
        true
    }

    /// Snapshot of the supervisor's counters.
    pub fn metrics(&self) -> TimeoutMetrics {
        self.metrics
    }
}

impl<K> Default for TimeoutSupervisor<K>
where
    K: Clone + fmt::Debug + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
