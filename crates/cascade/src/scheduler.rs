//! Timer facility used for delayed continuations.
//!
//! The scheduler is injected into the graph builder; nothing in the engine
//! reaches for a process-wide timer. [`TokioScheduler`] is the production
//! implementation, tests substitute a manual clock.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::SchedulingError;

/// One-shot unit of work run when a timer expires.
pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

/// Identifies a scheduled task for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(Uuid);

impl TimerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Non-blocking, one-shot, cancellable delayed execution.
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`. Must return without waiting.
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> Result<TimerId, SchedulingError>;

    /// Cancel a pending task. Returns false if it already ran or is unknown.
    fn cancel(&self, timer: TimerId) -> bool;

    fn is_pending(&self, timer: TimerId) -> bool;
}

/// Scheduler backed by `tokio::time::sleep` tasks.
pub struct TokioScheduler {
    handle: Handle,
    pending: DashMap<TimerId, JoinHandle<()>>,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            pending: DashMap::new(),
        }
    }

    /// Use the runtime the caller is currently running on.
    pub fn current() -> Result<Self, SchedulingError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| SchedulingError::NoRuntime)
    }

    /// Number of timers that have not run yet.
    pub fn pending_count(&self) -> usize {
        self.prune();
        self.pending.len()
    }

    /// Cancel everything still outstanding.
    pub fn cancel_all(&self) {
        self.pending.retain(|_, task| {
            task.abort();
            false
        });
    }

    fn prune(&self) {
        self.pending.retain(|_, task| !task.is_finished());
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> Result<TimerId, SchedulingError> {
        self.prune();

        let id = TimerId::new();
        let started = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&started);
        let join = self.handle.spawn(async move {
            flag.store(true, Ordering::Release);
            tokio::time::sleep(delay).await;
            task();
        });

        // a shut-down runtime drops the task without ever polling it
        if join.is_finished() && !started.load(Ordering::Acquire) {
            tracing::warn!(timer = %id, ?delay, "timer runtime is shut down");
            return Err(SchedulingError::ShutDown);
        }
        self.pending.insert(id, join);

        tracing::debug!(timer = %id, ?delay, "timer scheduled");
        Ok(id)
    }

    fn cancel(&self, timer: TimerId) -> bool {
        match self.pending.remove(&timer) {
            Some((_, task)) if !task.is_finished() => {
                task.abort();
                tracing::debug!(timer = %timer, "timer cancelled");
                true
            }
            _ => false,
        }
    }

    fn is_pending(&self, timer: TimerId) -> bool {
        self.pending
            .get(&timer)
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("pending", &self.pending.len())
            .finish()
    }
}
