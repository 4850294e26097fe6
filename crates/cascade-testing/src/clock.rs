use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cascade_core::{ScheduledTask, Scheduler, SchedulingError, TimerId};

/// Deterministic scheduler driven by [`advance`](ManualScheduler::advance).
///
/// Time starts at zero and only moves when advanced. Due tasks run in due-time
/// order, ties in scheduling order, on the thread calling `advance`. Tasks may
/// schedule further tasks; those that fall due inside the same advance run in
/// it too.
pub struct ManualScheduler {
    state: Mutex<ClockState>,
}

struct ClockState {
    now: Duration,
    seq: u64,
    queue: Vec<Entry>,
    refuse: Option<SchedulingError>,
}

struct Entry {
    due: Duration,
    seq: u64,
    id: TimerId,
    task: ScheduledTask,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ClockState {
                now: Duration::ZERO,
                seq: 0,
                queue: Vec::new(),
                refuse: None,
            }),
        }
    }

    pub fn now(&self) -> Duration {
        self.lock().now
    }

    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Due time of the earliest pending task.
    pub fn next_due(&self) -> Option<Duration> {
        self.lock().queue.iter().map(|e| e.due).min()
    }

    /// Move the clock forward, running everything that falls due.
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.now() + by;
        let mut ran = 0;
        loop {
            let entry = {
                let mut state = self.lock();
                let next = state
                    .queue
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.due <= target)
                    .min_by_key(|(_, e)| (e.due, e.seq))
                    .map(|(i, _)| i);
                match next {
                    Some(i) => {
                        let entry = state.queue.remove(i);
                        state.now = entry.due;
                        entry
                    }
                    None => {
                        state.now = target;
                        return ran;
                    }
                }
            };
            tracing::trace!(timer = %entry.id, due = ?entry.due, "manual clock running task");
            (entry.task)();
            ran += 1;
        }
    }

    /// Make every following `schedule` call fail with `error`.
    pub fn refuse_with(&self, error: SchedulingError) {
        self.lock().refuse = Some(error);
    }

    pub fn accept(&self) {
        self.lock().refuse = None;
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: ScheduledTask) -> Result<TimerId, SchedulingError> {
        let mut state = self.lock();
        if let Some(error) = &state.refuse {
            return Err(error.clone());
        }
        let id = TimerId::new();
        let due = state.now + delay;
        state.seq += 1;
        let seq = state.seq;
        state.queue.push(Entry { due, seq, id, task });
        Ok(id)
    }

    fn cancel(&self, timer: TimerId) -> bool {
        let mut state = self.lock();
        let before = state.queue.len();
        state.queue.retain(|e| e.id != timer);
        state.queue.len() != before
    }

    fn is_pending(&self, timer: TimerId) -> bool {
        self.lock().queue.iter().any(|e| e.id == timer)
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("pending", &state.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn push(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> ScheduledTask {
        let log = Arc::clone(log);
        Box::new(move || log.lock().unwrap().push(label))
    }

    #[test]
    fn test_runs_in_due_order() {
        let clock = ManualScheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        clock.schedule(Duration::from_secs(3), push(&log, "c")).unwrap();
        clock.schedule(Duration::from_secs(1), push(&log, "a")).unwrap();
        clock.schedule(Duration::from_secs(1), push(&log, "b")).unwrap();
        assert_eq!(clock.next_due(), Some(Duration::from_secs(1)));

        assert_eq!(clock.advance(Duration::from_millis(999)), 0);
        assert_eq!(clock.advance(Duration::from_secs(2)), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(clock.now(), Duration::from_millis(2999));

        assert_eq!(clock.advance(Duration::from_millis(1)), 1);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cancel_and_refuse() {
        let clock = ManualScheduler::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let id = clock.schedule(Duration::from_secs(1), push(&log, "x")).unwrap();
        assert!(clock.is_pending(id));
        assert!(clock.cancel(id));
        assert!(!clock.cancel(id));
        assert_eq!(clock.advance(Duration::from_secs(5)), 0);

        clock.refuse_with(SchedulingError::rejected_delay(Duration::from_secs(1)));
        assert!(clock.schedule(Duration::from_secs(1), push(&log, "y")).is_err());
        clock.accept();
        assert!(clock.schedule(Duration::from_secs(1), push(&log, "y")).is_ok());
    }
}
