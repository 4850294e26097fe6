//! Event identity, construction records and the arena node.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::action::Action;
use crate::condition::Condition;
use crate::error::{CascadeError, Result};
use crate::sensor::{Sensor, SubscriptionId};

/// Opaque event identifier taken from the construction record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventId {
    Number(i64),
    Name(String),
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventId::Number(n) => fmt::Display::fmt(n, f),
            EventId::Name(s) => fmt::Display::fmt(s, f),
        }
    }
}

impl From<i64> for EventId {
    fn from(n: i64) -> Self {
        EventId::Number(n)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        EventId::Name(s.to_string())
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        EventId::Name(s)
    }
}

/// Declarative input for one event: `{id, name, delay}` with delay in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub name: String,
    #[serde(default)]
    pub delay: f64,
}

impl EventRecord {
    pub fn new(id: impl Into<EventId>, name: impl Into<String>, delay: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            delay,
        }
    }

    pub(crate) fn delay_duration(&self) -> Result<Duration> {
        // rejects negative, non-finite and overflowing values
        Duration::try_from_secs_f64(self.delay).map_err(|_| CascadeError::InvalidDelay {
            event: self.id.clone(),
            seconds: self.delay,
        })
    }
}

/// Index of an event inside its graph's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey(pub(crate) usize);

impl EventKey {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) type ActionList = SmallVec<[Arc<dyn Action>; 4]>;
pub(crate) type KeyList = SmallVec<[EventKey; 4]>;

/// One event in the arena. Edges are keys, never owning pointers.
pub(crate) struct EventNode {
    pub id: EventId,
    pub name: String,
    pub delay: Duration,
    pub next: Option<EventKey>,
    pub start_actions: ActionList,
    pub stop_actions: ActionList,
    pub sub_events: KeyList,
    pub start_listening: KeyList,
    pub stop_listening: KeyList,
    pub binding: Option<SensorBinding>,
}

impl EventNode {
    pub fn new(record: &EventRecord, delay: Duration, binding: Option<SensorBinding>) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            delay,
            next: None,
            start_actions: SmallVec::new(),
            stop_actions: SmallVec::new(),
            sub_events: SmallVec::new(),
            start_listening: SmallVec::new(),
            stop_listening: SmallVec::new(),
            binding,
        }
    }
}

/// Sensor side of a sensor-bound event.
pub(crate) struct SensorBinding {
    pub sensor: Arc<dyn Sensor>,
    state: Mutex<ListenState>,
}

/// Guarded per-instance state; the only mutable state of an event.
pub(crate) struct ListenState {
    pub condition: Condition,
    pub subscription: Option<SubscriptionId>,
    /// Bumped on every subscribe so late notifications from an earlier
    /// subscription period are recognised and dropped.
    pub generation: u64,
}

impl SensorBinding {
    pub fn new(sensor: Arc<dyn Sensor>, condition: Condition) -> Self {
        Self {
            sensor,
            state: Mutex::new(ListenState {
                condition,
                subscription: None,
                generation: 0,
            }),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, ListenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read-only view of an event's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct EventInfo {
    pub key: EventKey,
    pub id: EventId,
    pub name: String,
    pub delay: Duration,
    pub next: Option<EventKey>,
    pub sensor_bound: bool,
}
