//! Sensor collaborator seam.
//!
//! The engine never looks at concrete sensor types. A sensor reports its
//! current state as [`Readings`], a capability-tagged snapshot, and accepts
//! data-change observers through [`Sensor::bind`] / [`Sensor::unbind`].
//!
//! [`ObserverSet`] is the subscriber registry sensor implementations are
//! expected to embed.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::condition::Variables;
use crate::error::CascadeError;

/// Snapshot of a sensor's readings, tagged by capability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Readings {
    Distance { distance: f64 },
    Movement { movement: bool },
    Color { red: f64, green: f64, blue: f64 },
}

impl Readings {
    /// Variables a condition may reference for this capability.
    pub fn variables(&self) -> Variables {
        match *self {
            Readings::Distance { distance } => Variables::new().with("distance", distance),
            Readings::Movement { movement } => Variables::new().with("movement", movement),
            Readings::Color { red, green, blue } => Variables::new()
                .with("red", red)
                .with("green", green)
                .with("blue", blue),
        }
    }

    pub fn capability(&self) -> &'static str {
        match self {
            Readings::Distance { .. } => "distance",
            Readings::Movement { .. } => "movement",
            Readings::Color { .. } => "color",
        }
    }
}

/// Handle returned by [`Sensor::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Data-change observer: called with `(new, old)` readings.
///
/// Failures are returned to the notifying sensor rather than panicking inside
/// its delivery context.
pub type DataChangeCallback =
    Arc<dyn Fn(&Readings, &Readings) -> Result<(), CascadeError> + Send + Sync>;

/// A sensor collaborator.
///
/// Implementations may deliver notifications from any thread.
pub trait Sensor: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Current readings, queried live at evaluation time.
    fn readings(&self) -> Readings;

    /// Register a data-change observer.
    fn bind(&self, on_change: DataChangeCallback) -> SubscriptionId;

    /// Remove an observer. Unknown ids are ignored.
    fn unbind(&self, subscription: SubscriptionId);
}

/// Concurrent registry of data-change observers.
#[derive(Default)]
pub struct ObserverSet {
    observers: DashMap<SubscriptionId, DataChangeCallback>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, on_change: DataChangeCallback) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.observers.insert(id, on_change);
        id
    }

    /// Returns whether the subscription was present.
    pub fn unbind(&self, subscription: SubscriptionId) -> bool {
        self.observers.remove(&subscription).is_some()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver a change to every observer bound at the time of the call.
    ///
    /// Observers run outside the registry's shard locks, so they may bind or
    /// unbind while being notified. Failures are logged and returned.
    pub fn notify(&self, new: &Readings, old: &Readings) -> Vec<CascadeError> {
        let snapshot: Vec<DataChangeCallback> = self
            .observers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut failures = Vec::new();
        for observer in snapshot {
            if let Err(err) = observer(new, old) {
                tracing::warn!(error = %err, "data-change observer failed");
                failures.push(err);
            }
        }
        failures
    }
}

impl fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_variables_by_capability() {
        let vars = Readings::Color {
            red: 1.0,
            green: 2.0,
            blue: 3.0,
        }
        .variables();
        assert_eq!(vars.names().collect::<Vec<_>>(), vec!["red", "green", "blue"]);
        assert_eq!(vars.get("green"), Some(Value::Number(2.0)));

        let vars = Readings::Movement { movement: true }.variables();
        assert_eq!(vars.get("movement"), Some(Value::Bool(true)));
        assert_eq!(vars.get("distance"), None);
    }

    #[test]
    fn test_readings_serde_tagged() {
        let json = serde_json::json!({"kind": "distance", "distance": 12.5});
        let readings: Readings = serde_json::from_value(json).unwrap();
        assert_eq!(readings, Readings::Distance { distance: 12.5 });
        assert_eq!(readings.capability(), "distance");
    }

    #[test]
    fn test_observer_can_unbind_itself_during_notify() {
        let set = Arc::new(ObserverSet::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let own_id = Arc::new(Mutex::new(None::<SubscriptionId>));

        let callback: DataChangeCallback = {
            let set = Arc::clone(&set);
            let calls = Arc::clone(&calls);
            let own_id = Arc::clone(&own_id);
            Arc::new(move |_new, _old| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = *own_id.lock().unwrap() {
                    set.unbind(id);
                }
                Ok(())
            })
        };
        *own_id.lock().unwrap() = Some(set.bind(callback));

        let reading = Readings::Distance { distance: 1.0 };
        assert!(set.notify(&reading, &reading).is_empty());
        assert!(set.notify(&reading, &reading).is_empty());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn test_notify_collects_failures() {
        let set = ObserverSet::new();
        set.bind(Arc::new(|_, _| {
            Err(CascadeError::UnknownEvent(3))
        }));
        set.bind(Arc::new(|_, _| Ok(())));

        let reading = Readings::Movement { movement: false };
        let failures = set.notify(&reading, &reading);
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], CascadeError::UnknownEvent(3)));
    }

    #[test]
    fn test_unbind_unknown_is_noop() {
        let set = ObserverSet::new();
        assert!(!set.unbind(SubscriptionId::new()));
    }
}
