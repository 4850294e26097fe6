use std::sync::{Arc, Mutex, PoisonError};

use cascade_core::{CascadeError, DataChangeCallback, ObserverSet, Readings, Sensor, SubscriptionId};

/// A sensor whose readings are set by the test.
///
/// `set` updates the readings first, then notifies observers on the calling
/// thread, so an observer querying the sensor sees the new values.
pub struct FakeSensor {
    name: String,
    readings: Mutex<Readings>,
    observers: ObserverSet,
}

impl FakeSensor {
    pub fn new(name: impl Into<String>, initial: Readings) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            readings: Mutex::new(initial),
            observers: ObserverSet::new(),
        })
    }

    pub fn distance(name: impl Into<String>, distance: f64) -> Arc<Self> {
        Self::new(name, Readings::Distance { distance })
    }

    pub fn movement(name: impl Into<String>, movement: bool) -> Arc<Self> {
        Self::new(name, Readings::Movement { movement })
    }

    pub fn color(name: impl Into<String>, red: f64, green: f64, blue: f64) -> Arc<Self> {
        Self::new(name, Readings::Color { red, green, blue })
    }

    /// Replace the readings and notify. Returns the observers' failures.
    pub fn set(&self, readings: Readings) -> Vec<CascadeError> {
        let old = {
            let mut current = self.readings.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, readings)
        };
        self.observers.notify(&readings, &old)
    }

    pub fn set_distance(&self, distance: f64) -> Vec<CascadeError> {
        self.set(Readings::Distance { distance })
    }

    pub fn set_movement(&self, movement: bool) -> Vec<CascadeError> {
        self.set(Readings::Movement { movement })
    }

    pub fn set_color(&self, red: f64, green: f64, blue: f64) -> Vec<CascadeError> {
        self.set(Readings::Color { red, green, blue })
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl Sensor for FakeSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn readings(&self) -> Readings {
        *self.readings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bind(&self, on_change: DataChangeCallback) -> SubscriptionId {
        self.observers.bind(on_change)
    }

    fn unbind(&self, subscription: SubscriptionId) {
        self.observers.unbind(subscription);
    }
}
