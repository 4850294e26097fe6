//! Concurrent notification delivery against a single sensor-bound event.
//!
//! Sensors may notify from any thread; these tests hammer one event from
//! several threads and check it still fires exactly once per subscription.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::SchedulingError;
use crate::{
    Action, DataChangeCallback, EventGraphBuilder, EventRecord, FireArgs, ObserverSet, Readings,
    ScheduledTask, Scheduler, Sensor, SubscriptionId, TimerId,
};

const THREADS: usize = 8;
const NOTIFICATIONS: usize = 200;

struct SharedDistance {
    value: Mutex<f64>,
    observers: ObserverSet,
}

impl SharedDistance {
    fn new(value: f64) -> Arc<Self> {
        Arc::new(Self {
            value: Mutex::new(value),
            observers: ObserverSet::new(),
        })
    }

    fn set(&self, value: f64) {
        let old = self.readings();
        *self.value.lock().unwrap() = value;
        self.observers.notify(&self.readings(), &old);
    }
}

impl Sensor for SharedDistance {
    fn name(&self) -> &str {
        "shared-distance"
    }

    fn readings(&self) -> Readings {
        Readings::Distance {
            distance: *self.value.lock().unwrap(),
        }
    }

    fn bind(&self, on_change: DataChangeCallback) -> SubscriptionId {
        self.observers.bind(on_change)
    }

    fn unbind(&self, subscription: SubscriptionId) {
        self.observers.unbind(subscription);
    }
}

struct Counter(AtomicUsize);

impl Action for Counter {
    fn fire(&self, _args: &FireArgs) -> anyhow::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        // widen the window between unsubscribe and the end of the cascade
        thread::sleep(Duration::from_micros(50));
        Ok(())
    }

    fn stop(&self, _args: &FireArgs) -> anyhow::Result<()> {
        Ok(())
    }
}

struct NoTimers;

impl Scheduler for NoTimers {
    fn schedule(&self, _delay: Duration, _task: ScheduledTask) -> Result<TimerId, SchedulingError> {
        Err(SchedulingError::ShutDown)
    }

    fn cancel(&self, _timer: TimerId) -> bool {
        false
    }

    fn is_pending(&self, _timer: TimerId) -> bool {
        false
    }
}

#[test]
fn test_racing_matches_fire_once() {
    let sensor = SharedDistance::new(5.0);
    let counter = Arc::new(Counter(AtomicUsize::new(0)));

    let mut builder = EventGraphBuilder::new(Arc::new(NoTimers));
    let near = builder
        .add_sensor_event_with_condition(
            EventRecord::new("near", "Near", 0.0),
            sensor.clone(),
            "distance < 10",
        )
        .unwrap();
    builder.add_action(near, counter.clone()).unwrap();
    let graph = builder.build();
    graph.start_listening(near).unwrap();

    // every notification would match; only one may get through
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let sensor = Arc::clone(&sensor);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..NOTIFICATIONS {
                    let reading = sensor.readings();
                    sensor.observers.notify(&reading, &reading);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    assert!(!graph.is_listening(near).unwrap());
    assert!(sensor.observers.is_empty());
}

#[test]
fn test_resubscribe_rounds_with_random_readings() {
    const ROUNDS: usize = 25;

    let sensor = SharedDistance::new(100.0);
    let counter = Arc::new(Counter(AtomicUsize::new(0)));

    let mut builder = EventGraphBuilder::new(Arc::new(NoTimers));
    let near = builder
        .add_sensor_event_with_condition(
            EventRecord::new("near", "Near", 0.0),
            sensor.clone(),
            "distance < 20",
        )
        .unwrap();
    builder.add_action(near, counter.clone()).unwrap();
    let graph = builder.build();

    for round in 0..ROUNDS {
        sensor.set(100.0);
        graph.start_listening(near).unwrap();

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let sensor = Arc::clone(&sensor);
                thread::spawn(move || {
                    let mut rng = fastrand::Rng::with_seed((round * THREADS + t) as u64);
                    for _ in 0..NOTIFICATIONS {
                        sensor.set(rng.f64() * 100.0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.0.load(Ordering::SeqCst), round + 1, "round {round}");
        assert!(!graph.is_listening(near).unwrap());
    }
}
