//! Testing utilities for cascade.
//!
//! - [`FakeSensor`]: a scripted sensor; `set` pushes new readings to observers
//! - [`RecordingAction`] / [`FailingAction`]: actions writing to a shared [`Journal`]
//! - [`ManualScheduler`]: a deterministic clock advanced by hand
//!
//! ```ignore
//! let journal = Journal::new();
//! let clock = Arc::new(ManualScheduler::new());
//! let sensor = FakeSensor::distance("front", 100.0);
//!
//! let mut builder = EventGraphBuilder::new(clock.clone());
//! let near = builder.add_sensor_event_with_condition(record, sensor.clone(), "distance < 10")?;
//! builder.add_action(near, RecordingAction::new("beep", &journal))?;
//! let graph = builder.build();
//!
//! graph.start_listening(near)?;
//! sensor.set_distance(5.0);
//! assert_eq!(journal.entries(), vec!["fire:beep"]);
//! ```

mod action;
mod clock;
mod sensor;

pub use action::{FailOn, FailingAction, Journal, RecordingAction};
pub use clock::ManualScheduler;
pub use sensor::FakeSensor;
