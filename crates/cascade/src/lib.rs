//! # Cascade
//!
//! A small, in-process event-propagation engine for sensor-driven control:
//! sensors report readings, conditions over those readings decide that
//! something happened, and firing an event sets off a cascade of actions,
//! sub-events, listener toggles and a delayed follow-up event.
//!
//! ## Core Concepts
//!
//! - **Event**: a named unit of cascading behaviour living in an
//!   [`EventGraph`] arena and addressed by [`EventKey`].
//! - **Sensor-bound event**: an event that watches a [`Sensor`] and fires when
//!   its [`Condition`] becomes true, then unsubscribes itself.
//! - **Action**: an external collaborator ([`Action`]) started or stopped by a
//!   cascade.
//! - **Delayed continuation**: an event's `next`, run by the injected
//!   [`Scheduler`] once its delay has elapsed.
//!
//! ## Architecture
//!
//! ```text
//! Sensor ──notify──► sensor-bound event ──(condition true)──► unbind
//!                                                               │
//!                                                               ▼
//!                       ┌──────────────────── fire ─────────────────────┐
//!                       │ start actions   (in order)                    │
//!                       │ stop actions    (in order)                    │
//!                       │ sub-events      (nested fire, same args)      │
//!                       │ start listening / stop listening              │
//!                       └───────────────────────────────────────────────┘
//!                                                               │
//!                                                   Scheduler (after delay)
//!                                                               ▼
//!                                                          next.fire()
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Ordered cascade** - actions, sub-events and toggles run synchronously
//!    in insertion order before `fire` returns
//! 2. **At-most-once trigger** - a sensor-bound event fires at most once per
//!    subscription period; evaluate-then-unsubscribe is atomic per event
//! 3. **Fail fast** - the first failing action aborts the rest of its cascade
//! 4. **Deferred successor** - `next` never runs on the caller's stack
//! 5. **Sandboxed conditions** - expressions see only their variables
//!
//! ## Example
//!
//! ```ignore
//! use cascade_core::{EventGraphBuilder, EventRecord, FireArgs, TokioScheduler};
//! use std::sync::Arc;
//!
//! let scheduler = Arc::new(TokioScheduler::current()?);
//! let mut builder = EventGraphBuilder::new(scheduler);
//!
//! let near = builder.add_sensor_event_with_condition(
//!     EventRecord::new("near", "Obstacle near", 0.0),
//!     distance_sensor,
//!     "distance < 10",
//! )?;
//! let brake = builder.add_event(EventRecord::new("brake", "Brake", 2.0))?;
//! let resume = builder.add_event(EventRecord::new("resume", "Resume", 0.0))?;
//!
//! builder.add_action(brake, Arc::new(BrakeAction))?;
//! builder.add_sub_event(near, brake)?;
//! builder.set_next(brake, resume)?;
//! builder.add_start_listening(resume, near)?;
//!
//! let graph = builder.build();
//! graph.start_listening(near)?;
//! ```

mod action;
pub mod condition;
mod config;
mod error;
mod event;
mod graph;
pub mod logging;
mod scheduler;
mod sensor;

// Concurrency stress tests (test-only)
#[cfg(test)]
mod stress_tests;

pub use action::{Action, FireArgs};
pub use condition::{Condition, Value, Variables};
pub use config::{GraphConfig, DEFAULT_MAX_CASCADE_DEPTH};
pub use error::{CascadeError, EvaluationError, Result, SchedulingError};
pub use event::{EventId, EventInfo, EventKey, EventRecord};
pub use graph::{EventGraph, EventGraphBuilder};
pub use scheduler::{ScheduledTask, Scheduler, TimerId, TokioScheduler};
pub use sensor::{DataChangeCallback, ObserverSet, Readings, Sensor, SubscriptionId};
