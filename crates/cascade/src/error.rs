//! Error types for the cascade engine.
//!
//! Nothing in the engine recovers from a failure on its own: a failing action
//! aborts the rest of the cascade it belongs to and the error travels back to
//! whoever started the top-level `fire` (a sensor notification or a timer).

use std::time::Duration;

use thiserror::Error;

use crate::event::EventId;

/// Result alias used throughout the crate.
pub type Result<T, E = CascadeError> = std::result::Result<T, E>;

/// Unified error type for graph construction and firing.
#[derive(Debug, Error)]
pub enum CascadeError {
    /// A sensor-bound event could not evaluate its condition.
    #[error("event '{event}': condition evaluation failed: {source}")]
    Evaluation {
        event: EventId,
        #[source]
        source: EvaluationError,
    },

    /// An action's `fire` or `stop` returned an error.
    #[error("event '{event}': action '{action}' failed: {source}")]
    Action {
        event: EventId,
        action: String,
        #[source]
        source: anyhow::Error,
    },

    /// The successor of an event could not be scheduled.
    #[error("event '{event}': failed to schedule successor: {source}")]
    Scheduling {
        event: EventId,
        #[source]
        source: SchedulingError,
    },

    /// A key that does not belong to this graph.
    #[error("unknown event key {0}")]
    UnknownEvent(usize),

    /// Two construction records share an id.
    #[error("duplicate event id '{0}'")]
    DuplicateEventId(EventId),

    /// Listener toggles only apply to sensor-bound events.
    #[error("event '{0}' is not bound to a sensor")]
    NotSensorBound(EventId),

    /// Delay must be a finite, non-negative number of seconds.
    #[error("event '{event}': invalid delay {seconds}s")]
    InvalidDelay { event: EventId, seconds: f64 },

    /// Sub-event recursion went deeper than the configured limit.
    #[error("event '{event}': cascade depth limit {limit} exceeded")]
    CascadeDepthExceeded { event: EventId, limit: usize },
}

impl CascadeError {
    /// True for failures raised while evaluating a condition.
    pub fn is_evaluation(&self) -> bool {
        matches!(self, CascadeError::Evaluation { .. })
    }
}

/// Failure to compile or evaluate a condition expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("type mismatch: '{operation}' cannot be applied to {found}")]
    TypeMismatch {
        operation: &'static str,
        found: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,
}

/// Failure of the delayed-invocation facility.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulingError {
    /// No async runtime is available to host the timer.
    #[error("no timer runtime available")]
    NoRuntime,

    /// The scheduler no longer accepts work.
    #[error("scheduler is shut down")]
    ShutDown,

    #[error("scheduling rejected: {0}")]
    Rejected(String),
}

impl SchedulingError {
    /// Convenience for schedulers that refuse a specific delay.
    pub fn rejected_delay(delay: Duration) -> Self {
        SchedulingError::Rejected(format!("delay {delay:?} not accepted"))
    }
}
