//! Error taxonomy.
//!
//! Two layers of errors exist:
//!
//! - [`WorkflowError`] is what workflow code sees. It is delivered as an ordinary
//!   value from awaiting a [`DurableFuture`](crate::DurableFuture) and never aborts
//!   the workflow on its own.
//! - [`ExecutorError`] is an engine-level fault. It ends the current workflow task
//!   and poisons the executor, because replay can no longer be trusted.

use crate::WorkflowInstance;
use crate::runtime::LogFormat;

/// Direction of a failed payload conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionDirection {
    ToPayload,
    FromPayload,
}

impl std::fmt::Display for ConversionDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversionDirection::ToPayload => f.write_str("encode"),
            ConversionDirection::FromPayload => f.write_str("decode"),
        }
    }
}

/// A value could not be turned into a payload, or a payload back into a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to {direction} payload: {message}")]
pub struct ConversionError {
    pub direction: ConversionDirection,
    pub message: String,
}

impl ConversionError {
    pub fn encode(message: impl Into<String>) -> Self {
        Self {
            direction: ConversionDirection::ToPayload,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            direction: ConversionDirection::FromPayload,
            message: message.into(),
        }
    }
}

/// Errors surfaced to workflow code as return values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    /// Arguments or results could not be converted. Never retried.
    #[error("{operation}: {source}")]
    Conversion {
        operation: &'static str,
        #[source]
        source: ConversionError,
    },

    /// The activity reported a failure.
    #[error("activity '{name}' failed (event_id={event_id}): {message}")]
    Activity { name: String, event_id: i64, message: String },

    /// Cancellation was observed before the command was committed.
    #[error("canceled")]
    Canceled,

    /// Failure raised by workflow code itself.
    #[error("{0}")]
    Application(String),
}

impl WorkflowError {
    pub fn application(message: impl Into<String>) -> Self {
        WorkflowError::Application(message.into())
    }

    pub(crate) fn conversion(operation: &'static str, source: ConversionError) -> Self {
        WorkflowError::Conversion { operation, source }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, WorkflowError::Canceled)
    }

    /// Only activity failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::Activity { .. })
    }
}

impl From<String> for WorkflowError {
    fn from(message: String) -> Self {
        WorkflowError::Application(message)
    }
}

impl From<&str> for WorkflowError {
    fn from(message: &str) -> Self {
        WorkflowError::Application(message.to_string())
    }
}

/// Violations raised by the command log. The applier reports all of them as
/// nondeterminism.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandLogError {
    #[error("no command with id {id}")]
    NotFound { id: i64 },

    #[error("command {id} was produced as {produced} but history recorded {recorded}")]
    Mismatch { id: i64, produced: String, recorded: String },

    #[error("command {id} is already committed")]
    AlreadyCommitted { id: i64 },

    #[error("command {id} recorded while earlier command {pending} is still uncommitted")]
    OutOfOrder { id: i64, pending: i64 },
}

/// Registry lookup and registration failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("{kind} '{name}' is not registered")]
    NotFound { kind: &'static str, name: String },

    #[error("registration failed: {0}")]
    Registration(String),
}

/// Engine-level faults. Fatal to the workflow task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    #[error("nondeterminism detected at event_id={event_id}: {message}")]
    Nondeterminism { event_id: i64, message: String },

    #[error("invalid history: {message}")]
    InvalidHistory { message: String },

    #[error("workflow task for {actual} delivered to executor of {expected}")]
    InstanceMismatch {
        expected: WorkflowInstance,
        actual: WorkflowInstance,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("task '{task}' panicked: {message}")]
    WorkflowPanicked { task: String, message: String },

    #[error("scheduler did not settle within {steps} steps")]
    SchedulerStalled { steps: usize },
}

impl ExecutorError {
    pub(crate) fn nondeterminism(event_id: i64, message: impl Into<String>) -> Self {
        ExecutorError::Nondeterminism {
            event_id,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_history(message: impl Into<String>) -> Self {
        ExecutorError::InvalidHistory {
            message: message.into(),
        }
    }

    pub fn is_nondeterminism(&self) -> bool {
        matches!(self, ExecutorError::Nondeterminism { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_activity_failures_are_retryable() {
        let activity = WorkflowError::Activity {
            name: "a1".into(),
            event_id: 0,
            message: "boom".into(),
        };
        assert!(activity.is_retryable());
        assert!(!WorkflowError::Canceled.is_retryable());
        assert!(!WorkflowError::application("nope").is_retryable());
        assert!(!WorkflowError::conversion("execute_activity", ConversionError::encode("bad")).is_retryable());
    }

    #[test]
    fn conversion_error_hides_nothing_but_the_operation() {
        let err = WorkflowError::conversion("execute_activity", ConversionError::encode("key must be a string"));
        assert_eq!(
            err.to_string(),
            "execute_activity: failed to encode payload: key must be a string"
        );
    }
}

/// Failure to install the global log subscriber.
#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    #[error("failed to initialize {format:?} logging")]
    SubscriberInit {
        format: LogFormat,
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
}
