//! # duroflow
//!
//! Deterministic replay executor for durable workflows.
//!
//! Workflow code is ordinary async Rust that calls activities and timers through
//! a [`WorkflowContext`]. Those calls do not perform any work: they produce
//! [`Command`]s and hand back [`DurableFuture`]s. A host persists the commands,
//! runs the activities elsewhere, and appends what happened to the instance's
//! history. Feeding that history back through a [`WorkflowExecutor`] replays the
//! workflow to the exact point it reached, resolves the futures it was waiting on,
//! and yields the next set of commands.
//!
//! ```rust,no_run
//! use duroflow::{HistoryEvent, Payload, WorkflowExecutor, WorkflowInstance, WorkflowRegistry, WorkflowTask};
//! use duroflow::runtime::ActivityOptions;
//!
//! let workflows = WorkflowRegistry::builder()
//!     .register_typed("Greet", |ctx, name: String| async move {
//!         ctx.execute_activity(&ActivityOptions::default(), "Hello", (name,))
//!             .get::<String>()
//!             .await
//!     })
//!     .build();
//!
//! let instance = WorkflowInstance::new("greet-1", "run-1");
//! let mut executor = WorkflowExecutor::new(instance.clone(), workflows);
//! let task = WorkflowTask::new(
//!     instance,
//!     vec![HistoryEvent::workflow_started("Greet", Payload::new(br#""world""#.to_vec()))],
//! );
//! let result = executor.execute_workflow_task(&task).unwrap();
//! assert_eq!(result.new_commands().count(), 1);
//! ```
//!
//! Replays of the same history are deterministic: the same commands with the
//! same ids are produced every time. A workflow that diverges from its recorded
//! history fails with [`ExecutorError::Nondeterminism`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

pub mod command;
pub mod error;
pub mod futures;
pub mod history;
pub mod logging;
pub mod payload;
pub mod runtime;

pub use command::{Command, CommandKind, CommandLog, CommandState};
pub use error::{CommandLogError, ConversionError, ExecutorError, ObservabilityError, RegistryError, WorkflowError};
pub use futures::{DurableFuture, DurableResult};
pub use history::{EventAttributes, HistoryEvent, HistoryEventType, UNCORRELATED_EVENT_ID};
pub use payload::{Converter, DefaultConverter, IntoPayloads, JsonConverter, Payload};
pub use runtime::{
    ActivityContext, ActivityOptions, ActivityRegistry, BackoffStrategy, ExecutorOptions, RetryOptions,
    WorkflowContext, WorkflowExecutor, WorkflowRegistry, WorkflowTaskResult,
};

/// Identity of one workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub instance_id: String,
    pub execution_id: String,
}

impl WorkflowInstance {
    pub fn new(instance_id: impl Into<String>, execution_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            execution_id: execution_id.into(),
        }
    }
}

impl std::fmt::Display for WorkflowInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.instance_id, self.execution_id)
    }
}

/// Input of one executor pass: the events recorded since the previous pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTask {
    pub instance: WorkflowInstance,
    pub history: Vec<HistoryEvent>,
}

impl WorkflowTask {
    pub fn new(instance: WorkflowInstance, history: Vec<HistoryEvent>) -> Self {
        Self { instance, history }
    }
}

#[doc(hidden)]
pub mod __private {
    pub use tracing;
}

// A panicking workflow task is caught by the scheduler; the state it leaves
// behind is still consistent, so poisoning is ignored.
pub(crate) fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
