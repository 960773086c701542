//! Replay runtime: scheduling, state, the activity bridge and the executor.

pub mod activity;
pub mod cancellation;
pub mod context;
pub mod executor;
pub mod limits;
pub mod observability;
pub mod registry;
pub(crate) mod replay;
pub mod scheduler;
pub mod state;
pub mod timers;

pub use activity::{ActivityOptions, BackoffStrategy, RetryOptions, execute_activity, execute_activity_with_retry};
pub use cancellation::{CancelHandle, CancellationSignal, Cancelled, ObserverId};
pub use context::WorkflowContext;
pub use executor::{WorkflowExecutor, WorkflowTaskResult};
pub use observability::{LogFormat, ObservabilityConfig, init_logging};
pub use registry::{
    ActivityContext, ActivityHandler, ActivityRegistry, ActivityRegistryBuilder, Registry, RegistryBuilder,
    WorkflowHandler, WorkflowRegistry, WorkflowRegistryBuilder,
};
pub use scheduler::{TaskId, YieldNow};
pub use state::ExecutionState;
pub use timers::{schedule_timer, sleep};

/// Configuration options for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Polls allowed in one scheduler drain before the task is failed with
    /// `SchedulerStalled`.
    /// Default: [`limits::DEFAULT_MAX_SCHEDULER_STEPS`]
    pub max_scheduler_steps: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            max_scheduler_steps: limits::DEFAULT_MAX_SCHEDULER_STEPS,
        }
    }
}
