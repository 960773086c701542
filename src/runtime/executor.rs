//! Drives one workflow instance through successive workflow tasks.

use tracing::{debug, error};

use crate::command::Command;
use crate::error::ExecutorError;
use crate::futures::DurableResult;
use crate::runtime::ExecutorOptions;
use crate::runtime::registry::WorkflowRegistry;
use crate::runtime::replay::HistoryApplier;
use crate::{WorkflowInstance, WorkflowTask};

/// Outcome of one workflow task.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowTaskResult {
    pub instance: WorkflowInstance,
    /// Every command of the pass in id order, each with its lifecycle state.
    pub commands: Vec<Command>,
    /// Whether the top-level workflow task has returned.
    pub completed: bool,
    /// The workflow's return value, once completed.
    pub output: Option<DurableResult>,
}

impl WorkflowTaskResult {
    /// Commands that still have to be durably recorded.
    pub fn new_commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter().filter(|c| c.is_new())
    }
}

/// Replays history for a single instance.
///
/// A fresh executor replays from the start of history. A retained executor keeps
/// its execution state between tasks, so each task only has to carry the events
/// recorded since the previous one. Once a task fails with an [`ExecutorError`]
/// the executor is poisoned and returns that error for every later task.
pub struct WorkflowExecutor {
    instance: WorkflowInstance,
    options: ExecutorOptions,
    applier: HistoryApplier,
    fault: Option<ExecutorError>,
}

impl std::fmt::Debug for WorkflowExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowExecutor")
            .field("instance", &self.instance)
            .field("completed", &self.is_completed())
            .field("fault", &self.fault)
            .finish()
    }
}

impl WorkflowExecutor {
    pub fn new(instance: WorkflowInstance, workflows: WorkflowRegistry) -> Self {
        Self::with_options(instance, workflows, ExecutorOptions::default())
    }

    pub fn with_options(instance: WorkflowInstance, workflows: WorkflowRegistry, options: ExecutorOptions) -> Self {
        Self {
            applier: HistoryApplier::new(instance.clone(), workflows),
            instance,
            options,
            fault: None,
        }
    }

    pub fn instance(&self) -> &WorkflowInstance {
        &self.instance
    }

    pub fn is_completed(&self) -> bool {
        self.applier.output().is_some()
    }

    /// The fault that poisoned this executor, if any.
    pub fn fault(&self) -> Option<&ExecutorError> {
        self.fault.as_ref()
    }

    /// Current command log, including commands carried over between tasks.
    pub fn commands(&self) -> Vec<Command> {
        self.applier.commands()
    }

    /// Logical tasks that have not finished.
    pub fn live_tasks(&self) -> usize {
        self.applier.live_tasks()
    }

    /// Futures still waiting on a completion event.
    pub fn pending_operations(&self) -> usize {
        self.applier.pending_count()
    }

    /// Apply `task.history` in order and report the resulting commands.
    pub fn execute_workflow_task(&mut self, task: &WorkflowTask) -> Result<WorkflowTaskResult, ExecutorError> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }
        if task.instance != self.instance {
            return Err(ExecutorError::InstanceMismatch {
                expected: self.instance.clone(),
                actual: task.instance.clone(),
            });
        }

        match self.run_pass(task) {
            Ok(result) => Ok(result),
            Err(e) => {
                error!(instance = %self.instance, error = %e, "workflow task failed, executor poisoned");
                self.fault = Some(e.clone());
                Err(e)
            }
        }
    }

    fn run_pass(&mut self, task: &WorkflowTask) -> Result<WorkflowTaskResult, ExecutorError> {
        let pruned = self.applier.begin_pass();
        debug!(
            instance = %self.instance,
            events = task.history.len(),
            pruned,
            "workflow task started"
        );

        let max_steps = self.options.max_scheduler_steps;
        let last = task.history.len().saturating_sub(1);
        for (idx, event) in task.history.iter().enumerate() {
            let replaying = idx < last;
            self.applier.set_replaying(replaying);
            debug!(
                instance = %self.instance,
                event_id = event.event_id,
                event_type = %event.event_type(),
                replaying,
                "applying event"
            );
            self.applier.apply(event)?;
            self.applier.drain(max_steps)?;
        }
        self.applier.set_replaying(false);
        self.applier.drain(max_steps)?;

        let output = self.applier.output();
        let result = WorkflowTaskResult {
            instance: self.instance.clone(),
            commands: self.applier.commands(),
            completed: output.is_some(),
            output,
        };
        debug!(
            instance = %self.instance,
            commands = result.commands.len(),
            new_commands = result.new_commands().count(),
            completed = result.completed,
            "workflow task finished"
        );
        Ok(result)
    }
}
