//! Applies history events to an instance's execution state.
//!
//! Scheduling events commit the command the workflow produced for the same id,
//! completion events resolve the future waiting on that id, and the start and
//! cancellation events drive the top-level task and the root signal. Anything
//! that does not line up with what the workflow code did is nondeterminism.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::WorkflowInstance;
use crate::command::{Command, CommandState};
use crate::error::{ExecutorError, WorkflowError};
use crate::futures::{DurableFuture, DurableResult};
use crate::history::{EventAttributes, HistoryEvent};
use crate::lock;
use crate::payload::Payload;
use crate::runtime::cancellation::CancellationSignal;
use crate::runtime::context::WorkflowContext;
use crate::runtime::registry::WorkflowRegistry;
use crate::runtime::scheduler::Scheduler;
use crate::runtime::state::{CompletionKind, ExecutionState, PendingCompletion};

pub(crate) struct HistoryApplier {
    instance: WorkflowInstance,
    state: Arc<Mutex<ExecutionState>>,
    scheduler: Scheduler,
    root_signal: CancellationSignal,
    workflows: WorkflowRegistry,
    output: Option<DurableFuture>,
}

impl HistoryApplier {
    pub(crate) fn new(instance: WorkflowInstance, workflows: WorkflowRegistry) -> Self {
        Self {
            state: Arc::new(Mutex::new(ExecutionState::new(instance.clone()))),
            instance,
            scheduler: Scheduler::new(),
            root_signal: CancellationSignal::new(),
            workflows,
            output: None,
        }
    }

    pub(crate) fn apply(&mut self, event: &HistoryEvent) -> Result<(), ExecutorError> {
        let event_id = event.event_id;
        if self.output.is_none() && !matches!(event.attributes, EventAttributes::WorkflowExecutionStarted { .. }) {
            return Err(ExecutorError::invalid_history(format!(
                "{} (event_id={event_id}) before WorkflowExecutionStarted",
                event.event_type()
            )));
        }

        match &event.attributes {
            EventAttributes::WorkflowExecutionStarted { name, inputs, .. } => self.start(name, inputs),
            EventAttributes::ActivityScheduled { .. } | EventAttributes::TimerScheduled { .. } => {
                self.commit(event)
            }
            EventAttributes::ActivityCompleted { result } => {
                let pending = self.take_completion(event, |kind| matches!(kind, CompletionKind::Activity { .. }))?;
                pending.future.set(Ok(result.clone()));
                Ok(())
            }
            EventAttributes::ActivityFailed { error } => {
                let pending = self.take_completion(event, |kind| matches!(kind, CompletionKind::Activity { .. }))?;
                if let CompletionKind::Activity { name } = pending.kind {
                    pending.future.set(Err(WorkflowError::Activity {
                        name,
                        event_id,
                        message: error.clone(),
                    }));
                }
                Ok(())
            }
            EventAttributes::TimerFired => {
                let pending = self.take_completion(event, |kind| matches!(kind, CompletionKind::Timer))?;
                pending.future.set(Ok(Payload::empty()));
                Ok(())
            }
            EventAttributes::WorkflowExecutionCanceled => {
                warn!(instance = %self.instance, "workflow execution canceled");
                self.root_signal.fire();
                Ok(())
            }
        }
    }

    fn start(&mut self, name: &str, inputs: &Payload) -> Result<(), ExecutorError> {
        if self.output.is_some() {
            return Err(ExecutorError::invalid_history("duplicate WorkflowExecutionStarted"));
        }
        let handler = self.workflows.lookup(name)?;
        let ctx = WorkflowContext::new(self.state.clone(), self.scheduler.spawner(), self.root_signal.clone());
        let output = DurableFuture::new();
        let resolve = output.clone();
        let input = inputs.clone();
        self.scheduler.spawner().spawn(format!("workflow:{name}"), async move {
            let result = handler.invoke(ctx, input).await;
            resolve.set(result);
        });
        self.output = Some(output);
        debug!(instance = %self.instance, workflow = %name, "workflow started");
        Ok(())
    }

    fn commit(&mut self, event: &HistoryEvent) -> Result<(), ExecutorError> {
        let event_id = event.event_id;
        let Some(recorded) = event.recorded_command() else {
            return Ok(());
        };
        let registration = {
            let mut state = lock(&self.state);
            state
                .commands_mut()
                .commit(event_id, &recorded)
                .map_err(|e| ExecutorError::nondeterminism(event_id, e.to_string()))?;
            state.detach_cancel_registration(event_id)
        };
        // Committed commands are no longer withdrawn on cancellation.
        if let Some(registration) = registration {
            registration.release();
        }
        debug!(instance = %self.instance, event_id, event_type = %event.event_type(), "command committed");
        Ok(())
    }

    /// Hand out the pending operation a completion event resolves.
    fn take_completion(
        &mut self,
        event: &HistoryEvent,
        expected: impl Fn(&CompletionKind) -> bool,
    ) -> Result<PendingCompletion, ExecutorError> {
        let event_id = event.event_id;
        let mut state = lock(&self.state);
        if state.commands().state_of(event_id) == Some(CommandState::New) {
            return Err(ExecutorError::nondeterminism(
                event_id,
                format!("{} arrived before the command was recorded as scheduled", event.event_type()),
            ));
        }
        let mut pending = state.take_pending(event_id).ok_or_else(|| {
            ExecutorError::nondeterminism(
                event_id,
                format!("{} has no pending operation to resolve", event.event_type()),
            )
        })?;
        if !expected(&pending.kind) {
            return Err(ExecutorError::nondeterminism(
                event_id,
                format!("{} does not match pending {}", event.event_type(), pending.kind.label()),
            ));
        }
        drop(state);
        if let Some(registration) = pending.cancel_registration.take() {
            registration.release();
        }
        debug!(instance = %self.instance, event_id, event_type = %event.event_type(), "completion applied");
        Ok(pending)
    }

    pub(crate) fn set_replaying(&self, replaying: bool) {
        lock(&self.state).set_replaying(replaying);
    }

    /// Forget commands whose scheduling an earlier pass already reported.
    pub(crate) fn begin_pass(&self) -> usize {
        lock(&self.state).commands_mut().prune_committed()
    }

    pub(crate) fn drain(&mut self, max_steps: usize) -> Result<usize, ExecutorError> {
        self.scheduler.run_until_blocked(max_steps)
    }

    pub(crate) fn output(&self) -> Option<DurableResult> {
        self.output.as_ref().and_then(DurableFuture::peek)
    }

    pub(crate) fn commands(&self) -> Vec<Command> {
        lock(&self.state).commands().to_vec()
    }

    pub(crate) fn live_tasks(&self) -> usize {
        self.scheduler.live_tasks()
    }

    pub(crate) fn pending_count(&self) -> usize {
        lock(&self.state).pending_count()
    }
}
