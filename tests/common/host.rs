//! A minimal in-memory host: records commands into history, runs activities
//! from a registry and fires timers immediately.

use duroflow::{
    ActivityContext, ActivityRegistry, CommandKind, ExecutorError, HistoryEvent, Payload, WorkflowExecutor,
    WorkflowRegistry, WorkflowTaskResult,
};

use super::{instance, task};

pub struct TestHost {
    pub executor: WorkflowExecutor,
    pub activities: ActivityRegistry,
    /// Every event delivered so far, in order.
    pub history: Vec<HistoryEvent>,
    /// Events not yet delivered to the executor.
    pending: Vec<HistoryEvent>,
    /// Number of workflow tasks executed.
    pub passes: usize,
}

impl TestHost {
    pub fn new(workflows: WorkflowRegistry, activities: ActivityRegistry) -> Self {
        Self {
            executor: WorkflowExecutor::new(instance(), workflows),
            activities,
            history: Vec::new(),
            pending: Vec::new(),
            passes: 0,
        }
    }

    pub fn start(&mut self, workflow: &str, input: Payload) {
        self.push(HistoryEvent::workflow_started(workflow, input));
    }

    pub fn push(&mut self, event: HistoryEvent) {
        self.pending.push(event);
    }

    /// Deliver the undelivered events as one workflow task.
    pub fn step(&mut self) -> Result<WorkflowTaskResult, ExecutorError> {
        let events = std::mem::take(&mut self.pending);
        self.history.extend(events.iter().cloned());
        self.passes += 1;
        self.executor.execute_workflow_task(&task(events))
    }

    /// Record every new command, execute it, and feed the outcomes back until
    /// the workflow completes or stops producing commands.
    pub async fn run(&mut self) -> Result<WorkflowTaskResult, ExecutorError> {
        loop {
            let result = self.step()?;
            let new: Vec<_> = result.new_commands().cloned().collect();
            if result.completed || new.is_empty() {
                return Ok(result);
            }
            for command in &new {
                self.push(match &command.kind {
                    CommandKind::ScheduleActivityTask { name, inputs, .. } => {
                        HistoryEvent::activity_scheduled(command.id, name.clone(), inputs.clone())
                    }
                    CommandKind::ScheduleTimer { delay_ms } => HistoryEvent::timer_scheduled(command.id, *delay_ms),
                });
            }
            for command in new {
                let completion = match command.kind {
                    CommandKind::ScheduleActivityTask { name, inputs, .. } => {
                        self.run_activity(command.id, &name, inputs).await
                    }
                    CommandKind::ScheduleTimer { .. } => HistoryEvent::timer_fired(command.id),
                };
                self.push(completion);
            }
        }
    }

    async fn run_activity(&self, event_id: i64, name: &str, inputs: Vec<Payload>) -> HistoryEvent {
        let handler = match self.activities.lookup(name) {
            Ok(handler) => handler,
            Err(e) => return HistoryEvent::activity_failed(event_id, e.to_string()),
        };
        let ctx = ActivityContext::new(instance(), name, event_id);
        match handler.invoke(ctx, inputs).await {
            Ok(result) => HistoryEvent::activity_completed(event_id, result),
            Err(error) => HistoryEvent::activity_failed(event_id, error),
        }
    }
}
