#![allow(dead_code)]

pub mod host;
pub mod log_capture;

use duroflow::{
    Command, Converter, DefaultConverter, ExecutorError, HistoryEvent, Payload, WorkflowExecutor, WorkflowInstance,
    WorkflowRegistry, WorkflowTask, WorkflowTaskResult,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use host::TestHost;

pub fn instance() -> WorkflowInstance {
    WorkflowInstance::new("inst-1", "exec-1")
}

pub fn json<T: Serialize>(value: T) -> Payload {
    DefaultConverter::default().to_payload(&value).unwrap()
}

pub fn decode<T: DeserializeOwned>(payload: &Payload) -> T {
    DefaultConverter::default().from_payload(payload).unwrap()
}

pub fn started<T: Serialize>(workflow: &str, input: T) -> HistoryEvent {
    HistoryEvent::workflow_started(workflow, json(input))
}

pub fn task(history: Vec<HistoryEvent>) -> WorkflowTask {
    WorkflowTask::new(instance(), history)
}

/// Replay `history` on a brand new executor.
pub fn replay(workflows: &WorkflowRegistry, history: Vec<HistoryEvent>) -> Result<WorkflowTaskResult, ExecutorError> {
    WorkflowExecutor::new(instance(), workflows.clone()).execute_workflow_task(&task(history))
}

pub fn new_ids(result: &WorkflowTaskResult) -> Vec<i64> {
    result.new_commands().map(|c| c.id).collect()
}

/// Successful output decoded as `T`.
pub fn output<T: DeserializeOwned>(result: &WorkflowTaskResult) -> T {
    match &result.output {
        Some(Ok(payload)) => decode(payload),
        other => panic!("expected successful output, got {other:?}"),
    }
}

pub fn activity_command(id: i64, name: &str, inputs: Vec<Payload>) -> Command {
    Command::schedule_activity(id, name, inputs)
}
