//! History events: the durably recorded facts a workflow is replayed against.

use serde::{Deserialize, Serialize};

use crate::command::CommandKind;
use crate::payload::Payload;

/// Event id carried by events that do not correlate with a command
/// (the start event, cancellation).
pub const UNCORRELATED_EVENT_ID: i64 = -1;

/// One recorded event. `event_id` correlates scheduling and completion events
/// with the command that caused them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub event_id: i64,
    #[serde(flatten)]
    pub attributes: EventAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "attributes")]
pub enum EventAttributes {
    WorkflowExecutionStarted {
        name: String,
        version: String,
        inputs: Payload,
    },
    ActivityScheduled {
        name: String,
        version: String,
        inputs: Vec<Payload>,
    },
    ActivityCompleted {
        result: Payload,
    },
    ActivityFailed {
        error: String,
    },
    TimerScheduled {
        delay_ms: u64,
    },
    TimerFired,
    WorkflowExecutionCanceled,
}

/// Discriminant of [`EventAttributes`], handy for logging and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryEventType {
    WorkflowExecutionStarted,
    ActivityScheduled,
    ActivityCompleted,
    ActivityFailed,
    TimerScheduled,
    TimerFired,
    WorkflowExecutionCanceled,
}

impl std::fmt::Display for HistoryEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

impl HistoryEvent {
    pub fn new(event_id: i64, attributes: EventAttributes) -> Self {
        Self { event_id, attributes }
    }

    pub fn workflow_started(name: impl Into<String>, inputs: Payload) -> Self {
        Self::new(
            UNCORRELATED_EVENT_ID,
            EventAttributes::WorkflowExecutionStarted {
                name: name.into(),
                version: String::new(),
                inputs,
            },
        )
    }

    pub fn activity_scheduled(event_id: i64, name: impl Into<String>, inputs: Vec<Payload>) -> Self {
        Self::new(
            event_id,
            EventAttributes::ActivityScheduled {
                name: name.into(),
                version: String::new(),
                inputs,
            },
        )
    }

    pub fn activity_completed(event_id: i64, result: Payload) -> Self {
        Self::new(event_id, EventAttributes::ActivityCompleted { result })
    }

    pub fn activity_failed(event_id: i64, error: impl Into<String>) -> Self {
        Self::new(event_id, EventAttributes::ActivityFailed { error: error.into() })
    }

    pub fn timer_scheduled(event_id: i64, delay_ms: u64) -> Self {
        Self::new(event_id, EventAttributes::TimerScheduled { delay_ms })
    }

    pub fn timer_fired(event_id: i64) -> Self {
        Self::new(event_id, EventAttributes::TimerFired)
    }

    pub fn workflow_canceled() -> Self {
        Self::new(UNCORRELATED_EVENT_ID, EventAttributes::WorkflowExecutionCanceled)
    }

    pub fn event_type(&self) -> HistoryEventType {
        match &self.attributes {
            EventAttributes::WorkflowExecutionStarted { .. } => HistoryEventType::WorkflowExecutionStarted,
            EventAttributes::ActivityScheduled { .. } => HistoryEventType::ActivityScheduled,
            EventAttributes::ActivityCompleted { .. } => HistoryEventType::ActivityCompleted,
            EventAttributes::ActivityFailed { .. } => HistoryEventType::ActivityFailed,
            EventAttributes::TimerScheduled { .. } => HistoryEventType::TimerScheduled,
            EventAttributes::TimerFired => HistoryEventType::TimerFired,
            EventAttributes::WorkflowExecutionCanceled => HistoryEventType::WorkflowExecutionCanceled,
        }
    }

    /// For scheduling events, the command the workflow must have produced.
    pub fn recorded_command(&self) -> Option<CommandKind> {
        match &self.attributes {
            EventAttributes::ActivityScheduled { name, version, inputs } => Some(CommandKind::ScheduleActivityTask {
                name: name.clone(),
                version: version.clone(),
                inputs: inputs.clone(),
            }),
            EventAttributes::TimerScheduled { delay_ms } => Some(CommandKind::ScheduleTimer { delay_ms: *delay_ms }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_is_tagged() {
        let ev = HistoryEvent::activity_completed(3, Payload::new(b"42".to_vec()));
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event_id"], 3);
        assert_eq!(json["type"], "ActivityCompleted");
        assert!(json["attributes"]["result"].is_array());

        let back: HistoryEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn start_and_cancel_are_uncorrelated() {
        assert_eq!(HistoryEvent::workflow_started("w", Payload::empty()).event_id, UNCORRELATED_EVENT_ID);
        assert_eq!(HistoryEvent::workflow_canceled().event_id, UNCORRELATED_EVENT_ID);
    }

    #[test]
    fn only_scheduling_events_map_to_commands() {
        assert_eq!(
            HistoryEvent::timer_scheduled(1, 500).recorded_command(),
            Some(CommandKind::ScheduleTimer { delay_ms: 500 })
        );
        assert!(HistoryEvent::timer_fired(1).recorded_command().is_none());
        assert!(HistoryEvent::activity_failed(0, "x").recorded_command().is_none());
    }
}
