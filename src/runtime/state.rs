//! Per-instance execution state.

use std::collections::BTreeMap;

use crate::WorkflowInstance;
use crate::command::{CommandLog, CommandState};
use crate::futures::DurableFuture;
use crate::runtime::cancellation::{CancellationSignal, ObserverId};

/// What a pending future expects to be resolved by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CompletionKind {
    Activity { name: String },
    Timer,
}

impl CompletionKind {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            CompletionKind::Activity { .. } => "activity",
            CompletionKind::Timer => "timer",
        }
    }
}

/// The cancellation observer installed for one command.
#[derive(Debug)]
pub(crate) struct CancelRegistration {
    signal: CancellationSignal,
    observer: ObserverId,
}

impl CancelRegistration {
    pub(crate) fn new(signal: CancellationSignal, observer: ObserverId) -> Self {
        Self { signal, observer }
    }

    pub(crate) fn release(self) {
        self.signal.unobserve(self.observer);
    }
}

#[derive(Debug)]
pub(crate) struct PendingCompletion {
    pub(crate) future: DurableFuture,
    pub(crate) kind: CompletionKind,
    pub(crate) cancel_registration: Option<CancelRegistration>,
}

impl PendingCompletion {
    pub(crate) fn new(future: DurableFuture, kind: CompletionKind) -> Self {
        Self {
            future,
            kind,
            cancel_registration: None,
        }
    }
}

/// Event-id counter, command log and pending futures of one workflow instance.
///
/// Only code running under the instance's scheduler, or the applier driving it,
/// touches this state.
#[derive(Debug)]
pub struct ExecutionState {
    instance: WorkflowInstance,
    next_event_id: i64,
    commands: CommandLog,
    pending: BTreeMap<i64, PendingCompletion>,
    replaying: bool,
}

impl ExecutionState {
    pub(crate) fn new(instance: WorkflowInstance) -> Self {
        Self {
            instance,
            next_event_id: 0,
            commands: CommandLog::new(),
            pending: BTreeMap::new(),
            replaying: false,
        }
    }

    pub fn instance(&self) -> &WorkflowInstance {
        &self.instance
    }

    /// Id the next command will receive.
    pub fn next_event_id(&self) -> i64 {
        self.next_event_id
    }

    pub fn commands(&self) -> &CommandLog {
        &self.commands
    }

    /// Number of futures still waiting for a completion event.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    pub(crate) fn set_replaying(&mut self, replaying: bool) {
        self.replaying = replaying;
    }

    pub(crate) fn allocate_event_id(&mut self) -> i64 {
        let id = self.next_event_id;
        self.next_event_id += 1;
        id
    }

    pub(crate) fn commands_mut(&mut self) -> &mut CommandLog {
        &mut self.commands
    }

    pub(crate) fn register_pending(&mut self, event_id: i64, pending: PendingCompletion) {
        self.pending.insert(event_id, pending);
    }

    pub(crate) fn take_pending(&mut self, event_id: i64) -> Option<PendingCompletion> {
        self.pending.remove(&event_id)
    }

    /// Attach the cancellation observer of a command that is still New. When
    /// the command was already withdrawn or committed the registration is handed
    /// back so the caller can release it.
    pub(crate) fn attach_cancel_registration(
        &mut self,
        event_id: i64,
        registration: CancelRegistration,
    ) -> Option<CancelRegistration> {
        if self.commands.state_of(event_id) != Some(CommandState::New) {
            return Some(registration);
        }
        match self.pending.get_mut(&event_id) {
            Some(pending) => {
                pending.cancel_registration = Some(registration);
                None
            }
            None => Some(registration),
        }
    }

    /// Take the cancellation observer of a command, e.g. once it is committed
    /// and cancellation can no longer withdraw it.
    pub(crate) fn detach_cancel_registration(&mut self, event_id: i64) -> Option<CancelRegistration> {
        self.pending
            .get_mut(&event_id)
            .and_then(|p| p.cancel_registration.take())
    }

    /// Withdraw a command that was never committed, handing back the future that
    /// was waiting on it. Committed or unknown commands are left alone.
    pub(crate) fn withdraw(&mut self, event_id: i64) -> Option<DurableFuture> {
        if self.commands.state_of(event_id) != Some(CommandState::New) {
            return None;
        }
        self.commands.remove(event_id).ok()?;
        self.pending.remove(&event_id).map(|p| p.future)
    }
}
