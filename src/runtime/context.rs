//! The handle workflow code uses to reach its instance's execution state.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use crate::WorkflowInstance;
use crate::command::{Command, CommandKind};
use crate::error::WorkflowError;
use crate::futures::DurableFuture;
use crate::lock;
use crate::payload::IntoPayloads;
use crate::runtime::activity::{self, ActivityOptions};
use crate::runtime::cancellation::{CancelHandle, CancellationSignal, Cancelled};
use crate::runtime::scheduler::{Spawner, TaskId, YieldNow};
use crate::runtime::state::{CancelRegistration, CompletionKind, ExecutionState, PendingCompletion};
use crate::runtime::timers;

/// Cloneable handle passed to workflow code.
///
/// Every clone refers to the same execution state; clones made through
/// [`with_cancel`](Self::with_cancel) carry their own child cancellation signal.
#[derive(Clone)]
pub struct WorkflowContext {
    state: Arc<Mutex<ExecutionState>>,
    spawner: Spawner,
    cancellation: CancellationSignal,
}

impl std::fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("instance", &self.instance())
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

impl WorkflowContext {
    pub(crate) fn new(state: Arc<Mutex<ExecutionState>>, spawner: Spawner, cancellation: CancellationSignal) -> Self {
        Self {
            state,
            spawner,
            cancellation,
        }
    }

    pub fn instance(&self) -> WorkflowInstance {
        lock(&self.state).instance().clone()
    }

    /// True while the event being applied is not the last one of the task, i.e.
    /// while the workflow is re-executing decisions it already made.
    pub fn is_replaying(&self) -> bool {
        lock(&self.state).is_replaying()
    }

    /// Run `f` as a new logical task of this instance. It is queued behind every
    /// task that is already ready.
    pub fn spawn<F, Fut>(&self, f: F) -> TaskId
    where
        F: FnOnce(WorkflowContext) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.spawner.spawn("spawned", f(self.clone()))
    }

    /// Let every other ready task run before continuing.
    pub fn yield_now(&self) -> YieldNow {
        YieldNow::new()
    }

    pub fn is_canceled(&self) -> bool {
        self.cancellation.is_fired()
    }

    /// Suspend until this context's cancellation signal fires.
    pub fn cancelled(&self) -> Cancelled {
        self.cancellation.cancelled()
    }

    pub fn cancellation_signal(&self) -> &CancellationSignal {
        &self.cancellation
    }

    /// A context whose signal fires with this one's, or on its own through the
    /// returned handle. Canceling the child never affects the parent.
    pub fn with_cancel(&self) -> (WorkflowContext, CancelHandle) {
        let signal = self.cancellation.child();
        let ctx = WorkflowContext {
            state: self.state.clone(),
            spawner: self.spawner.clone(),
            cancellation: signal.clone(),
        };
        (ctx, CancelHandle::new(signal))
    }

    pub fn execute_activity(&self, options: &ActivityOptions, activity: &str, args: impl IntoPayloads) -> DurableFuture {
        activity::execute_activity(self, options, activity, args)
    }

    pub fn execute_activity_with_retry(
        &self,
        options: &ActivityOptions,
        activity: &str,
        args: impl IntoPayloads,
    ) -> DurableFuture {
        activity::execute_activity_with_retry(self, options, activity, args)
    }

    pub fn schedule_timer(&self, delay: Duration) -> DurableFuture {
        timers::schedule_timer(self, delay)
    }

    pub fn sleep(&self, delay: Duration) -> impl Future<Output = Result<(), WorkflowError>> + Send + use<> {
        timers::sleep(self, delay)
    }

    pub(crate) fn spawner(&self) -> &Spawner {
        &self.spawner
    }

    /// Record a command and register the future its completion will resolve.
    ///
    /// While the command is still New, firing this context's signal withdraws
    /// it and resolves the future with [`WorkflowError::Canceled`]. Once
    /// committed, only the completion event can resolve the future.
    pub(crate) fn schedule_command(&self, kind: CommandKind, completion: CompletionKind) -> DurableFuture {
        let future = DurableFuture::new();
        let (instance, event_id) = {
            let mut state = lock(&self.state);
            let event_id = state.allocate_event_id();
            state.commands_mut().append(Command::new(event_id, kind));
            state.register_pending(event_id, PendingCompletion::new(future.clone(), completion.clone()));
            (state.instance().clone(), event_id)
        };
        debug!(instance = %instance, event_id, kind = completion.label(), "command scheduled");

        let weak_state = Arc::downgrade(&self.state);
        let observer = self.cancellation.observe(move || {
            let Some(state) = weak_state.upgrade() else {
                return;
            };
            let withdrawn = lock(&state).withdraw(event_id);
            if let Some(future) = withdrawn {
                debug!(instance = %instance, event_id, "uncommitted command withdrawn on cancellation");
                future.set(Err(WorkflowError::Canceled));
            }
        });

        // Kept until the command commits or completes. If the signal had already
        // fired, the observer ran inside `observe` and nothing is kept.
        let registration = CancelRegistration::new(self.cancellation.clone(), observer);
        let unused = lock(&self.state).attach_cancel_registration(event_id, registration);
        if let Some(registration) = unused {
            registration.release();
        }
        future
    }
}
