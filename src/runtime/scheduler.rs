//! Cooperative, single-stepping scheduler for the logical tasks of one workflow
//! instance.
//!
//! Exactly one task runs at a time and only gives up control at a suspension
//! point. Tasks become ready when spawned or when something wakes them, and are
//! polled strictly in the order they became ready. Given the same sequence of
//! resolutions, the same interleaving happens on every replay.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll, Wake, Waker};

use futures::future::BoxFuture;
use tracing::{debug, trace};

use crate::error::ExecutorError;
use crate::lock;

pub(crate) type TaskFuture = BoxFuture<'static, ()>;

/// Identifier of a logical task, assigned in spawn order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

struct Task {
    name: String,
    future: TaskFuture,
    // One waker per task for its whole life, so suspension points can tell a
    // repeated registration apart from a new waiter.
    waker: Waker,
}

#[derive(Default)]
struct Shared {
    ready: VecDeque<TaskId>,
    queued: HashSet<TaskId>,
    spawned: Vec<(TaskId, Task)>,
    next_task_id: u64,
}

impl Shared {
    fn enqueue(&mut self, id: TaskId) {
        if self.queued.insert(id) {
            self.ready.push_back(id);
        }
    }
}

/// Handle used by workflow code to add tasks while the scheduler is running.
#[derive(Clone)]
pub(crate) struct Spawner {
    shared: Arc<Mutex<Shared>>,
}

impl Spawner {
    pub(crate) fn spawn<F>(&self, name: impl Into<String>, future: F) -> TaskId
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut shared = lock(&self.shared);
        let id = TaskId(shared.next_task_id);
        shared.next_task_id += 1;
        let waker = Waker::from(Arc::new(TaskWaker {
            id,
            shared: Arc::downgrade(&self.shared),
        }));
        shared.spawned.push((
            id,
            Task {
                name: name.into(),
                future: Box::pin(future),
                waker,
            },
        ));
        shared.enqueue(id);
        id
    }
}

struct TaskWaker {
    id: TaskId,
    shared: Weak<Mutex<Shared>>,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared).enqueue(self.id);
        }
    }
}

pub(crate) struct Scheduler {
    shared: Arc<Mutex<Shared>>,
    tasks: BTreeMap<TaskId, Task>,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            tasks: BTreeMap::new(),
        }
    }

    pub(crate) fn spawner(&self) -> Spawner {
        Spawner {
            shared: self.shared.clone(),
        }
    }

    /// Number of tasks that have not finished yet.
    pub(crate) fn live_tasks(&self) -> usize {
        self.tasks.len() + lock(&self.shared).spawned.len()
    }

    /// Poll ready tasks until none is ready. Returns how many polls were made.
    pub(crate) fn run_until_blocked(&mut self, max_steps: usize) -> Result<usize, ExecutorError> {
        let mut steps = 0;
        loop {
            let next = {
                let mut shared = lock(&self.shared);
                for (id, task) in shared.spawned.drain(..) {
                    self.tasks.insert(id, task);
                }
                let next = shared.ready.pop_front();
                if let Some(id) = next {
                    shared.queued.remove(&id);
                }
                next
            };
            let Some(id) = next else {
                return Ok(steps);
            };
            // A task can be woken after it finished; nothing to do then.
            let Some(task) = self.tasks.get_mut(&id) else {
                continue;
            };

            if steps >= max_steps {
                return Err(ExecutorError::SchedulerStalled { steps });
            }
            steps += 1;

            let Task { name, future, waker } = task;
            let mut cx = Context::from_waker(waker);
            trace!(task = %id, name = %name, "polling task");
            match catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))) {
                Ok(Poll::Ready(())) => {
                    if let Some(done) = self.tasks.remove(&id) {
                        debug!(task = %id, name = %done.name, "task finished");
                    }
                }
                Ok(Poll::Pending) => {}
                Err(panic) => {
                    let name = self.tasks.remove(&id).map(|t| t.name).unwrap_or_default();
                    return Err(ExecutorError::WorkflowPanicked {
                        task: name,
                        message: panic_message(panic.as_ref()),
                    });
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

/// Suspension point that gives every other ready task a turn.
#[must_use = "futures do nothing unless awaited"]
pub struct YieldNow {
    yielded: bool,
}

impl YieldNow {
    pub(crate) fn new() -> Self {
        Self { yielded: false }
    }
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
