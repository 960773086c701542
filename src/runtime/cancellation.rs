//! One-shot, broadcast cancellation signal.
//!
//! Once fired a signal stays fired. Observers run synchronously, in registration
//! order, on the thread that fires the signal; tasks waiting on
//! [`CancellationSignal::cancelled`] are woken afterwards and observe it at their
//! next poll.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use crate::lock;

type Observer = Box<dyn FnOnce() + Send + 'static>;

/// Registration returned by [`CancellationSignal::observe`], used to withdraw
/// an observer that is no longer needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
struct SignalInner {
    fired: bool,
    next_observer: u64,
    // Keyed by registration order.
    observers: BTreeMap<ObserverId, Observer>,
    wakers: Vec<Waker>,
}

#[derive(Clone, Default)]
pub struct CancellationSignal {
    inner: Arc<Mutex<SignalInner>>,
}

impl std::fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("CancellationSignal")
            .field("fired", &inner.fired)
            .field("observers", &inner.observers.len())
            .field("waiters", &inner.wakers.len())
            .finish()
    }
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fired(&self) -> bool {
        lock(&self.inner).fired
    }

    /// Fire the signal. Returns `false` if it had already fired.
    pub fn fire(&self) -> bool {
        let (observers, wakers) = {
            let mut inner = lock(&self.inner);
            if inner.fired {
                return false;
            }
            inner.fired = true;
            (
                std::mem::take(&mut inner.observers),
                std::mem::take(&mut inner.wakers),
            )
        };
        for observer in observers.into_values() {
            observer();
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Register a non-blocking observer. Runs immediately if the signal already fired.
    pub fn observe(&self, observer: impl FnOnce() + Send + 'static) -> ObserverId {
        let id = {
            let mut inner = lock(&self.inner);
            let id = ObserverId(inner.next_observer);
            inner.next_observer += 1;
            if !inner.fired {
                inner.observers.insert(id, Box::new(observer));
                return id;
            }
            id
        };
        observer();
        id
    }

    /// Drop an observer that has not run. Returns `false` if it already ran or
    /// was removed before.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        lock(&self.inner).observers.remove(&id).is_some()
    }

    /// Observers waiting for the signal to fire.
    pub fn observer_count(&self) -> usize {
        lock(&self.inner).observers.len()
    }

    /// Distinct wakers parked on [`cancelled`](Self::cancelled).
    pub fn waiter_count(&self) -> usize {
        lock(&self.inner).wakers.len()
    }

    /// Suspend until the signal fires.
    pub fn cancelled(&self) -> Cancelled {
        Cancelled {
            inner: self.inner.clone(),
        }
    }

    /// A signal that fires whenever this one does, and can also be fired on its own.
    pub fn child(&self) -> CancellationSignal {
        let child = CancellationSignal::new();
        let propagate = child.clone();
        self.observe(move || {
            propagate.fire();
        });
        child
    }
}

#[must_use = "futures do nothing unless awaited"]
pub struct Cancelled {
    inner: Arc<Mutex<SignalInner>>,
}

impl Future for Cancelled {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut inner = lock(&self.inner);
        if inner.fired {
            return Poll::Ready(());
        }
        if !inner.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            inner.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

/// Fires the signal of a context created by `WorkflowContext::with_cancel`.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    signal: CancellationSignal,
}

impl CancelHandle {
    pub(crate) fn new(signal: CancellationSignal) -> Self {
        Self { signal }
    }

    pub fn cancel(&self) {
        self.signal.fire();
    }

    pub fn is_canceled(&self) -> bool {
        self.signal.is_fired()
    }
}
