//! Single-resolution futures shared between the engine and workflow code.
//!
//! A [`DurableFuture`] is resolved by whoever owns the outcome (the history
//! applier, a cancellation observer, a retry loop) and awaited by workflow tasks.
//! Awaiting registers the task's waker; resolving wakes every registered waker,
//! which puts the awaiting tasks back on the scheduler's ready queue.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use serde::de::DeserializeOwned;

use crate::error::WorkflowError;
use crate::lock;
use crate::payload::{Converter, DefaultConverter, Payload};

/// Outcome stored in a [`DurableFuture`].
pub type DurableResult = Result<Payload, WorkflowError>;

#[derive(Default)]
struct Slot {
    value: Option<DurableResult>,
    wakers: Vec<Waker>,
}

/// Eventual `(value, error)` pair. Resolved at most once; the first resolution
/// is authoritative.
#[derive(Clone, Default)]
pub struct DurableFuture {
    slot: Arc<Mutex<Slot>>,
}

impl std::fmt::Debug for DurableFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = lock(&self.slot);
        f.debug_struct("DurableFuture")
            .field("value", &slot.value)
            .field("waiters", &slot.wakers.len())
            .finish()
    }
}

impl DurableFuture {
    pub fn new() -> Self {
        Self::default()
    }

    /// A future that is already resolved.
    pub fn resolved(result: DurableResult) -> Self {
        let f = Self::new();
        f.set(result);
        f
    }

    /// Resolve the future. Returns `false`, leaving the stored outcome untouched,
    /// if it was already resolved.
    pub fn set(&self, result: DurableResult) -> bool {
        let wakers = {
            let mut slot = lock(&self.slot);
            if slot.value.is_some() {
                return false;
            }
            slot.value = Some(result);
            std::mem::take(&mut slot.wakers)
        };
        for waker in wakers {
            waker.wake();
        }
        true
    }

    pub fn is_ready(&self) -> bool {
        lock(&self.slot).value.is_some()
    }

    /// Current outcome without suspending.
    pub fn peek(&self) -> Option<DurableResult> {
        lock(&self.slot).value.clone()
    }

    /// Wait for the raw payload.
    pub fn result(&self) -> Resolution {
        Resolution { slot: self.slot.clone() }
    }

    /// Wait for the outcome and decode it with the default converter.
    pub fn get<T: DeserializeOwned>(&self) -> impl Future<Output = Result<T, WorkflowError>> + Send + use<T> {
        let resolution = self.result();
        async move {
            let payload = resolution.await?;
            DefaultConverter::default()
                .from_payload(&payload)
                .map_err(|e| WorkflowError::conversion("get_result", e))
        }
    }

    /// Wait for the outcome, discarding any value.
    pub fn wait(&self) -> impl Future<Output = Result<(), WorkflowError>> + Send + use<> {
        let resolution = self.result();
        async move { resolution.await.map(|_| ()) }
    }
}

/// Suspension point returned by [`DurableFuture::result`].
#[must_use = "futures do nothing unless awaited"]
pub struct Resolution {
    slot: Arc<Mutex<Slot>>,
}

impl Future for Resolution {
    type Output = DurableResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = lock(&self.slot);
        if let Some(value) = &slot.value {
            return Poll::Ready(value.clone());
        }
        if !slot.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            slot.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}
