//! One-shot first-writer-wins completion gate.
//!
//! A `Gate` holds at most one result. Racing producers call [`Gate::offer`];
//! only the first succeeds and wakes the consumer. The consumer blocks in
//! [`Gate::take`] (or [`Gate::wait`] for cloneable results) with a wall-clock
//! backstop, and is also woken immediately if its cancel token trips.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::cx::CancelToken;

/// How a gate wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GateOutcome<R> {
    /// A producer won the gate with this result.
    Signalled(R),
    /// The backstop duration elapsed with no producer.
    TimedOut,
    /// The consumer's cancel token tripped.
    Cancelled,
}

struct GateInner<R> {
    slot: Mutex<Option<R>>,
    condvar: Condvar,
}

pub(crate) struct Gate<R> {
    inner: Arc<GateInner<R>>,
}

impl<R> Gate<R> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(GateInner {
                slot: Mutex::new(None),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Offers a result. Returns true if this call won the gate; a losing
    /// offer is dropped.
    pub(crate) fn offer(&self, result: R) -> bool {
        let mut slot = self.inner.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(result);
        self.inner.condvar.notify_all();
        true
    }
}

impl<R: Send + 'static> Gate<R> {
    // The wake holds the slot mutex while notifying, so a consumer between
    // its cancelled check and its park cannot miss the cancel.
    fn watch_cancel(&self, cancel: &CancelToken) -> crate::cx::WatchGuard {
        let inner = Arc::clone(&self.inner);
        cancel.watch(move || {
            let _slot = inner.slot.lock();
            inner.condvar.notify_all();
        })
    }

    /// Blocks until a result is offered, the backstop elapses, or `cancel`
    /// trips. Removes the result from the gate.
    ///
    /// The backstop is wall-clock time on purpose: gate consumers arbitrate
    /// between real helper threads, so a virtual clock must not stall them.
    pub(crate) fn take(&self, backstop: Duration, cancel: &CancelToken) -> GateOutcome<R> {
        let deadline = Instant::now() + backstop;
        let _watch = self.watch_cancel(cancel);
        let mut slot = self.inner.slot.lock();
        loop {
            if let Some(result) = slot.take() {
                return GateOutcome::Signalled(result);
            }
            if cancel.is_cancelled() {
                return GateOutcome::Cancelled;
            }
            let now = Instant::now();
            if now >= deadline {
                return GateOutcome::TimedOut;
            }
            self.inner.condvar.wait_for(&mut slot, deadline - now);
        }
    }
}

impl<R: Clone + Send + 'static> Gate<R> {
    /// Like [`take`](Self::take) but leaves the result in place, so every
    /// later wait observes the same completion.
    pub(crate) fn wait(&self, backstop: Duration, cancel: &CancelToken) -> GateOutcome<R> {
        let deadline = Instant::now() + backstop;
        let _watch = self.watch_cancel(cancel);
        let mut slot = self.inner.slot.lock();
        loop {
            if let Some(result) = slot.as_ref() {
                return GateOutcome::Signalled(result.clone());
            }
            if cancel.is_cancelled() {
                return GateOutcome::Cancelled;
            }
            let now = Instant::now();
            if now >= deadline {
                return GateOutcome::TimedOut;
            }
            self.inner.condvar.wait_for(&mut slot, deadline - now);
        }
    }
}

impl<R> core::fmt::Debug for Gate<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Gate")
            .field("signalled", &self.inner.slot.lock().is_some())
            .finish()
    }
}
