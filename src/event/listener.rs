//! Manually triggered one-shot events.
//!
//! An [`EventListener`] is the bridge from callback-style code into the
//! waiting algebra: hand a clone to the code that observes the occurrence,
//! have it call [`trigger`](EventListener::trigger), and await the listener
//! like any other event. Completion is first-wins; later triggers are
//! no-ops.
//!
//! # Example
//!
//! ```ignore
//! let received = EventListener::new();
//! let on_message = received.clone();
//! client.on_message(move |msg| {
//!     on_message.trigger(msg);
//! });
//! let msg = received.wait_up_to(&cx, Duration::from_secs(5))?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::cx::Cx;
use crate::error::{Error, Result};
use crate::event::{Event, Gate, GateOutcome, Waited};
use crate::time::TimeKeeper;

/// A one-shot event completed by an explicit trigger call.
///
/// Cloneable; all clones share the same completion. Waiting blocks on a
/// wall-clock gate, so a trigger from any thread wakes the waiter
/// immediately.
pub struct EventListener<T> {
    gate: Arc<Gate<Result<T>>>,
    keeper: Arc<dyn TimeKeeper>,
    description: Option<Arc<str>>,
}

impl<T> Clone for EventListener<T> {
    fn clone(&self) -> Self {
        Self {
            gate: Arc::clone(&self.gate),
            keeper: Arc::clone(&self.keeper),
            description: self.description.clone(),
        }
    }
}

impl<T> Default for EventListener<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventListener<T> {
    /// Creates an untriggered listener on the process-wide clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Gate::new()),
            keeper: crate::time::system(),
            description: None,
        }
    }

    /// Attaches a clock, for composing with events on a virtual clock.
    ///
    /// The gate itself always wakes in real time; the keeper only matters
    /// for combinator construction.
    #[must_use]
    pub fn with_time_keeper(mut self, keeper: Arc<dyn TimeKeeper>) -> Self {
        self.keeper = keeper;
        self
    }

    /// Sets the description used in failure messages. Unlike the trait
    /// combinator of the same name this keeps the listener triggerable.
    #[must_use]
    pub fn described_as(mut self, text: impl Into<String>) -> Self {
        self.description = Some(Arc::from(text.into().as_str()));
        self
    }

    /// Completes the listener with `value`. Returns true if this call won;
    /// a listener already completed ignores further triggers.
    pub fn trigger(&self, value: T) -> bool {
        let won = self.gate.offer(Ok(value));
        if won {
            tracing::trace!(listener = %self.render_description(), "listener triggered");
        }
        won
    }

    /// Completes the listener with an error, re-raised by every waiter.
    /// First-wins like [`trigger`](Self::trigger).
    pub fn trigger_error(&self, error: Error) -> bool {
        self.gate.offer(Err(error))
    }

    fn render_description(&self) -> String {
        match &self.description {
            Some(text) => text.to_string(),
            None => "a listened-for event".to_owned(),
        }
    }
}

impl<T: Clone + Send + 'static> Event<T> for EventListener<T> {
    fn wait_up_to(&self, cx: &Cx, timeout: Duration) -> Result<Waited<T>> {
        match self.gate.wait(timeout, cx.token()) {
            GateOutcome::Signalled(Ok(value)) => Ok(Waited::Value(value)),
            GateOutcome::Signalled(Err(err)) => Err(err),
            GateOutcome::TimedOut => Err(Error::timeout(self.render_description(), timeout)),
            GateOutcome::Cancelled => Ok(Waited::Cancelled),
        }
    }

    fn time_keeper(&self) -> &Arc<dyn TimeKeeper> {
        &self.keeper
    }

    fn describe(&self) -> String {
        self.render_description()
    }
}

impl<T> core::fmt::Debug for EventListener<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventListener")
            .field("description", &self.render_description())
            .finish()
    }
}
