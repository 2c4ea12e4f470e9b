//! Events: occurrences that can be awaited with a deadline and composed.
//!
//! An [`Event`] stands for something that may happen in the future. Waiting
//! on one blocks the calling thread until the occurrence completes, the
//! deadline elapses, or the wait context is cancelled:
//!
//! ```text
//!                    wait_up_to(cx, timeout)
//!                              |
//!            +-----------------+------------------+
//!            |                 |                  |
//!     Ok(Value(v))      Err(Timeout)       Ok(Cancelled)
//!     it happened       it did not         caller gave up
//! ```
//!
//! Events compose: `a.or(b)` races two occurrences, `a.and_then_expect(b)`
//! chains them under one shared deadline budget, `a.after(action)` performs
//! a triggering action first, and `a.fail_if(b)` turns `b` into an
//! assertion that must not fire while `a` is awaited.
//!
//! # Example
//!
//! ```ignore
//! let reply = request_sent
//!     .after(|| client.send(&request))
//!     .fail_if_condition(FnCondition::new(|| dialog.visible(), |v| *v)
//!         .described_as("an error dialog"))
//!     .wait_up_to(&cx, Duration::from_secs(5))?;
//! ```

mod fail;
mod gate;
mod listener;
mod multi;
mod poll;
mod sequential;
mod worker;

pub use fail::{FailEvent, FailIf};
pub use listener::EventListener;
pub use multi::MultiEvent;
pub use poll::{PollEvent, DEFAULT_POLL_INTERVAL};
pub use sequential::SequentialEvent;
pub use worker::PollWorker;

pub(crate) use gate::{Gate, GateOutcome};

use std::sync::Arc;
use std::time::Duration;

use crate::condition::Condition;
use crate::cx::Cx;
use crate::error::{Error, Result};
use crate::time::TimeKeeper;

/// The outcome of a completed wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waited<T> {
    /// The occurrence completed with this result.
    Value(T),
    /// The occurrence has nothing to yield: the success path of a
    /// fail-event whose disallowed occurrence never happened.
    Absent,
    /// The wait context was cancelled. A sentinel, never an error.
    Cancelled,
}

impl<T> Waited<T> {
    /// Returns the value if the occurrence completed with one.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Absent | Self::Cancelled => None,
        }
    }

    /// Returns true if the wait was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Maps the carried value, preserving `Absent` and `Cancelled`.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Waited<U> {
        match self {
            Self::Value(value) => Waited::Value(f(value)),
            Self::Absent => Waited::Absent,
            Self::Cancelled => Waited::Cancelled,
        }
    }
}

/// An occurrence that can be awaited with a deadline.
///
/// Implementations promise exactly one of three outcomes per wait: a value
/// (or [`Waited::Absent`]) before the deadline, a
/// [`Timeout`](crate::ErrorKind::Timeout) error at or after it, or the
/// [`Waited::Cancelled`] sentinel if the context is cancelled. Failures of
/// the awaited machinery itself surface as the other error kinds.
///
/// The provided methods are the composition surface. Combinators require
/// both constituents to share one [`TimeKeeper`] instance and panic at
/// construction when they do not; events built without an explicit keeper
/// all share the process-wide [`system`](crate::time::system) clock, so
/// this only bites when a virtual clock is attached to one side only.
pub trait Event<T>: Send + Sync {
    /// Awaits the occurrence for at most `timeout`.
    fn wait_up_to(&self, cx: &Cx, timeout: Duration) -> Result<Waited<T>>;

    /// The clock this event reads and sleeps on.
    fn time_keeper(&self) -> &Arc<dyn TimeKeeper>;

    /// Human description used in timeout and failure messages.
    fn describe(&self) -> String;

    /// Performs `action`, then awaits this event with the full `timeout`.
    ///
    /// The action's own running time is not charged against the budget. On
    /// a chained event the action runs before the first constituent.
    #[must_use]
    fn after(self, action: impl Fn() + Send + Sync + 'static) -> After<T>
    where
        Self: Sized + 'static,
        T: 'static,
    {
        After {
            action: Box::new(action),
            inner: Box::new(self),
        }
    }

    /// Races this event against `other`; the first to complete wins and the
    /// loser is cancelled.
    #[must_use]
    fn or(self, other: impl Event<T> + 'static) -> MultiEvent<T>
    where
        Self: Sized + 'static,
        T: Send + 'static,
    {
        MultiEvent::new(self, other)
    }

    /// Races this event against polling `condition` at the default interval.
    #[must_use]
    fn or_condition(self, condition: impl Condition<T> + 'static) -> MultiEvent<T>
    where
        Self: Sized + 'static,
        T: Clone + Send + 'static,
    {
        let keeper = Arc::clone(self.time_keeper());
        MultiEvent::new(self, PollEvent::new(condition).with_time_keeper(keeper))
    }

    /// Awaits this event, then `next`, under one shared deadline budget.
    ///
    /// This event's value is discarded; the chain yields `next`'s value.
    #[must_use]
    fn and_then_expect<U>(self, next: impl Event<U> + 'static) -> SequentialEvent<U>
    where
        Self: Sized + 'static,
        T: 'static,
        U: 'static,
    {
        SequentialEvent::new(DiscardValue { inner: Box::new(self) }, next)
    }

    /// Awaits this event, then polls `condition` at the default interval,
    /// under one shared deadline budget.
    #[must_use]
    fn and_then_expect_condition<U>(self, condition: impl Condition<U> + 'static) -> SequentialEvent<U>
    where
        Self: Sized + 'static,
        T: 'static,
        U: Clone + Send + 'static,
    {
        let keeper = Arc::clone(self.time_keeper());
        SequentialEvent::new(
            DiscardValue { inner: Box::new(self) },
            PollEvent::new(condition).with_time_keeper(keeper),
        )
    }

    /// Awaits this event while asserting that `disallowed` does not fire.
    ///
    /// If `disallowed` completes first the wait fails with a
    /// [`DisallowedOccurred`](crate::ErrorKind::DisallowedOccurred) error.
    #[must_use]
    fn fail_if<U>(self, disallowed: impl Event<U> + 'static) -> FailIf<T>
    where
        Self: Sized + 'static,
        T: Send + 'static,
        U: 'static,
    {
        FailIf::new(self, DiscardValue { inner: Box::new(disallowed) })
    }

    /// Like [`fail_if`](Self::fail_if), with the disallowed occurrence
    /// given as a condition polled at the default interval.
    #[must_use]
    fn fail_if_condition<U>(self, condition: impl Condition<U> + 'static) -> FailIf<T>
    where
        Self: Sized + 'static,
        T: Send + 'static,
        U: Clone + Send + 'static,
    {
        let keeper = Arc::clone(self.time_keeper());
        let disallowed = PollEvent::new(condition).with_time_keeper(keeper);
        FailIf::new(self, DiscardValue { inner: Box::new(disallowed) })
    }

    /// Overrides the description used in this event's timeout messages.
    #[must_use]
    fn described_as(self, text: impl Into<String>) -> Described<T>
    where
        Self: Sized + 'static,
        T: 'static,
    {
        Described {
            inner: Box::new(self),
            text: text.into(),
        }
    }
}

/// An event that performs an action before each wait.
///
/// Built by [`Event::after`].
pub struct After<T: 'static> {
    action: Box<dyn Fn() + Send + Sync>,
    inner: Box<dyn Event<T>>,
}

impl<T> Event<T> for After<T> {
    fn wait_up_to(&self, cx: &Cx, timeout: Duration) -> Result<Waited<T>> {
        (self.action)();
        self.inner.wait_up_to(cx, timeout)
    }

    fn time_keeper(&self) -> &Arc<dyn TimeKeeper> {
        self.inner.time_keeper()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

impl<T> core::fmt::Debug for After<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("After").field("inner", &self.describe()).finish()
    }
}

/// An event with an overridden description.
///
/// Built by [`Event::described_as`]. Timeouts raised by the wrapped wait
/// are re-rendered with the override so the caller-facing message matches.
pub struct Described<T: 'static> {
    inner: Box<dyn Event<T>>,
    text: String,
}

impl<T> Event<T> for Described<T> {
    fn wait_up_to(&self, cx: &Cx, timeout: Duration) -> Result<Waited<T>> {
        match self.inner.wait_up_to(cx, timeout) {
            Err(err) if err.is_timeout() => Err(Error::timeout(&self.text, timeout)),
            other => other,
        }
    }

    fn time_keeper(&self) -> &Arc<dyn TimeKeeper> {
        self.inner.time_keeper()
    }

    fn describe(&self) -> String {
        self.text.clone()
    }
}

impl<T> core::fmt::Debug for Described<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Described").field("text", &self.text).finish()
    }
}

/// Type-erases an event's value, keeping only its completion.
pub(crate) struct DiscardValue<T: 'static> {
    pub(crate) inner: Box<dyn Event<T>>,
}

impl<T> Event<()> for DiscardValue<T> {
    fn wait_up_to(&self, cx: &Cx, timeout: Duration) -> Result<Waited<()>> {
        Ok(self.inner.wait_up_to(cx, timeout)?.map(|_| ()))
    }

    fn time_keeper(&self) -> &Arc<dyn TimeKeeper> {
        self.inner.time_keeper()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}
