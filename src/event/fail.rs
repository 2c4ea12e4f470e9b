//! Negated events: asserting that something does *not* happen.
//!
//! A [`FailEvent`] inverts an occurrence. The wrapped event firing before
//! the deadline is the failure, raised as a
//! [`DisallowedOccurred`](crate::ErrorKind::DisallowedOccurred) error; the
//! wrapped event timing out is the success, reported as [`Waited::Absent`]
//! with the inner timeout swallowed.
//!
//! [`FailIf`] is the composed form: a main event raced against a fail
//! event, so "wait for X, failing if Y happens first" reads as
//! `x.fail_if(y)`.

use std::sync::Arc;
use std::time::Duration;

use crate::cx::Cx;
use crate::error::{Error, Result};
use crate::event::multi::race;
use crate::event::{Event, Waited};
use crate::time::{same_keeper, TimeKeeper};

enum Cause {
    Default,
    Fixed(Error),
    Supplier(Box<dyn Fn() -> Error + Send + Sync>),
    Map(Box<dyn Fn(Error) -> Error + Send + Sync>),
}

impl Cause {
    fn raise(&self, description: &str) -> Error {
        let base = Error::disallowed(description);
        match self {
            Self::Default => base,
            Self::Fixed(err) => err.clone(),
            Self::Supplier(supply) => supply(),
            Self::Map(map) => map(base),
        }
    }
}

/// An event that succeeds when its underlying occurrence does not happen.
pub struct FailEvent {
    underlying: Box<dyn Event<()>>,
    cause: Cause,
}

impl FailEvent {
    /// Wraps `underlying` as a disallowed occurrence.
    #[must_use]
    pub fn new(underlying: impl Event<()> + 'static) -> Self {
        Self {
            underlying: Box::new(underlying),
            cause: Cause::Default,
        }
    }

    /// Raises `error` instead of the default assertion error.
    #[must_use]
    pub fn throwing(mut self, error: Error) -> Self {
        self.cause = Cause::Fixed(error);
        self
    }

    /// Raises the supplied error, built only at failure time.
    #[must_use]
    pub fn throwing_with(mut self, supply: impl Fn() -> Error + Send + Sync + 'static) -> Self {
        self.cause = Cause::Supplier(Box::new(supply));
        self
    }

    /// Passes the generated assertion error through `map`, to wrap or
    /// replace it.
    #[must_use]
    pub fn throwing_map(mut self, map: impl Fn(Error) -> Error + Send + Sync + 'static) -> Self {
        self.cause = Cause::Map(Box::new(map));
        self
    }
}

impl Event<()> for FailEvent {
    fn wait_up_to(&self, cx: &Cx, timeout: Duration) -> Result<Waited<()>> {
        match self.underlying.wait_up_to(cx, timeout) {
            Ok(Waited::Value(())) => {
                tracing::debug!(event = %self.underlying.describe(), "disallowed event occurred");
                Err(self.cause.raise(&self.underlying.describe()))
            }
            Ok(Waited::Absent) => Ok(Waited::Absent),
            Ok(Waited::Cancelled) => Ok(Waited::Cancelled),
            // The underlying not happening is this event's success; its
            // timeout is swallowed, never surfaced.
            Err(err) if err.is_timeout() => Ok(Waited::Absent),
            Err(err) => Err(err),
        }
    }

    fn time_keeper(&self) -> &Arc<dyn TimeKeeper> {
        self.underlying.time_keeper()
    }

    fn describe(&self) -> String {
        format!("no {}", self.underlying.describe())
    }
}

impl core::fmt::Debug for FailEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FailEvent")
            .field("underlying", &self.underlying.describe())
            .finish()
    }
}

/// Adapts a [`FailEvent`] to any value type so it can race a main event.
struct FailBranch<'a> {
    fail: &'a FailEvent,
}

impl<T: Send> Event<T> for FailBranch<'_> {
    fn wait_up_to(&self, cx: &Cx, timeout: Duration) -> Result<Waited<T>> {
        // A fail event never yields a value, only Absent or an error.
        Ok(self.fail.wait_up_to(cx, timeout)?.map(|()| unreachable!()))
    }

    fn time_keeper(&self) -> &Arc<dyn TimeKeeper> {
        self.fail.time_keeper()
    }

    fn describe(&self) -> String {
        self.fail.describe()
    }
}

/// A main event awaited while a disallowed occurrence is watched.
///
/// Built by [`Event::fail_if`] / [`Event::fail_if_condition`].
///
/// # Example
///
/// ```ignore
/// let page = page_loaded
///     .fail_if(error_dialog_shown)
///     .wait_up_to(&cx, Duration::from_secs(10))?;
/// ```
pub struct FailIf<T: 'static> {
    original: Box<dyn Event<T>>,
    fail: FailEvent,
    keeper: Arc<dyn TimeKeeper>,
}

impl<T: Send + 'static> FailIf<T> {
    /// Combines a main event with a disallowed occurrence.
    ///
    /// # Panics
    ///
    /// Panics if the two events are not on the same time keeper.
    #[must_use]
    pub fn new(original: impl Event<T> + 'static, disallowed: impl Event<()> + 'static) -> Self {
        assert!(
            same_keeper(original.time_keeper(), disallowed.time_keeper()),
            "combined events must share one time keeper"
        );
        let keeper = Arc::clone(original.time_keeper());
        Self {
            original: Box::new(original),
            fail: FailEvent::new(disallowed),
            keeper,
        }
    }

    /// Raises `error` instead of the default assertion error when the
    /// disallowed occurrence happens.
    #[must_use]
    pub fn throwing(mut self, error: Error) -> Self {
        self.fail = self.fail.throwing(error);
        self
    }

    /// Raises the supplied error, built only at failure time.
    #[must_use]
    pub fn throwing_with(mut self, supply: impl Fn() -> Error + Send + Sync + 'static) -> Self {
        self.fail = self.fail.throwing_with(supply);
        self
    }

    /// Passes the generated assertion error through `map`.
    #[must_use]
    pub fn throwing_map(mut self, map: impl Fn(Error) -> Error + Send + Sync + 'static) -> Self {
        self.fail = self.fail.throwing_map(map);
        self
    }
}

impl<T: Send + 'static> Event<T> for FailIf<T> {
    fn wait_up_to(&self, cx: &Cx, timeout: Duration) -> Result<Waited<T>> {
        let branch = FailBranch { fail: &self.fail };
        // A timeout names the whole composed expression, not just the main
        // event.
        race(
            self.original.as_ref(),
            &branch as &dyn Event<T>,
            cx,
            timeout,
            &self.describe(),
        )
    }

    fn time_keeper(&self) -> &Arc<dyn TimeKeeper> {
        &self.keeper
    }

    fn describe(&self) -> String {
        format!("{}, failing if {}", self.original.describe(), self.fail.underlying.describe())
    }
}

impl<T> core::fmt::Debug for FailIf<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FailIf")
            .field("original", &self.original.describe())
            .field("disallowed", &self.fail.underlying.describe())
            .finish()
    }
}
