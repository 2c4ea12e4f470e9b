//! Chaining two events under one shared deadline budget.
//!
//! The first constituent is awaited with the full requested duration; the
//! second gets whatever remains, measured on the chain's shared clock. A
//! constituent's timeout is re-raised attributed to the chain as a whole,
//! always reporting the full requested duration, so the caller sees one
//! coherent failure for the expression they wrote.

use std::sync::Arc;
use std::time::Duration;

use crate::cx::Cx;
use crate::error::{Error, Result};
use crate::event::{Event, Waited};
use crate::time::{same_keeper, TimeKeeper};

/// An event that awaits one occurrence and then another.
///
/// Built by [`Event::and_then_expect`] / [`Event::and_then_expect_condition`].
/// The first constituent's value is discarded; the chain yields the
/// second's.
///
/// # Example
///
/// ```ignore
/// let body = connection_opened
///     .and_then_expect(response_received)
///     .wait_up_to(&cx, Duration::from_secs(5))?;
/// ```
pub struct SequentialEvent<T: 'static> {
    original: Box<dyn Event<()>>,
    additional: Box<dyn Event<T>>,
    additional_description: Option<String>,
    keeper: Arc<dyn TimeKeeper>,
}

impl<T> SequentialEvent<T> {
    /// Chains two events.
    ///
    /// # Panics
    ///
    /// Panics if the two events are not on the same time keeper. The budget
    /// arithmetic is only meaningful against one clock.
    #[must_use]
    pub fn new(original: impl Event<()> + 'static, additional: impl Event<T> + 'static) -> Self {
        assert!(
            same_keeper(original.time_keeper(), additional.time_keeper()),
            "chained events must share one time keeper"
        );
        let keeper = Arc::clone(original.time_keeper());
        Self {
            original: Box::new(original),
            additional: Box::new(additional),
            additional_description: None,
            keeper,
        }
    }

    /// Overrides the second constituent's portion of the description.
    #[must_use]
    pub fn described_as(mut self, text: impl Into<String>) -> Self {
        self.additional_description = Some(text.into());
        self
    }

    fn additional_description(&self) -> String {
        match &self.additional_description {
            Some(text) => text.clone(),
            None => self.additional.describe(),
        }
    }
}

impl<T> Event<T> for SequentialEvent<T> {
    fn wait_up_to(&self, cx: &Cx, timeout: Duration) -> Result<Waited<T>> {
        let start = self.keeper.instant();
        match self.original.wait_up_to(cx, timeout) {
            Ok(Waited::Value(()) | Waited::Absent) => {}
            Ok(Waited::Cancelled) => return Ok(Waited::Cancelled),
            Err(err) if err.is_timeout() => {
                tracing::debug!(chain = %self.describe(), "first constituent timed out");
                return Err(Error::timeout(self.describe(), timeout));
            }
            Err(err) => return Err(err),
        }
        // Zero remainder is a valid immediately-expiring deadline for the
        // second constituent, not a reason to skip it.
        let elapsed = self.keeper.instant().saturating_duration_since(start);
        let remaining = timeout.saturating_sub(elapsed);
        match self.additional.wait_up_to(cx, remaining) {
            Err(err) if err.is_timeout() => Err(Error::timeout(self.describe(), timeout)),
            other => other,
        }
    }

    fn time_keeper(&self) -> &Arc<dyn TimeKeeper> {
        &self.keeper
    }

    fn describe(&self) -> String {
        format!(
            "{} and then {}",
            self.original.describe(),
            self.additional_description()
        )
    }
}

impl<T> core::fmt::Debug for SequentialEvent<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SequentialEvent")
            .field("original", &self.original.describe())
            .field("additional", &self.additional_description())
            .finish()
    }
}
