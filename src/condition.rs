//! Conditions: repeatable computations tested against a predicate.
//!
//! A [`Condition`] is the unit a poll event evaluates on every tick. Each
//! call to [`is_met`](Condition::is_met) re-runs the computation (values are
//! never memoised between ticks), stores what it observed, and reports
//! whether the predicate held. The stored value is what a successful poll
//! wait ultimately returns.
//!
//! [`FnCondition`] is the closure adapter covering the common case:
//!
//! ```ignore
//! let cond = FnCondition::new(|| inbox.len(), |n| *n >= 3)
//!     .described_as("three messages to arrive");
//! ```

use core::fmt;

use crate::error::Result;

/// A computation plus a predicate over its result.
///
/// `is_met` takes `&mut self` so implementations can hold mutable state
/// (counters, sockets, readers) without interior mutability.
pub trait Condition<T>: Send {
    /// Re-runs the computation, records the observed value, and returns
    /// whether the predicate held.
    ///
    /// A failure of the computation itself surfaces as
    /// [`ErrorKind::ConditionEvaluation`](crate::ErrorKind::ConditionEvaluation)
    /// with the cause attached.
    fn is_met(&mut self) -> Result<bool>;

    /// Returns the most recently observed value.
    ///
    /// # Panics
    ///
    /// Panics if called before any successful evaluation. Callers only reach
    /// this after `is_met` returned `Ok(true)`.
    fn last_result(&self) -> T;

    /// Human description used in timeout and failure messages.
    fn describe(&self) -> String;
}

enum Description {
    None,
    Fixed(String),
    Lazy(Box<dyn Fn() -> String + Send>),
}

impl Description {
    fn render(&self) -> String {
        match self {
            Self::None => "condition to be met".to_owned(),
            Self::Fixed(text) => text.clone(),
            Self::Lazy(supplier) => supplier(),
        }
    }
}

/// Closure-backed [`Condition`].
pub struct FnCondition<T: 'static> {
    supplier: Box<dyn FnMut() -> Result<T> + Send>,
    predicate: Box<dyn Fn(&T) -> bool + Send>,
    last: Option<T>,
    description: Description,
}

impl<T> FnCondition<T> {
    /// Creates a condition from an infallible computation and a predicate.
    #[must_use]
    pub fn new(
        mut supplier: impl FnMut() -> T + Send + 'static,
        predicate: impl Fn(&T) -> bool + Send + 'static,
    ) -> Self {
        Self {
            supplier: Box::new(move || Ok(supplier())),
            predicate: Box::new(predicate),
            last: None,
            description: Description::None,
        }
    }

    /// Creates a condition whose computation can fail.
    ///
    /// Failures are wrapped as condition-evaluation errors with the cause
    /// attached, so a poll's ignore policy can match on them.
    #[must_use]
    pub fn fallible<E>(
        mut supplier: impl FnMut() -> core::result::Result<T, E> + Send + 'static,
        predicate: impl Fn(&T) -> bool + Send + 'static,
    ) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            supplier: Box::new(move || {
                supplier().map_err(crate::error::Error::condition_evaluation)
            }),
            predicate: Box::new(predicate),
            last: None,
            description: Description::None,
        }
    }

    /// Sets the description used in failure messages.
    #[must_use]
    pub fn described_as(mut self, text: impl Into<String>) -> Self {
        self.description = Description::Fixed(text.into());
        self
    }

    /// Sets a description computed lazily, only when a message is rendered.
    #[must_use]
    pub fn described_as_with(mut self, supplier: impl Fn() -> String + Send + 'static) -> Self {
        self.description = Description::Lazy(Box::new(supplier));
        self
    }
}

impl<T: Clone + Send> Condition<T> for FnCondition<T> {
    fn is_met(&mut self) -> Result<bool> {
        let value = (self.supplier)()?;
        let met = (self.predicate)(&value);
        self.last = Some(value);
        Ok(met)
    }

    fn last_result(&self) -> T {
        match &self.last {
            Some(value) => value.clone(),
            None => panic!("last_result called before a successful evaluation"),
        }
    }

    fn describe(&self) -> String {
        self.description.render()
    }
}

impl<T> fmt::Debug for FnCondition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCondition")
            .field("description", &self.description.render())
            .field("evaluated", &self.last.is_some())
            .finish()
    }
}
