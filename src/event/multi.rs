//! Racing two events: first completion wins, the loser is cancelled.
//!
//! Each wait call spawns one scoped helper thread per branch; the scope
//! joins both before returning, so no work outlives the wait. Branches run
//! under fresh cancel tokens, which the race trips on every exit path.
//! Nested races propagate cancellation recursively the same way.

use std::sync::Arc;
use std::time::Duration;

use crate::cx::{CancelToken, Cx};
use crate::error::{Error, Result};
use crate::event::{Event, Gate, GateOutcome, Waited};
use crate::time::{same_keeper, TimeKeeper};

/// Races `first` against `second` for up to `timeout`.
///
/// Winner selection is first-writer-wins on a shared gate. A branch that
/// ends `Absent` or `Cancelled` stays silent; a winning timeout failure, or
/// the gate's own backstop elapsing, becomes a single timeout attributed to
/// `description`.
pub(crate) fn race<T: Send + 'static>(
    first: &dyn Event<T>,
    second: &dyn Event<T>,
    cx: &Cx,
    timeout: Duration,
    description: &str,
) -> Result<Waited<T>> {
    if cx.is_cancelled() {
        return Ok(Waited::Cancelled);
    }
    let gate = Gate::new();
    let first_token = CancelToken::new();
    let second_token = CancelToken::new();
    let outcome = std::thread::scope(|scope| {
        for (event, token) in [(first, &first_token), (second, &second_token)] {
            let gate = &gate;
            let branch_cx = Cx::with_token(token.clone());
            scope.spawn(move || match event.wait_up_to(&branch_cx, timeout) {
                Ok(Waited::Value(value)) => {
                    if gate.offer(Ok(value)) {
                        tracing::trace!("race branch won");
                    }
                }
                Ok(Waited::Absent | Waited::Cancelled) => {}
                Err(err) => {
                    let _ = gate.offer(Err(err));
                }
            });
        }
        let outcome = gate.take(timeout, cx.token());
        // Losing branches stop here; the scope joins them before we return.
        first_token.cancel();
        second_token.cancel();
        outcome
    });
    match outcome {
        GateOutcome::Signalled(Ok(value)) => Ok(Waited::Value(value)),
        GateOutcome::Signalled(Err(err)) if err.is_timeout() => {
            Err(Error::timeout(description, timeout))
        }
        GateOutcome::Signalled(Err(err)) => Err(err),
        GateOutcome::TimedOut => Err(Error::timeout(description, timeout)),
        GateOutcome::Cancelled => Ok(Waited::Cancelled),
    }
}

/// An event that completes when either of two events completes.
///
/// Built by [`Event::or`] / [`Event::or_condition`].
///
/// # Example
///
/// ```ignore
/// let page = page_loaded
///     .or(error_page_loaded)
///     .wait_up_to(&cx, Duration::from_secs(10))?;
/// ```
pub struct MultiEvent<T: 'static> {
    original: Box<dyn Event<T>>,
    additional: Box<dyn Event<T>>,
    keeper: Arc<dyn TimeKeeper>,
}

impl<T: Send + 'static> MultiEvent<T> {
    /// Combines two events into a race.
    ///
    /// # Panics
    ///
    /// Panics if the two events are not on the same time keeper.
    #[must_use]
    pub fn new(original: impl Event<T> + 'static, additional: impl Event<T> + 'static) -> Self {
        assert!(
            same_keeper(original.time_keeper(), additional.time_keeper()),
            "raced events must share one time keeper"
        );
        let keeper = Arc::clone(original.time_keeper());
        Self {
            original: Box::new(original),
            additional: Box::new(additional),
            keeper,
        }
    }
}

impl<T: Send + 'static> Event<T> for MultiEvent<T> {
    fn wait_up_to(&self, cx: &Cx, timeout: Duration) -> Result<Waited<T>> {
        race(
            self.original.as_ref(),
            self.additional.as_ref(),
            cx,
            timeout,
            &self.describe(),
        )
    }

    fn time_keeper(&self) -> &Arc<dyn TimeKeeper> {
        &self.keeper
    }

    fn describe(&self) -> String {
        format!("{} or {}", self.original.describe(), self.additional.describe())
    }
}

impl<T> core::fmt::Debug for MultiEvent<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MultiEvent")
            .field("original", &self.original.describe())
            .field("additional", &self.additional.describe())
            .finish()
    }
}
