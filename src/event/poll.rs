//! Polling: turning a condition into an awaitable event.
//!
//! A [`PollEvent`] evaluates its condition, sleeps for the polling interval,
//! and repeats until the condition is met, the deadline elapses, or the wait
//! is cancelled. The deadline is checked *before* each evaluation, so an
//! expired or zero budget never buys one more evaluation.
//!
//! Evaluation failures are fatal by default; [`ignoring`](PollEvent::ignoring)
//! and [`ignoring_where`](PollEvent::ignoring_where) declare a subset of
//! failures to recover from locally by treating the tick as "not met".

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::condition::Condition;
use crate::cx::Cx;
use crate::error::{Error, ErrorKind, Result};
use crate::event::{Event, PollWorker, Waited};
use crate::time::{SleepOutcome, TimeKeeper};

/// Interval between evaluations unless overridden with
/// [`PollEvent::polling_every`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

type SharedCondition<T> = Arc<Mutex<Box<dyn Condition<T> + Send>>>;

/// An event satisfied by repeatedly evaluating a [`Condition`].
///
/// # Example
///
/// ```ignore
/// let row = PollEvent::new(
///     FnCondition::new(move || db.count_rows(), |n| *n > 0)
///         .described_as("a row to appear"),
/// )
/// .polling_every(Duration::from_millis(100))
/// .wait_up_to(&cx, Duration::from_secs(5))?;
/// ```
pub struct PollEvent<T: 'static> {
    condition: SharedCondition<T>,
    keeper: Arc<dyn TimeKeeper>,
    interval: Duration,
    ignored_kinds: Vec<ErrorKind>,
    ignore_predicate: Option<Arc<dyn Fn(&Error) -> bool + Send + Sync>>,
    worker: Option<PollWorker>,
    description: Option<String>,
}

impl<T> PollEvent<T> {
    /// Creates a poll event over `condition` on the process-wide clock with
    /// the default interval.
    #[must_use]
    pub fn new(condition: impl Condition<T> + 'static) -> Self {
        let boxed: Box<dyn Condition<T> + Send> = Box::new(condition);
        Self {
            condition: Arc::new(Mutex::new(boxed)),
            keeper: crate::time::system(),
            interval: DEFAULT_POLL_INTERVAL,
            ignored_kinds: Vec::new(),
            ignore_predicate: None,
            worker: None,
            description: None,
        }
    }

    /// Attaches a clock. Required when composing with events on a virtual
    /// clock.
    #[must_use]
    pub fn with_time_keeper(mut self, keeper: Arc<dyn TimeKeeper>) -> Self {
        self.keeper = keeper;
        self
    }

    /// Sets the interval slept between evaluations.
    #[must_use]
    pub fn polling_every(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Declares evaluation failures of `kind` recoverable: the tick counts
    /// as "not met" and polling continues. Accumulates across calls.
    #[must_use]
    pub fn ignoring(mut self, kind: ErrorKind) -> Self {
        self.ignored_kinds.push(kind);
        self
    }

    /// Declares evaluation failures matching `predicate` recoverable.
    #[must_use]
    pub fn ignoring_where(mut self, predicate: impl Fn(&Error) -> bool + Send + Sync + 'static) -> Self {
        self.ignore_predicate = Some(Arc::new(predicate));
        self
    }

    /// Serializes condition evaluation through `worker` instead of running
    /// it on the waiting thread.
    #[must_use]
    pub fn via(mut self, worker: PollWorker) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Overrides the condition's description in failure messages.
    #[must_use]
    pub fn described_as(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    fn ignores(&self, err: &Error) -> bool {
        self.ignored_kinds.contains(&err.kind())
            || self.ignore_predicate.as_ref().is_some_and(|pred| pred(err))
    }
}

impl<T: Clone + Send + 'static> Event<T> for PollEvent<T> {
    fn wait_up_to(&self, cx: &Cx, timeout: Duration) -> Result<Waited<T>> {
        let deadline = self.keeper.instant() + timeout;
        loop {
            if cx.is_cancelled() {
                return Ok(Waited::Cancelled);
            }
            if self.keeper.instant() >= deadline {
                tracing::debug!(event = %self.describe(), ?timeout, "poll deadline elapsed");
                return Err(Error::timeout(self.describe(), timeout));
            }
            let evaluation = match &self.worker {
                Some(worker) => {
                    let condition = Arc::clone(&self.condition);
                    match worker
                        .submit_unless_cancelled(cx.token(), move || condition.lock().is_met())?
                    {
                        Some(evaluation) => evaluation,
                        None => return Ok(Waited::Cancelled),
                    }
                }
                None => self.condition.lock().is_met(),
            };
            match evaluation {
                Ok(true) => return Ok(Waited::Value(self.condition.lock().last_result())),
                Ok(false) => {}
                Err(err) if self.ignores(&err) => {
                    tracing::trace!(%err, "ignoring condition failure, polling on");
                }
                Err(err) => return Err(err),
            }
            if self.keeper.sleep_for(self.interval, cx.token()) == SleepOutcome::Interrupted {
                return Ok(Waited::Cancelled);
            }
        }
    }

    fn time_keeper(&self) -> &Arc<dyn TimeKeeper> {
        &self.keeper
    }

    fn describe(&self) -> String {
        match &self.description {
            Some(text) => text.clone(),
            None => self.condition.lock().describe(),
        }
    }
}

impl<T: Clone + Send + 'static> core::fmt::Debug for PollEvent<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PollEvent")
            .field("description", &self.describe())
            .field("interval", &self.interval)
            .field("via_worker", &self.worker.is_some())
            .finish()
    }
}
