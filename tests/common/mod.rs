//! Shared test infrastructure: logging setup and event/condition doubles.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use bide::{Condition, CancelToken, Cx, Error, Event, Result, SleepOutcome, TimeKeeper, Waited};

pub fn init_test_logging() {
    // Initialize tracing for tests if not already done
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

/// Phase tracking macro for structured test logging.
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(test = $name, "=== TEST START ===");
    };
}

/// Assertion with logging for better test output.
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        if !$cond {
            tracing::error!(
                message = $msg,
                expected = ?$expected,
                actual = ?$actual,
                "Assertion failed"
            );
        }
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// An event that completes with a fixed value once its keeper has slept
/// `delay` past the start of the wait.
pub struct FakeEvent<T> {
    value: T,
    delay: Duration,
    keeper: Arc<dyn TimeKeeper>,
    description: String,
}

impl<T> FakeEvent<T> {
    pub fn new(value: T, delay: Duration, keeper: Arc<dyn TimeKeeper>) -> Self {
        Self {
            value,
            delay,
            keeper,
            description: format!("a fake event after {delay:?}"),
        }
    }

    pub fn described_as(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }
}

impl<T: Clone + Send + Sync> Event<T> for FakeEvent<T> {
    fn wait_up_to(&self, cx: &Cx, timeout: Duration) -> Result<Waited<T>> {
        if self.delay > timeout {
            if self.keeper.sleep_for(timeout, cx.token()) == SleepOutcome::Interrupted {
                return Ok(Waited::Cancelled);
            }
            return Err(Error::timeout(&self.description, timeout));
        }
        if self.keeper.sleep_for(self.delay, cx.token()) == SleepOutcome::Interrupted {
            return Ok(Waited::Cancelled);
        }
        Ok(Waited::Value(self.value.clone()))
    }

    fn time_keeper(&self) -> &Arc<dyn TimeKeeper> {
        &self.keeper
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// An event that sleeps out every budget it is given.
pub struct NeverOccurringEvent {
    keeper: Arc<dyn TimeKeeper>,
}

impl NeverOccurringEvent {
    pub fn new(keeper: Arc<dyn TimeKeeper>) -> Self {
        Self { keeper }
    }
}

impl<T: Send> Event<T> for NeverOccurringEvent {
    fn wait_up_to(&self, cx: &Cx, timeout: Duration) -> Result<Waited<T>> {
        if self.keeper.sleep_for(timeout, cx.token()) == SleepOutcome::Interrupted {
            return Ok(Waited::Cancelled);
        }
        Err(Error::timeout(<Self as Event<T>>::describe(self), timeout))
    }

    fn time_keeper(&self) -> &Arc<dyn TimeKeeper> {
        &self.keeper
    }

    fn describe(&self) -> String {
        "an event that never occurs".to_owned()
    }
}

/// A condition met on the nth evaluation; its result is the call count.
pub struct FakeCondition {
    met_on_call: usize,
    calls: usize,
}

impl FakeCondition {
    pub fn met_on_call(n: usize) -> Self {
        Self { met_on_call: n, calls: 0 }
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Condition<usize> for FakeCondition {
    fn is_met(&mut self) -> Result<bool> {
        self.calls += 1;
        Ok(self.calls >= self.met_on_call)
    }

    fn last_result(&self) -> usize {
        assert!(self.calls > 0, "last_result before any evaluation");
        self.calls
    }

    fn describe(&self) -> String {
        format!("a condition met on call {}", self.met_on_call)
    }
}

/// A condition that is never met.
pub struct NeverMetCondition;

impl Condition<u32> for NeverMetCondition {
    fn is_met(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn last_result(&self) -> u32 {
        panic!("a never-met condition has no result");
    }

    fn describe(&self) -> String {
        "a condition that is never met".to_owned()
    }
}

/// Trips the given token once the keeper's clock has slept past `delay`.
/// Returns immediately; only meaningful with a virtual keeper, where the
/// cancellation fires during a later virtual sleep.
pub fn cancel_after(clock: &bide::VirtualTimeKeeper, delay: Duration, token: CancelToken) {
    clock.schedule_callback(delay, move || token.cancel());
}
