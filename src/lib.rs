//! Bide: a composable wait-for-occurrence algebra for test code.
//!
//! Tests against concurrent systems keep needing the same sentence: "do
//! this, then wait until that happens, but not longer than X, and fail if
//! the wrong thing happens instead." Bide turns that sentence into typed
//! values. An [`Event`] stands for something that may happen in the
//! future; awaiting it blocks the calling thread with a deadline, and
//! events compose:
//!
//! - [`Event::or`] races two occurrences, first completion wins
//! - [`Event::and_then_expect`] chains occurrences under one deadline budget
//! - [`Event::after`] performs the triggering action before waiting
//! - [`Event::fail_if`] asserts a disallowed occurrence does not happen
//!
//! Occurrences come from two sources: polling a [`Condition`] via
//! [`PollEvent`], or explicit callback-driven completion via
//! [`EventListener`].
//!
//! # Example
//!
//! ```ignore
//! use bide::{Cx, Event, EventListener, FnCondition};
//! use std::time::Duration;
//!
//! let reply = EventListener::new();
//! client.on_reply({
//!     let reply = reply.clone();
//!     move |msg| { reply.trigger(msg); }
//! });
//!
//! let msg = reply
//!     .after(|| client.send("ping"))
//!     .fail_if_condition(
//!         FnCondition::new(|| client.is_disconnected(), |down| *down)
//!             .described_as("the connection dropping"),
//!     )
//!     .wait_up_to(&Cx::new(), Duration::from_secs(5))?;
//! ```
//!
//! # Time
//!
//! Every event reads the clock through a [`TimeKeeper`]. By default that is
//! the process-wide system clock; tests can attach a [`VirtualTimeKeeper`]
//! and drive time explicitly, which makes interval and deadline behavior
//! deterministic. Events combined into one expression must share a single
//! keeper; mixing clocks is a construction-time panic.
//!
//! # Cancellation
//!
//! Waits run under a [`Cx`] context. Cancelling it ends every wait in the
//! expression promptly with the [`Waited::Cancelled`] sentinel; cancellation
//! is never reported as an error.

pub mod condition;
pub mod cx;
pub mod error;
pub mod event;
pub mod time;

pub use condition::{Condition, FnCondition};
pub use cx::{CancelToken, Cx};
pub use error::{Error, ErrorKind, Result};
pub use event::{
    After, Described, Event, EventListener, FailEvent, FailIf, MultiEvent, PollEvent, PollWorker,
    SequentialEvent, Waited, DEFAULT_POLL_INTERVAL,
};
pub use time::{SleepOutcome, SystemTimeKeeper, TimeKeeper, VirtualTimeKeeper};
