//! Cancellation context threaded through every wait.
//!
//! A [`Cx`] carries the cancellation state for one wait expression. Waits
//! check it between blocking steps and abandon work when it trips, returning
//! the `Cancelled` sentinel instead of an error. Racing combinators hand each
//! branch a child context with its own [`CancelToken`] so the loser can be
//! stopped without touching the caller's token.
//!
//! Blocking primitives register a wake callback with the token before
//! parking so that [`CancelToken::cancel`] wakes them immediately rather
//! than at the next poll interval. The callback must lock the mutex the
//! waiter parks with before notifying its condvar; that makes the waiter's
//! flag check and park atomic against the notification, so a cancel landing
//! between the two cannot be lost.
//!
//! # Example
//!
//! ```ignore
//! let cx = Cx::new();
//! let handle = cx.clone();
//! std::thread::spawn(move || handle.cancel());
//! // Any wait running under `cx` observes the cancellation and unwinds.
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

type WakeFn = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct TokenState {
    cancelled: AtomicBool,
    next_watcher_id: AtomicU64,
    watchers: Mutex<Vec<(u64, WakeFn)>>,
}

impl core::fmt::Debug for TokenState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenState")
            .field("cancelled", &self.cancelled.load(Ordering::Relaxed))
            .field("watchers", &self.watchers.lock().len())
            .finish()
    }
}

/// A cancellation token shared between the party that cancels and the
/// waits that observe it.
///
/// Cloning is cheap and all clones observe the same state. Once tripped a
/// token stays tripped.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<TokenState>,
}

impl CancelToken {
    /// Creates a fresh, untripped token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Trips the token and wakes every registered watcher.
    ///
    /// Idempotent: later calls are no-ops. The flag is set before the
    /// watcher list is locked, so a watcher registering after the first
    /// cancel observes the flag instead of a wake.
    pub fn cancel(&self) {
        if self.state.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::trace!("cancel token tripped");
        let watchers = self.state.watchers.lock();
        for (_, wake) in watchers.iter() {
            wake();
        }
    }

    /// Registers a wake callback to run when the token trips.
    ///
    /// The callback must acquire the mutex its waiter parks with before
    /// notifying the waiter's condvar. A waiter that has checked
    /// [`is_cancelled`](Self::is_cancelled) under that mutex then either
    /// still holds it (the callback blocks until the waiter parks and
    /// releases it) or has already parked (the notification wakes it), so
    /// the cancel is never missed. Callers must re-check the flag after
    /// registering, since the token may have tripped in between.
    ///
    /// The returned guard deregisters the callback when dropped.
    #[must_use]
    pub fn watch(&self, wake: impl Fn() + Send + Sync + 'static) -> WatchGuard {
        let id = self.state.next_watcher_id.fetch_add(1, Ordering::Relaxed);
        self.state.watchers.lock().push((id, Box::new(wake)));
        WatchGuard {
            state: Arc::clone(&self.state),
            id,
        }
    }
}

/// Deregisters a watcher registration on drop.
#[derive(Debug)]
pub struct WatchGuard {
    state: Arc<TokenState>,
    id: u64,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        let mut watchers = self.state.watchers.lock();
        if let Some(pos) = watchers.iter().position(|(id, _)| *id == self.id) {
            watchers.swap_remove(pos);
        }
    }
}

/// The context a wait runs under.
///
/// Thin, cloneable handle around a [`CancelToken`]. Every
/// [`Event::wait_up_to`](crate::event::Event::wait_up_to) takes one; callers
/// that never cancel can pass `&Cx::new()`.
#[derive(Debug, Clone, Default)]
pub struct Cx {
    token: CancelToken,
}

impl Cx {
    /// Creates a context that is never cancelled unless [`cancel`](Self::cancel)
    /// is called on a clone.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context around an existing token.
    #[must_use]
    pub const fn with_token(token: CancelToken) -> Self {
        Self { token }
    }

    /// Returns the underlying token.
    #[must_use]
    pub const fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Returns true if this context has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels this context, waking every wait running under it.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}
