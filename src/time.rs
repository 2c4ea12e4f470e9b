//! Time sources for waits.
//!
//! Every event reads the clock and sleeps through a [`TimeKeeper`] rather
//! than calling `Instant::now` or `thread::sleep` directly. Production code
//! uses the process-wide [`system`] keeper; tests inject a
//! [`VirtualTimeKeeper`] and drive it explicitly, which makes timeout and
//! interval behavior deterministic without real waiting.
//!
//! Sleeps are cancellation-aware: a tripped [`CancelToken`] ends a sleep
//! early with [`SleepOutcome::Interrupted`], which waits translate into the
//! `Cancelled` sentinel.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::cx::CancelToken;

/// How a sleep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// The full duration elapsed.
    Completed,
    /// The cancel token tripped before the duration elapsed.
    Interrupted,
}

/// A source of time and sleeping.
///
/// Implementations must be coherent: after `sleep_for(d, ..)` completes,
/// [`instant`](Self::instant) has advanced by at least `d`.
pub trait TimeKeeper: Send + Sync {
    /// Returns the current instant according to this keeper.
    fn instant(&self) -> Instant;

    /// Blocks for `duration`, ending early if `cancel` trips.
    fn sleep_for(&self, duration: Duration, cancel: &CancelToken) -> SleepOutcome;
}

/// Returns true if two keepers are the same underlying clock.
pub(crate) fn same_keeper(a: &Arc<dyn TimeKeeper>, b: &Arc<dyn TimeKeeper>) -> bool {
    // Compare data pointers only; vtable pointers may differ across
    // codegen units for the same object.
    std::ptr::eq(
        Arc::as_ptr(a).cast::<u8>(),
        Arc::as_ptr(b).cast::<u8>(),
    )
}

/// Returns the process-wide wall-clock keeper.
///
/// Always returns the same allocation, so events built without an explicit
/// keeper can be composed freely.
#[must_use]
pub fn system() -> Arc<dyn TimeKeeper> {
    static SYSTEM: OnceLock<Arc<SystemTimeKeeper>> = OnceLock::new();
    Arc::clone(SYSTEM.get_or_init(|| Arc::new(SystemTimeKeeper::default()))) as Arc<dyn TimeKeeper>
}

/// Wall-clock keeper backed by [`Instant::now`] and a condvar sleep.
#[derive(Debug, Default)]
pub struct SystemTimeKeeper {
    _private: (),
}

impl TimeKeeper for SystemTimeKeeper {
    fn instant(&self) -> Instant {
        Instant::now()
    }

    fn sleep_for(&self, duration: Duration, cancel: &CancelToken) -> SleepOutcome {
        struct Park {
            lock: Mutex<()>,
            condvar: Condvar,
        }

        let deadline = Instant::now() + duration;
        let park = Arc::new(Park {
            lock: Mutex::new(()),
            condvar: Condvar::new(),
        });
        let watched = Arc::clone(&park);
        // The wake holds the park mutex while notifying, so a cancel landing
        // between the flag check and the park cannot be lost.
        let _watch = cancel.watch(move || {
            let _held = watched.lock.lock();
            watched.condvar.notify_all();
        });
        let mut guard = park.lock.lock();
        loop {
            if cancel.is_cancelled() {
                return SleepOutcome::Interrupted;
            }
            let now = Instant::now();
            if now >= deadline {
                return SleepOutcome::Completed;
            }
            park.condvar.wait_for(&mut guard, deadline - now);
        }
    }
}

struct ScheduledCallback {
    at: Instant,
    seq: u64,
    run: Box<dyn FnOnce() + Send>,
}

struct VirtualState {
    now: Instant,
    next_seq: u64,
    callbacks: Vec<ScheduledCallback>,
}

/// A clock that only moves when told to.
///
/// `sleep_for` advances the virtual instant by the requested duration
/// instead of blocking, running any callbacks scheduled inside the slept
/// span, each exactly once, in schedule order. If a callback trips the
/// sleep's cancel token the clock halts at that callback's instant and the
/// sleep reports [`SleepOutcome::Interrupted`].
///
/// # Example
///
/// ```ignore
/// let clock = Arc::new(VirtualTimeKeeper::new());
/// clock.schedule_callback(Duration::from_millis(30), move || listener.trigger(7));
/// // A wait sleeping past the 30ms mark observes the trigger.
/// ```
pub struct VirtualTimeKeeper {
    state: Mutex<VirtualState>,
}

impl Default for VirtualTimeKeeper {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualTimeKeeper {
    /// Creates a virtual keeper whose epoch is the construction instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(VirtualState {
                now: Instant::now(),
                next_seq: 0,
                callbacks: Vec::new(),
            }),
        }
    }

    /// Schedules `run` to fire once the clock reaches `delay` from now.
    pub fn schedule_callback(&self, delay: Duration, run: impl FnOnce() + Send + 'static) {
        let mut state = self.state.lock();
        let at = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.callbacks.push(ScheduledCallback {
            at,
            seq,
            run: Box::new(run),
        });
    }

    /// Moves the clock forward by `duration`, running due callbacks.
    ///
    /// Unlike a sleep this ignores cancellation and always reaches the
    /// target instant.
    pub fn advance(&self, duration: Duration) {
        let target = {
            let state = self.state.lock();
            state.now + duration
        };
        self.run_until(target, None);
    }

    /// Advances to `target`, running each due callback once, in order of
    /// scheduled instant (ties broken by schedule order). Returns
    /// `Interrupted` if `cancel` is observed tripped after a callback.
    fn run_until(&self, target: Instant, cancel: Option<&CancelToken>) -> SleepOutcome {
        loop {
            let next = {
                let mut state = self.state.lock();
                let due = state
                    .callbacks
                    .iter()
                    .enumerate()
                    .filter(|(_, cb)| cb.at <= target)
                    .min_by_key(|(_, cb)| (cb.at, cb.seq))
                    .map(|(i, _)| i);
                match due {
                    Some(i) => {
                        let cb = state.callbacks.swap_remove(i);
                        state.now = state.now.max(cb.at);
                        cb
                    }
                    None => {
                        state.now = state.now.max(target);
                        return SleepOutcome::Completed;
                    }
                }
            };
            // Run outside the lock: callbacks may schedule, cancel, or
            // read the clock.
            (next.run)();
            if cancel.is_some_and(CancelToken::is_cancelled) {
                return SleepOutcome::Interrupted;
            }
        }
    }
}

impl TimeKeeper for VirtualTimeKeeper {
    fn instant(&self) -> Instant {
        self.state.lock().now
    }

    fn sleep_for(&self, duration: Duration, cancel: &CancelToken) -> SleepOutcome {
        if cancel.is_cancelled() {
            return SleepOutcome::Interrupted;
        }
        let target = self.state.lock().now + duration;
        self.run_until(target, Some(cancel))
    }
}

impl core::fmt::Debug for VirtualTimeKeeper {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("VirtualTimeKeeper")
            .field("now", &state.now)
            .field("pending_callbacks", &state.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ===== system keeper tests =====

    #[test]
    fn system_returns_same_allocation() {
        let a = system();
        let b = system();
        assert!(same_keeper(&a, &b));
    }

    #[test]
    fn system_sleep_completes() {
        let keeper = system();
        let before = Instant::now();
        let outcome = keeper.sleep_for(Duration::from_millis(10), &CancelToken::new());
        assert_eq!(outcome, SleepOutcome::Completed);
        assert!(before.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn system_sleep_interrupted_promptly() {
        let keeper = system();
        let token = CancelToken::new();
        let remote = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });
        let before = Instant::now();
        let outcome = keeper.sleep_for(Duration::from_secs(10), &token);
        handle.join().unwrap();
        assert_eq!(outcome, SleepOutcome::Interrupted);
        assert!(before.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn cancel_racing_the_sleep_park_is_not_missed() {
        // Cancel as close as possible to the sleeper's transition from flag
        // check to park; the deadline must never absorb the sleep.
        for _ in 0..200 {
            let keeper = system();
            let token = CancelToken::new();
            let sleeper_keeper = Arc::clone(&keeper);
            let sleeper_token = token.clone();
            let sleeper = std::thread::spawn(move || {
                sleeper_keeper.sleep_for(Duration::from_secs(2), &sleeper_token)
            });
            token.cancel();
            let before = Instant::now();
            let outcome = sleeper.join().unwrap();
            assert_eq!(outcome, SleepOutcome::Interrupted);
            assert!(before.elapsed() < Duration::from_millis(500));
        }
    }

    // ===== VirtualTimeKeeper tests =====

    #[test]
    fn sleep_advances_virtual_instant() {
        let clock = VirtualTimeKeeper::new();
        let start = clock.instant();
        let outcome = clock.sleep_for(Duration::from_secs(5), &CancelToken::new());
        assert_eq!(outcome, SleepOutcome::Completed);
        assert_eq!(clock.instant() - start, Duration::from_secs(5));
    }

    #[test]
    fn advance_moves_clock_without_token() {
        let clock = VirtualTimeKeeper::new();
        let start = clock.instant();
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.instant() - start, Duration::from_millis(250));
    }

    #[test]
    fn callback_runs_exactly_once() {
        let clock = VirtualTimeKeeper::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        clock.schedule_callback(Duration::from_millis(30), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        clock.advance(Duration::from_millis(100));
        clock.advance(Duration::from_millis(100));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_not_run_before_due() {
        let clock = VirtualTimeKeeper::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        clock.schedule_callback(Duration::from_millis(50), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        clock.advance(Duration::from_millis(49));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        clock.advance(Duration::from_millis(1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callbacks_run_in_instant_order() {
        let clock = VirtualTimeKeeper::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for (label, delay) in [(2u8, 20u64), (1, 10), (3, 30)] {
            let order = Arc::clone(&order);
            clock.schedule_callback(Duration::from_millis(delay), move || {
                order.lock().push(label);
            });
        }
        clock.advance(Duration::from_millis(100));
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn interrupting_callback_halts_clock_at_its_instant() {
        let clock = VirtualTimeKeeper::new();
        let start = clock.instant();
        let token = CancelToken::new();
        let remote = token.clone();
        clock.schedule_callback(Duration::from_millis(30), move || remote.cancel());
        let outcome = clock.sleep_for(Duration::from_millis(100), &token);
        assert_eq!(outcome, SleepOutcome::Interrupted);
        assert_eq!(clock.instant() - start, Duration::from_millis(30));
    }

    #[test]
    fn sleep_with_tripped_token_does_not_advance() {
        let clock = VirtualTimeKeeper::new();
        let start = clock.instant();
        let token = CancelToken::new();
        token.cancel();
        let outcome = clock.sleep_for(Duration::from_millis(40), &token);
        assert_eq!(outcome, SleepOutcome::Interrupted);
        assert_eq!(clock.instant(), start);
    }

    #[test]
    fn callback_can_schedule_another() {
        let clock = VirtualTimeKeeper::new();
        let hits = Arc::new(AtomicUsize::new(0));
        // Borrow the keeper through an Arc so the callback can reschedule.
        let clock = Arc::new(clock);
        let inner_clock = Arc::clone(&clock);
        let counter = Arc::clone(&hits);
        clock.schedule_callback(Duration::from_millis(10), move || {
            let counter = Arc::clone(&counter);
            inner_clock.schedule_callback(Duration::from_millis(10), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });
        clock.advance(Duration::from_millis(30));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
