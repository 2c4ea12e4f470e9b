//! Dedicated single-thread evaluation queue for poll events.
//!
//! Some conditions touch state that must only ever be read from one thread
//! (a UI toolkit handle, a non-Sync driver). A [`PollWorker`] owns one
//! long-lived worker thread and serializes submitted closures onto it, so
//! any number of poll events configured with
//! [`PollEvent::via`](crate::event::PollEvent::via) evaluate their
//! conditions on that single thread.
//!
//! Each caller creates its own worker and passes the handle down explicitly;
//! the handle is cheap to clone. The worker thread exits once every handle
//! has been dropped.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::cx::CancelToken;
use crate::error::{Error, Result};

type Job = Box<dyn FnOnce() + Send>;

// Granularity of the cancellation check while a reply is pending.
const REPLY_CHECK_SLICE: Duration = Duration::from_millis(5);

/// Handle to a dedicated evaluation thread.
#[derive(Debug, Clone)]
pub struct PollWorker {
    sender: mpsc::Sender<Job>,
}

impl Default for PollWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl PollWorker {
    /// Spawns the worker thread and returns a handle to it.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        thread::spawn(move || {
            while let Ok(job) = receiver.recv() {
                job();
            }
            tracing::trace!("poll worker thread exiting, all handles dropped");
        });
        Self { sender }
    }

    /// Runs `job` on the worker thread and returns its result.
    ///
    /// Blocks the caller until the job has run. A submission the worker can
    /// no longer accept (its thread is gone, or the job was dropped without
    /// running) is an [`ErrorKind::Internal`](crate::ErrorKind::Internal)
    /// error, distinct from the job's own outcome.
    pub fn submit<R>(&self, job: impl FnOnce() -> R + Send + 'static) -> Result<R>
    where
        R: Send + 'static,
    {
        let (reply, outcome) = mpsc::channel();
        self.sender
            .send(Box::new(move || {
                let _ = reply.send(job());
            }))
            .map_err(|_| Error::internal("poll worker rejected the submission"))?;
        outcome
            .recv()
            .map_err(|_| Error::internal("poll worker dropped the submission"))
    }

    /// Like [`submit`](Self::submit) but stops waiting for the reply if
    /// `cancel` trips, returning `None`.
    ///
    /// An abandoned job may still run on the worker thread; its result is
    /// discarded.
    pub fn submit_unless_cancelled<R>(
        &self,
        cancel: &CancelToken,
        job: impl FnOnce() -> R + Send + 'static,
    ) -> Result<Option<R>>
    where
        R: Send + 'static,
    {
        let (reply, outcome) = mpsc::channel();
        self.sender
            .send(Box::new(move || {
                let _ = reply.send(job());
            }))
            .map_err(|_| Error::internal("poll worker rejected the submission"))?;
        loop {
            match outcome.recv_timeout(REPLY_CHECK_SLICE) {
                Ok(result) => return Ok(Some(result)),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if cancel.is_cancelled() {
                        tracing::trace!("abandoning a pending worker submission, wait cancelled");
                        return Ok(None);
                    }
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(Error::internal("poll worker dropped the submission"));
                }
            }
        }
    }
}
