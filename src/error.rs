//! Error types and error handling strategy for Bide.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Failure kinds are a closed enumeration, so callers can declare a subset
//!   of kinds as ignorable during polling without matching on open-ended
//!   type hierarchies
//! - Cancellation is *not* an error: a cancelled wait returns the
//!   [`Waited::Cancelled`](crate::event::Waited::Cancelled) sentinel, never
//!   an `Error`
//!
//! # Error Categories
//!
//! - **Timeout**: a deadline elapsed before an event completed; carries the
//!   event's description and the requested duration
//! - **ConditionEvaluation**: a condition's computation raised an unexpected
//!   failure; wraps the original cause
//! - **DisallowedOccurred**: the assertion raised by a fail-event when the
//!   event that must not happen did happen
//! - **Internal**: programmer errors and runtime bugs, such as a poll
//!   worker's submission being rejected

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A deadline elapsed before the awaited event completed.
    Timeout,
    /// A condition's computation failed while being evaluated.
    ConditionEvaluation,
    /// An event that must not happen occurred before the reference event.
    DisallowedOccurred,
    /// Internal error or illegal use (bug).
    Internal,
}

impl ErrorKind {
    /// Returns a human-readable name for the kind.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ConditionEvaluation => "condition evaluation failed",
            Self::DisallowedOccurred => "disallowed event occurred",
            Self::Internal => "internal error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The main error type for Bide waits.
///
/// Carries an [`ErrorKind`], a message sufficient on its own to identify
/// which composed wait expression failed and after what duration, and an
/// optional source chain.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Returns true if this error is a fail-event assertion.
    #[must_use]
    pub const fn is_disallowed(&self) -> bool {
        matches!(self.kind, ErrorKind::DisallowedOccurred)
    }

    /// Returns true if this error came from evaluating a condition.
    #[must_use]
    pub const fn is_condition_evaluation(&self) -> bool {
        matches!(self.kind, ErrorKind::ConditionEvaluation)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Creates a timeout error for the described event.
    #[must_use]
    pub fn timeout(description: impl fmt::Display, duration: Duration) -> Self {
        Self::new(ErrorKind::Timeout)
            .with_message(format!("timed out after {duration:?} waiting for {description}"))
    }

    /// Creates a condition evaluation error wrapping the original cause.
    #[must_use]
    pub fn condition_evaluation(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(ErrorKind::ConditionEvaluation)
            .with_message(source.to_string())
            .with_source(source)
    }

    /// Creates a fail-event assertion error for the described event.
    #[must_use]
    pub fn disallowed(description: impl fmt::Display) -> Self {
        Self::new(ErrorKind::DisallowedOccurred)
            .with_message(format!("{description} occurred, which was not allowed"))
    }

    /// Creates an internal error (runtime bug or illegal use).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{msg}"),
            None => f.write_str(self.kind.name()),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// A specialized Result type for Bide operations.
pub type Result<T> = core::result::Result<T, Error>;
