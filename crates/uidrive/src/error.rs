use std::{any::Any, error::Error as StdError, result::Result as StdResult, time::Duration};

use thiserror::Error;

/// Result type for uidrive operations.
pub type Result<T> = StdResult<T, Error>;

/// A boxed error that can cross threads.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Core error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Dispatched work failed. The original failure is preserved as the
    /// source.
    #[error("dispatch failed: {source}")]
    Dispatch {
        /// The error returned or panic raised by the work.
        #[source]
        source: BoxError,
    },

    /// An operation was invoked from the wrong thread, or a thread-confinement
    /// invariant was violated.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// A layout predicate failed.
    #[error("layout assertion failed: {0}")]
    Assertion(String),

    /// A bounded wait expired.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The UI thread could not run or complete a task.
    #[error("ui thread: {0}")]
    Executor(String),

    /// A widget handle did not resolve to a live widget.
    #[error("widget: {0}")]
    Widget(String),
}

impl Error {
    /// Wrap a failure from dispatched work.
    pub(crate) fn dispatch(source: impl Into<BoxError>) -> Self {
        Self::Dispatch {
            source: source.into(),
        }
    }

    /// Is this a dispatch failure?
    pub fn is_dispatch(&self) -> bool {
        matches!(self, Self::Dispatch { .. })
    }

    /// Is this an assertion failure?
    pub fn is_assertion(&self) -> bool {
        matches!(self, Self::Assertion(_))
    }
}

/// Extract a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A panic captured while running dispatched work.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("task panicked: {message}")]
pub struct TaskPanic {
    /// The panic message.
    message: String,
}

impl TaskPanic {
    /// Capture a panic payload.
    pub(crate) fn from_payload(payload: &(dyn Any + Send)) -> Self {
        Self {
            message: panic_message(payload),
        }
    }

    /// The panic message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// An error that escaped native event delivery while the loop was pumping.
///
/// These are captured into the session's error queue and never returned from
/// the call that happened to be running at the time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("event dispatch failed: {message}")]
pub struct LoopDispatchError {
    /// The handler's error message.
    message: String,
}

impl LoopDispatchError {
    /// Construct an error from a handler message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The handler's error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&BoxError> for LoopDispatchError {
    fn from(e: &BoxError) -> Self {
        Self::new(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::panic;

    use super::*;

    #[test]
    fn panic_payloads() {
        let payload = panic::catch_unwind(|| panic!("static message")).unwrap_err();
        assert_eq!(TaskPanic::from_payload(&*payload).message(), "static message");

        let n = 3;
        let payload = panic::catch_unwind(|| panic!("formatted {n}")).unwrap_err();
        assert_eq!(panic_message(&*payload), "formatted 3");
    }

    #[test]
    fn dispatch_keeps_source() {
        let e = Error::dispatch(TaskPanic {
            message: "boom".into(),
        });
        assert!(e.is_dispatch());
        let source = e.source().unwrap();
        assert_eq!(source.to_string(), "task panicked: boom");
        assert_eq!(e.to_string(), "dispatch failed: task panicked: boom");
    }
}
