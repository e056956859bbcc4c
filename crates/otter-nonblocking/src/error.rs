//! Error types for otter-nonblocking
//!
//! [`Fault`] is the only error an iteration can end with. [`LoopError`] covers
//! the ways driving the event loop itself can stop early.

use std::any::Any;

use thiserror::Error;

/// A fault raised by a caller-supplied callback during a single tick
#[derive(Error, Debug)]
pub enum Fault {
    /// The callback returned an error
    #[error(transparent)]
    Callback(#[from] anyhow::Error),

    /// The callback panicked and the panic was trapped
    #[error("callback panicked: {0}")]
    Panic(String),
}

impl Fault {
    /// Create a fault from a plain message
    pub fn msg<M>(message: M) -> Self
    where
        M: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        Self::Callback(anyhow::Error::msg(message))
    }

    /// Wrap any standard error
    pub fn from_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Callback(anyhow::Error::new(error))
    }

    /// Build a fault from a panic payload caught by `catch_unwind`
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::Panic(message)
    }

    /// Whether this fault came from a trapped panic
    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panic(_))
    }
}

impl From<String> for Fault {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<&'static str> for Fault {
    fn from(message: &'static str) -> Self {
        Self::msg(message)
    }
}

/// Errors that stop the event loop or an awaited completion
#[derive(Error, Debug)]
pub enum LoopError {
    /// A fault had no completion callback and no unhandled-fault handler was installed
    #[error("unhandled fault: {0}")]
    Unhandled(Fault),

    /// The iteration ended with a fault
    #[error(transparent)]
    Iteration(#[from] Fault),

    /// The completion callback was dropped without being called
    #[error("completion dropped before a result was delivered")]
    Cancelled,

    /// The loop ran for more turns than `LoopConfig::max_turns` allows
    #[error("event loop exceeded {0} turns")]
    TurnLimit(u64),
}

/// Result type alias for event loop operations
pub type LoopResult<T> = Result<T, LoopError>;
