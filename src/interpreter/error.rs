//! Runtime errors.

use thiserror::Error;

/// Failure reported by an action callback.
///
/// Returning an error aborts the macrostep: configuration, context and
/// timers stay exactly as they were before the signal was processed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ActionError {
    message: String,
}

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors surfaced by [`Interpreter`](super::Interpreter) operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InterpreterError {
    #[error("Interpreter has already been started")]
    AlreadyStarted,

    #[error("Action '{action}' failed in state '{state}' while processing '{event}': {source}")]
    ActionFailed {
        action: String,
        state: String,
        event: String,
        #[source]
        source: ActionError,
    },
}
