use std::time::Duration;

use execution_engine::EngineFault;
use thiserror::Error;
use tutor_api::TutorApiError;

/// Infrastructure failure while loading the engine or running code.
///
/// Program faults are never reported here; they are part of the result.
#[derive(Debug, Clone, Error)]
pub enum CoordinatorError {
    #[error("execution engine failure: {0}")]
    Engine(#[source] EngineFault),

    #[error("execution worker stopped unexpectedly: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Api(#[from] TutorApiError),

    #[error("conversation transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api(error) => error.is_retryable(),
            Self::Unavailable(_) => true,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("message text is empty")]
    EmptyMessage,

    #[error("a message is already being sent")]
    SendInProgress,

    #[error("no reply from the tutor within {0:?}")]
    Timeout(Duration),

    #[error("failed to reach the tutor: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to run code: {0}")]
    Execution(#[from] CoordinatorError),
}

impl SessionError {
    /// Returns true when the user can sensibly try the same action again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EmptyMessage => false,
            Self::SendInProgress | Self::Timeout(_) | Self::Execution(_) => true,
            Self::Transport(error) => error.is_retryable(),
        }
    }
}
