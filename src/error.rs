use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChatError {
    /// Missing/invalid credential, unsupported model, unknown persona or an
    /// authentication rejection from the service.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Service unreachable, timed out or answered with a non-2xx status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered but without usable candidate content.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Input rejected before any state change.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl ChatError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// The turn failed but the session can keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::MalformedResponse(_))
    }
}
