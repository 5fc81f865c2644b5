//! Error taxonomy for the signing worker.

use thiserror::Error;

/// Result type used across the worker.
pub type SignerResult<T> = Result<T, SignerError>;

/// Worker-level error.
///
/// Every variant except [`SignerError::Configuration`] is scoped to a single
/// job attempt: the job processor classifies it by delivery attempt and moves
/// on. Configuration errors are only produced at startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    /// Queue or object-store network failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The authentication session could not be checked or established.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Signing or signature verification failed.
    #[error("signing error: {0}")]
    Signing(String),

    /// The job message cannot be processed as given (e.g. unsafe filename).
    #[error("invalid job: {0}")]
    InvalidJob(String),

    /// Missing or malformed settings.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SignerError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing(msg.into())
    }

    pub fn invalid_job(msg: impl Into<String>) -> Self {
        Self::InvalidJob(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Fatal errors stop the process; everything else fails one attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
