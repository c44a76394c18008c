//! Error types for the `mindscope-clinic` crate.

use mindscope_affect::AffectError;
use thiserror::Error;

/// Errors raised by the clinical workflows.
///
/// Generation failures are not errors here: the gateway reports them inside
/// the reply so callers always receive a well-formed envelope.
#[derive(Debug, Error)]
pub enum ClinicError {
    /// The request is missing a field or carries an unusable value.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Media extraction or fusion failed.
    #[error(transparent)]
    Affect(#[from] AffectError),

    /// The pipeline is missing a collaborator or setting.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The generative model could not be called.
    #[error("Model error ({model}): {message}")]
    Model {
        /// The model that failed.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// Temporary upload storage failed.
    #[error("Upload storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// A blocking extraction task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),
}

impl ClinicError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// A convenience result type for clinical operations.
pub type Result<T> = std::result::Result<T, ClinicError>;
