use thiserror::Error;

use crate::time::NormalizationError;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Credentials rejected by an external service. Ends the run.
    #[error("{collaborator} rejected credentials: {message}")]
    AuthenticationFailure {
        collaborator: &'static str,
        message: String,
    },

    /// Transient failure talking to an external service. Skips the current
    /// strategy or event.
    #[error("{collaborator} unavailable: {message}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        message: String,
    },

    #[error(transparent)]
    Normalization(#[from] NormalizationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Output error: {0}")]
    Sink(String),
}

impl PipelineError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::AuthenticationFailure { .. } | PipelineError::Sink(_)
        )
    }

    pub fn unavailable(collaborator: &'static str, err: impl std::fmt::Display) -> Self {
        PipelineError::CollaboratorUnavailable {
            collaborator,
            message: err.to_string(),
        }
    }

    pub fn auth(collaborator: &'static str, err: impl std::fmt::Display) -> Self {
        PipelineError::AuthenticationFailure {
            collaborator,
            message: err.to_string(),
        }
    }
}
