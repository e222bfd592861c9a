// src/error.rs

use axum::http::StatusCode;

/// Failure surfaced to the caller of the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Bad or missing request fields. Raised before any namespace exists.
    #[error("{0}")]
    Validation(String),

    /// The script ran (or could not be started) but no artifact was produced.
    /// Carries the diagnostic text built by the executor.
    #[error("{0}")]
    Execution(String),

    /// Anything else: namespace I/O, persistence, serialization.
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
            PipelineError::Execution(_) | PipelineError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "VALIDATION_FAILED",
            PipelineError::Execution(_) => "EXECUTION_FAILED",
            PipelineError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
