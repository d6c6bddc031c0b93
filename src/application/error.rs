use thiserror::Error;

use crate::{domain::error::DomainError, infra::error::InfraError};

/// Top-level error surfaced at the binary boundary. Library code keeps its
/// layer-specific errors; this aggregation exists so `main` has one exit path.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
