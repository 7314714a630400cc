use thiserror::Error;

/// Failures surfaced by the collaboration services.
///
/// `NotFound`, `Permission` and `BadRequest` are expected outcomes that the
/// request layer translates for the client. `Internal` wraps store or
/// provider failures.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Permission(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }
}
