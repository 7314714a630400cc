use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tabula_core::error::{ServiceError, ServiceResult};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{error, warn};

/// Longest internal error text written to the log.
const MAX_LOGGED_ERROR: usize = 512;

/// Handler error. Implements `IntoResponse` so handlers can return
/// `Result<T, ApiError>` and use `?` on service calls.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("blocking task failed: {0}")]
    Join(#[from] JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Service(ServiceError::NotFound(msg)) => {
                warn!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, msg)
            }
            ApiError::Service(ServiceError::Permission(msg)) => {
                warn!("Permission denied: {}", msg);
                (StatusCode::FORBIDDEN, msg)
            }
            ApiError::Service(ServiceError::BadRequest(msg)) => {
                warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, msg)
            }
            ApiError::Service(ServiceError::Internal(e)) => {
                error!("Internal error: {}", bounded(&format!("{:#}", e), MAX_LOGGED_ERROR));
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
            ApiError::Join(e) => {
                error!("spawn_blocking join error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Cuts `text` to at most `max` bytes on a char boundary, noting how much was dropped.
fn bounded(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes truncated)", &text[..end], text.len() - end)
}

/// Runs a synchronous service call on the blocking pool.
pub async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}
