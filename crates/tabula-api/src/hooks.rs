//! Callbacks from the host table system: lifecycle events, directory sync,
//! file registration and host-side activity.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info, warn};

use tabula_types::api::{
    HostActivityRequest, RegisterFileRequest, RegisterFileResponse, UpsertUserRequest,
};
use tabula_types::events::HostEvent;

use crate::error::{ApiError, blocking};
use crate::state::AppState;

pub async fn table_deleted(
    State(state): State<AppState>,
    Path(table_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    dispatch(&state, HostEvent::TableDeleted { table_id }).await
}

pub async fn row_deleted(
    State(state): State<AppState>,
    Path((table_id, row_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    dispatch(&state, HostEvent::RowDeleted { table_id, row_id }).await
}

pub async fn upsert_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<UpsertUserRequest>,
) -> Result<StatusCode, ApiError> {
    let db = state.db.clone();
    blocking(move || Ok(db.upsert_user(&user_id, &req.display_name)?)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn register_file(
    State(state): State<AppState>,
    Json(req): Json<RegisterFileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let file_id =
        blocking(move || Ok(db.insert_file(&req.owner_id, &req.path, &req.mime_type)?)).await?;
    debug!("Registered file {}", file_id);
    Ok((StatusCode::CREATED, Json(RegisterFileResponse { file_id })))
}

pub async fn record_activity(
    State(state): State<AppState>,
    Json(req): Json<HostActivityRequest>,
) -> Result<StatusCode, ApiError> {
    let activity = state.collab.activity.clone();
    blocking(move || {
        activity.record_host_change(
            req.table_id,
            req.row_id,
            req.column_id,
            &req.user_id,
            req.action,
            req.changes,
        )
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Hands the event to the cleanup listener. With no listener subscribed the
/// cleanup runs before responding, so the event is never dropped here.
async fn dispatch(state: &AppState, event: HostEvent) -> Result<StatusCode, ApiError> {
    let receivers = state.dispatcher.emit(event.clone());
    if receivers > 0 {
        info!("Host event {:?} dispatched to {} listeners", event, receivers);
        return Ok(StatusCode::ACCEPTED);
    }

    warn!("No cleanup listener for host event {:?}, handling inline", event);
    let collab = state.collab.clone();
    blocking(move || {
        collab.handle_host_event(&event);
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
