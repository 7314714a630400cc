use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use tabula_types::api::{Claims, CountResponse, CreateAttachmentRequest};
use tabula_types::models::Attachment;

use crate::error::{ApiError, blocking};
use crate::state::AppState;

pub async fn list_attachments(
    State(state): State<AppState>,
    Path(row_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Attachment>>, ApiError> {
    let collab = state.collab.clone();
    let attachments =
        blocking(move || collab.attachments.find_all_for_row(row_id, &claims.sub)).await?;
    Ok(Json(attachments))
}

pub async fn create_attachment(
    State(state): State<AppState>,
    Path(row_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateAttachmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let collab = state.collab.clone();
    let attachment = blocking(move || {
        collab.attachments.create(
            row_id,
            req.table_id,
            &claims.sub,
            Some(req.file_id),
            Some(req.kind.as_str()),
            req.data,
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}

pub async fn count_attachments(
    State(state): State<AppState>,
    Path(row_id): Path<i64>,
) -> Result<Json<CountResponse>, ApiError> {
    let collab = state.collab.clone();
    let count = blocking(move || Ok(collab.attachments.count_for_row(row_id))).await?;
    Ok(Json(CountResponse { count }))
}

pub async fn get_attachment(
    State(state): State<AppState>,
    Path(attachment_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Attachment>, ApiError> {
    let collab = state.collab.clone();
    let attachment =
        blocking(move || collab.attachments.find(attachment_id, &claims.sub)).await?;
    Ok(Json(attachment))
}

pub async fn delete_attachment(
    State(state): State<AppState>,
    Path(attachment_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let actor = state.actor(&claims);
    let collab = state.collab.clone();
    blocking(move || collab.attachments.delete(attachment_id, &actor)).await?;
    Ok(StatusCode::NO_CONTENT)
}
