use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use tabula_types::api::{
    Claims, CreateLabelRequest, RowLabelsRequest, SetRowLabelsRequest, UpdateLabelRequest,
};
use tabula_types::models::Label;

use crate::error::{ApiError, blocking};
use crate::state::AppState;

pub async fn list_labels(
    State(state): State<AppState>,
    Path(table_id): Path<i64>,
) -> Result<Json<Vec<Label>>, ApiError> {
    let collab = state.collab.clone();
    let labels = blocking(move || collab.labels.find_all_for_table(table_id)).await?;
    Ok(Json(labels))
}

pub async fn create_label(
    State(state): State<AppState>,
    Path(table_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateLabelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let collab = state.collab.clone();
    let label = blocking(move || {
        collab
            .labels
            .create(table_id, &req.title, req.color.as_deref(), &claims.sub)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(label)))
}

pub async fn get_label(
    State(state): State<AppState>,
    Path(label_id): Path<i64>,
) -> Result<Json<Label>, ApiError> {
    let collab = state.collab.clone();
    Ok(Json(blocking(move || collab.labels.find(label_id)).await?))
}

pub async fn update_label(
    State(state): State<AppState>,
    Path(label_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateLabelRequest>,
) -> Result<Json<Label>, ApiError> {
    let collab = state.collab.clone();
    let label =
        blocking(move || collab.labels.update(label_id, &req.title, &req.color, &claims.sub))
            .await?;
    Ok(Json(label))
}

pub async fn delete_label(
    State(state): State<AppState>,
    Path(label_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let collab = state.collab.clone();
    blocking(move || collab.labels.delete_label(label_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn row_labels(
    State(state): State<AppState>,
    Path(row_id): Path<i64>,
) -> Result<Json<Vec<Label>>, ApiError> {
    let collab = state.collab.clone();
    Ok(Json(blocking(move || collab.labels.list_for_row(row_id)).await?))
}

/// Replaces the row's label set and returns the labels it ends up with.
pub async fn set_row_labels(
    State(state): State<AppState>,
    Path(row_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetRowLabelsRequest>,
) -> Result<Json<Vec<Label>>, ApiError> {
    let collab = state.collab.clone();
    let labels = blocking(move || {
        collab
            .labels
            .set_for_row(row_id, &req.label_ids, req.table_id, &claims.sub)?;
        collab.labels.list_for_row(row_id)
    })
    .await?;
    Ok(Json(labels))
}

pub async fn batch_row_labels(
    State(state): State<AppState>,
    Path(table_id): Path<i64>,
    Json(req): Json<RowLabelsRequest>,
) -> Result<Json<HashMap<i64, Vec<Label>>>, ApiError> {
    let collab = state.collab.clone();
    let labels = blocking(move || collab.labels.list_for_rows(&req.row_ids, table_id)).await?;
    Ok(Json(labels))
}

pub async fn assign_label(
    State(state): State<AppState>,
    Path((table_id, row_id, label_id)): Path<(i64, i64, i64)>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let collab = state.collab.clone();
    blocking(move || collab.labels.assign(row_id, label_id, table_id, &claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_label(
    State(state): State<AppState>,
    Path((table_id, row_id, label_id)): Path<(i64, i64, i64)>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let collab = state.collab.clone();
    blocking(move || collab.labels.remove(row_id, label_id, table_id, &claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}
