use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use tabula_types::api::{Claims, CountResponse, CreateCommentRequest, UpdateCommentRequest};
use tabula_types::models::Comment;

use crate::error::{ApiError, blocking};
use crate::state::AppState;

pub async fn list_comments(
    State(state): State<AppState>,
    Path(row_id): Path<i64>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let collab = state.collab.clone();
    Ok(Json(blocking(move || collab.comments.find_all_for_row(row_id)).await?))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Path(row_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let collab = state.collab.clone();
    let comment = blocking(move || {
        collab
            .comments
            .create(row_id, req.table_id, &claims.sub, &req.message, req.reply_to)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn count_comments(
    State(state): State<AppState>,
    Path(row_id): Path<i64>,
) -> Result<Json<CountResponse>, ApiError> {
    let collab = state.collab.clone();
    let count = blocking(move || Ok(collab.comments.count_for_row(row_id))).await?;
    Ok(Json(CountResponse { count }))
}

pub async fn get_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
) -> Result<Json<Comment>, ApiError> {
    let collab = state.collab.clone();
    Ok(Json(blocking(move || collab.comments.find(comment_id)).await?))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    let actor = state.actor(&claims);
    let collab = state.collab.clone();
    let comment = blocking(move || collab.comments.update(comment_id, &req.message, &actor)).await?;
    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let actor = state.actor(&claims);
    let collab = state.collab.clone();
    blocking(move || collab.comments.delete(comment_id, &actor)).await?;
    Ok(StatusCode::NO_CONTENT)
}
