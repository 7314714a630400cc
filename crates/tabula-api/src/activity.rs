use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};

use tabula_types::api::{ActivityQuery, Claims};
use tabula_types::models::Activity;

use crate::error::{ApiError, blocking};
use crate::state::AppState;

pub async fn row_activity(
    State(state): State<AppState>,
    Path(row_id): Path<i64>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<Activity>>, ApiError> {
    let activity = state.collab.activity.clone();
    let entries =
        blocking(move || activity.find_all_for_row(row_id, query.limit, query.offset)).await?;
    Ok(Json(entries))
}

pub async fn table_activity(
    State(state): State<AppState>,
    Path(table_id): Path<i64>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<Activity>>, ApiError> {
    let activity = state.collab.activity.clone();
    let entries =
        blocking(move || activity.find_all_for_table(table_id, query.limit, query.offset)).await?;
    Ok(Json(entries))
}

/// The caller's own recent actions across all tables.
pub async fn my_activity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<Activity>>, ApiError> {
    let activity = state.collab.activity.clone();
    let entries = blocking(move || activity.find_recent_for_user(&claims.sub, query.limit)).await?;
    Ok(Json(entries))
}
