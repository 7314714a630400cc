pub mod activity;
pub mod attachments;
pub mod comments;
pub mod error;
pub mod hooks;
pub mod labels;
pub mod middleware;
pub mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};

use crate::middleware::{require_auth, require_hook_token};
use crate::state::AppState;

/// All routes. Tracing and CORS layers are added by the binary.
pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/tables/{table_id}/labels",
            get(labels::list_labels).post(labels::create_label),
        )
        .route(
            "/labels/{label_id}",
            get(labels::get_label)
                .put(labels::update_label)
                .delete(labels::delete_label),
        )
        .route(
            "/rows/{row_id}/labels",
            get(labels::row_labels).put(labels::set_row_labels),
        )
        .route("/tables/{table_id}/rows/labels", post(labels::batch_row_labels))
        .route(
            "/tables/{table_id}/rows/{row_id}/labels/{label_id}",
            post(labels::assign_label).delete(labels::remove_label),
        )
        .route(
            "/rows/{row_id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route("/rows/{row_id}/comments/count", get(comments::count_comments))
        .route(
            "/comments/{comment_id}",
            get(comments::get_comment)
                .put(comments::update_comment)
                .delete(comments::delete_comment),
        )
        .route(
            "/rows/{row_id}/attachments",
            get(attachments::list_attachments).post(attachments::create_attachment),
        )
        .route("/rows/{row_id}/attachments/count", get(attachments::count_attachments))
        .route(
            "/attachments/{attachment_id}",
            get(attachments::get_attachment).delete(attachments::delete_attachment),
        )
        .route("/rows/{row_id}/activity", get(activity::row_activity))
        .route("/tables/{table_id}/activity", get(activity::table_activity))
        .route("/me/activity", get(activity::my_activity))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    let hook_routes = Router::new()
        .route("/hooks/tables/{table_id}/deleted", post(hooks::table_deleted))
        .route(
            "/hooks/tables/{table_id}/rows/{row_id}/deleted",
            post(hooks::row_deleted),
        )
        .route("/hooks/users/{user_id}", put(hooks::upsert_user))
        .route("/hooks/files", post(hooks::register_file))
        .route("/hooks/activity", post(hooks::record_activity))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_hook_token));

    Router::new()
        .route("/health", get(health))
        .merge(protected_routes)
        .merge(hook_routes)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
