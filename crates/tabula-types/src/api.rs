use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Action;

// -- JWT Claims --

/// JWT claims issued by the host platform. `sub` is the host user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub exp: usize,
}

// -- Labels --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateLabelRequest {
    pub title: String,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateLabelRequest {
    pub title: String,
    pub color: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetRowLabelsRequest {
    pub table_id: i64,
    pub label_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RowLabelsRequest {
    pub row_ids: Vec<i64>,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub table_id: i64,
    pub message: String,
    pub reply_to: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCommentRequest {
    pub message: String,
}

// -- Attachments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAttachmentRequest {
    pub table_id: i64,
    pub file_id: i64,
    #[serde(rename = "type", default = "default_attachment_kind")]
    pub kind: String,
    pub data: Option<String>,
}

fn default_attachment_kind() -> String {
    "file".to_string()
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

// -- Host hooks --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpsertUserRequest {
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterFileRequest {
    pub owner_id: String,
    pub path: String,
    pub mime_type: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterFileResponse {
    pub file_id: i64,
}

/// A host-side mutation to record in the activity log. The subject is the
/// row when `row_id` is set, the column when `column_id` is set, otherwise
/// the table itself.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostActivityRequest {
    pub table_id: i64,
    pub user_id: String,
    pub action: Action,
    pub row_id: Option<i64>,
    pub column_id: Option<i64>,
    pub changes: Option<Value>,
}

// -- Activity --

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}
