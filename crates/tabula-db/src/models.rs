//! SQLite row shapes, one per table. API models add display names and file
//! metadata on top of these in tabula-core.

use chrono::{DateTime, Utc};
use tabula_types::models::{Action, SubjectType};

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: i64,
    pub row_id: i64,
    pub table_id: i64,
    pub user_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub reply_to: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub row_id: i64,
    pub table_id: i64,
    pub user_id: String,
    pub message: String,
    pub reply_to: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AttachmentRow {
    pub id: i64,
    pub row_id: i64,
    pub table_id: i64,
    pub user_id: String,
    pub file_id: Option<i64>,
    pub kind: String,
    pub data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub row_id: i64,
    pub table_id: i64,
    pub user_id: String,
    pub file_id: Option<i64>,
    pub kind: String,
    pub data: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelRow {
    pub id: i64,
    pub table_id: i64,
    pub title: String,
    pub color: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLabel {
    pub table_id: i64,
    pub title: String,
    pub color: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ActivityRow {
    pub id: i64,
    pub table_id: i64,
    pub row_id: Option<i64>,
    pub user_id: String,
    pub action: Action,
    pub subject_type: SubjectType,
    pub subject_id: Option<i64>,
    pub changes: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub table_id: i64,
    pub row_id: Option<i64>,
    pub user_id: String,
    pub action: Action,
    pub subject_type: SubjectType,
    pub subject_id: Option<i64>,
    pub changes: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Entry in the host file index. `path` is relative to the storage root.
#[derive(Debug, Clone)]
pub struct FileRow {
    pub id: i64,
    pub owner_id: String,
    pub path: String,
    pub mime_type: String,
}
