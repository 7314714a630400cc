use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Color assigned to a label when the caller does not pick one.
pub const DEFAULT_LABEL_COLOR: &str = "#0082c9";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// -- Activity vocabulary --

/// What happened in an activity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    Delete,
    Comment,
    Attachment,
    Move,
    LabelAssign,
    LabelRemove,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Comment => "comment",
            Self::Attachment => "attachment",
            Self::Move => "move",
            Self::LabelAssign => "label_assign",
            Self::LabelRemove => "label_remove",
        }
    }
}

impl FromStr for Action {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "create" => Self::Create,
            "update" => Self::Update,
            "delete" => Self::Delete,
            "comment" => Self::Comment,
            "attachment" => Self::Attachment,
            "move" => Self::Move,
            "label_assign" => Self::LabelAssign,
            "label_remove" => Self::LabelRemove,
            other => {
                return Err(UnknownVariant {
                    kind: "action",
                    value: other.to_string(),
                });
            }
        })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of entity an activity record is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    Row,
    Column,
    Table,
    View,
    Comment,
    Attachment,
    Label,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Row => "row",
            Self::Column => "column",
            Self::Table => "table",
            Self::View => "view",
            Self::Comment => "comment",
            Self::Attachment => "attachment",
            Self::Label => "label",
        }
    }
}

impl FromStr for SubjectType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "row" => Self::Row,
            "column" => Self::Column,
            "table" => Self::Table,
            "view" => Self::View,
            "comment" => Self::Comment,
            "attachment" => Self::Attachment,
            "label" => Self::Label,
            other => {
                return Err(UnknownVariant {
                    kind: "subject type",
                    value: other.to_string(),
                });
            }
        })
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Entities --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: i64,
    pub table_id: i64,
    pub title: String,
    pub color: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub user_id: String,
    pub display_name: String,
}

/// A comment on a row, enriched with the author's name and resolved mentions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub row_id: i64,
    pub table_id: i64,
    pub author_id: String,
    pub author_display_name: Option<String>,
    pub message: String,
    pub mentions: Vec<Mention>,
    pub reply_to: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A file reference attached to a row. The `file_*` and `mime_type` fields
/// come from the file store and stay `None` when the file cannot be resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub row_id: i64,
    pub table_id: i64,
    pub author_id: String,
    pub author_display_name: Option<String>,
    pub file_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Option<String>,
    pub file_name: Option<String>,
    pub file_path: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub table_id: i64,
    pub row_id: Option<i64>,
    pub user_id: String,
    pub user_display_name: Option<String>,
    pub action: Action,
    pub subject_type: SubjectType,
    pub subject_id: Option<i64>,
    pub changes: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
