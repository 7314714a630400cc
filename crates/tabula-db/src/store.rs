//! Repository traits over the relational store.
//!
//! `Database` implements every trait; services hold them as trait objects so
//! tests can swap in failing or instrumented stores.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{
    ActivityRow, AttachmentRow, CommentRow, LabelRow, NewActivity, NewAttachment, NewComment,
    NewLabel,
};

pub trait CommentStore: Send + Sync {
    fn find_comment(&self, id: i64) -> Result<Option<CommentRow>>;
    /// Oldest first.
    fn comments_for_row(&self, row_id: i64) -> Result<Vec<CommentRow>>;
    fn insert_comment(&self, new: &NewComment) -> Result<CommentRow>;
    fn update_comment_message(
        &self,
        id: i64,
        message: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<CommentRow>>;
    fn delete_comment(&self, id: i64) -> Result<bool>;
    fn count_comments_for_row(&self, row_id: i64) -> Result<u64>;
    /// Rows without comments are absent from the map.
    fn count_comments_for_rows(&self, row_ids: &[i64]) -> Result<HashMap<i64, u64>>;
    fn delete_comments_for_row(&self, row_id: i64) -> Result<usize>;
    fn delete_comments_for_table(&self, table_id: i64) -> Result<usize>;
}

/// Every read skips tombstoned attachments except `find_attachment_including_deleted`.
pub trait AttachmentStore: Send + Sync {
    fn find_attachment(&self, id: i64) -> Result<Option<AttachmentRow>>;
    fn find_attachment_including_deleted(&self, id: i64) -> Result<Option<AttachmentRow>>;
    /// Newest first.
    fn attachments_for_row(&self, row_id: i64) -> Result<Vec<AttachmentRow>>;
    fn insert_attachment(&self, new: &NewAttachment) -> Result<AttachmentRow>;
    fn soft_delete_attachment(&self, id: i64, deleted_at: DateTime<Utc>) -> Result<bool>;
    fn soft_delete_attachments_for_row(&self, row_id: i64, deleted_at: DateTime<Utc>)
    -> Result<usize>;
    fn delete_attachments_for_table(&self, table_id: i64) -> Result<usize>;
    fn count_attachments_for_row(&self, row_id: i64) -> Result<u64>;
    fn count_attachments_for_rows(&self, row_ids: &[i64]) -> Result<HashMap<i64, u64>>;
}

pub trait LabelStore: Send + Sync {
    fn find_label(&self, id: i64) -> Result<Option<LabelRow>>;
    /// Ordered by title.
    fn labels_for_table(&self, table_id: i64) -> Result<Vec<LabelRow>>;
    fn insert_label(&self, new: &NewLabel) -> Result<LabelRow>;
    fn update_label(&self, id: i64, title: &str, color: &str) -> Result<Option<LabelRow>>;
    fn delete_label(&self, id: i64) -> Result<bool>;
    fn delete_labels_for_table(&self, table_id: i64) -> Result<usize>;
}

pub trait RowLabelStore: Send + Sync {
    /// Label ids in assignment order.
    fn label_ids_for_row(&self, row_id: i64) -> Result<Vec<i64>>;
    /// One query for all rows; rows without assignments are absent.
    fn label_ids_for_rows(&self, row_ids: &[i64]) -> Result<HashMap<i64, Vec<i64>>>;
    /// Returns `false` when the pair already exists (unique constraint hit).
    fn insert_row_label(&self, row_id: i64, label_id: i64, created_at: DateTime<Utc>)
    -> Result<bool>;
    /// Returns `false` when there was nothing to delete.
    fn delete_row_label(&self, row_id: i64, label_id: i64) -> Result<bool>;
    fn delete_row_labels_for_row(&self, row_id: i64) -> Result<usize>;
    fn delete_row_labels_for_label(&self, label_id: i64) -> Result<usize>;
}

pub trait ActivityStore: Send + Sync {
    fn insert_activity(&self, new: &NewActivity) -> Result<i64>;
    /// Newest first.
    fn activity_for_row(&self, row_id: i64, limit: u32, offset: u32) -> Result<Vec<ActivityRow>>;
    /// Newest first.
    fn activity_for_table(&self, table_id: i64, limit: u32, offset: u32)
    -> Result<Vec<ActivityRow>>;
    fn activity_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<ActivityRow>>;
    fn delete_activity_for_row(&self, row_id: i64) -> Result<usize>;
    fn delete_activity_for_table(&self, table_id: i64) -> Result<usize>;
    /// Deletes at most `batch` records created strictly before `cutoff`.
    fn delete_activity_before(&self, cutoff: DateTime<Utc>, batch: u32) -> Result<usize>;
}
