//! File attachments on rows.
//!
//! Records only hold a `file_id`; name, path, MIME type and size are looked
//! up in the `FileStore` on every read on behalf of the viewing user. A file
//! the viewer cannot resolve leaves those fields empty rather than failing
//! the read. Deletes are soft: the record keeps its `deleted_at` tombstone
//! and disappears from listings and counts.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tabula_db::AttachmentStore;
use tabula_db::models::{AttachmentRow, NewAttachment};
use tabula_types::models::{Action, Attachment, SubjectType};
use tracing::{error, info, warn};

use crate::Actor;
use crate::activity::{ActivityEvent, ActivityRecorder};
use crate::comments::ensure_author;
use crate::error::{ServiceError, ServiceResult};
use crate::providers::{FileError, FileInfo, FileStore, IdentityProvider};

pub const DEFAULT_KIND: &str = "file";

pub struct AttachmentService {
    store: Arc<dyn AttachmentStore>,
    identity: Arc<dyn IdentityProvider>,
    files: Arc<dyn FileStore>,
    activity: Arc<dyn ActivityRecorder>,
}

impl AttachmentService {
    pub fn new(
        store: Arc<dyn AttachmentStore>,
        identity: Arc<dyn IdentityProvider>,
        files: Arc<dyn FileStore>,
        activity: Arc<dyn ActivityRecorder>,
    ) -> Self {
        Self {
            store,
            identity,
            files,
            activity,
        }
    }

    /// Newest first, tombstones excluded.
    pub fn find_all_for_row(&self, row_id: i64, viewer: &str) -> ServiceResult<Vec<Attachment>> {
        let rows = self.store.attachments_for_row(row_id)?;
        Ok(rows.into_iter().map(|row| self.enrich(row, viewer)).collect())
    }

    pub fn find(&self, id: i64, viewer: &str) -> ServiceResult<Attachment> {
        let row = self
            .store
            .find_attachment(id)?
            .ok_or_else(|| ServiceError::not_found("Attachment"))?;
        Ok(self.enrich(row, viewer))
    }

    pub fn create(
        &self,
        row_id: i64,
        table_id: i64,
        author: &str,
        file_id: Option<i64>,
        kind: Option<&str>,
        data: Option<String>,
    ) -> ServiceResult<Attachment> {
        let kind = kind.map(str::trim).filter(|k| !k.is_empty()).unwrap_or(DEFAULT_KIND);
        let row = self.store.insert_attachment(&NewAttachment {
            row_id,
            table_id,
            user_id: author.to_string(),
            file_id,
            kind: kind.to_string(),
            data,
            created_at: Utc::now(),
        })?;

        let attachment = self.enrich(row, author);
        let file_name = attachment.file_name.as_deref().unwrap_or("File");
        self.activity.record(
            ActivityEvent::new(table_id, author, Action::Attachment, SubjectType::Attachment)
                .on_row(row_id)
                .subject(attachment.id)
                .with_changes(Some(json!({ "fileName": file_name }))),
        );

        Ok(attachment)
    }

    /// Soft delete. Only the author or an admin may remove an attachment.
    pub fn delete(&self, id: i64, actor: &Actor) -> ServiceResult<()> {
        let existing = self
            .store
            .find_attachment(id)?
            .ok_or_else(|| ServiceError::not_found("Attachment"))?;
        ensure_author(actor, &existing.user_id, "delete this attachment")?;

        if !self.store.soft_delete_attachment(id, Utc::now())? {
            return Err(ServiceError::not_found("Attachment"));
        }

        self.activity.record(
            ActivityEvent::new(
                existing.table_id,
                &actor.user_id,
                Action::Delete,
                SubjectType::Attachment,
            )
            .on_row(existing.row_id)
            .subject(id),
        );
        Ok(())
    }

    pub fn count_for_row(&self, row_id: i64) -> u64 {
        self.store.count_attachments_for_row(row_id).unwrap_or_else(|e| {
            error!("Error counting attachments for row {}: {}", row_id, e);
            0
        })
    }

    pub fn count_for_rows(&self, row_ids: &[i64]) -> HashMap<i64, u64> {
        if row_ids.is_empty() {
            return HashMap::new();
        }
        match self.store.count_attachments_for_rows(row_ids) {
            Ok(mut counts) => {
                for row_id in row_ids {
                    counts.entry(*row_id).or_insert(0);
                }
                counts
            }
            Err(e) => {
                error!("Error counting attachments for {} rows: {}", row_ids.len(), e);
                HashMap::new()
            }
        }
    }

    pub fn delete_all_for_row(&self, row_id: i64) {
        match self.store.soft_delete_attachments_for_row(row_id, Utc::now()) {
            Ok(count) => info!("Soft-deleted {} attachments for row {}", count, row_id),
            Err(e) => error!("Error deleting attachments for row {}: {}", row_id, e),
        }
    }

    pub fn delete_all_for_table(&self, table_id: i64) {
        match self.store.delete_attachments_for_table(table_id) {
            Ok(count) => info!("Deleted {} attachments for table {}", count, table_id),
            Err(e) => error!("Error deleting attachments for table {}: {}", table_id, e),
        }
    }

    fn enrich(&self, row: AttachmentRow, viewer: &str) -> Attachment {
        let file = row.file_id.and_then(|file_id| self.resolve_file(file_id, viewer));

        let mut attachment = Attachment {
            id: row.id,
            row_id: row.row_id,
            table_id: row.table_id,
            author_display_name: self.identity.display_name(&row.user_id),
            author_id: row.user_id,
            file_id: row.file_id,
            kind: row.kind,
            data: row.data,
            file_name: None,
            file_path: None,
            mime_type: None,
            file_size: None,
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        };

        if let Some(file) = file {
            attachment.file_name = Some(file.name);
            attachment.file_path = Some(file.path);
            attachment.mime_type = Some(file.mime_type);
            attachment.file_size = Some(file.size);
        }
        attachment
    }

    fn resolve_file(&self, file_id: i64, viewer: &str) -> Option<FileInfo> {
        match self.files.resolve(file_id, viewer) {
            Ok(info) => Some(info),
            Err(FileError::NotFound) => {
                warn!("File {} not found for user {}", file_id, viewer);
                None
            }
            Err(FileError::Provider(e)) => {
                error!("Error resolving file {}: {}", file_id, e);
                None
            }
        }
    }
}
