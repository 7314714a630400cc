pub mod activity;
pub mod attachments;
pub mod cleanup;
pub mod comments;
pub mod dispatcher;
pub mod error;
pub mod labels;
pub mod mentions;
pub mod providers;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tabula_db::Database;
use tabula_types::events::HostEvent;
use tracing::info;

use crate::activity::ActivityService;
use crate::attachments::AttachmentService;
use crate::comments::CommentService;
use crate::labels::LabelService;
use crate::providers::FileStore;

/// The user performing a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    /// Admins may edit and delete content authored by others.
    pub is_admin: bool,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, is_admin: bool) -> Self {
        Self {
            user_id: user_id.into(),
            is_admin,
        }
    }
}

/// All collaboration services wired to one database.
pub struct Collab {
    pub activity: Arc<ActivityService>,
    pub labels: LabelService,
    pub comments: CommentService,
    pub attachments: AttachmentService,
}

impl Collab {
    pub fn new(db: Arc<Database>, files: Arc<dyn FileStore>) -> Self {
        let activity = Arc::new(ActivityService::new(db.clone(), db.clone()));
        Self {
            labels: LabelService::new(db.clone(), db.clone(), activity.clone()),
            comments: CommentService::new(db.clone(), db.clone(), activity.clone()),
            attachments: AttachmentService::new(db.clone(), db, files, activity.clone()),
            activity,
        }
    }

    /// Removes data belonging to a deleted table or row.
    ///
    /// Row deletion keeps the row's activity so the audit trail outlives it;
    /// table deletion purges everything including activity.
    pub fn handle_host_event(&self, event: &HostEvent) {
        match *event {
            HostEvent::TableDeleted { table_id } => {
                info!("Table {} deleted, purging collaboration data", table_id);
                self.labels.delete_all_for_table(table_id);
                self.comments.delete_all_for_table(table_id);
                self.attachments.delete_all_for_table(table_id);
                self.activity.delete_all_for_table(table_id);
            }
            HostEvent::RowDeleted { table_id, row_id } => {
                info!("Row {} of table {} deleted, cleaning up", row_id, table_id);
                self.labels.delete_all_for_row(row_id);
                self.comments.delete_all_for_row(row_id);
                self.attachments.delete_all_for_row(row_id);
            }
        }
    }
}
