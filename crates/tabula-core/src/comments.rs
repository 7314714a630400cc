use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tabula_db::CommentStore;
use tabula_db::models::{CommentRow, NewComment};
use tabula_types::models::{Action, Comment, SubjectType};
use tracing::{error, info};

use crate::Actor;
use crate::activity::{ActivityEvent, ActivityRecorder};
use crate::error::{ServiceError, ServiceResult};
use crate::mentions;
use crate::providers::IdentityProvider;

pub struct CommentService {
    store: Arc<dyn CommentStore>,
    identity: Arc<dyn IdentityProvider>,
    activity: Arc<dyn ActivityRecorder>,
}

impl CommentService {
    pub fn new(
        store: Arc<dyn CommentStore>,
        identity: Arc<dyn IdentityProvider>,
        activity: Arc<dyn ActivityRecorder>,
    ) -> Self {
        Self {
            store,
            identity,
            activity,
        }
    }

    /// Oldest first.
    pub fn find_all_for_row(&self, row_id: i64) -> ServiceResult<Vec<Comment>> {
        let rows = self.store.comments_for_row(row_id)?;
        Ok(rows.into_iter().map(|row| self.enrich(row)).collect())
    }

    pub fn find(&self, id: i64) -> ServiceResult<Comment> {
        self.find_row(id).map(|row| self.enrich(row))
    }

    pub fn create(
        &self,
        row_id: i64,
        table_id: i64,
        author: &str,
        message: &str,
        reply_to: Option<i64>,
    ) -> ServiceResult<Comment> {
        let message = validate_message(message)?;
        let row = self.store.insert_comment(&NewComment {
            row_id,
            table_id,
            user_id: author.to_string(),
            message,
            reply_to,
            created_at: Utc::now(),
        })?;

        self.activity.record(
            ActivityEvent::new(table_id, author, Action::Comment, SubjectType::Comment)
                .on_row(row_id)
                .subject(row.id),
        );

        Ok(self.enrich(row))
    }

    pub fn update(&self, id: i64, message: &str, actor: &Actor) -> ServiceResult<Comment> {
        let message = validate_message(message)?;
        let existing = self.find_row(id)?;
        ensure_author(actor, &existing.user_id, "edit this comment")?;

        let row = self
            .store
            .update_comment_message(id, &message, Utc::now())?
            .ok_or_else(|| ServiceError::not_found("Comment"))?;

        self.activity.record(
            ActivityEvent::new(row.table_id, &actor.user_id, Action::Update, SubjectType::Comment)
                .on_row(row.row_id)
                .subject(row.id),
        );

        Ok(self.enrich(row))
    }

    pub fn delete(&self, id: i64, actor: &Actor) -> ServiceResult<()> {
        let existing = self.find_row(id)?;
        ensure_author(actor, &existing.user_id, "delete this comment")?;

        if !self.store.delete_comment(id)? {
            return Err(ServiceError::not_found("Comment"));
        }

        self.activity.record(
            ActivityEvent::new(
                existing.table_id,
                &actor.user_id,
                Action::Delete,
                SubjectType::Comment,
            )
            .on_row(existing.row_id)
            .subject(id),
        );
        Ok(())
    }

    pub fn count_for_row(&self, row_id: i64) -> u64 {
        self.store.count_comments_for_row(row_id).unwrap_or_else(|e| {
            error!("Error counting comments for row {}: {}", row_id, e);
            0
        })
    }

    /// Every requested row gets an entry; rows without comments count 0.
    pub fn count_for_rows(&self, row_ids: &[i64]) -> HashMap<i64, u64> {
        if row_ids.is_empty() {
            return HashMap::new();
        }
        match self.store.count_comments_for_rows(row_ids) {
            Ok(mut counts) => {
                for row_id in row_ids {
                    counts.entry(*row_id).or_insert(0);
                }
                counts
            }
            Err(e) => {
                error!("Error counting comments for {} rows: {}", row_ids.len(), e);
                HashMap::new()
            }
        }
    }

    pub fn delete_all_for_row(&self, row_id: i64) {
        match self.store.delete_comments_for_row(row_id) {
            Ok(count) => info!("Deleted {} comments for row {}", count, row_id),
            Err(e) => error!("Error deleting comments for row {}: {}", row_id, e),
        }
    }

    pub fn delete_all_for_table(&self, table_id: i64) {
        match self.store.delete_comments_for_table(table_id) {
            Ok(count) => info!("Deleted {} comments for table {}", count, table_id),
            Err(e) => error!("Error deleting comments for table {}: {}", table_id, e),
        }
    }

    fn find_row(&self, id: i64) -> ServiceResult<CommentRow> {
        self.store
            .find_comment(id)?
            .ok_or_else(|| ServiceError::not_found("Comment"))
    }

    fn enrich(&self, row: CommentRow) -> Comment {
        let mentions = mentions::resolve(&row.message, self.identity.as_ref());
        Comment {
            id: row.id,
            row_id: row.row_id,
            table_id: row.table_id,
            author_display_name: self.identity.display_name(&row.user_id),
            author_id: row.user_id,
            message: row.message,
            mentions,
            reply_to: row.reply_to,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn validate_message(message: &str) -> ServiceResult<String> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ServiceError::BadRequest("Comment message must not be empty".into()));
    }
    Ok(message.to_string())
}

pub(crate) fn ensure_author(actor: &Actor, author_id: &str, what: &str) -> ServiceResult<()> {
    if actor.is_admin || actor.user_id == author_id {
        Ok(())
    } else {
        Err(ServiceError::Permission(format!("You are not allowed to {what}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_db::Database;

    use crate::activity::ActivityService;
    use crate::testing::{FailingActivityStore, RecordedActivity};

    fn setup() -> (Arc<Database>, Arc<RecordedActivity>, CommentService) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.upsert_user("alice", "Alice").unwrap();
        db.upsert_user("bob", "Bob").unwrap();
        let activity = Arc::new(RecordedActivity::default());
        let service = CommentService::new(db.clone(), db.clone(), activity.clone());
        (db, activity, service)
    }

    fn user(id: &str) -> Actor {
        Actor::new(id, false)
    }

    #[test]
    fn create_enriches_and_records() {
        let (_db, activity, service) = setup();
        let comment = service
            .create(10, 1, "alice", "  hey @bob and @nobody, @bob  ", None)
            .unwrap();

        assert_eq!(comment.message, "hey @bob and @nobody, @bob");
        assert_eq!(comment.author_display_name.as_deref(), Some("Alice"));
        assert_eq!(comment.mentions.len(), 1);
        assert_eq!(comment.mentions[0].user_id, "bob");
        assert!(comment.updated_at.is_none());

        let events = activity.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, Action::Comment);
        assert_eq!(events[0].subject_type, SubjectType::Comment);
        assert_eq!(events[0].subject_id, Some(comment.id));
        assert_eq!(events[0].row_id, Some(10));
    }

    #[test]
    fn empty_message_is_rejected() {
        let (_db, activity, service) = setup();
        assert!(matches!(
            service.create(10, 1, "alice", " \n ", None),
            Err(ServiceError::BadRequest(_))
        ));
        assert!(activity.events().is_empty());
    }

    #[test]
    fn create_survives_activity_failure() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let activity = Arc::new(ActivityService::new(Arc::new(FailingActivityStore), db.clone()));
        let service = CommentService::new(db.clone(), db.clone(), activity);

        let comment = service.create(10, 1, "alice", "still saved", None).unwrap();
        assert_eq!(service.find(comment.id).unwrap().message, "still saved");
    }

    #[test]
    fn listing_is_oldest_first_with_replies() {
        let (_db, _activity, service) = setup();
        let first = service.create(10, 1, "alice", "first", None).unwrap();
        service.create(10, 1, "bob", "second", Some(first.id)).unwrap();
        service.create(11, 1, "bob", "elsewhere", None).unwrap();

        let comments = service.find_all_for_row(10).unwrap();
        let messages: Vec<_> = comments.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert_eq!(comments[1].reply_to, Some(first.id));
    }

    #[test]
    fn only_author_or_admin_can_edit_and_delete() {
        let (_db, _activity, service) = setup();
        let comment = service.create(10, 1, "alice", "draft", None).unwrap();

        assert!(matches!(
            service.update(comment.id, "hijack", &user("bob")),
            Err(ServiceError::Permission(_))
        ));
        assert!(matches!(
            service.delete(comment.id, &user("bob")),
            Err(ServiceError::Permission(_))
        ));

        let edited = service.update(comment.id, "final", &user("alice")).unwrap();
        assert_eq!(edited.message, "final");
        assert!(edited.updated_at.is_some());

        service.delete(comment.id, &Actor::new("bob", true)).unwrap();
        assert!(matches!(service.find(comment.id), Err(ServiceError::NotFound(_))));
        assert!(matches!(
            service.delete(comment.id, &user("alice")),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn counts() {
        let (_db, _activity, service) = setup();
        service.create(10, 1, "alice", "a", None).unwrap();
        service.create(10, 1, "alice", "b", None).unwrap();
        service.create(11, 1, "alice", "c", None).unwrap();

        assert_eq!(service.count_for_row(10), 2);
        assert_eq!(service.count_for_row(99), 0);

        let counts = service.count_for_rows(&[10, 11, 12]);
        assert_eq!(counts, HashMap::from([(10, 2), (11, 1), (12, 0)]));
        assert!(service.count_for_rows(&[]).is_empty());
    }

    #[test]
    fn bulk_deletes() {
        let (_db, _activity, service) = setup();
        service.create(10, 1, "alice", "a", None).unwrap();
        service.create(11, 1, "alice", "b", None).unwrap();
        service.create(20, 2, "alice", "c", None).unwrap();

        service.delete_all_for_row(10);
        assert_eq!(service.count_for_row(10), 0);
        assert_eq!(service.count_for_row(11), 1);

        service.delete_all_for_table(1);
        assert_eq!(service.count_for_row(11), 0);
        assert_eq!(service.count_for_row(20), 1);
    }
}
