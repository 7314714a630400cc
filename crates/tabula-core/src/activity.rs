//! Append-only audit log.
//!
//! Feature services hold an `Arc<dyn ActivityRecorder>` and call it after
//! their own write has succeeded. Recording is best-effort: a failed insert
//! is logged here and never reaches the caller.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tabula_db::models::{ActivityRow, NewActivity};
use tabula_db::ActivityStore;
use tabula_types::models::{Action, Activity, SubjectType};
use tracing::{error, info};

use crate::error::{ServiceError, ServiceResult};
use crate::providers::IdentityProvider;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;
pub const RETENTION_BATCH: u32 = 500;

/// A mutation to be written to the audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEvent {
    pub table_id: i64,
    pub row_id: Option<i64>,
    pub user_id: String,
    pub action: Action,
    pub subject_type: SubjectType,
    pub subject_id: Option<i64>,
    pub changes: Option<Value>,
}

impl ActivityEvent {
    pub fn new(
        table_id: i64,
        user_id: impl Into<String>,
        action: Action,
        subject_type: SubjectType,
    ) -> Self {
        Self {
            table_id,
            row_id: None,
            user_id: user_id.into(),
            action,
            subject_type,
            subject_id: None,
            changes: None,
        }
    }

    pub fn on_row(mut self, row_id: i64) -> Self {
        self.row_id = Some(row_id);
        self
    }

    pub fn subject(mut self, subject_id: i64) -> Self {
        self.subject_id = Some(subject_id);
        self
    }

    pub fn with_changes(mut self, changes: Option<Value>) -> Self {
        self.changes = changes;
        self
    }
}

/// Sink for audit events. Implementations must not fail the caller.
pub trait ActivityRecorder: Send + Sync {
    fn record(&self, event: ActivityEvent);
}

pub struct ActivityService {
    store: Arc<dyn ActivityStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl ActivityService {
    pub fn new(store: Arc<dyn ActivityStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { store, identity }
    }

    /// Persists `event` stamped with the current time. Errors are logged and dropped.
    pub fn log(&self, event: ActivityEvent) {
        let entry = NewActivity {
            table_id: event.table_id,
            row_id: event.row_id,
            user_id: event.user_id,
            action: event.action,
            subject_type: event.subject_type,
            subject_id: event.subject_id,
            changes: event.changes,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.insert_activity(&entry) {
            error!(
                "Error logging {} {} activity on table {}: {}",
                entry.action, entry.subject_type, entry.table_id, e
            );
        }
    }

    pub fn find_all_for_row(
        &self,
        row_id: i64,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> ServiceResult<Vec<Activity>> {
        let (limit, offset) = page(limit, offset);
        let rows = self.store.activity_for_row(row_id, limit, offset)?;
        Ok(self.enrich(rows))
    }

    pub fn find_all_for_table(
        &self,
        table_id: i64,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> ServiceResult<Vec<Activity>> {
        let (limit, offset) = page(limit, offset);
        let rows = self.store.activity_for_table(table_id, limit, offset)?;
        Ok(self.enrich(rows))
    }

    pub fn find_recent_for_user(&self, user_id: &str, limit: Option<u32>) -> ServiceResult<Vec<Activity>> {
        let (limit, _) = page(limit, None);
        let rows = self.store.activity_for_user(user_id, limit)?;
        Ok(self.enrich(rows))
    }

    pub fn delete_all_for_row(&self, row_id: i64) {
        if let Err(e) = self.store.delete_activity_for_row(row_id) {
            error!("Error deleting activity for row {}: {}", row_id, e);
        }
    }

    pub fn delete_all_for_table(&self, table_id: i64) {
        if let Err(e) = self.store.delete_activity_for_table(table_id) {
            error!("Error deleting activity for table {}: {}", table_id, e);
        }
    }

    /// Removes records created strictly before `cutoff`, `RETENTION_BATCH` at a time.
    pub fn delete_older_than(&self, cutoff: DateTime<Utc>) -> ServiceResult<usize> {
        let mut total = 0;
        loop {
            let removed = self.store.delete_activity_before(cutoff, RETENTION_BATCH)?;
            total += removed;
            if removed < RETENTION_BATCH as usize {
                break;
            }
        }
        info!("Retention: removed {} activity records older than {}", total, cutoff);
        Ok(total)
    }

    // -- Host-side recorders --

    pub fn log_row_create(&self, table_id: i64, row_id: i64, user_id: &str, data: Option<Value>) {
        self.log(row_event(table_id, row_id, user_id, Action::Create).with_changes(data));
    }

    pub fn log_row_update(&self, table_id: i64, row_id: i64, user_id: &str, changes: Option<Value>) {
        self.log(row_event(table_id, row_id, user_id, Action::Update).with_changes(changes));
    }

    pub fn log_row_delete(&self, table_id: i64, row_id: i64, user_id: &str) {
        self.log(row_event(table_id, row_id, user_id, Action::Delete));
    }

    /// Board stack change.
    pub fn log_row_move(&self, table_id: i64, row_id: i64, user_id: &str, changes: Option<Value>) {
        self.log(row_event(table_id, row_id, user_id, Action::Move).with_changes(changes));
    }

    pub fn log_table_create(&self, table_id: i64, user_id: &str, data: Option<Value>) {
        self.log(
            ActivityEvent::new(table_id, user_id, Action::Create, SubjectType::Table)
                .subject(table_id)
                .with_changes(data),
        );
    }

    pub fn log_table_update(&self, table_id: i64, user_id: &str, changes: Option<Value>) {
        self.log(
            ActivityEvent::new(table_id, user_id, Action::Update, SubjectType::Table)
                .subject(table_id)
                .with_changes(changes),
        );
    }

    pub fn log_column_create(&self, table_id: i64, user_id: &str, column_id: i64, data: Option<Value>) {
        self.log(column_event(table_id, user_id, column_id, Action::Create).with_changes(data));
    }

    pub fn log_column_update(
        &self,
        table_id: i64,
        user_id: &str,
        column_id: i64,
        changes: Option<Value>,
    ) {
        self.log(column_event(table_id, user_id, column_id, Action::Update).with_changes(changes));
    }

    pub fn log_column_delete(&self, table_id: i64, user_id: &str, column_id: i64) {
        self.log(column_event(table_id, user_id, column_id, Action::Delete));
    }

    /// Routes a change reported by the host to the matching recorder.
    /// Rows take precedence over columns; with neither, the table is the subject.
    pub fn record_host_change(
        &self,
        table_id: i64,
        row_id: Option<i64>,
        column_id: Option<i64>,
        user_id: &str,
        action: Action,
        changes: Option<Value>,
    ) -> ServiceResult<()> {
        match (row_id, column_id, action) {
            (Some(row_id), _, Action::Create) => self.log_row_create(table_id, row_id, user_id, changes),
            (Some(row_id), _, Action::Update) => self.log_row_update(table_id, row_id, user_id, changes),
            (Some(row_id), _, Action::Delete) => self.log_row_delete(table_id, row_id, user_id),
            (Some(row_id), _, Action::Move) => self.log_row_move(table_id, row_id, user_id, changes),
            (None, Some(column_id), Action::Create) => {
                self.log_column_create(table_id, user_id, column_id, changes)
            }
            (None, Some(column_id), Action::Update) => {
                self.log_column_update(table_id, user_id, column_id, changes)
            }
            (None, Some(column_id), Action::Delete) => self.log_column_delete(table_id, user_id, column_id),
            (None, None, Action::Create) => self.log_table_create(table_id, user_id, changes),
            (None, None, Action::Update) => self.log_table_update(table_id, user_id, changes),
            (_, _, action) => {
                return Err(ServiceError::BadRequest(format!(
                    "Action '{action}' cannot be recorded for this subject"
                )));
            }
        }
        Ok(())
    }

    /// Attaches display names, looking each distinct user up once.
    fn enrich(&self, rows: Vec<ActivityRow>) -> Vec<Activity> {
        let mut names: HashMap<String, Option<String>> = HashMap::new();
        rows.into_iter()
            .map(|row| {
                let user_display_name = names
                    .entry(row.user_id.clone())
                    .or_insert_with(|| self.identity.display_name(&row.user_id))
                    .clone();
                Activity {
                    id: row.id,
                    table_id: row.table_id,
                    row_id: row.row_id,
                    user_id: row.user_id,
                    user_display_name,
                    action: row.action,
                    subject_type: row.subject_type,
                    subject_id: row.subject_id,
                    changes: row.changes,
                    created_at: row.created_at,
                }
            })
            .collect()
    }
}

impl ActivityRecorder for ActivityService {
    fn record(&self, event: ActivityEvent) {
        self.log(event);
    }
}

fn page(limit: Option<u32>, offset: Option<u32>) -> (u32, u32) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (limit, offset.unwrap_or(0))
}

fn row_event(table_id: i64, row_id: i64, user_id: &str, action: Action) -> ActivityEvent {
    ActivityEvent::new(table_id, user_id, action, SubjectType::Row)
        .on_row(row_id)
        .subject(row_id)
}

fn column_event(table_id: i64, user_id: &str, column_id: i64, action: Action) -> ActivityEvent {
    ActivityEvent::new(table_id, user_id, action, SubjectType::Column).subject(column_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FailingActivityStore;
    use chrono::Duration;
    use serde_json::json;
    use tabula_db::Database;

    fn service() -> (Arc<Database>, ActivityService) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.upsert_user("alice", "Alice").unwrap();
        let service = ActivityService::new(db.clone(), db.clone());
        (db, service)
    }

    #[test]
    fn entries_are_enriched_and_newest_first() {
        let (_db, service) = service();
        service.log_row_create(1, 10, "alice", Some(json!({ "title": "Task" })));
        service.log_row_update(1, 10, "ghost", None);

        let entries = service.find_all_for_row(10, None, None).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, Action::Update);
        assert_eq!(entries[0].user_display_name, None);
        assert_eq!(entries[1].action, Action::Create);
        assert_eq!(entries[1].user_display_name.as_deref(), Some("Alice"));
        assert_eq!(entries[1].changes, Some(json!({ "title": "Task" })));
    }

    #[test]
    fn table_scope_includes_table_level_events() {
        let (_db, service) = service();
        service.log_table_update(3, "alice", None);
        service.log_column_delete(3, "alice", 44);
        service.log_row_move(3, 7, "alice", Some(json!({ "stack": [1, 2] })));

        let entries = service.find_all_for_table(3, None, None).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].subject_type, SubjectType::Column);
        assert_eq!(entries[1].subject_id, Some(44));
        assert_eq!(service.find_all_for_row(7, None, None).unwrap().len(), 1);
    }

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(page(None, None), (DEFAULT_PAGE_SIZE, 0));
        assert_eq!(page(Some(0), Some(5)), (1, 5));
        assert_eq!(page(Some(10_000), None), (MAX_PAGE_SIZE, 0));
    }

    #[test]
    fn store_failures_are_swallowed() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let service = ActivityService::new(Arc::new(FailingActivityStore), db);

        service.log_row_delete(1, 2, "alice");
        service.delete_all_for_row(2);
        service.delete_all_for_table(1);
        assert!(service.find_all_for_table(1, None, None).is_err());
    }

    #[test]
    fn host_changes_pick_the_subject() {
        let (_db, service) = service();
        service
            .record_host_change(5, Some(50), None, "alice", Action::Move, None)
            .unwrap();
        service
            .record_host_change(5, None, Some(7), "alice", Action::Create, None)
            .unwrap();
        service
            .record_host_change(5, None, None, "alice", Action::Update, Some(json!({ "title": ["a", "b"] })))
            .unwrap();

        let entries = service.find_all_for_table(5, None, None).unwrap();
        let subjects: Vec<_> = entries.iter().map(|e| (e.subject_type, e.subject_id)).collect();
        assert_eq!(
            subjects,
            vec![
                (SubjectType::Table, Some(5)),
                (SubjectType::Column, Some(7)),
                (SubjectType::Row, Some(50)),
            ]
        );

        assert!(matches!(
            service.record_host_change(5, None, None, "alice", Action::Delete, None),
            Err(ServiceError::BadRequest(_))
        ));
        assert!(matches!(
            service.record_host_change(5, Some(1), None, "alice", Action::LabelAssign, None),
            Err(ServiceError::BadRequest(_))
        ));
    }

    #[test]
    fn bulk_purges() {
        let (_db, service) = service();
        service.log_row_create(1, 10, "alice", None);
        service.log_row_create(1, 11, "alice", None);
        service.log_row_create(2, 20, "alice", None);

        service.delete_all_for_row(10);
        assert_eq!(service.find_all_for_table(1, None, None).unwrap().len(), 1);

        service.delete_all_for_table(1);
        assert!(service.find_all_for_table(1, None, None).unwrap().is_empty());
        assert_eq!(service.find_recent_for_user("alice", None).unwrap().len(), 1);
    }

    #[test]
    fn retention_runs_until_short_batch() {
        let (db, service) = service();
        let old = Utc::now() - Duration::days(30);
        for i in 0..(RETENTION_BATCH as i64 + 3) {
            db.insert_activity(&NewActivity {
                table_id: 1,
                row_id: Some(i),
                user_id: "alice".into(),
                action: Action::Create,
                subject_type: SubjectType::Row,
                subject_id: Some(i),
                changes: None,
                created_at: old,
            })
            .unwrap();
        }
        service.log_row_create(1, 1, "alice", None);

        let removed = service.delete_older_than(Utc::now() - Duration::days(1)).unwrap();
        assert_eq!(removed, RETENTION_BATCH as usize + 3);
        assert_eq!(service.find_all_for_table(1, None, None).unwrap().len(), 1);
    }
}
