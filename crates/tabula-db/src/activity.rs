use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Row, params};

use crate::models::{ActivityRow, NewActivity};
use crate::store::ActivityStore;
use crate::{Database, parse_column};

const ACTIVITY_COLUMNS: &str =
    "id, table_id, row_id, user_id, action, subject_type, subject_id, changes, created_at";

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityRow> {
    Ok(ActivityRow {
        id: row.get(0)?,
        table_id: row.get(1)?,
        row_id: row.get(2)?,
        user_id: row.get(3)?,
        action: parse_column(4, row.get(4)?)?,
        subject_type: parse_column(5, row.get(5)?)?,
        subject_id: row.get(6)?,
        changes: parse_changes(7, row.get(7)?)?,
        created_at: row.get(8)?,
    })
}

/// `changes` is stored as JSON text and never inspected beyond parsing.
fn parse_changes(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<serde_json::Value>> {
    raw.map(|text| {
        serde_json::from_str(&text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

impl Database {
    fn activity_page(
        &self,
        filter: &str,
        value: &dyn rusqlite::ToSql,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ActivityRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {ACTIVITY_COLUMNS} FROM activity
                 WHERE {filter} = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![value, limit, offset], activity_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

impl ActivityStore for Database {
    fn insert_activity(&self, new: &NewActivity) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO activity (table_id, row_id, user_id, action, subject_type, subject_id, changes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    new.table_id,
                    new.row_id,
                    new.user_id,
                    new.action.as_str(),
                    new.subject_type.as_str(),
                    new.subject_id,
                    new.changes.as_ref().map(|c| c.to_string()),
                    new.created_at
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn activity_for_row(&self, row_id: i64, limit: u32, offset: u32) -> Result<Vec<ActivityRow>> {
        self.activity_page("row_id", &row_id, limit, offset)
    }

    fn activity_for_table(
        &self,
        table_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<ActivityRow>> {
        self.activity_page("table_id", &table_id, limit, offset)
    }

    fn activity_for_user(&self, user_id: &str, limit: u32) -> Result<Vec<ActivityRow>> {
        self.activity_page("user_id", &user_id, limit, 0)
    }

    fn delete_activity_for_row(&self, row_id: i64) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM activity WHERE row_id = ?1", [row_id])?))
    }

    fn delete_activity_for_table(&self, table_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM activity WHERE table_id = ?1", [table_id])?)
        })
    }

    fn delete_activity_before(&self, cutoff: DateTime<Utc>, batch: u32) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM activity WHERE id IN (
                     SELECT id FROM activity WHERE created_at < ?1 ORDER BY id LIMIT ?2
                 )",
                params![cutoff, batch],
            )?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use tabula_types::models::{Action, SubjectType};

    fn entry(row_id: Option<i64>, at: DateTime<Utc>) -> NewActivity {
        NewActivity {
            table_id: 1,
            row_id,
            user_id: "alice".into(),
            action: Action::Update,
            subject_type: SubjectType::Row,
            subject_id: row_id,
            changes: Some(json!({ "status": ["open", "done"] })),
            created_at: at,
        }
    }

    #[test]
    fn pages_are_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let t0 = Utc::now();
        let ids: Vec<i64> = (0..5)
            .map(|i| db.insert_activity(&entry(Some(3), t0 + Duration::seconds(i))).unwrap())
            .collect();

        let page = db.activity_for_row(3, 2, 0).unwrap();
        assert_eq!(page.iter().map(|a| a.id).collect::<Vec<_>>(), vec![ids[4], ids[3]]);

        let next = db.activity_for_row(3, 2, 2).unwrap();
        assert_eq!(next.iter().map(|a| a.id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);
    }

    #[test]
    fn changes_payload_round_trips_untouched() {
        let db = Database::open_in_memory().unwrap();
        let mut new = entry(None, Utc::now());
        new.changes = Some(json!([1, "two", { "three": null }]));
        db.insert_activity(&new).unwrap();

        let stored = db.activity_for_table(1, 10, 0).unwrap().remove(0);
        assert_eq!(stored.changes, new.changes);
        assert_eq!(stored.row_id, None);
        assert_eq!(stored.action, Action::Update);
    }

    #[test]
    fn unknown_action_fails_to_decode() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO activity (table_id, user_id, action, subject_type, created_at)
                 VALUES (1, 'alice', 'teleport', 'row', '2026-01-01 00:00:00+00:00')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        assert!(db.activity_for_table(1, 10, 0).is_err());
    }

    #[test]
    fn retention_deletes_in_batches_and_respects_cutoff() {
        let db = Database::open_in_memory().unwrap();
        let cutoff = Utc::now();
        for i in 1..=5 {
            db.insert_activity(&entry(Some(1), cutoff - Duration::days(i))).unwrap();
        }
        db.insert_activity(&entry(Some(1), cutoff)).unwrap();
        db.insert_activity(&entry(Some(1), cutoff + Duration::seconds(1))).unwrap();

        assert_eq!(db.delete_activity_before(cutoff, 2).unwrap(), 2);
        assert_eq!(db.delete_activity_before(cutoff, 2).unwrap(), 2);
        assert_eq!(db.delete_activity_before(cutoff, 2).unwrap(), 1);
        assert_eq!(db.delete_activity_before(cutoff, 2).unwrap(), 0);

        // records at the cutoff are kept
        assert_eq!(db.activity_for_row(1, 50, 0).unwrap().len(), 2);
    }

    #[test]
    fn user_feed_spans_tables() {
        let db = Database::open_in_memory().unwrap();
        let mut other = entry(Some(9), Utc::now());
        other.table_id = 2;
        db.insert_activity(&entry(Some(1), Utc::now())).unwrap();
        db.insert_activity(&other).unwrap();

        assert_eq!(db.activity_for_user("alice", 10).unwrap().len(), 2);
        assert!(db.activity_for_user("bob", 10).unwrap().is_empty());
    }
}
