use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Row, params, params_from_iter};

use crate::models::{AttachmentRow, NewAttachment};
use crate::store::AttachmentStore;
use crate::{Database, OptionalExt, id_chunks, placeholders};

const ATTACHMENT_COLUMNS: &str =
    "id, row_id, table_id, user_id, file_id, type, data, created_at, deleted_at";

fn attachment_from_row(row: &Row<'_>) -> rusqlite::Result<AttachmentRow> {
    Ok(AttachmentRow {
        id: row.get(0)?,
        row_id: row.get(1)?,
        table_id: row.get(2)?,
        user_id: row.get(3)?,
        file_id: row.get(4)?,
        kind: row.get(5)?,
        data: row.get(6)?,
        created_at: row.get(7)?,
        deleted_at: row.get(8)?,
    })
}

impl AttachmentStore for Database {
    fn find_attachment(&self, id: i64) -> Result<Option<AttachmentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = ?1 AND deleted_at IS NULL"
            );
            conn.query_row(&sql, [id], attachment_from_row).optional()
        })
    }

    fn find_attachment_including_deleted(&self, id: i64) -> Result<Option<AttachmentRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE id = ?1");
            conn.query_row(&sql, [id], attachment_from_row).optional()
        })
    }

    fn attachments_for_row(&self, row_id: i64) -> Result<Vec<AttachmentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {ATTACHMENT_COLUMNS} FROM attachments
                 WHERE row_id = ?1 AND deleted_at IS NULL
                 ORDER BY created_at DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([row_id], attachment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn insert_attachment(&self, new: &NewAttachment) -> Result<AttachmentRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO attachments (row_id, table_id, user_id, file_id, type, data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    new.row_id,
                    new.table_id,
                    new.user_id,
                    new.file_id,
                    new.kind,
                    new.data,
                    new.created_at
                ],
            )?;

            Ok(AttachmentRow {
                id: conn.last_insert_rowid(),
                row_id: new.row_id,
                table_id: new.table_id,
                user_id: new.user_id.clone(),
                file_id: new.file_id,
                kind: new.kind.clone(),
                data: new.data.clone(),
                created_at: new.created_at,
                deleted_at: None,
            })
        })
    }

    fn soft_delete_attachment(&self, id: i64, deleted_at: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE attachments SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                params![deleted_at, id],
            )?;
            Ok(changed > 0)
        })
    }

    fn soft_delete_attachments_for_row(
        &self,
        row_id: i64,
        deleted_at: DateTime<Utc>,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE attachments SET deleted_at = ?1 WHERE row_id = ?2 AND deleted_at IS NULL",
                params![deleted_at, row_id],
            )?)
        })
    }

    fn delete_attachments_for_table(&self, table_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM attachments WHERE table_id = ?1", [table_id])?)
        })
    }

    fn count_attachments_for_row(&self, row_id: i64) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(id) FROM attachments WHERE row_id = ?1 AND deleted_at IS NULL",
                [row_id],
                |r| r.get(0),
            )?;
            Ok(count as u64)
        })
    }

    fn count_attachments_for_rows(&self, row_ids: &[i64]) -> Result<HashMap<i64, u64>> {
        if row_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let mut counts = HashMap::new();
            for chunk in id_chunks(row_ids) {
                let sql = format!(
                    "SELECT row_id, COUNT(id) FROM attachments WHERE row_id IN ({}) AND deleted_at IS NULL GROUP BY row_id",
                    placeholders(chunk.len())
                );
                let mut stmt = conn.prepare_cached(&sql)?;
                let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as u64))
                })?;
                for row in rows {
                    let (row_id, count) = row?;
                    counts.insert(row_id, count);
                }
            }
            Ok(counts)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_attachment(row_id: i64, file_id: i64) -> NewAttachment {
        NewAttachment {
            row_id,
            table_id: 1,
            user_id: "alice".into(),
            file_id: Some(file_id),
            kind: "file".into(),
            data: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn tombstoned_attachments_are_hidden() {
        let db = Database::open_in_memory().unwrap();
        let kept = db.insert_attachment(&new_attachment(1, 10)).unwrap();
        let gone = db.insert_attachment(&new_attachment(1, 11)).unwrap();

        assert!(db.soft_delete_attachment(gone.id, Utc::now()).unwrap());
        // second tombstone is a no-op
        assert!(!db.soft_delete_attachment(gone.id, Utc::now()).unwrap());

        let visible: Vec<_> = db.attachments_for_row(1).unwrap().iter().map(|a| a.id).collect();
        assert_eq!(visible, vec![kept.id]);
        assert!(db.find_attachment(gone.id).unwrap().is_none());
        assert_eq!(db.count_attachments_for_row(1).unwrap(), 1);

        let raw = db.find_attachment_including_deleted(gone.id).unwrap().unwrap();
        assert!(raw.deleted_at.is_some());
    }

    #[test]
    fn row_soft_delete_and_table_hard_delete() {
        let db = Database::open_in_memory().unwrap();
        let a = db.insert_attachment(&new_attachment(1, 10)).unwrap();
        db.insert_attachment(&new_attachment(2, 11)).unwrap();

        assert_eq!(db.soft_delete_attachments_for_row(1, Utc::now()).unwrap(), 1);
        assert!(db.find_attachment_including_deleted(a.id).unwrap().is_some());

        let counts = db.count_attachments_for_rows(&[1, 2]).unwrap();
        assert_eq!(counts.get(&1), None);
        assert_eq!(counts.get(&2), Some(&1));

        assert_eq!(db.delete_attachments_for_table(1).unwrap(), 2);
        assert!(db.find_attachment_including_deleted(a.id).unwrap().is_none());
    }

    #[test]
    fn counts_for_more_rows_than_sqlite_binds() {
        let db = Database::open_in_memory().unwrap();
        db.insert_attachment(&new_attachment(2, 10)).unwrap();
        db.insert_attachment(&new_attachment(33_000, 11)).unwrap();
        let gone = db.insert_attachment(&new_attachment(33_000, 12)).unwrap();
        db.soft_delete_attachment(gone.id, Utc::now()).unwrap();

        let row_ids: Vec<i64> = (1..=40_000).collect();
        let counts = db.count_attachments_for_rows(&row_ids).unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&2], 1);
        assert_eq!(counts[&33_000], 1);
    }
}
