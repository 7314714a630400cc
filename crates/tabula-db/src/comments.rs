use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params, params_from_iter};

use crate::models::{CommentRow, NewComment};
use crate::store::CommentStore;
use crate::{Database, OptionalExt, id_chunks, placeholders};

const COMMENT_COLUMNS: &str =
    "id, row_id, table_id, user_id, message, created_at, updated_at, reply_to";

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        row_id: row.get(1)?,
        table_id: row.get(2)?,
        user_id: row.get(3)?,
        message: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        reply_to: row.get(7)?,
    })
}

fn query_comment(conn: &Connection, id: i64) -> Result<Option<CommentRow>> {
    let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1");
    conn.query_row(&sql, [id], comment_from_row).optional()
}

impl CommentStore for Database {
    fn find_comment(&self, id: i64) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| query_comment(conn, id))
    }

    fn comments_for_row(&self, row_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {COMMENT_COLUMNS} FROM comments WHERE row_id = ?1 ORDER BY created_at ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([row_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn insert_comment(&self, new: &NewComment) -> Result<CommentRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (row_id, table_id, user_id, message, created_at, reply_to)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    new.row_id,
                    new.table_id,
                    new.user_id,
                    new.message,
                    new.created_at,
                    new.reply_to
                ],
            )?;

            Ok(CommentRow {
                id: conn.last_insert_rowid(),
                row_id: new.row_id,
                table_id: new.table_id,
                user_id: new.user_id.clone(),
                message: new.message.clone(),
                created_at: new.created_at,
                updated_at: None,
                reply_to: new.reply_to,
            })
        })
    }

    fn update_comment_message(
        &self,
        id: i64,
        message: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE comments SET message = ?1, updated_at = ?2 WHERE id = ?3",
                params![message, updated_at, id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_comment(conn, id)
        })
    }

    fn delete_comment(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM comments WHERE id = ?1", [id])? > 0))
    }

    fn count_comments_for_row(&self, row_id: i64) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(id) FROM comments WHERE row_id = ?1", [row_id], |r| {
                    r.get(0)
                })?;
            Ok(count as u64)
        })
    }

    fn count_comments_for_rows(&self, row_ids: &[i64]) -> Result<HashMap<i64, u64>> {
        if row_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let mut counts = HashMap::new();
            for chunk in id_chunks(row_ids) {
                let sql = format!(
                    "SELECT row_id, COUNT(id) FROM comments WHERE row_id IN ({}) GROUP BY row_id",
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

    fn delete_comments_for_row(&self, row_id: i64) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM comments WHERE row_id = ?1", [row_id])?))
    }

    fn delete_comments_for_table(&self, table_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM comments WHERE table_id = ?1", [table_id])?)
        })
    }
}
