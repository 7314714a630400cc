use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, Row, params, params_from_iter};
use tracing::debug;

use crate::models::{LabelRow, NewLabel};
use crate::store::{LabelStore, RowLabelStore};
use crate::{Database, OptionalExt, id_chunks, placeholders};

const LABEL_COLUMNS: &str = "id, table_id, title, color, created_by, created_at";

fn label_from_row(row: &Row<'_>) -> rusqlite::Result<LabelRow> {
    Ok(LabelRow {
        id: row.get(0)?,
        table_id: row.get(1)?,
        title: row.get(2)?,
        color: row.get(3)?,
        created_by: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn query_label(conn: &Connection, id: i64) -> Result<Option<LabelRow>> {
    let sql = format!("SELECT {LABEL_COLUMNS} FROM labels WHERE id = ?1");
    conn.query_row(&sql, [id], label_from_row).optional()
}

impl LabelStore for Database {
    fn find_label(&self, id: i64) -> Result<Option<LabelRow>> {
        self.with_conn(|conn| query_label(conn, id))
    }

    fn labels_for_table(&self, table_id: i64) -> Result<Vec<LabelRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {LABEL_COLUMNS} FROM labels WHERE table_id = ?1 ORDER BY title ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([table_id], label_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn insert_label(&self, new: &NewLabel) -> Result<LabelRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO labels (table_id, title, color, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![new.table_id, new.title, new.color, new.created_by, new.created_at],
            )?;

            Ok(LabelRow {
                id: conn.last_insert_rowid(),
                table_id: new.table_id,
                title: new.title.clone(),
                color: new.color.clone(),
                created_by: new.created_by.clone(),
                created_at: new.created_at,
            })
        })
    }

    fn update_label(&self, id: i64, title: &str, color: &str) -> Result<Option<LabelRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE labels SET title = ?1, color = ?2 WHERE id = ?3",
                params![title, color, id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_label(conn, id)
        })
    }

    fn delete_label(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM labels WHERE id = ?1", [id])? > 0))
    }

    fn delete_labels_for_table(&self, table_id: i64) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM labels WHERE table_id = ?1", [table_id])?))
    }
}

impl RowLabelStore for Database {
    fn label_ids_for_row(&self, row_id: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT label_id FROM row_labels WHERE row_id = ?1 ORDER BY id ASC")?;
            let ids = stmt
                .query_map([row_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            Ok(ids)
        })
    }

    fn label_ids_for_rows(&self, row_ids: &[i64]) -> Result<HashMap<i64, Vec<i64>>> {
        if row_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let mut mapping: HashMap<i64, Vec<i64>> = HashMap::new();
            for chunk in id_chunks(row_ids) {
                let sql = format!(
                    "SELECT row_id, label_id FROM row_labels WHERE row_id IN ({}) ORDER BY id ASC",
                    placeholders(chunk.len())
                );
                let mut stmt = conn.prepare_cached(&sql)?;
                let pairs = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
                })?;
                for pair in pairs {
                    let (row_id, label_id) = pair?;
                    mapping.entry(row_id).or_default().push(label_id);
                }
            }
            Ok(mapping)
        })
    }

    fn insert_row_label(
        &self,
        row_id: i64,
        label_id: i64,
        created_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO row_labels (row_id, label_id, created_at) VALUES (?1, ?2, ?3)",
                params![row_id, label_id, created_at],
            );
            match inserted {
                Ok(_) => Ok(true),
                // UNIQUE(row_id, label_id) lost a race with a concurrent insert
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                    debug!("Row {} already has label {}", row_id, label_id);
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    fn delete_row_label(&self, row_id: i64, label_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM row_labels WHERE row_id = ?1 AND label_id = ?2",
                [row_id, label_id],
            )?;
            Ok(changed > 0)
        })
    }

    fn delete_row_labels_for_row(&self, row_id: i64) -> Result<usize> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM row_labels WHERE row_id = ?1", [row_id])?))
    }

    fn delete_row_labels_for_label(&self, label_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM row_labels WHERE label_id = ?1", [label_id])?)
        })
    }
}
