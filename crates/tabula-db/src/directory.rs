//! Host-synced lookup tables: the user directory and the file index.

use anyhow::Result;
use rusqlite::params;

use crate::models::FileRow;
use crate::{Database, OptionalExt};

impl Database {
    // -- Users --

    pub fn upsert_user(&self, id: &str, display_name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, display_name) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name,
                                               updated_at = datetime('now')",
                (id, display_name),
            )?;
            Ok(())
        })
    }

    pub fn get_display_name(&self, id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT display_name FROM users WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()
        })
    }

    // -- Files --

    pub fn insert_file(&self, owner_id: &str, path: &str, mime_type: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO files (owner_id, path, mime_type) VALUES (?1, ?2, ?3)",
                params![owner_id, path, mime_type],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_file(&self, id: i64) -> Result<Option<FileRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, owner_id, path, mime_type FROM files WHERE id = ?1",
                [id],
                |row| {
                    Ok(FileRow {
                        id: row.get(0)?,
                        owner_id: row.get(1)?,
                        path: row.get(2)?,
                        mime_type: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }
}
