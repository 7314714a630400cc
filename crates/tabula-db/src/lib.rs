pub mod activity;
pub mod attachments;
pub mod comments;
pub mod directory;
pub mod labels;
pub mod migrations;
pub mod models;
pub mod store;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub use store::{ActivityStore, AttachmentStore, CommentStore, LabelStore, RowLabelStore};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory database, used by tests and throwaway tooling.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Bound values per `IN (...)` statement. SQLite caps a statement at 32766
/// parameters; batches larger than this are split.
pub(crate) const MAX_IN_PARAMS: usize = 900;

/// Sorted, de-duplicated ids split into `IN`-sized chunks. Each id lands in
/// exactly one chunk, so per-id results never straddle two statements.
pub(crate) fn id_chunks(ids: &[i64]) -> Vec<Vec<i64>> {
    let mut unique = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();
    unique.chunks(MAX_IN_PARAMS).map(<[i64]>::to_vec).collect()
}

/// Builds `?1, ?2, ...` for an `IN (...)` clause over `n` bound values.
pub(crate) fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}

/// Converts a stored enum string, reporting bad values as a column decode failure.
pub(crate) fn parse_column<T>(idx: usize, raw: String) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_list() {
        assert_eq!(placeholders(1), "?1");
        assert_eq!(placeholders(3), "?1, ?2, ?3");
    }

    #[test]
    fn id_chunks_dedupe_and_split() {
        assert!(id_chunks(&[]).is_empty());
        assert_eq!(id_chunks(&[3, 1, 3, 2]), vec![vec![1, 2, 3]]);

        let ids: Vec<i64> = (0..(MAX_IN_PARAMS as i64 * 2 + 1)).rev().collect();
        let chunks = id_chunks(&ids);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), MAX_IN_PARAMS);
        assert_eq!(chunks[2], vec![MAX_IN_PARAMS as i64 * 2]);
    }

    #[test]
    fn reopening_a_file_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tabula.db");
        {
            let db = Database::open(&path).unwrap();
            db.upsert_user("alice", "Alice").unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_display_name("alice").unwrap().as_deref(), Some("Alice"));
    }
}
