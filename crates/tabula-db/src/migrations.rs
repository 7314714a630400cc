use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (comments, attachments, activity)");
        conn.execute_batch(
            "
            CREATE TABLE comments (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                row_id      INTEGER NOT NULL,
                table_id    INTEGER NOT NULL,
                user_id     TEXT NOT NULL,
                message     TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT,
                reply_to    INTEGER
            );

            CREATE INDEX idx_comments_row ON comments(row_id);
            CREATE INDEX idx_comments_table ON comments(table_id);
            CREATE INDEX idx_comments_user ON comments(user_id);

            CREATE TABLE attachments (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                row_id      INTEGER NOT NULL,
                table_id    INTEGER NOT NULL,
                user_id     TEXT NOT NULL,
                file_id     INTEGER,
                type        TEXT NOT NULL DEFAULT 'file',
                data        TEXT,
                created_at  TEXT NOT NULL,
                deleted_at  TEXT
            );

            CREATE INDEX idx_attachments_row ON attachments(row_id);
            CREATE INDEX idx_attachments_table ON attachments(table_id);

            CREATE TABLE activity (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                table_id      INTEGER NOT NULL,
                row_id        INTEGER,
                user_id       TEXT NOT NULL,
                action        TEXT NOT NULL,
                subject_type  TEXT NOT NULL,
                subject_id    INTEGER,
                changes       TEXT,
                created_at    TEXT NOT NULL
            );

            CREATE INDEX idx_activity_table ON activity(table_id);
            CREATE INDEX idx_activity_row ON activity(row_id);
            CREATE INDEX idx_activity_user ON activity(user_id);
            CREATE INDEX idx_activity_created ON activity(created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (labels)");
        conn.execute_batch(
            "
            CREATE TABLE labels (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                table_id    INTEGER NOT NULL,
                title       TEXT NOT NULL,
                color       TEXT NOT NULL DEFAULT '#0082c9',
                created_by  TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_labels_table ON labels(table_id);

            -- No foreign key to labels: cascades happen in the label service.
            CREATE TABLE row_labels (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                row_id      INTEGER NOT NULL,
                label_id    INTEGER NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE(row_id, label_id)
            );

            CREATE INDEX idx_row_labels_row ON row_labels(row_id);
            CREATE INDEX idx_row_labels_label ON row_labels(label_id);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    if version < 3 {
        info!("Running migration v3 (user directory, file index)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id            TEXT PRIMARY KEY,
                display_name  TEXT NOT NULL,
                updated_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE files (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id    TEXT NOT NULL,
                path        TEXT NOT NULL,
                mime_type   TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_files_owner ON files(owner_id);

            INSERT INTO schema_version (version) VALUES (3);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 3);
    }

    #[test]
    fn row_labels_pair_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();

        conn.execute(
            "INSERT INTO row_labels (row_id, label_id, created_at) VALUES (1, 1, 'x')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO row_labels (row_id, label_id, created_at) VALUES (1, 1, 'y')",
            [],
        );
        assert!(dup.is_err());
    }
}
