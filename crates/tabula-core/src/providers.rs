//! External collaborators: the identity provider and the file store.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use tabula_db::Database;
use thiserror::Error;
use tracing::warn;

/// Resolves host user ids to display names.
pub trait IdentityProvider: Send + Sync {
    /// `None` when the user is unknown or cannot be looked up.
    fn display_name(&self, user_id: &str) -> Option<String>;
}

impl IdentityProvider for Database {
    fn display_name(&self, user_id: &str) -> Option<String> {
        match self.get_display_name(user_id) {
            Ok(name) => name,
            Err(e) => {
                warn!("User directory lookup failed for {}: {}", user_id, e);
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub name: String,
    /// Relative to the owner's folder.
    pub path: String,
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum FileError {
    #[error("file not found")]
    NotFound,

    #[error("file store error: {0}")]
    Provider(#[from] anyhow::Error),
}

pub trait FileStore: Send + Sync {
    fn resolve(&self, file_id: i64, acting_user: &str) -> Result<FileInfo, FileError>;
}

/// File store backed by the `files` index table and a directory tree laid
/// out as `{root}/{owner_id}/{path}`.
///
/// Only the owner can see a file; anyone else gets `NotFound`.
pub struct DiskFileStore {
    db: Arc<Database>,
    root: PathBuf,
}

impl DiskFileStore {
    pub fn new(db: Arc<Database>, root: PathBuf) -> Self {
        Self { db, root }
    }

    fn file_path(&self, owner_id: &str, relative: &str) -> Result<PathBuf, FileError> {
        let owner = Path::new(owner_id);
        let relative = Path::new(relative);
        let is_plain = |p: &Path| p.components().all(|c| matches!(c, Component::Normal(_)));
        if !is_plain(owner) || !is_plain(relative) {
            return Err(FileError::Provider(anyhow!(
                "refusing to resolve path outside storage root: {}/{}",
                owner.display(),
                relative.display()
            )));
        }
        Ok(self.root.join(owner).join(relative))
    }
}

impl FileStore for DiskFileStore {
    fn resolve(&self, file_id: i64, acting_user: &str) -> Result<FileInfo, FileError> {
        let row = self.db.get_file(file_id)?.ok_or(FileError::NotFound)?;
        if row.owner_id != acting_user {
            return Err(FileError::NotFound);
        }

        let path = self.file_path(&row.owner_id, &row.path)?;
        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(FileError::NotFound),
            Err(e) => return Err(FileError::Provider(e.into())),
        };

        let name = Path::new(&row.path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| row.path.clone());

        Ok(FileInfo {
            name,
            path: row.path,
            mime_type: row.mime_type,
            size: metadata.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_file(contents: &[u8]) -> (tempfile::TempDir, DiskFileStore, i64) {
        let dir = tempfile::tempdir().unwrap();
        let owner_dir = dir.path().join("alice").join("docs");
        std::fs::create_dir_all(&owner_dir).unwrap();
        std::fs::write(owner_dir.join("plan.pdf"), contents).unwrap();

        let db = Arc::new(Database::open_in_memory().unwrap());
        let id = db.insert_file("alice", "docs/plan.pdf", "application/pdf").unwrap();
        let root = dir.path().to_path_buf();
        (dir, DiskFileStore::new(db, root), id)
    }

    #[test]
    fn resolves_owned_file() {
        let (_dir, store, id) = store_with_file(b"12345");
        let info = store.resolve(id, "alice").unwrap();
        assert_eq!(info.name, "plan.pdf");
        assert_eq!(info.path, "docs/plan.pdf");
        assert_eq!(info.mime_type, "application/pdf");
        assert_eq!(info.size, 5);
    }

    #[test]
    fn other_users_and_unknown_ids_are_not_found() {
        let (_dir, store, id) = store_with_file(b"x");
        assert!(matches!(store.resolve(id, "bob"), Err(FileError::NotFound)));
        assert!(matches!(store.resolve(id + 100, "alice"), Err(FileError::NotFound)));
    }

    #[test]
    fn missing_file_on_disk_is_not_found() {
        let (dir, store, id) = store_with_file(b"x");
        std::fs::remove_file(dir.path().join("alice/docs/plan.pdf")).unwrap();
        assert!(matches!(store.resolve(id, "alice"), Err(FileError::NotFound)));
    }

    #[test]
    fn traversal_is_a_provider_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open_in_memory().unwrap());
        let id = db.insert_file("alice", "../bob/secret.txt", "text/plain").unwrap();
        let store = DiskFileStore::new(db, dir.path().to_path_buf());

        assert!(matches!(store.resolve(id, "alice"), Err(FileError::Provider(_))));
    }

    #[test]
    fn directory_lookup_for_identity() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_user("alice", "Alice").unwrap();
        assert_eq!(db.display_name("alice").as_deref(), Some("Alice"));
        assert_eq!(db.display_name("ghost"), None);
    }
}
