//! Test doubles shared by the service tests.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use tabula_db::ActivityStore;
use tabula_db::models::{ActivityRow, NewActivity};

use crate::activity::{ActivityEvent, ActivityRecorder};
use crate::providers::{FileError, FileInfo, FileStore};

/// Activity store whose every call fails, as if the table were locked or gone.
pub struct FailingActivityStore;

impl ActivityStore for FailingActivityStore {
    fn insert_activity(&self, _new: &NewActivity) -> Result<i64> {
        Err(anyhow!("activity store offline"))
    }

    fn activity_for_row(&self, _row_id: i64, _limit: u32, _offset: u32) -> Result<Vec<ActivityRow>> {
        Err(anyhow!("activity store offline"))
    }

    fn activity_for_table(
        &self,
        _table_id: i64,
        _limit: u32,
        _offset: u32,
    ) -> Result<Vec<ActivityRow>> {
        Err(anyhow!("activity store offline"))
    }

    fn activity_for_user(&self, _user_id: &str, _limit: u32) -> Result<Vec<ActivityRow>> {
        Err(anyhow!("activity store offline"))
    }

    fn delete_activity_for_row(&self, _row_id: i64) -> Result<usize> {
        Err(anyhow!("activity store offline"))
    }

    fn delete_activity_for_table(&self, _table_id: i64) -> Result<usize> {
        Err(anyhow!("activity store offline"))
    }

    fn delete_activity_before(&self, _cutoff: DateTime<Utc>, _batch: u32) -> Result<usize> {
        Err(anyhow!("activity store offline"))
    }
}

/// Recorder that keeps events in memory so tests can count them.
#[derive(Default)]
pub struct RecordedActivity {
    events: Mutex<Vec<ActivityEvent>>,
}

impl RecordedActivity {
    pub fn events(&self) -> Vec<ActivityEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ActivityRecorder for RecordedActivity {
    fn record(&self, event: ActivityEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// In-memory file store. Ids listed in `broken` fail with a provider error.
#[derive(Default)]
pub struct StubFiles {
    pub files: HashMap<i64, FileInfo>,
    pub broken: Vec<i64>,
}

impl StubFiles {
    pub fn with_file(mut self, file_id: i64, name: &str, size: u64) -> Self {
        self.files.insert(
            file_id,
            FileInfo {
                name: name.to_string(),
                path: format!("uploads/{name}"),
                mime_type: "application/octet-stream".to_string(),
                size,
            },
        );
        self
    }
}

impl FileStore for StubFiles {
    fn resolve(&self, file_id: i64, _acting_user: &str) -> Result<FileInfo, FileError> {
        if self.broken.contains(&file_id) {
            return Err(FileError::Provider(anyhow!("storage backend unavailable")));
        }
        self.files.get(&file_id).cloned().ok_or(FileError::NotFound)
    }
}
