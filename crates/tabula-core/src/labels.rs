//! Label catalogue per table and the row ↔ label assignment engine.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value, json};
use tabula_db::models::{LabelRow, NewLabel};
use tabula_db::{LabelStore, RowLabelStore};
use tabula_types::models::{Action, DEFAULT_LABEL_COLOR, Label, SubjectType};
use tracing::{debug, error, info};

use crate::activity::{ActivityEvent, ActivityRecorder};
use crate::error::{ServiceError, ServiceResult};

const MAX_TITLE_LEN: usize = 255;

pub struct LabelService {
    labels: Arc<dyn LabelStore>,
    row_labels: Arc<dyn RowLabelStore>,
    activity: Arc<dyn ActivityRecorder>,
}

impl LabelService {
    pub fn new(
        labels: Arc<dyn LabelStore>,
        row_labels: Arc<dyn RowLabelStore>,
        activity: Arc<dyn ActivityRecorder>,
    ) -> Self {
        Self {
            labels,
            row_labels,
            activity,
        }
    }

    // -- Catalogue --

    pub fn find_all_for_table(&self, table_id: i64) -> ServiceResult<Vec<Label>> {
        Ok(self.labels.labels_for_table(table_id)?.into_iter().map(to_label).collect())
    }

    pub fn find(&self, label_id: i64) -> ServiceResult<Label> {
        self.find_row(label_id).map(to_label)
    }

    pub fn create(
        &self,
        table_id: i64,
        title: &str,
        color: Option<&str>,
        actor: &str,
    ) -> ServiceResult<Label> {
        let title = validate_title(title)?;
        let color = validate_color(color.unwrap_or(DEFAULT_LABEL_COLOR))?;

        let row = self.labels.insert_label(&NewLabel {
            table_id,
            title,
            color,
            created_by: actor.to_string(),
            created_at: Utc::now(),
        })?;

        self.activity.record(
            ActivityEvent::new(table_id, actor, Action::Create, SubjectType::Label).subject(row.id),
        );

        Ok(to_label(row))
    }

    pub fn update(&self, label_id: i64, title: &str, color: &str, actor: &str) -> ServiceResult<Label> {
        let title = validate_title(title)?;
        let color = validate_color(color)?;
        let before = self.find_row(label_id)?;

        let after = self
            .labels
            .update_label(label_id, &title, &color)?
            .ok_or_else(|| ServiceError::not_found("Label"))?;

        let mut changes = Map::new();
        if before.title != after.title {
            changes.insert("title".into(), json!([before.title, after.title]));
        }
        if before.color != after.color {
            changes.insert("color".into(), json!([before.color, after.color]));
        }
        if !changes.is_empty() {
            self.activity.record(
                ActivityEvent::new(after.table_id, actor, Action::Update, SubjectType::Label)
                    .subject(label_id)
                    .with_changes(Some(Value::Object(changes))),
            );
        }

        Ok(to_label(after))
    }

    /// Removes every assignment of the label, then the label itself.
    pub fn delete_label(&self, label_id: i64) -> ServiceResult<()> {
        self.find_row(label_id)?;
        let unassigned = self.row_labels.delete_row_labels_for_label(label_id)?;
        self.labels.delete_label(label_id)?;
        info!("Deleted label {} ({} row assignments)", label_id, unassigned);
        Ok(())
    }

    // -- Assignments --

    /// Attaches a label to a row. Already-assigned pairs are left alone and
    /// produce no activity.
    pub fn assign(&self, row_id: i64, label_id: i64, table_id: i64, actor: &str) -> ServiceResult<()> {
        self.find_row(label_id)?;

        if !self.row_labels.insert_row_label(row_id, label_id, Utc::now())? {
            debug!("Label {} already on row {}", label_id, row_id);
            return Ok(());
        }

        self.activity.record(
            ActivityEvent::new(table_id, actor, Action::LabelAssign, SubjectType::Row)
                .on_row(row_id)
                .subject(label_id),
        );
        Ok(())
    }

    /// Detaches a label from a row. Missing pairs are a silent no-op.
    pub fn remove(&self, row_id: i64, label_id: i64, table_id: i64, actor: &str) -> ServiceResult<()> {
        if !self.row_labels.delete_row_label(row_id, label_id)? {
            debug!("Label {} not on row {}, nothing to remove", label_id, row_id);
            return Ok(());
        }

        self.activity.record(
            ActivityEvent::new(table_id, actor, Action::LabelRemove, SubjectType::Row)
                .on_row(row_id)
                .subject(label_id),
        );
        Ok(())
    }

    /// Makes the row's labels equal to `desired`, touching only the difference.
    ///
    /// Ids in `desired` that no longer resolve to a label are skipped.
    pub fn set_for_row(
        &self,
        row_id: i64,
        desired: &[i64],
        table_id: i64,
        actor: &str,
    ) -> ServiceResult<()> {
        let current = self.row_labels.label_ids_for_row(row_id)?;
        let current_set: HashSet<i64> = current.iter().copied().collect();
        let desired_set: HashSet<i64> = desired.iter().copied().collect();

        let mut seen = HashSet::new();
        let to_add: Vec<i64> = desired
            .iter()
            .copied()
            .filter(|id| !current_set.contains(id) && seen.insert(*id))
            .collect();
        let to_remove: Vec<i64> =
            current.into_iter().filter(|id| !desired_set.contains(id)).collect();

        for label_id in to_add {
            match self.assign(row_id, label_id, table_id, actor) {
                Ok(()) => {}
                Err(ServiceError::NotFound(_)) => {
                    debug!("Skipping stale label {} for row {}", label_id, row_id);
                }
                Err(e) => return Err(e),
            }
        }

        for label_id in to_remove {
            self.remove(row_id, label_id, table_id, actor)?;
        }

        Ok(())
    }

    /// Labels on a row in assignment order. Assignments whose label is gone are dropped.
    pub fn list_for_row(&self, row_id: i64) -> ServiceResult<Vec<Label>> {
        let mut labels = Vec::new();
        for label_id in self.row_labels.label_ids_for_row(row_id)? {
            match self.labels.find_label(label_id)? {
                Some(row) => labels.push(to_label(row)),
                None => debug!("Row {} references deleted label {}", row_id, label_id),
            }
        }
        Ok(labels)
    }

    /// Batch form of `list_for_row` for rows of one table: one label query and
    /// one assignment query, joined in memory. Every requested row gets an entry.
    pub fn list_for_rows(
        &self,
        row_ids: &[i64],
        table_id: i64,
    ) -> ServiceResult<HashMap<i64, Vec<Label>>> {
        if row_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let by_id: HashMap<i64, Label> = self
            .labels
            .labels_for_table(table_id)?
            .into_iter()
            .map(|row| (row.id, to_label(row)))
            .collect();
        let mut assignments = self.row_labels.label_ids_for_rows(row_ids)?;

        let mut result = HashMap::with_capacity(row_ids.len());
        for &row_id in row_ids {
            let labels = assignments
                .remove(&row_id)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|label_id| by_id.get(&label_id).cloned())
                .collect();
            result.entry(row_id).or_insert(labels);
        }
        Ok(result)
    }

    // -- Cleanup hooks --

    pub fn delete_all_for_table(&self, table_id: i64) {
        let result = self.labels.labels_for_table(table_id).and_then(|labels| {
            for label in &labels {
                self.row_labels.delete_row_labels_for_label(label.id)?;
            }
            self.labels.delete_labels_for_table(table_id)
        });
        match result {
            Ok(count) => info!("Deleted {} labels for table {}", count, table_id),
            Err(e) => error!("Error deleting labels for table {}: {}", table_id, e),
        }
    }

    pub fn delete_all_for_row(&self, row_id: i64) {
        if let Err(e) = self.row_labels.delete_row_labels_for_row(row_id) {
            error!("Error deleting labels for row {}: {}", row_id, e);
        }
    }

    fn find_row(&self, label_id: i64) -> ServiceResult<LabelRow> {
        self.labels
            .find_label(label_id)?
            .ok_or_else(|| ServiceError::not_found("Label"))
    }
}

fn to_label(row: LabelRow) -> Label {
    Label {
        id: row.id,
        table_id: row.table_id,
        title: row.title,
        color: row.color,
        created_by: row.created_by,
        created_at: row.created_at,
    }
}

fn validate_title(title: &str) -> ServiceResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ServiceError::BadRequest("Label title must not be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ServiceError::BadRequest(format!(
            "Label title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

/// Accepts `#rgb` and `#rrggbb`.
fn validate_color(color: &str) -> ServiceResult<String> {
    let valid = color
        .strip_prefix('#')
        .is_some_and(|hex| matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()));
    if !valid {
        return Err(ServiceError::BadRequest(format!("Invalid label color '{color}'")));
    }
    Ok(color.to_ascii_lowercase())
}
