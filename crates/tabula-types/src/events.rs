use serde::{Deserialize, Serialize};

/// Notifications emitted by the host table system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum HostEvent {
    /// A table and all its rows were destroyed
    TableDeleted { table_id: i64 },

    /// A single row was destroyed
    RowDeleted { table_id: i64, row_id: i64 },
}
