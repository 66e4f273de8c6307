use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted record of actual time spent on an item (or the whole meeting when
/// `agenda_item_id` is `None`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeLog {
    pub id: String,
    pub meeting_id: String,
    pub agenda_item_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<u64>,
}
