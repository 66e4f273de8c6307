use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One agenda item as seen by the conduct engine. Owned by the agenda store;
/// the engine only ever flips `is_completed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgendaItem {
    pub id: String,
    pub title: String,
    /// Planned budget in minutes. `None` (or zero) means count-up only.
    pub duration_minutes: Option<u32>,
    pub is_completed: bool,
}

impl AgendaItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>, duration_minutes: Option<u32>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            duration_minutes,
            is_completed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MeetingStatus {
    Scheduled,
    InProgress,
    Completed,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Scheduled => "Scheduled",
            MeetingStatus::InProgress => "InProgress",
            MeetingStatus::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    pub title: String,
    pub status: MeetingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
