use serde::{Deserialize, Serialize};

use crate::{
    models::{NoteDocument, NoteKey},
    settings::ViewMode,
    timer::{TimerKey, TimerState},
};

use super::coordinator::NoteFocus;

/// Serializable picture of a live session, enough to pick it up again with
/// [`ConductSession::resume`](super::ConductSession::resume).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub meeting_id: String,
    pub view_mode: ViewMode,
    pub active_index: usize,
    pub focus: NoteFocus,
    pub timers: Vec<(TimerKey, TimerState)>,
    pub notes: Vec<(NoteKey, NoteDocument)>,
    /// Keys whose buffered content had not been written yet.
    #[serde(default)]
    pub unsaved: Vec<NoteKey>,
}

impl SessionSnapshot {
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
