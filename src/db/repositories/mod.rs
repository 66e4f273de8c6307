mod agenda;
mod notes;
mod time_logs;

use anyhow::Result;
use async_trait::async_trait;

use crate::{
    db::Database,
    models::{MeetingStatus, NoteDocument, NoteKey},
    store::{AgendaStore, NoteStore, TimeLogStore},
};

#[async_trait]
impl TimeLogStore for Database {
    async fn open_log(&self, meeting_id: &str, item_id: Option<&str>) -> Result<String> {
        self.insert_time_log(meeting_id, item_id).await
    }

    async fn close_log(&self, log_id: &str, elapsed_seconds: u64) -> Result<()> {
        self.finish_time_log(log_id, elapsed_seconds).await
    }
}

#[async_trait]
impl NoteStore for Database {
    async fn load_notes(&self, key: &NoteKey) -> Result<Option<NoteDocument>> {
        self.get_notes(key).await
    }

    async fn save_notes(&self, key: &NoteKey, document: &NoteDocument) -> Result<()> {
        self.put_notes(key, document).await
    }
}

#[async_trait]
impl AgendaStore for Database {
    async fn set_completion(&self, item_id: &str, completed: bool) -> Result<()> {
        self.set_item_completion(item_id, completed).await
    }

    async fn set_meeting_completed(&self, meeting_id: &str) -> Result<()> {
        self.set_meeting_status(meeting_id, MeetingStatus::Completed)
            .await
    }
}
