//! External collaborators the engine reads from and writes to.
//!
//! All three are best-effort from the engine's point of view except
//! [`AgendaStore::set_completion`], whose failure is surfaced to the caller.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{NoteDocument, NoteKey};

#[async_trait]
pub trait TimeLogStore: Send + Sync {
    /// Opens a time-log record and returns its id. `item_id` is `None` for the
    /// whole meeting.
    async fn open_log(&self, meeting_id: &str, item_id: Option<&str>) -> Result<String>;

    /// Stamps the end of a log with its final elapsed value. Closing the same
    /// log again overwrites the previous value.
    async fn close_log(&self, log_id: &str, elapsed_seconds: u64) -> Result<()>;
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn load_notes(&self, key: &NoteKey) -> Result<Option<NoteDocument>>;

    async fn save_notes(&self, key: &NoteKey, document: &NoteDocument) -> Result<()>;
}

#[async_trait]
pub trait AgendaStore: Send + Sync {
    async fn set_completion(&self, item_id: &str, completed: bool) -> Result<()>;

    async fn set_meeting_completed(&self, meeting_id: &str) -> Result<()>;
}

/// The three collaborators a conduct session needs.
#[derive(Clone)]
pub struct Collaborators {
    pub time_logs: Arc<dyn TimeLogStore>,
    pub notes: Arc<dyn NoteStore>,
    pub agenda: Arc<dyn AgendaStore>,
}

impl Collaborators {
    pub fn new(
        time_logs: Arc<dyn TimeLogStore>,
        notes: Arc<dyn NoteStore>,
        agenda: Arc<dyn AgendaStore>,
    ) -> Self {
        Self {
            time_logs,
            notes,
            agenda,
        }
    }

    /// One backend serving all three roles (e.g. the SQLite `Database`).
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: TimeLogStore + NoteStore + AgendaStore + 'static,
    {
        Self {
            time_logs: store.clone(),
            notes: store.clone(),
            agenda: store,
        }
    }
}
