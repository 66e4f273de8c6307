//! The conduct session: the one place that sequences timer, note and
//! navigation operations.
//!
//! Ordering rules held here:
//! - the outgoing item's notes and the global notes are flushed before the
//!   active index moves;
//! - every pending note is flushed before a completion is recorded;
//! - completion state only changes after the agenda store accepted it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::{
    error::{ConductError, ConductResult},
    log_debug, log_info, log_warn,
    models::{AgendaItem, NoteBlock, NoteDocument, NoteKey, NoteScope},
    notes::{NoteBuffer, NotesSyncQueue, SyncStatus},
    settings::{ConductSettings, ViewMode},
    store::Collaborators,
    timer::{TimerController, TimerEngine, TimerKey, TimerSnapshot, TimerStatus},
};

use super::snapshot::SessionSnapshot;

const ENABLE_LOGS: bool = true;

/// Which note editor receives inserted timestamps.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NoteFocus {
    #[default]
    Global,
    /// The active item's notes.
    Item,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOutcome {
    pub item_id: String,
    pub completed: bool,
    /// New active index when the completion moved the session forward.
    pub advanced_to: Option<usize>,
}

struct SessionState {
    items: Vec<AgendaItem>,
    active_index: usize,
    focus: NoteFocus,
    closed: bool,
}

impl SessionState {
    fn position(&self, item_id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == item_id)
    }
}

/// A meeting being conducted. Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct ConductSession {
    meeting_id: Arc<str>,
    settings: Arc<ConductSettings>,
    state: Arc<Mutex<SessionState>>,
    timers: TimerController,
    notes: Arc<Mutex<NoteBuffer>>,
    sync: NotesSyncQueue,
    collaborators: Collaborators,
}

impl ConductSession {
    /// Opens a session: creates every item timer, loads saved notes and starts
    /// the clock. No timer is started. The first incomplete item becomes
    /// active.
    pub async fn open(
        meeting_id: impl Into<String>,
        items: Vec<AgendaItem>,
        collaborators: Collaborators,
        settings: ConductSettings,
    ) -> Self {
        let active_index = items
            .iter()
            .position(|item| !item.is_completed)
            .unwrap_or(0);

        let session = Self::build(
            meeting_id.into(),
            items,
            collaborators,
            settings,
            TimerEngine::new(),
            NoteBuffer::new(),
        );
        session.state.lock().await.active_index = active_index;
        session.start(active_index).await;
        session
    }

    /// Re-opens a session from a snapshot. Timers that were running come back
    /// paused, and snapshot notes take precedence over stored ones.
    pub async fn resume(
        snapshot: SessionSnapshot,
        items: Vec<AgendaItem>,
        collaborators: Collaborators,
        settings: ConductSettings,
    ) -> Self {
        let mut engine = TimerEngine::new();
        for (key, mut timer) in snapshot.timers {
            if timer.status == TimerStatus::Running {
                timer.status = TimerStatus::Paused;
            }
            engine.restore(key, timer);
        }

        let mut buffer = NoteBuffer::new();
        for (key, document) in &snapshot.notes {
            buffer.set(key.clone(), document.clone());
        }

        let active_index = snapshot
            .active_index
            .min(items.len().saturating_sub(1));
        let settings = ConductSettings {
            view_mode: snapshot.view_mode,
            ..settings
        };

        let session = Self::build(
            snapshot.meeting_id,
            items,
            collaborators,
            settings,
            engine,
            buffer,
        );
        {
            let mut state = session.state.lock().await;
            state.active_index = active_index;
            state.focus = snapshot.focus;
        }

        for key in snapshot.unsaved {
            let document = session.notes.lock().await.get(&key);
            session.sync.enqueue(key, document).await;
        }

        session.start(active_index).await;
        session
    }

    fn build(
        meeting_id: String,
        items: Vec<AgendaItem>,
        collaborators: Collaborators,
        settings: ConductSettings,
        engine: TimerEngine,
        buffer: NoteBuffer,
    ) -> Self {
        let timers = TimerController::with_engine(
            meeting_id.clone(),
            collaborators.time_logs.clone(),
            settings.tick_interval(),
            engine,
        );
        let sync = NotesSyncQueue::new(collaborators.notes.clone(), settings.debounce());

        Self {
            meeting_id: Arc::from(meeting_id),
            settings: Arc::new(settings),
            state: Arc::new(Mutex::new(SessionState {
                items,
                active_index: 0,
                focus: NoteFocus::Global,
                closed: false,
            })),
            timers,
            notes: Arc::new(Mutex::new(buffer)),
            sync,
            collaborators,
        }
    }

    async fn start(&self, active_index: usize) {
        let items = self.items().await;
        for item in &items {
            self.timers
                .init(&TimerKey::item(item.id.clone()), item.duration_minutes)
                .await;
        }
        let loaded = self.load_session().await;
        self.timers.start_clock().await;
        log_info!(
            "conduct session for meeting {} open: {} item(s), {} saved note(s), active index {}",
            self.meeting_id,
            items.len(),
            loaded,
            active_index
        );
    }

    /// Pulls saved notes for the meeting and every item into the buffer.
    /// Documents already in the buffer are kept. Load failures are logged and
    /// skipped. Returns how many documents were loaded.
    pub async fn load_session(&self) -> usize {
        let mut keys = vec![NoteKey::global(&*self.meeting_id)];
        keys.extend(
            self.items()
                .await
                .into_iter()
                .map(|item| NoteKey::item(item.id)),
        );

        let mut loaded = 0;
        for key in keys {
            if self.notes.lock().await.contains(&key) {
                continue;
            }
            match self.collaborators.notes.load_notes(&key).await {
                Ok(Some(document)) => {
                    let mut buffer = self.notes.lock().await;
                    if !buffer.contains(&key) {
                        buffer.set(key, document);
                        loaded += 1;
                    }
                }
                Ok(None) => {}
                Err(err) => log_warn!("failed to load notes for {}: {:#}", key, err),
            }
        }
        loaded
    }

    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    pub fn settings(&self) -> &ConductSettings {
        &self.settings
    }

    pub fn view_mode(&self) -> ViewMode {
        self.settings.view_mode
    }

    // Navigation

    /// Moves the active item. The outgoing item's notes and the global notes
    /// are flushed first; a failed flush is logged and leaves the payload
    /// queued, it does not block navigation.
    pub async fn select_item(&self, index: usize) -> ConductResult<()> {
        let outgoing = {
            let state = self.open_state().await?;
            if index >= state.items.len() {
                return Err(ConductError::ItemOutOfRange {
                    index,
                    len: state.items.len(),
                });
            }
            if index == state.active_index {
                return Ok(());
            }
            state
                .items
                .get(state.active_index)
                .map(|item| item.id.clone())
        };

        let mut keys = vec![NoteKey::global(&*self.meeting_id)];
        keys.extend(outgoing.map(NoteKey::item));
        if let Err(err) = self.sync.flush_keys(&keys).await {
            log_warn!("navigating with unsaved notes: {}", err);
        }

        self.open_state().await?.active_index = index;
        log_debug!("meeting {}: active item -> {}", self.meeting_id, index);
        Ok(())
    }

    /// Steps forward; stays put on the last item. Returns the active index.
    pub async fn next_item(&self) -> ConductResult<usize> {
        let (current, len) = self.position().await?;
        if current + 1 < len {
            self.select_item(current + 1).await?;
            return Ok(current + 1);
        }
        Ok(current)
    }

    /// Steps back; stays put on the first item. Returns the active index.
    pub async fn previous_item(&self) -> ConductResult<usize> {
        let (current, _) = self.position().await?;
        if current > 0 {
            self.select_item(current - 1).await?;
            return Ok(current - 1);
        }
        Ok(current)
    }

    async fn position(&self) -> ConductResult<(usize, usize)> {
        let state = self.open_state().await?;
        Ok((state.active_index, state.items.len()))
    }

    // Completion

    /// Flips an item's completion flag through the agenda store. Pending notes
    /// are flushed first. If the store rejects the change nothing local
    /// changes. With auto-advance on, completing the active item moves to the
    /// next one unless it is the last.
    pub async fn toggle_complete(&self, item_id: &str) -> ConductResult<CompletionOutcome> {
        let completed = {
            let state = self.open_state().await?;
            let index = state
                .position(item_id)
                .ok_or_else(|| ConductError::UnknownItem(item_id.to_string()))?;
            !state.items[index].is_completed
        };

        if let Err(err) = self.sync.flush_all().await {
            log_warn!("recording completion of {} with unsaved notes: {}", item_id, err);
        }

        self.collaborators
            .agenda
            .set_completion(item_id, completed)
            .await
            .map_err(|source| ConductError::CompletionFailed {
                item_id: item_id.to_string(),
                source,
            })?;

        let advance_to = {
            let mut state = self.state.lock().await;
            let index = state
                .position(item_id)
                .ok_or_else(|| ConductError::UnknownItem(item_id.to_string()))?;
            state.items[index].is_completed = completed;

            let is_active = index == state.active_index;
            (completed && is_active && self.settings.auto_advance() && index + 1 < state.items.len())
                .then_some(index + 1)
        };
        log_info!(
            "item {} marked {}",
            item_id,
            if completed { "complete" } else { "incomplete" }
        );

        if let Some(next) = advance_to {
            self.select_item(next).await?;
        }

        Ok(CompletionOutcome {
            item_id: item_id.to_string(),
            completed,
            advanced_to: advance_to,
        })
    }

    /// `(completed, total)` for the agenda.
    pub async fn progress(&self) -> (usize, usize) {
        let state = self.state.lock().await;
        let completed = state.items.iter().filter(|item| item.is_completed).count();
        (completed, state.items.len())
    }

    // Notes

    pub async fn focus(&self) -> NoteFocus {
        self.state.lock().await.focus
    }

    pub async fn set_focus(&self, focus: NoteFocus) -> ConductResult<()> {
        self.open_state().await?.focus = focus;
        Ok(())
    }

    /// Appends a `[M:SS]` marker for the current meeting time to the focused
    /// document and queues it for saving. Returns the updated document.
    pub async fn insert_timestamp(&self) -> ConductResult<NoteDocument> {
        let key = self.focused_note_key().await?;
        let elapsed = self
            .timers
            .elapsed_seconds(&TimerKey::Global)
            .await
            .unwrap_or(0);

        let document = self
            .notes
            .lock()
            .await
            .append_block(key.clone(), NoteBlock::timestamp(elapsed));
        self.sync.enqueue(key, document.clone()).await;
        Ok(document)
    }

    /// Stores a user edit and schedules its save.
    pub async fn update_notes(&self, key: NoteKey, document: NoteDocument) -> ConductResult<()> {
        self.check_note_key(&key).await?;
        self.notes.lock().await.set(key.clone(), document.clone());
        self.sync.enqueue(key, document).await;
        Ok(())
    }

    pub async fn notes(&self, key: &NoteKey) -> NoteDocument {
        self.notes.lock().await.get(key)
    }

    pub async fn has_pending_changes(&self) -> bool {
        self.sync.has_pending_changes().await
    }

    pub async fn sync_status(&self, key: &NoteKey) -> SyncStatus {
        self.sync.status(key).await
    }

    /// Saves every pending note now. Unlike navigation, failures come back to
    /// the caller.
    pub async fn flush(&self) -> ConductResult<()> {
        self.sync.flush_all().await
    }

    /// Document that currently has editing focus. Item focus with an empty
    /// agenda falls back to the global notes.
    pub async fn focused_note_key(&self) -> ConductResult<NoteKey> {
        let state = self.open_state().await?;
        let active = state.items.get(state.active_index);
        Ok(match (state.focus, active) {
            (NoteFocus::Item, Some(item)) => NoteKey::item(item.id.clone()),
            _ => NoteKey::global(&*self.meeting_id),
        })
    }

    async fn check_note_key(&self, key: &NoteKey) -> ConductResult<()> {
        let state = self.open_state().await?;
        let known = match key.scope {
            NoteScope::Global => key.id == *self.meeting_id,
            NoteScope::Item => state.position(&key.id).is_some(),
        };
        if known {
            Ok(())
        } else {
            Err(ConductError::UnknownItem(key.to_string()))
        }
    }

    // Timers

    /// Creates the timer for an item if it does not exist yet.
    pub async fn init_item_timer(&self, item_id: &str) -> ConductResult<bool> {
        let minutes = {
            let state = self.open_state().await?;
            let index = state
                .position(item_id)
                .ok_or_else(|| ConductError::UnknownItem(item_id.to_string()))?;
            state.items[index].duration_minutes
        };
        Ok(self.timers.init(&TimerKey::item(item_id), minutes).await)
    }

    /// Starts a timer. Starting an item pauses whichever other item was
    /// running; the global timer runs independently.
    pub async fn start_timer(&self, key: &TimerKey) -> ConductResult<TimerSnapshot> {
        self.ensure_open().await?;
        if self.timers.snapshot(key).await.is_none() {
            return Err(ConductError::TimerNotInitialized(key.to_string()));
        }
        if let TimerKey::Item(_) = key {
            for running in self.timers.running_items().await {
                if running != *key {
                    self.timers.pause(&running).await?;
                }
            }
        }
        self.timers.start(key).await
    }

    pub async fn pause_timer(&self, key: &TimerKey) -> ConductResult<TimerSnapshot> {
        self.ensure_open().await?;
        self.timers.pause(key).await
    }

    pub async fn reset_timer(&self, key: &TimerKey) -> ConductResult<TimerSnapshot> {
        self.ensure_open().await?;
        self.timers.reset(key).await
    }

    pub async fn timer(&self, key: &TimerKey) -> Option<TimerSnapshot> {
        self.timers.snapshot(key).await
    }

    pub async fn timers(&self) -> Vec<TimerSnapshot> {
        self.timers.snapshots().await
    }

    /// Direct handle on the timer controller, for adapters that drive ticks
    /// themselves.
    pub fn timer_controller(&self) -> &TimerController {
        &self.timers
    }

    // Agenda

    pub async fn active_index(&self) -> usize {
        self.state.lock().await.active_index
    }

    pub async fn active_item(&self) -> Option<AgendaItem> {
        let state = self.state.lock().await;
        state.items.get(state.active_index).cloned()
    }

    pub async fn items(&self) -> Vec<AgendaItem> {
        self.state.lock().await.items.clone()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    // Lifecycle

    pub async fn snapshot(&self) -> SessionSnapshot {
        let (active_index, focus) = {
            let state = self.state.lock().await;
            (state.active_index, state.focus)
        };
        SessionSnapshot {
            meeting_id: self.meeting_id.to_string(),
            view_mode: self.settings.view_mode,
            active_index,
            focus,
            timers: self.timers.entries().await,
            notes: self.notes.lock().await.entries(),
            unsaved: self.sync.busy_keys().await,
        }
    }

    /// Marks the meeting complete and closes the session. Notes are flushed
    /// first; if either the flush or the agenda store fails the session stays
    /// open.
    pub async fn complete_meeting(&self) -> ConductResult<()> {
        self.ensure_open().await?;
        self.sync.flush_all().await?;

        self.collaborators
            .agenda
            .set_meeting_completed(&self.meeting_id)
            .await
            .map_err(|source| ConductError::MeetingCompletionFailed {
                meeting_id: self.meeting_id.to_string(),
                source,
            })?;
        log_info!("meeting {} completed", self.meeting_id);

        self.close().await
    }

    /// Ends the session: saves every pending note, pauses running timers
    /// (closing their logs), stops the clock and waits for outstanding log
    /// writes. A failed save leaves the session open so the caller can retry.
    /// Closing twice is a no-op.
    pub async fn close(&self) -> ConductResult<()> {
        if self.is_closed().await {
            return Ok(());
        }
        self.sync.flush_all().await?;

        self.state.lock().await.closed = true;
        let paused = self.timers.pause_all().await;
        self.timers.stop_clock().await;

        let final_flush = self.sync.flush_all().await;
        self.sync.cancel_timers().await;
        self.timers.drain_log_writes().await;

        log_info!(
            "conduct session for meeting {} closed ({} timer(s) paused)",
            self.meeting_id,
            paused
        );
        final_flush
    }

    async fn ensure_open(&self) -> ConductResult<()> {
        self.open_state().await.map(|_| ())
    }

    async fn open_state(&self) -> ConductResult<tokio::sync::MutexGuard<'_, SessionState>> {
        let state = self.state.lock().await;
        if state.closed {
            return Err(ConductError::SessionClosed(self.meeting_id.to_string()));
        }
        Ok(state)
    }
}
