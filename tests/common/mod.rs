#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use conduct_engine::{
    AgendaItem, AgendaStore, Collaborators, NoteBlock, NoteDocument, NoteKey, NoteStore,
    TimeLogStore,
};
use tokio::sync::Semaphore;

/// In-memory collaborator that records every call. Saves and log opens can be
/// held behind a gate and made to fail on demand.
#[derive(Default)]
pub struct RecordingStore {
    pub stored_notes: Mutex<HashMap<NoteKey, NoteDocument>>,
    pub saves: Mutex<Vec<(NoteKey, NoteDocument)>>,
    pub save_attempts: AtomicUsize,
    pub saves_in_progress: AtomicUsize,
    pub max_concurrent_saves: AtomicUsize,
    pub fail_saves: AtomicBool,
    pub fail_loads: AtomicBool,
    save_gate: Mutex<Option<Arc<Semaphore>>>,

    pub opened_logs: Mutex<Vec<(String, Option<String>)>>,
    pub closed_logs: Mutex<Vec<(String, u64)>>,
    pub fail_log_opens: AtomicBool,
    open_gate: Mutex<Option<Arc<Semaphore>>>,
    log_counter: AtomicUsize,

    pub completions: Mutex<Vec<(String, bool)>>,
    pub fail_completion: AtomicBool,
    pub completed_meetings: Mutex<Vec<String>>,
    pub fail_meeting_completion: AtomicBool,

    /// Every collaborator call, in the order it settled.
    pub events: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators::from_shared(self.clone())
    }

    pub fn seed_notes(&self, key: NoteKey, document: NoteDocument) {
        self.stored_notes.lock().unwrap().insert(key, document);
    }

    /// Saves wait for a permit until `release_saves` hands them out.
    pub fn hold_saves(&self) {
        *self.save_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_saves(&self, permits: usize) {
        if let Some(gate) = self.save_gate.lock().unwrap().as_ref() {
            gate.add_permits(permits);
        }
    }

    pub fn hold_log_opens(&self) {
        *self.open_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_log_opens(&self, permits: usize) {
        if let Some(gate) = self.open_gate.lock().unwrap().as_ref() {
            gate.add_permits(permits);
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    pub fn saves_for(&self, key: &NoteKey) -> Vec<NoteDocument> {
        self.saves
            .lock()
            .unwrap()
            .iter()
            .filter(|(saved, _)| saved == key)
            .map(|(_, document)| document.clone())
            .collect()
    }

    pub fn closed(&self) -> Vec<(String, u64)> {
        self.closed_logs.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<(String, Option<String>)> {
        self.opened_logs.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

async fn pass_gate(gate: &Mutex<Option<Arc<Semaphore>>>) {
    let gate = gate.lock().unwrap().clone();
    if let Some(gate) = gate {
        if let Ok(permit) = gate.acquire().await {
            permit.forget();
        }
    }
}

#[async_trait]
impl NoteStore for RecordingStore {
    async fn load_notes(&self, key: &NoteKey) -> Result<Option<NoteDocument>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            bail!("notes backend unavailable");
        }
        Ok(self.stored_notes.lock().unwrap().get(key).cloned())
    }

    async fn save_notes(&self, key: &NoteKey, document: &NoteDocument) -> Result<()> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        let running = self.saves_in_progress.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_saves.fetch_max(running, Ordering::SeqCst);

        pass_gate(&self.save_gate).await;
        self.saves_in_progress.fetch_sub(1, Ordering::SeqCst);

        if self.fail_saves.load(Ordering::SeqCst) {
            self.record(format!("save-failed:{key}"));
            bail!("disk full");
        }
        self.stored_notes
            .lock()
            .unwrap()
            .insert(key.clone(), document.clone());
        self.saves
            .lock()
            .unwrap()
            .push((key.clone(), document.clone()));
        self.record(format!("save:{key}"));
        Ok(())
    }
}

#[async_trait]
impl TimeLogStore for RecordingStore {
    async fn open_log(&self, _meeting_id: &str, item_id: Option<&str>) -> Result<String> {
        pass_gate(&self.open_gate).await;
        if self.fail_log_opens.load(Ordering::SeqCst) {
            bail!("time log backend unavailable");
        }
        let log_id = format!("log-{}", self.log_counter.fetch_add(1, Ordering::SeqCst) + 1);
        self.opened_logs
            .lock()
            .unwrap()
            .push((log_id.clone(), item_id.map(str::to_string)));
        self.record(format!("open:{log_id}"));
        Ok(log_id)
    }

    async fn close_log(&self, log_id: &str, elapsed_seconds: u64) -> Result<()> {
        self.closed_logs
            .lock()
            .unwrap()
            .push((log_id.to_string(), elapsed_seconds));
        self.record(format!("close:{log_id}:{elapsed_seconds}"));
        Ok(())
    }
}

#[async_trait]
impl AgendaStore for RecordingStore {
    async fn set_completion(&self, item_id: &str, completed: bool) -> Result<()> {
        if self.fail_completion.load(Ordering::SeqCst) {
            bail!("agenda service rejected the update");
        }
        self.completions
            .lock()
            .unwrap()
            .push((item_id.to_string(), completed));
        self.record(format!("complete:{item_id}:{completed}"));
        Ok(())
    }

    async fn set_meeting_completed(&self, meeting_id: &str) -> Result<()> {
        if self.fail_meeting_completion.load(Ordering::SeqCst) {
            bail!("meeting service rejected the update");
        }
        self.completed_meetings
            .lock()
            .unwrap()
            .push(meeting_id.to_string());
        self.record(format!("meeting-complete:{meeting_id}"));
        Ok(())
    }
}

pub fn agenda() -> Vec<AgendaItem> {
    vec![
        AgendaItem::new("a", "Intro", Some(5)),
        AgendaItem::new("b", "Budget", Some(10)),
        AgendaItem::new("c", "Wrap-up", None),
    ]
}

pub fn doc(text: &str) -> NoteDocument {
    NoteDocument::with_blocks(vec![NoteBlock::paragraph(text)])
}

pub fn texts(document: &NoteDocument) -> Vec<String> {
    document
        .blocks
        .iter()
        .filter_map(|block| block.text().map(str::to_string))
        .collect()
}

/// Lets spawned tasks run without moving the paused clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub async fn advance(millis: u64) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
}
