//! Debounced, coalescing persistence for note documents.
//!
//! Each `(scope, id)` key moves through `idle -> pending -> in-flight -> idle`,
//! or `in-flight -> pending` when it is edited again mid-write. Only the latest
//! payload of a quiet period is written, a key is never written by two saves at
//! once, and a failed payload stays parked on its key until the next enqueue or
//! flush picks it up.

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use serde::Serialize;
use tokio::{sync::Mutex, task::JoinSet, time};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{ConductError, ConductResult},
    log_debug, log_warn,
    models::{NoteDocument, NoteKey},
    store::NoteStore,
};

const ENABLE_LOGS: bool = true;

/// Default quiet period before a debounced save.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SyncPhase {
    Idle,
    /// A payload is waiting, either on its debounce timer or parked after a
    /// failed write.
    Pending,
    InFlight,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub phase: SyncPhase,
    /// An unsaved payload is buffered (it may be queued behind an in-flight
    /// write).
    pub has_payload: bool,
    pub last_error: Option<String>,
    pub committed_writes: u64,
}

#[derive(Default)]
struct KeySlot {
    pending: Option<NoteDocument>,
    timer: Option<CancellationToken>,
    /// Bumped by every enqueue and flush; a debounce task only writes if the
    /// generation it was armed with is still current.
    generation: u64,
    in_flight: bool,
    write_lock: Arc<Mutex<()>>,
    last_error: Option<String>,
    committed_writes: u64,
}

impl KeySlot {
    fn phase(&self) -> SyncPhase {
        if self.in_flight {
            SyncPhase::InFlight
        } else if self.pending.is_some() || self.timer.is_some() {
            SyncPhase::Pending
        } else {
            SyncPhase::Idle
        }
    }

    fn is_busy(&self) -> bool {
        self.phase() != SyncPhase::Idle
    }

    fn disarm(&mut self) {
        if let Some(token) = self.timer.take() {
            token.cancel();
        }
        self.generation = self.generation.wrapping_add(1);
    }

    fn status(&self) -> SyncStatus {
        SyncStatus {
            phase: self.phase(),
            has_payload: self.pending.is_some(),
            last_error: self.last_error.clone(),
            committed_writes: self.committed_writes,
        }
    }
}

struct QueueInner {
    store: Arc<dyn NoteStore>,
    debounce: Duration,
    slots: Mutex<HashMap<NoteKey, KeySlot>>,
}

/// Sole writer of durable note storage for a session.
#[derive(Clone)]
pub struct NotesSyncQueue {
    inner: Arc<QueueInner>,
}

impl NotesSyncQueue {
    pub fn new(store: Arc<dyn NoteStore>, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                store,
                debounce,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    /// Replaces the pending payload for `key` and restarts its debounce timer.
    pub async fn enqueue(&self, key: NoteKey, document: NoteDocument) {
        let (token, generation) = {
            let mut slots = self.inner.slots.lock().await;
            let slot = slots.entry(key.clone()).or_default();
            slot.pending = Some(document);
            slot.disarm();
            let token = CancellationToken::new();
            slot.timer = Some(token.clone());
            (token, slot.generation)
        };

        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = time::sleep(inner.debounce) => {}
            }

            if let Err(err) = write_key(&inner, &key, Some(generation)).await {
                log_warn!(
                    "debounced save of {} failed, payload kept for the next attempt: {:#}",
                    key,
                    err
                );
            }
        });
    }

    /// Cancels the debounce timer for `key` and writes its latest payload now,
    /// after any in-flight write for the key has settled. Resolves once
    /// nothing for `key` is left to write.
    pub async fn flush(&self, key: &NoteKey) -> Result<()> {
        flush_key(&self.inner, key).await
    }

    /// Flushes several keys concurrently. Every key is attempted; the error
    /// lists the keys that failed.
    pub async fn flush_keys(&self, keys: &[NoteKey]) -> ConductResult<()> {
        let mut set = JoinSet::new();
        for key in keys {
            let inner = self.inner.clone();
            let key = key.clone();
            set.spawn(async move {
                let result = flush_key(&inner, &key).await;
                (key, result)
            });
        }

        let mut failed = Vec::new();
        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((key, Err(err))) => {
                    failed.push(key.to_string());
                    first_error.get_or_insert(err);
                }
                Err(join_err) => {
                    failed.push("<aborted flush>".to_string());
                    first_error.get_or_insert(anyhow!(join_err));
                }
            }
        }

        match first_error {
            None => Ok(()),
            Some(source) => {
                failed.sort();
                Err(ConductError::FlushFailed {
                    keys: failed,
                    source,
                })
            }
        }
    }

    /// Barrier over every key with buffered, scheduled, or in-flight work.
    pub async fn flush_all(&self) -> ConductResult<()> {
        let keys = self.busy_keys().await;
        if keys.is_empty() {
            return Ok(());
        }
        log_debug!("flushing {} note key(s)", keys.len());
        self.flush_keys(&keys).await
    }

    pub async fn has_pending_changes(&self) -> bool {
        self.inner
            .slots
            .lock()
            .await
            .values()
            .any(KeySlot::is_busy)
    }

    /// Keys with buffered, scheduled, or in-flight work, ordered.
    pub async fn busy_keys(&self) -> Vec<NoteKey> {
        let slots = self.inner.slots.lock().await;
        let mut keys: Vec<NoteKey> = slots
            .iter()
            .filter(|(_, slot)| slot.is_busy())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub async fn status(&self, key: &NoteKey) -> SyncStatus {
        self.inner
            .slots
            .lock()
            .await
            .get(key)
            .map(KeySlot::status)
            .unwrap_or_else(|| KeySlot::default().status())
    }

    /// Disarms every debounce timer without writing. Buffered payloads stay
    /// in place for an explicit flush.
    pub async fn cancel_timers(&self) {
        let mut slots = self.inner.slots.lock().await;
        for slot in slots.values_mut() {
            slot.disarm();
        }
    }
}

async fn flush_key(inner: &QueueInner, key: &NoteKey) -> Result<()> {
    {
        let mut slots = inner.slots.lock().await;
        match slots.get_mut(key) {
            Some(slot) => slot.disarm(),
            None => return Ok(()),
        }
    }
    write_key(inner, key, None).await.map(|_| ())
}

/// Writes the latest payload for `key`, serialised behind any write already
/// in flight for it. With `armed_generation` set (debounce path) the write is
/// skipped if the key was re-armed or flushed since. Returns whether a save
/// was issued.
async fn write_key(inner: &QueueInner, key: &NoteKey, armed_generation: Option<u64>) -> Result<bool> {
    let write_lock = {
        let mut slots = inner.slots.lock().await;
        let Some(slot) = slots.get_mut(key) else {
            return Ok(false);
        };
        if let Some(generation) = armed_generation {
            if slot.generation != generation {
                return Ok(false);
            }
            slot.timer = None;
        }
        slot.write_lock.clone()
    };

    let _write_guard = write_lock.lock().await;

    let payload = {
        let mut slots = inner.slots.lock().await;
        let Some(slot) = slots.get_mut(key) else {
            return Ok(false);
        };
        if armed_generation.is_some_and(|generation| slot.generation != generation) {
            return Ok(false);
        }
        let Some(payload) = slot.pending.take() else {
            return Ok(false);
        };
        slot.in_flight = true;
        payload
    };

    let result = inner.store.save_notes(key, &payload).await;

    let mut slots = inner.slots.lock().await;
    if let Some(slot) = slots.get_mut(key) {
        slot.in_flight = false;
        match &result {
            Ok(()) => {
                slot.committed_writes += 1;
                slot.last_error = None;
                log_debug!("notes {} saved ({} blocks)", key, payload.blocks.len());
            }
            Err(err) => {
                // a newer edit supersedes the failed payload
                if slot.pending.is_none() {
                    slot.pending = Some(payload);
                }
                slot.last_error = Some(format!("{err:#}"));
            }
        }
    }

    result.map(|()| true)
}
