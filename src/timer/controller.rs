use std::{sync::Arc, time::Duration};

use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, Instant},
};
use tokio_util::task::TaskTracker;

use crate::{
    error::ConductResult,
    log_debug, log_info, log_warn,
    store::TimeLogStore,
};

use super::engine::{LogAttach, LogClose, StartOutcome, TimerEngine};
use super::state::{TimerKey, TimerSnapshot, TimerState};

const ENABLE_LOGS: bool = true;

/// Drives a [`TimerEngine`]: owns the clock task and the best-effort time-log
/// writes. The in-memory engine is authoritative; durable logs never hold up
/// the clock.
#[derive(Clone)]
pub struct TimerController {
    meeting_id: Arc<str>,
    engine: Arc<Mutex<TimerEngine>>,
    time_logs: Arc<dyn TimeLogStore>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
    log_writes: TaskTracker,
}

impl TimerController {
    pub fn new(
        meeting_id: impl Into<String>,
        time_logs: Arc<dyn TimeLogStore>,
        tick_interval: Duration,
    ) -> Self {
        Self::with_engine(meeting_id, time_logs, tick_interval, TimerEngine::new())
    }

    pub fn with_engine(
        meeting_id: impl Into<String>,
        time_logs: Arc<dyn TimeLogStore>,
        tick_interval: Duration,
        engine: TimerEngine,
    ) -> Self {
        let meeting_id: String = meeting_id.into();
        Self {
            meeting_id: Arc::from(meeting_id),
            engine: Arc::new(Mutex::new(engine)),
            time_logs,
            ticker: Arc::new(Mutex::new(None)),
            tick_interval,
            log_writes: TaskTracker::new(),
        }
    }

    /// Seconds added to each running timer per clock interval.
    pub fn tick_seconds(&self) -> u64 {
        self.tick_interval.as_secs().max(1)
    }

    pub async fn init(&self, key: &TimerKey, allocated_minutes: Option<u32>) -> bool {
        self.engine.lock().await.init(key, allocated_minutes)
    }

    /// Starts the timer immediately and, on its first run, opens a durable log
    /// in the background.
    pub async fn start(&self, key: &TimerKey) -> ConductResult<TimerSnapshot> {
        let (outcome, snapshot) = {
            let mut engine = self.engine.lock().await;
            let outcome = engine.start(key)?;
            (outcome, engine.snapshot(key))
        };

        if let StartOutcome::Started { open_log, segment } = outcome {
            log_info!("timer {} started", key);
            if open_log {
                self.spawn_open_log(key.clone(), segment);
            }
        }

        Ok(snapshot.unwrap_or_else(|| TimerState::default().snapshot(key.clone())))
    }

    /// Freezes the timer and commits its elapsed value to the attached log
    /// (fire-and-forget).
    pub async fn pause(&self, key: &TimerKey) -> ConductResult<TimerSnapshot> {
        let (close, snapshot) = {
            let mut engine = self.engine.lock().await;
            let close = engine.pause(key)?;
            (close, engine.snapshot(key))
        };

        if let Some(close) = close {
            self.spawn_close_log(key.clone(), close);
        }

        Ok(snapshot.unwrap_or_else(|| TimerState::default().snapshot(key.clone())))
    }

    pub async fn reset(&self, key: &TimerKey) -> ConductResult<TimerSnapshot> {
        let (close, snapshot) = {
            let mut engine = self.engine.lock().await;
            let close = engine.reset(key)?;
            (close, engine.snapshot(key))
        };

        if let Some(close) = close {
            self.spawn_close_log(key.clone(), close);
        }
        log_info!("timer {} reset", key);

        Ok(snapshot.unwrap_or_else(|| TimerState::default().snapshot(key.clone())))
    }

    /// One clock interval for a single timer.
    pub async fn tick(&self, key: &TimerKey) -> ConductResult<bool> {
        let seconds = self.tick_seconds();
        self.engine.lock().await.tick(key, seconds)
    }

    /// One clock interval for every running timer.
    pub async fn tick_running(&self) -> usize {
        let seconds = self.tick_seconds();
        self.engine.lock().await.tick_running(seconds)
    }

    /// Pauses every running timer, committing their logs.
    pub async fn pause_all(&self) -> usize {
        let keys = self.engine.lock().await.running_keys();
        let mut paused = 0;
        for key in keys {
            match self.pause(&key).await {
                Ok(_) => paused += 1,
                Err(err) => log_warn!("failed to pause timer {}: {}", key, err),
            }
        }
        paused
    }

    pub async fn snapshot(&self, key: &TimerKey) -> Option<TimerSnapshot> {
        self.engine.lock().await.snapshot(key)
    }

    pub async fn snapshots(&self) -> Vec<TimerSnapshot> {
        self.engine.lock().await.snapshots()
    }

    pub async fn elapsed_seconds(&self, key: &TimerKey) -> Option<u64> {
        self.engine
            .lock()
            .await
            .get(key)
            .map(|timer| timer.elapsed_seconds)
    }

    pub async fn running_items(&self) -> Vec<TimerKey> {
        self.engine.lock().await.running_items()
    }

    pub async fn entries(&self) -> Vec<(TimerKey, TimerState)> {
        self.engine.lock().await.entries()
    }

    /// Spawns the clock. The first tick lands one full interval after the
    /// call; restarting replaces the previous clock task.
    pub async fn start_clock(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let engine = self.engine.clone();
        let tick_interval = self.tick_interval;
        let seconds = self.tick_seconds();
        let meeting_id = self.meeting_id.clone();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + tick_interval, tick_interval);
            loop {
                interval.tick().await;
                let advanced = engine.lock().await.tick_running(seconds);
                if advanced > 0 {
                    log_debug!("meeting {}: clock advanced {} timer(s)", meeting_id, advanced);
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    pub async fn stop_clock(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    pub async fn clock_running(&self) -> bool {
        self.ticker
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Waits for every outstanding time-log write spawned so far.
    pub async fn drain_log_writes(&self) {
        self.log_writes.close();
        self.log_writes.wait().await;
        self.log_writes.reopen();
    }

    fn spawn_open_log(&self, key: TimerKey, segment: u32) {
        let engine = self.engine.clone();
        let store = self.time_logs.clone();
        let meeting_id = self.meeting_id.clone();

        self.log_writes.spawn(async move {
            let log_id = match store.open_log(&meeting_id, key.item_id()).await {
                Ok(log_id) => log_id,
                Err(err) => {
                    log_warn!("failed to open time log for {}: {:#}", key, err);
                    engine.lock().await.abandon_log_open(&key, segment);
                    return;
                }
            };

            let attach = engine
                .lock()
                .await
                .attach_log(&key, segment, log_id.clone());
            match attach {
                LogAttach::Attached => log_debug!("time log {} attached to {}", log_id, key),
                LogAttach::CloseNow(elapsed_seconds) => {
                    close_log(store.as_ref(), &key, &log_id, elapsed_seconds).await;
                }
            }
        });
    }

    fn spawn_close_log(&self, key: TimerKey, close: LogClose) {
        let store = self.time_logs.clone();
        self.log_writes.spawn(async move {
            close_log(store.as_ref(), &key, &close.log_id, close.elapsed_seconds).await;
        });
    }
}

async fn close_log(store: &dyn TimeLogStore, key: &TimerKey, log_id: &str, elapsed_seconds: u64) {
    match store.close_log(log_id, elapsed_seconds).await {
        Ok(()) => log_debug!("time log {} for {} closed at {}s", log_id, key, elapsed_seconds),
        Err(err) => log_warn!("failed to close time log {} for {}: {:#}", log_id, key, err),
    }
}
