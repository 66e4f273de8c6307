use std::collections::HashMap;

use crate::error::{ConductError, ConductResult};

use super::state::{TimerKey, TimerSnapshot, TimerState};

/// Result of a `start` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    AlreadyRunning,
    /// Now running. `open_log` asks the caller to open a durable log for this
    /// `segment`.
    Started { open_log: bool, segment: u32 },
}

/// A durable log that should be stamped with a final elapsed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogClose {
    pub log_id: String,
    pub elapsed_seconds: u64,
}

/// What to do with a log id that was opened in the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogAttach {
    /// Stored on the running timer.
    Attached,
    /// The timer stopped running before the id arrived; close with this value.
    CloseNow(u64),
}

/// Every per-item timer plus the global one. Pure state: no I/O, no clock.
#[derive(Debug, Clone)]
pub struct TimerEngine {
    timers: HashMap<TimerKey, TimerState>,
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerEngine {
    pub fn new() -> Self {
        let mut timers = HashMap::new();
        timers.insert(TimerKey::Global, TimerState::new(None));
        Self { timers }
    }

    /// Creates an idle timer unless one already exists. Returns whether a new
    /// timer was created; an existing one keeps its progress.
    pub fn init(&mut self, key: &TimerKey, allocated_minutes: Option<u32>) -> bool {
        if self.timers.contains_key(key) {
            return false;
        }
        self.timers
            .insert(key.clone(), TimerState::new(allocated_minutes));
        true
    }

    pub fn start(&mut self, key: &TimerKey) -> ConductResult<StartOutcome> {
        let timer = self.timer_mut(key)?;
        if !timer.start() {
            return Ok(StartOutcome::AlreadyRunning);
        }
        let open_log = matches!(key, TimerKey::Item(_))
            && timer.durable_log_id.is_none()
            && !timer.open_pending;
        if open_log {
            timer.open_pending = true;
        }
        Ok(StartOutcome::Started {
            open_log,
            segment: timer.segment,
        })
    }

    /// `running -> paused`. Returns the log to close when one is attached;
    /// `Ok(None)` when the timer was not running or has no log yet.
    pub fn pause(&mut self, key: &TimerKey) -> ConductResult<Option<LogClose>> {
        let timer = self.timer_mut(key)?;
        if !timer.pause() {
            return Ok(None);
        }
        Ok(timer.durable_log_id.clone().map(|log_id| LogClose {
            log_id,
            elapsed_seconds: timer.elapsed_seconds,
        }))
    }

    /// Zeroes the timer. A running timer's open log is handed back so its
    /// segment can be closed; paused timers already closed theirs.
    pub fn reset(&mut self, key: &TimerKey) -> ConductResult<Option<LogClose>> {
        let timer = self.timer_mut(key)?;
        let close = if timer.is_running() {
            timer.durable_log_id.clone().map(|log_id| LogClose {
                log_id,
                elapsed_seconds: timer.elapsed_seconds,
            })
        } else {
            None
        };
        timer.reset();
        Ok(close)
    }

    /// One clock interval for a single timer. No-op unless running.
    pub fn tick(&mut self, key: &TimerKey, seconds: u64) -> ConductResult<bool> {
        Ok(self.timer_mut(key)?.tick(seconds))
    }

    /// One clock interval for every running timer. Returns how many advanced.
    pub fn tick_running(&mut self, seconds: u64) -> usize {
        self.timers
            .values_mut()
            .map(|timer| timer.tick(seconds))
            .filter(|advanced| *advanced)
            .count()
    }

    /// Stores a background-opened log id if it still belongs to the current
    /// segment of a running timer.
    pub fn attach_log(&mut self, key: &TimerKey, segment: u32, log_id: String) -> LogAttach {
        let Some(timer) = self.timers.get_mut(key) else {
            return LogAttach::CloseNow(0);
        };
        if timer.segment != segment {
            let elapsed = timer.unattached_segments.remove(&segment).unwrap_or(0);
            return LogAttach::CloseNow(elapsed);
        }
        timer.open_pending = false;
        let elapsed = timer.elapsed_seconds;
        if timer.durable_log_id.is_some() {
            // segment already has its log
            return LogAttach::CloseNow(elapsed);
        }
        timer.durable_log_id = Some(log_id);
        if timer.is_running() {
            LogAttach::Attached
        } else {
            LogAttach::CloseNow(elapsed)
        }
    }

    /// A background open failed. The next start of the same segment asks
    /// again; a reset segment has nothing left to close.
    pub fn abandon_log_open(&mut self, key: &TimerKey, segment: u32) {
        if let Some(timer) = self.timers.get_mut(key) {
            if timer.segment == segment {
                timer.open_pending = false;
            } else {
                timer.unattached_segments.remove(&segment);
            }
        }
    }

    pub fn get(&self, key: &TimerKey) -> Option<&TimerState> {
        self.timers.get(key)
    }

    pub fn snapshot(&self, key: &TimerKey) -> Option<TimerSnapshot> {
        self.timers.get(key).map(|timer| timer.snapshot(key.clone()))
    }

    /// Snapshots of every timer, global first, then items by id.
    pub fn snapshots(&self) -> Vec<TimerSnapshot> {
        let mut keys: Vec<&TimerKey> = self.timers.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|key| self.timers[key].snapshot(key.clone()))
            .collect()
    }

    pub fn running_items(&self) -> Vec<TimerKey> {
        let mut keys: Vec<TimerKey> = self
            .timers
            .iter()
            .filter(|(key, timer)| matches!(key, TimerKey::Item(_)) && timer.is_running())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn running_keys(&self) -> Vec<TimerKey> {
        let mut keys: Vec<TimerKey> = self
            .timers
            .iter()
            .filter(|(_, timer)| timer.is_running())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Installs a timer wholesale (used when resuming a session).
    pub fn restore(&mut self, key: TimerKey, state: TimerState) {
        self.timers.insert(key, state);
    }

    pub fn entries(&self) -> Vec<(TimerKey, TimerState)> {
        let mut entries: Vec<(TimerKey, TimerState)> = self
            .timers
            .iter()
            .map(|(key, timer)| (key.clone(), timer.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    fn timer_mut(&mut self, key: &TimerKey) -> ConductResult<&mut TimerState> {
        self.timers
            .get_mut(key)
            .ok_or_else(|| ConductError::TimerNotInitialized(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::state::TimerStatus;

    fn item(id: &str) -> TimerKey {
        TimerKey::item(id)
    }

    #[test]
    fn init_is_idempotent() {
        let mut engine = TimerEngine::new();
        assert!(engine.init(&item("a"), Some(5)));
        engine.start(&item("a")).unwrap();
        engine.tick(&item("a"), 1).unwrap();
        engine.tick(&item("a"), 1).unwrap();

        assert!(!engine.init(&item("a"), Some(5)));
        let timer = engine.get(&item("a")).unwrap();
        assert_eq!(timer.elapsed_seconds, 2);
        assert_eq!(timer.status, TimerStatus::Running);
    }

    #[test]
    fn operations_on_unknown_timers_are_rejected() {
        let mut engine = TimerEngine::new();
        assert!(matches!(
            engine.start(&item("ghost")),
            Err(ConductError::TimerNotInitialized(_))
        ));
        assert!(engine.pause(&item("ghost")).is_err());
        assert!(engine.reset(&item("ghost")).is_err());
        assert!(engine.tick(&item("ghost"), 1).is_err());
    }

    #[test]
    fn first_item_start_requests_a_log_but_global_never_does() {
        let mut engine = TimerEngine::new();
        engine.init(&item("a"), None);
        assert_eq!(
            engine.start(&item("a")).unwrap(),
            StartOutcome::Started {
                open_log: true,
                segment: 0
            }
        );
        assert_eq!(
            engine.start(&item("a")).unwrap(),
            StartOutcome::AlreadyRunning
        );
        assert_eq!(
            engine.start(&TimerKey::Global).unwrap(),
            StartOutcome::Started {
                open_log: false,
                segment: 0
            }
        );
    }

    #[test]
    fn resume_reuses_the_attached_log() {
        let mut engine = TimerEngine::new();
        engine.init(&item("a"), Some(10));
        engine.start(&item("a")).unwrap();
        assert_eq!(
            engine.attach_log(&item("a"), 0, "log-1".into()),
            LogAttach::Attached
        );
        engine.tick(&item("a"), 3).unwrap();

        let close = engine.pause(&item("a")).unwrap().unwrap();
        assert_eq!(close.log_id, "log-1");
        assert_eq!(close.elapsed_seconds, 3);

        assert_eq!(
            engine.start(&item("a")).unwrap(),
            StartOutcome::Started {
                open_log: false,
                segment: 0
            }
        );
    }

    #[test]
    fn pause_when_not_running_is_a_no_op() {
        let mut engine = TimerEngine::new();
        engine.init(&item("a"), None);
        assert_eq!(engine.pause(&item("a")).unwrap(), None);
        assert_eq!(engine.get(&item("a")).unwrap().status, TimerStatus::Idle);
    }

    #[test]
    fn late_log_after_pause_is_closed_immediately() {
        let mut engine = TimerEngine::new();
        engine.init(&item("a"), None);
        engine.start(&item("a")).unwrap();
        engine.tick(&item("a"), 4).unwrap();
        assert_eq!(engine.pause(&item("a")).unwrap(), None);

        assert_eq!(
            engine.attach_log(&item("a"), 0, "log-late".into()),
            LogAttach::CloseNow(4)
        );
        assert_eq!(
            engine.get(&item("a")).unwrap().durable_log_id.as_deref(),
            Some("log-late")
        );
    }

    #[test]
    fn late_log_after_reset_is_not_attached() {
        let mut engine = TimerEngine::new();
        engine.init(&item("a"), None);
        engine.start(&item("a")).unwrap();
        engine.tick(&item("a"), 7).unwrap();
        assert_eq!(engine.reset(&item("a")).unwrap(), None);

        assert_eq!(
            engine.attach_log(&item("a"), 0, "log-old".into()),
            LogAttach::CloseNow(7)
        );
        assert_eq!(engine.get(&item("a")).unwrap().durable_log_id, None);
    }

    #[test]
    fn restart_before_the_log_arrives_does_not_open_another() {
        let mut engine = TimerEngine::new();
        engine.init(&item("a"), None);
        engine.start(&item("a")).unwrap();
        engine.tick(&item("a"), 1).unwrap();
        engine.pause(&item("a")).unwrap();
        assert_eq!(
            engine.start(&item("a")).unwrap(),
            StartOutcome::Started {
                open_log: false,
                segment: 0
            }
        );
        assert_eq!(
            engine.attach_log(&item("a"), 0, "log-1".into()),
            LogAttach::Attached
        );
        assert_eq!(
            engine.attach_log(&item("a"), 0, "log-2".into()),
            LogAttach::CloseNow(1)
        );
        assert_eq!(
            engine.get(&item("a")).unwrap().durable_log_id.as_deref(),
            Some("log-1")
        );
    }

    #[test]
    fn late_log_after_two_resets_closes_with_its_own_segment() {
        let mut engine = TimerEngine::new();
        engine.init(&item("a"), None);
        engine.start(&item("a")).unwrap();
        engine.tick(&item("a"), 7).unwrap();
        engine.reset(&item("a")).unwrap();
        engine.reset(&item("a")).unwrap();

        assert_eq!(
            engine.attach_log(&item("a"), 0, "log-old".into()),
            LogAttach::CloseNow(7)
        );
        assert!(engine.get(&item("a")).unwrap().unattached_segments.is_empty());
    }

    #[test]
    fn failed_open_lets_the_next_start_ask_again() {
        let mut engine = TimerEngine::new();
        engine.init(&item("a"), None);
        engine.start(&item("a")).unwrap();
        engine.abandon_log_open(&item("a"), 0);
        engine.pause(&item("a")).unwrap();
        assert!(matches!(
            engine.start(&item("a")).unwrap(),
            StartOutcome::Started { open_log: true, .. }
        ));
    }

    #[test]
    fn reset_of_running_timer_hands_back_its_log() {
        let mut engine = TimerEngine::new();
        engine.init(&item("a"), None);
        engine.start(&item("a")).unwrap();
        engine.attach_log(&item("a"), 0, "log-1".into());
        engine.tick(&item("a"), 9).unwrap();

        let close = engine.reset(&item("a")).unwrap().unwrap();
        assert_eq!(close.elapsed_seconds, 9);
        let timer = engine.get(&item("a")).unwrap();
        assert_eq!(timer.elapsed_seconds, 0);
        assert_eq!(timer.status, TimerStatus::Idle);
        assert!(matches!(
            engine.start(&item("a")).unwrap(),
            StartOutcome::Started { open_log: true, segment: 1 }
        ));
    }

    #[test]
    fn tick_running_only_touches_running_timers() {
        let mut engine = TimerEngine::new();
        engine.init(&item("a"), None);
        engine.init(&item("b"), None);
        engine.start(&item("a")).unwrap();
        engine.start(&TimerKey::Global).unwrap();

        assert_eq!(engine.tick_running(1), 2);
        assert_eq!(engine.get(&item("a")).unwrap().elapsed_seconds, 1);
        assert_eq!(engine.get(&item("b")).unwrap().elapsed_seconds, 0);
        assert_eq!(engine.get(&TimerKey::Global).unwrap().elapsed_seconds, 1);
        assert_eq!(engine.running_items(), vec![item("a")]);
    }

    #[test]
    fn snapshots_list_global_first() {
        let mut engine = TimerEngine::new();
        engine.init(&item("b"), Some(1));
        engine.init(&item("a"), Some(1));
        let keys: Vec<TimerKey> = engine.snapshots().into_iter().map(|s| s.key).collect();
        assert_eq!(keys, vec![TimerKey::Global, item("a"), item("b")]);
    }
}
