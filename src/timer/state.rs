use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use super::format::{format_clock, format_overtime};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

impl Default for TimerStatus {
    fn default() -> Self {
        TimerStatus::Idle
    }
}

/// Which timer an operation targets: the whole-meeting clock or one item's.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum TimerKey {
    Global,
    Item(String),
}

impl TimerKey {
    pub fn item(item_id: impl Into<String>) -> Self {
        TimerKey::Item(item_id.into())
    }

    pub fn item_id(&self) -> Option<&str> {
        match self {
            TimerKey::Global => None,
            TimerKey::Item(id) => Some(id.as_str()),
        }
    }
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKey::Global => write!(f, "global"),
            TimerKey::Item(id) => write!(f, "item:{id}"),
        }
    }
}

/// Threshold color for a countdown. Count-up timers are always green.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ColorBand {
    Green,
    Yellow,
    Red,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub status: TimerStatus,
    pub elapsed_seconds: u64,
    /// Fixed at creation; `None` means count-up only.
    pub allocated_seconds: Option<u64>,
    pub durable_log_id: Option<String>,
    /// Bumped on every reset so a log id that resolves late is never attached
    /// to a newer segment.
    #[serde(skip)]
    pub segment: u32,
    /// A durable log open is in flight for the current segment.
    #[serde(skip)]
    pub open_pending: bool,
    /// Final elapsed values of reset segments whose log id has not arrived.
    #[serde(skip)]
    pub unattached_segments: BTreeMap<u32, u64>,
}

impl TimerState {
    /// Fresh idle timer. A zero-minute budget counts as no budget.
    pub fn new(allocated_minutes: Option<u32>) -> Self {
        Self {
            allocated_seconds: allocated_minutes
                .filter(|minutes| *minutes > 0)
                .map(|minutes| u64::from(minutes) * 60),
            ..Self::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// `idle|paused -> running`. Returns false when already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        self.status = TimerStatus::Running;
        true
    }

    /// `running -> paused`. Returns false for any other status.
    pub fn pause(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.status = TimerStatus::Paused;
        true
    }

    /// Back to idle at zero, detached from any durable log.
    pub fn reset(&mut self) {
        if self.open_pending {
            self.unattached_segments
                .insert(self.segment, self.elapsed_seconds);
            self.open_pending = false;
        }
        self.status = TimerStatus::Idle;
        self.elapsed_seconds = 0;
        self.durable_log_id = None;
        self.segment = self.segment.wrapping_add(1);
    }

    /// Adds `seconds` while running; frozen otherwise.
    pub fn tick(&mut self, seconds: u64) -> bool {
        if !self.is_running() {
            return false;
        }
        self.elapsed_seconds = self.elapsed_seconds.saturating_add(seconds);
        true
    }

    pub fn remaining_seconds(&self) -> Option<u64> {
        self.allocated_seconds
            .map(|allocated| allocated.saturating_sub(self.elapsed_seconds))
    }

    pub fn is_overtime(&self) -> bool {
        matches!(self.allocated_seconds, Some(allocated) if self.elapsed_seconds > allocated)
    }

    pub fn overtime_seconds(&self) -> Option<u64> {
        self.allocated_seconds
            .filter(|allocated| self.elapsed_seconds > *allocated)
            .map(|allocated| self.elapsed_seconds - allocated)
    }

    pub fn color_band(&self) -> ColorBand {
        match self.allocated_seconds {
            None => ColorBand::Green,
            // elapsed < 80% of allocated, kept in integers
            Some(allocated)
                if self.elapsed_seconds.saturating_mul(5) < allocated.saturating_mul(4) =>
            {
                ColorBand::Green
            }
            Some(allocated) if self.elapsed_seconds < allocated => ColorBand::Yellow,
            Some(_) => ColorBand::Red,
        }
    }

    /// Fraction of the budget used, capped at 1.0. `None` in count-up mode.
    pub fn progress(&self) -> Option<f64> {
        self.allocated_seconds
            .map(|allocated| (self.elapsed_seconds as f64 / allocated as f64).min(1.0))
    }

    /// Remaining time for countdowns, `+overtime` past the budget, elapsed
    /// time in count-up mode.
    pub fn display(&self) -> String {
        if let Some(overtime) = self.overtime_seconds() {
            return format_overtime(overtime);
        }
        match self.remaining_seconds() {
            Some(remaining) => format_clock(remaining),
            None => format_clock(self.elapsed_seconds),
        }
    }

    pub fn snapshot(&self, key: TimerKey) -> TimerSnapshot {
        TimerSnapshot {
            key,
            status: self.status,
            elapsed_seconds: self.elapsed_seconds,
            allocated_seconds: self.allocated_seconds,
            remaining_seconds: self.remaining_seconds(),
            is_overtime: self.is_overtime(),
            overtime_seconds: self.overtime_seconds(),
            color: self.color_band(),
            progress: self.progress(),
            display: self.display(),
            durable_log_id: self.durable_log_id.clone(),
        }
    }
}

/// Read model handed to presentation code.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub key: TimerKey,
    pub status: TimerStatus,
    pub elapsed_seconds: u64,
    pub allocated_seconds: Option<u64>,
    pub remaining_seconds: Option<u64>,
    pub is_overtime: bool,
    pub overtime_seconds: Option<u64>,
    pub color: ColorBand,
    pub progress: Option<f64>,
    pub display: String,
    pub durable_log_id: Option<String>,
}
