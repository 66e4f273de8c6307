use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
    time::Duration,
};

use crate::log_warn;

const ENABLE_LOGS: bool = true;

/// Which presentation adapter is driving the session. Only matters for the
/// default completion policy.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ViewMode {
    /// Full-agenda overview; stays on an item after completing it.
    #[default]
    Conductor,
    /// Single-item focus; advances to the next item after completing one.
    Scribe,
}

impl ViewMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "conductor" => Some(ViewMode::Conductor),
            "scribe" => Some(ViewMode::Scribe),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConductSettings {
    pub debounce_ms: u64,
    pub tick_interval_ms: u64,
    pub view_mode: ViewMode,
    /// Explicit policy; when unset the view mode decides.
    pub auto_advance_on_complete: Option<bool>,
}

impl Default for ConductSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            tick_interval_ms: 1000,
            view_mode: ViewMode::Conductor,
            auto_advance_on_complete: None,
        }
    }
}

impl ConductSettings {
    pub fn for_view(view_mode: ViewMode) -> Self {
        Self {
            view_mode,
            ..Self::default()
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn auto_advance(&self) -> bool {
        self.auto_advance_on_complete
            .unwrap_or(self.view_mode == ViewMode::Scribe)
    }

    /// Applies `CONDUCT_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("CONDUCT_DEBOUNCE_MS") {
            match raw.trim().parse() {
                Ok(value) => self.debounce_ms = value,
                Err(_) => log_warn!("ignoring invalid CONDUCT_DEBOUNCE_MS={raw}"),
            }
        }
        if let Some(raw) = lookup("CONDUCT_TICK_MS") {
            match raw.trim().parse() {
                Ok(value) => self.tick_interval_ms = value,
                Err(_) => log_warn!("ignoring invalid CONDUCT_TICK_MS={raw}"),
            }
        }
        if let Some(raw) = lookup("CONDUCT_VIEW_MODE") {
            match ViewMode::parse(&raw) {
                Some(mode) => self.view_mode = mode,
                None => log_warn!("ignoring invalid CONDUCT_VIEW_MODE={raw}"),
            }
        }
        if let Some(raw) = lookup("CONDUCT_AUTO_ADVANCE") {
            self.auto_advance_on_complete =
                Some(raw == "1" || raw.eq_ignore_ascii_case("true"));
        }
    }
}

/// JSON-file backed settings. A missing or unreadable file falls back to
/// defaults.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ConductSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!("settings at {} are invalid, using defaults: {err}", path.display());
                ConductSettings::default()
            })
        } else {
            ConductSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> ConductSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, settings: ConductSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: ConductSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings at {}", self.path.display()))?;
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = data;
        Ok(())
    }

    fn persist(&self, data: &ConductSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
