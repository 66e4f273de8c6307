use std::path::PathBuf;

use anyhow::{Context, Result};
use conduct_engine::{console, init_logging, SettingsStore};
use log::info;
use tokio::io::{stdin, stdout, BufReader};

/// `conduct [meeting-id]`. Data lives in `$CONDUCT_DATA_DIR` (default
/// `./.conduct`).
#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let meeting_id = std::env::args().nth(1).unwrap_or_else(|| "demo".to_string());
    let data_dir = std::env::var_os("CONDUCT_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".conduct"));
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings = SettingsStore::new(data_dir.join("settings.json"))?
        .settings()
        .with_env_overrides();
    info!(
        "conducting meeting {} ({:?} view, {} ms debounce)",
        meeting_id, settings.view_mode, settings.debounce_ms
    );

    let session = console::open_session(&data_dir, &meeting_id, settings).await?;
    console::run(&session, BufReader::new(stdin()), stdout()).await
}
