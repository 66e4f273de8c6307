use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::models::{MeetingStatus, NoteDocument};

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_meeting_status(value: &str) -> Result<MeetingStatus> {
    match value {
        "Scheduled" => Ok(MeetingStatus::Scheduled),
        "InProgress" => Ok(MeetingStatus::InProgress),
        "Completed" => Ok(MeetingStatus::Completed),
        other => Err(anyhow!("unknown meeting status {other}")),
    }
}

/// Note columns hold serialized documents; `NULL` means never saved.
pub fn parse_notes(value: Option<String>, field: &str) -> Result<Option<NoteDocument>> {
    match value {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .with_context(|| format!("failed to parse {field} document")),
        None => Ok(None),
    }
}
