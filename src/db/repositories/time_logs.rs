use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, Row};
use uuid::Uuid;

use crate::{
    db::{
        helpers::{parse_datetime, parse_optional_datetime, to_i64, to_u64},
        Database,
    },
    models::TimeLog,
};

fn row_to_time_log(row: &Row) -> Result<TimeLog> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let duration_seconds: Option<i64> = row.get("duration_seconds")?;

    Ok(TimeLog {
        id: row.get("id")?,
        meeting_id: row.get("meeting_id")?,
        agenda_item_id: row.get("agenda_item_id")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        duration_seconds: duration_seconds
            .map(|value| to_u64(value, "duration_seconds"))
            .transpose()?,
    })
}

impl Database {
    pub async fn insert_time_log(&self, meeting_id: &str, item_id: Option<&str>) -> Result<String> {
        let log_id = Uuid::new_v4().to_string();
        let meeting_id = meeting_id.to_string();
        let item_id = item_id.map(str::to_string);
        let id = log_id.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO time_logs (id, meeting_id, agenda_item_id, started_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, meeting_id, item_id, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await?;
        Ok(log_id)
    }

    /// Closing an already-closed log overwrites its end stamp and duration.
    pub async fn finish_time_log(&self, log_id: &str, elapsed_seconds: u64) -> Result<()> {
        let log_id = log_id.to_string();
        self.execute(move |conn| {
            let updated = conn.execute(
                "UPDATE time_logs
                 SET ended_at = ?1,
                     duration_seconds = ?2
                 WHERE id = ?3",
                params![Utc::now().to_rfc3339(), to_i64(elapsed_seconds)?, log_id],
            )?;
            if updated == 0 {
                return Err(anyhow!("time log {log_id} not found"));
            }
            Ok(())
        })
        .await
    }

    pub async fn list_time_logs(&self, meeting_id: &str) -> Result<Vec<TimeLog>> {
        let meeting_id = meeting_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, meeting_id, agenda_item_id, started_at, ended_at, duration_seconds
                 FROM time_logs
                 WHERE meeting_id = ?1
                 ORDER BY started_at ASC, rowid ASC",
            )?;

            let mut rows = stmt.query(params![meeting_id])?;
            let mut logs = Vec::new();
            while let Some(row) = rows.next()? {
                logs.push(row_to_time_log(row)?);
            }

            Ok(logs)
        })
        .await
    }
}
