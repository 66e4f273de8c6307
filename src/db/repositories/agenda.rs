use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::{
    db::{
        helpers::{parse_datetime, parse_meeting_status},
        Database,
    },
    models::{AgendaItem, Meeting, MeetingStatus},
};

fn row_to_meeting(row: &Row) -> Result<Meeting> {
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Meeting {
        id: row.get("id")?,
        title: row.get("title")?,
        status: parse_meeting_status(&status)?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn row_to_agenda_item(row: &Row) -> Result<AgendaItem> {
    let duration_minutes: Option<i64> = row.get("duration_minutes")?;
    let is_completed: i64 = row.get("is_completed")?;

    let duration_minutes = duration_minutes
        .map(|minutes| {
            u32::try_from(minutes)
                .map_err(|_| anyhow!("duration_minutes contains invalid value {minutes}"))
        })
        .transpose()?;

    Ok(AgendaItem {
        id: row.get("id")?,
        title: row.get("title")?,
        duration_minutes,
        is_completed: is_completed != 0,
    })
}

impl Database {
    pub async fn insert_meeting(&self, meeting: &Meeting) -> Result<()> {
        let record = meeting.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO meetings (id, title, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.title,
                    record.status.as_str(),
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Replaces the agenda of a meeting, keeping the given order.
    pub async fn replace_agenda_items(&self, meeting_id: &str, items: &[AgendaItem]) -> Result<()> {
        let meeting_id = meeting_id.to_string();
        let items = items.to_vec();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM agenda_items WHERE meeting_id = ?1",
                params![meeting_id],
            )?;
            let now = Utc::now().to_rfc3339();
            for (position, item) in items.iter().enumerate() {
                tx.execute(
                    "INSERT INTO agenda_items (id, meeting_id, position, title, duration_minutes, is_completed, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        item.id,
                        meeting_id,
                        position as i64,
                        item.title,
                        item.duration_minutes.map(i64::from),
                        item.is_completed as i64,
                        now,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    pub async fn get_meeting(&self, meeting_id: &str) -> Result<Option<Meeting>> {
        let meeting_id = meeting_id.to_string();
        self.execute(move |conn| {
            let meeting = conn
                .query_row(
                    "SELECT id, title, status, created_at, updated_at
                     FROM meetings
                     WHERE id = ?1",
                    params![meeting_id],
                    |row| Ok(row_to_meeting(row)),
                )
                .optional()?
                .transpose()?;
            Ok(meeting)
        })
        .await
    }

    pub async fn list_agenda_items(&self, meeting_id: &str) -> Result<Vec<AgendaItem>> {
        let meeting_id = meeting_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, duration_minutes, is_completed
                 FROM agenda_items
                 WHERE meeting_id = ?1
                 ORDER BY position ASC",
            )?;

            let mut rows = stmt.query(params![meeting_id])?;
            let mut items = Vec::new();
            while let Some(row) = rows.next()? {
                items.push(row_to_agenda_item(row)?);
            }

            Ok(items)
        })
        .await
    }

    pub async fn set_item_completion(&self, item_id: &str, completed: bool) -> Result<()> {
        let item_id = item_id.to_string();
        self.execute(move |conn| {
            let updated = conn.execute(
                "UPDATE agenda_items
                 SET is_completed = ?1,
                     updated_at = ?2
                 WHERE id = ?3",
                params![completed as i64, Utc::now().to_rfc3339(), item_id],
            )?;
            if updated == 0 {
                return Err(anyhow!("agenda item {item_id} not found"));
            }
            Ok(())
        })
        .await
    }

    pub async fn set_meeting_status(&self, meeting_id: &str, status: MeetingStatus) -> Result<()> {
        let meeting_id = meeting_id.to_string();
        self.execute(move |conn| {
            let updated = conn.execute(
                "UPDATE meetings
                 SET status = ?1,
                     updated_at = ?2
                 WHERE id = ?3",
                params![status.as_str(), Utc::now().to_rfc3339(), meeting_id],
            )?;
            if updated == 0 {
                return Err(anyhow!("meeting {meeting_id} not found"));
            }
            Ok(())
        })
        .await
    }
}
