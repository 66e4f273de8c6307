use anyhow::{anyhow, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::{
    db::{helpers::parse_notes, Database},
    models::{NoteDocument, NoteKey, NoteScope},
};

/// Global notes live on the meeting row, item notes on the agenda item row.
fn table_for(scope: NoteScope) -> &'static str {
    match scope {
        NoteScope::Global => "meetings",
        NoteScope::Item => "agenda_items",
    }
}

impl Database {
    pub async fn get_notes(&self, key: &NoteKey) -> Result<Option<NoteDocument>> {
        let key = key.clone();
        self.execute(move |conn| {
            let sql = format!("SELECT notes FROM {} WHERE id = ?1", table_for(key.scope));
            let raw: Option<Option<String>> = conn
                .query_row(&sql, params![key.id], |row| row.get(0))
                .optional()?;
            parse_notes(raw.flatten(), "notes")
        })
        .await
    }

    pub async fn put_notes(&self, key: &NoteKey, document: &NoteDocument) -> Result<()> {
        let key = key.clone();
        let serialized = serde_json::to_string(document)?;
        self.execute(move |conn| {
            let sql = format!(
                "UPDATE {} SET notes = ?1, updated_at = ?2 WHERE id = ?3",
                table_for(key.scope)
            );
            let updated = conn.execute(&sql, params![serialized, Utc::now().to_rfc3339(), key.id])?;
            if updated == 0 {
                return Err(anyhow!("no row to hold notes for {key}"));
            }
            Ok(())
        })
        .await
    }
}
