//! Line-oriented adapter over a [`ConductSession`], used by the `conduct`
//! binary. Owns no engine logic: every command maps onto one session call.

use std::{path::Path, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    db::Database,
    log_info,
    models::{AgendaItem, Meeting, MeetingStatus, NoteBlock},
    session::{ConductSession, NoteFocus},
    settings::ConductSettings,
    store::Collaborators,
    timer::{TimerKey, TimerSnapshot},
};

const ENABLE_LOGS: bool = true;

const HELP: &str = "commands: status | select <n> | next | prev | start [global] | pause [global] \
| reset [global] | done | stamp | focus <global|item> | note <text> | flush | end | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Select(usize),
    Next,
    Previous,
    Start(TimerTarget),
    Pause(TimerTarget),
    Reset(TimerTarget),
    ToggleComplete,
    Timestamp,
    Focus(NoteFocus),
    Note(String),
    Flush,
    EndMeeting,
    Quit,
    Help,
}

/// `global`, or the active item when omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTarget {
    Global,
    Active,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "status" | "ls" => Command::Status,
            "select" | "go" => {
                let number: usize = rest
                    .parse()
                    .with_context(|| format!("expected an item number, got {rest:?}"))?;
                if number == 0 {
                    bail!("items are numbered from 1");
                }
                Command::Select(number - 1)
            }
            "next" => Command::Next,
            "prev" | "previous" => Command::Previous,
            "start" => Command::Start(parse_target(rest)?),
            "pause" => Command::Pause(parse_target(rest)?),
            "reset" => Command::Reset(parse_target(rest)?),
            "done" | "complete" => Command::ToggleComplete,
            "stamp" => Command::Timestamp,
            "focus" => match rest {
                "global" => Command::Focus(NoteFocus::Global),
                "item" => Command::Focus(NoteFocus::Item),
                other => bail!("unknown focus {other:?}"),
            },
            "note" if !rest.is_empty() => Command::Note(rest.to_string()),
            "note" => bail!("note needs some text"),
            "flush" | "save" => Command::Flush,
            "end" => Command::EndMeeting,
            "quit" | "exit" => Command::Quit,
            "help" | "?" => Command::Help,
            other => bail!("unknown command {other:?}"),
        };
        Ok(command)
    }
}

fn parse_target(rest: &str) -> Result<TimerTarget> {
    match rest {
        "" | "item" => Ok(TimerTarget::Active),
        "global" => Ok(TimerTarget::Global),
        other => Err(anyhow!("unknown timer {other:?}")),
    }
}

/// Loads a meeting and its agenda from the database, seeding a short demo
/// agenda when the meeting does not exist yet.
pub async fn load_or_seed(db: &Database, meeting_id: &str) -> Result<Vec<AgendaItem>> {
    if db.get_meeting(meeting_id).await?.is_none() {
        let now = Utc::now();
        db.insert_meeting(&Meeting {
            id: meeting_id.to_string(),
            title: "Weekly sync".into(),
            status: MeetingStatus::InProgress,
            created_at: now,
            updated_at: now,
        })
        .await?;
        let demo = vec![
            AgendaItem::new(format!("{meeting_id}-1"), "Check-in", Some(5)),
            AgendaItem::new(format!("{meeting_id}-2"), "Roadmap review", Some(20)),
            AgendaItem::new(format!("{meeting_id}-3"), "Open questions", None),
        ];
        db.replace_agenda_items(meeting_id, &demo).await?;
        log_info!("seeded demo agenda for meeting {}", meeting_id);
    }
    db.list_agenda_items(meeting_id).await
}

/// Opens the database under `data_dir` and a session for `meeting_id`.
pub async fn open_session(
    data_dir: &Path,
    meeting_id: &str,
    settings: ConductSettings,
) -> Result<ConductSession> {
    let db = Database::new(data_dir.join("conduct.sqlite3"))?;
    let items = load_or_seed(&db, meeting_id).await?;
    let collaborators = Collaborators::from_shared(Arc::new(db));
    Ok(ConductSession::open(meeting_id, items, collaborators, settings).await)
}

/// Reads commands until `quit`, `end` or end of input, then closes the
/// session.
pub async fn run<R, W>(session: &ConductSession, input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    write_line(&mut output, HELP).await?;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(err) => {
                write_line(&mut output, &format!("error: {err:#}")).await?;
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::EndMeeting => {
                session.complete_meeting().await?;
                write_line(&mut output, "meeting completed").await?;
                return Ok(());
            }
            command => {
                let reply = match execute(session, command).await {
                    Ok(reply) => reply,
                    Err(err) => format!("error: {err:#}"),
                };
                write_line(&mut output, &reply).await?;
            }
        }
    }

    session.close().await?;
    write_line(&mut output, "session closed").await?;
    Ok(())
}

async fn execute(session: &ConductSession, command: Command) -> Result<String> {
    let reply = match command {
        Command::Status => render_status(session).await,
        Command::Select(index) => {
            session.select_item(index).await?;
            render_status(session).await
        }
        Command::Next => {
            session.next_item().await?;
            render_status(session).await
        }
        Command::Previous => {
            session.previous_item().await?;
            render_status(session).await
        }
        Command::Start(target) => {
            let key = resolve_target(session, target).await?;
            render_timer(&session.start_timer(&key).await?)
        }
        Command::Pause(target) => {
            let key = resolve_target(session, target).await?;
            render_timer(&session.pause_timer(&key).await?)
        }
        Command::Reset(target) => {
            let key = resolve_target(session, target).await?;
            render_timer(&session.reset_timer(&key).await?)
        }
        Command::ToggleComplete => {
            let item = session
                .active_item()
                .await
                .ok_or_else(|| anyhow!("agenda is empty"))?;
            let outcome = session.toggle_complete(&item.id).await?;
            let (done, total) = session.progress().await;
            format!(
                "{} {} ({done}/{total} done)",
                item.title,
                if outcome.completed { "completed" } else { "reopened" }
            )
        }
        Command::Timestamp => {
            let document = session.insert_timestamp().await?;
            document
                .blocks
                .last()
                .and_then(NoteBlock::text)
                .unwrap_or_default()
                .to_string()
        }
        Command::Focus(focus) => {
            session.set_focus(focus).await?;
            format!("focus: {focus:?}")
        }
        Command::Note(text) => {
            let key = session.focused_note_key().await?;
            let document = session.notes(&key).await.appended(NoteBlock::paragraph(text));
            let blocks = document.blocks.len();
            session.update_notes(key.clone(), document).await?;
            format!("{key}: {blocks} block(s)")
        }
        Command::Flush => {
            session.flush().await?;
            "notes saved".to_string()
        }
        Command::Help => HELP.to_string(),
        Command::EndMeeting | Command::Quit => String::new(),
    };
    Ok(reply)
}

async fn resolve_target(session: &ConductSession, target: TimerTarget) -> Result<TimerKey> {
    match target {
        TimerTarget::Global => Ok(TimerKey::Global),
        TimerTarget::Active => session
            .active_item()
            .await
            .map(|item| TimerKey::item(item.id))
            .ok_or_else(|| anyhow!("agenda is empty")),
    }
}

fn render_timer(snapshot: &TimerSnapshot) -> String {
    format!(
        "{} {:?} {} ({:?})",
        snapshot.key, snapshot.status, snapshot.display, snapshot.color
    )
}

async fn render_status(session: &ConductSession) -> String {
    let active = session.active_index().await;
    let mut out = Vec::new();
    if let Some(global) = session.timer(&TimerKey::Global).await {
        out.push(format!("meeting {}", render_timer(&global)));
    }
    for (index, item) in session.items().await.iter().enumerate() {
        let marker = if index == active { ">" } else { " " };
        let check = if item.is_completed { "x" } else { " " };
        let timer = session
            .timer(&TimerKey::item(item.id.clone()))
            .await
            .map(|snapshot| format!("{} {:?}", snapshot.display, snapshot.color))
            .unwrap_or_default();
        out.push(format!("{marker} {}. [{check}] {} {timer}", index + 1, item.title));
    }
    out.join("\n")
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
