pub mod console;
pub mod db;
pub mod error;
pub mod models;
pub mod notes;
pub mod session;
pub mod settings;
pub mod store;
pub mod timer;
mod utils;

pub use db::Database;
pub use error::{ConductError, ConductResult};
pub use models::{
    AgendaItem, Meeting, MeetingStatus, NoteBlock, NoteDocument, NoteKey, NoteScope, TimeLog,
};
pub use notes::{NoteBuffer, NotesSyncQueue, SyncPhase, SyncStatus};
pub use session::{CompletionOutcome, ConductSession, NoteFocus, SessionSnapshot};
pub use settings::{ConductSettings, SettingsStore, ViewMode};
pub use store::{AgendaStore, Collaborators, NoteStore, TimeLogStore};
pub use timer::{
    ColorBand, TimerController, TimerEngine, TimerKey, TimerSnapshot, TimerState, TimerStatus,
};
pub use utils::logging::init_logging;
