pub mod agenda;
pub mod notes;
pub mod time_log;

pub use agenda::{AgendaItem, Meeting, MeetingStatus};
pub use notes::{NoteBlock, NoteDocument, NoteKey, NoteScope, DOCUMENT_FORMAT_VERSION};
pub use time_log::TimeLog;
