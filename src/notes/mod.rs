pub mod buffer;
pub mod sync_queue;

pub use buffer::NoteBuffer;
pub use sync_queue::{NotesSyncQueue, SyncPhase, SyncStatus, DEFAULT_DEBOUNCE};
