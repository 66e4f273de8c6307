use thiserror::Error;

/// Errors surfaced by the conduct engine's public operations.
///
/// Storage hiccups on the opportunistic paths (debounced note saves, time-log
/// writes) never show up here; they are logged and retried by the next
/// coalesced write. What remains is either a programmer error or a failure the
/// caller has to decide about.
#[derive(Debug, Error)]
pub enum ConductError {
    #[error("agenda item index {index} is out of range (agenda has {len} items)")]
    ItemOutOfRange { index: usize, len: usize },

    #[error("unknown agenda item {0}")]
    UnknownItem(String),

    #[error("timer {0} has not been initialized")]
    TimerNotInitialized(String),

    #[error("failed to update completion for item {item_id}: {source}")]
    CompletionFailed {
        item_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to mark meeting {meeting_id} complete: {source}")]
    MeetingCompletionFailed {
        meeting_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to persist notes for {}: {source}", keys.join(", "))]
    FlushFailed {
        keys: Vec<String>,
        #[source]
        source: anyhow::Error,
    },

    #[error("conduct session for meeting {0} is closed")]
    SessionClosed(String),
}

pub type ConductResult<T> = std::result::Result<T, ConductError>;
