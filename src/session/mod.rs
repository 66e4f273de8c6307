mod coordinator;
mod snapshot;

pub use coordinator::{CompletionOutcome, ConductSession, NoteFocus};
pub use snapshot::SessionSnapshot;
