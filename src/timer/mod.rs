pub mod controller;
pub mod engine;
pub mod format;
pub mod state;

pub use controller::TimerController;
pub use engine::{LogAttach, LogClose, StartOutcome, TimerEngine};
pub use state::{ColorBand, TimerKey, TimerSnapshot, TimerState, TimerStatus};
