//! Conditional logging macros gated by a module-level `ENABLE_LOGS` flag, plus
//! the one-time `env_logger` bootstrap.
//!
//! Usage:
//! ```ignore
//! // In your module, define the flag first:
//! const ENABLE_LOGS: bool = true;
//!
//! // Then use the macros (they're exported at the crate root):
//! use crate::{log_info, log_warn};
//!
//! log_warn!("note save for {} failed: {}", key, err);
//! ```

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs `env_logger` once per process. `RUST_LOG` wins over the default
/// `info` level. Safe to call repeatedly; never panics if another logger has
/// already been installed.
pub fn init_logging() {
    INIT.call_once(|| {
        let result = env_logger::Builder::new()
            .filter_level(log::LevelFilter::Info)
            .parse_default_env()
            .try_init();

        match result {
            Ok(()) => log::info!("conduct engine logging initialised"),
            Err(err) => eprintln!("logger already installed, keeping it: {err}"),
        }
    });
}

/// Conditional debug logging; requires `const ENABLE_LOGS: bool` in scope.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Conditional info logging; requires `const ENABLE_LOGS: bool` in scope.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Conditional warn logging; requires `const ENABLE_LOGS: bool` in scope.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Conditional error logging; requires `const ENABLE_LOGS: bool` in scope.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
