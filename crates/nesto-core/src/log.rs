//! Process-wide log callback.
//!
//! The host may install a single callback that receives one formatted line
//! per event (ROM parse failures, unknown mapper register traffic, and the
//! like). This pointer is the only process-global state in the core; every
//! other piece of state lives in the [`crate::Nes`] aggregate. When no
//! callback is installed, messages fall through to `tracing::warn!` so the
//! usual subscriber machinery still sees them.

use std::sync::RwLock;

/// Host-facing log sink. Receives one line per call, no trailing newline.
pub type LogCallback = fn(&str);

static LOG: RwLock<Option<LogCallback>> = RwLock::new(None);

/// Installs (or clears) the process-wide log callback.
pub fn set_log_callback(callback: Option<LogCallback>) {
    if let Ok(mut slot) = LOG.write() {
        *slot = callback;
    }
}

pub(crate) fn emit(msg: std::fmt::Arguments<'_>) {
    let line = msg.to_string();
    let delivered = match LOG.read() {
        Ok(slot) => {
            if let Some(cb) = *slot {
                cb(&line);
                true
            } else {
                false
            }
        }
        Err(_) => false,
    };
    if !delivered {
        tracing::warn!("{line}");
    }
}

/// Formats and routes one log line to the host callback.
macro_rules! core_log {
    ($($arg:tt)*) => {
        $crate::log::emit(format_args!($($arg)*))
    };
}

pub(crate) use core_log;
