//! Small shared utilities.

use std::{
    collections::HashSet,
    sync::{Mutex, OnceLock},
};

/// Logs a warning at most once per distinct message for the lifetime of the
/// process. Used for faults which would otherwise flood the log on every
/// frame, like a dangling atlas reference.
pub fn warn_once(message: &str) {
    static SEEN: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

    let seen = SEEN.get_or_init(Default::default);
    let first = seen
        .lock()
        .map(|mut seen| seen.insert(message.to_string()))
        .unwrap_or(false);

    if first {
        log::warn!("{message}");
    }
}
