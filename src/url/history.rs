//! Navigation History
//!
//! The store only needs three things from the browser: the current location,
//! a way to push a new entry, and a notification when the user moves through
//! existing entries (back/forward). [`History`] captures that surface;
//! [`MemoryHistory`] implements it in memory with the same stack semantics
//! (pushing discards forward entries, moving emits a pop-state event).

use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

/// Emitted when navigation moves to an existing history entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopState {
    /// Full location (`path?query`) after the move
    pub location: String,
}

/// Browser-history surface used by the store
pub trait History: Send + Sync {
    /// Path part of the current location
    fn pathname(&self) -> String;

    /// Query part of the current location, including the leading `?`,
    /// or an empty string
    fn search(&self) -> String;

    /// Add an entry without reloading; forward entries are discarded
    fn push_state(&self, location: &str);

    /// Receive pop-state notifications
    fn subscribe(&self) -> broadcast::Receiver<PopState>;
}

/// In-memory history stack
pub struct MemoryHistory {
    stack: Mutex<HistoryStack>,
    pop_tx: broadcast::Sender<PopState>,
}

#[derive(Debug)]
struct HistoryStack {
    entries: Vec<String>,
    cursor: usize,
}

impl MemoryHistory {
    /// Create a history whose only entry is `location`
    pub fn new(location: impl Into<String>) -> Self {
        let (pop_tx, _) = broadcast::channel(64);
        Self {
            stack: Mutex::new(HistoryStack {
                entries: vec![location.into()],
                cursor: 0,
            }),
            pop_tx,
        }
    }

    fn stack(&self) -> MutexGuard<'_, HistoryStack> {
        self.stack.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current full location
    pub fn location(&self) -> String {
        let stack = self.stack();
        stack.entries[stack.cursor].clone()
    }

    /// Number of entries, including forward ones
    pub fn len(&self) -> usize {
        self.stack().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack().entries.is_empty()
    }

    /// Index of the current entry
    pub fn position(&self) -> usize {
        self.stack().cursor
    }

    /// Move by `delta` entries; returns false (and emits nothing) when the
    /// target is outside the stack
    pub fn go(&self, delta: isize) -> bool {
        let location = {
            let mut stack = self.stack();
            let target = match stack.cursor.checked_add_signed(delta) {
                Some(target) if target < stack.entries.len() && delta != 0 => target,
                _ => return false,
            };
            stack.cursor = target;
            stack.entries[target].clone()
        };

        tracing::debug!(location = %location, delta, "History pop-state");
        let _ = self.pop_tx.send(PopState { location });
        true
    }

    pub fn back(&self) -> bool {
        self.go(-1)
    }

    pub fn forward(&self) -> bool {
        self.go(1)
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new("/")
    }
}

impl History for MemoryHistory {
    fn pathname(&self) -> String {
        split_location(&self.location()).0.to_string()
    }

    fn search(&self) -> String {
        split_location(&self.location()).1.to_string()
    }

    fn push_state(&self, location: &str) {
        let mut stack = self.stack();
        let keep = stack.cursor + 1;
        stack.entries.truncate(keep);
        stack.entries.push(location.to_string());
        stack.cursor = keep;
        tracing::debug!(location = %location, entries = stack.entries.len(), "History push");
    }

    fn subscribe(&self) -> broadcast::Receiver<PopState> {
        self.pop_tx.subscribe()
    }
}

/// Split `path?query#fragment` into (`path`, `?query`)
pub fn split_location(location: &str) -> (&str, &str) {
    let location = location.split('#').next().unwrap_or(location);
    match location.find('?') {
        Some(idx) if idx + 1 < location.len() => (&location[..idx], &location[idx..]),
        Some(idx) => (&location[..idx], ""),
        None => (location, ""),
    }
}
