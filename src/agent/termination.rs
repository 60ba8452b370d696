//! Termination detection
//!
//! A run ends the moment any text part of any event contains the sentinel
//! token. Matching is a case-sensitive substring search.

use crate::core::Event;

/// Default sentinel announced to agents
pub const DEFAULT_SENTINEL: &str = "TASK_COMPLETE";

/// Scans events for the completion sentinel
#[derive(Debug, Clone)]
pub struct TerminationDetector {
    sentinel: String,
}

impl TerminationDetector {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
        }
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Whether the event signals completion
    pub fn scan(&self, event: &Event) -> bool {
        if self.sentinel.is_empty() {
            return false;
        }
        event.texts().any(|text| text.contains(&self.sentinel))
    }
}

impl Default for TerminationDetector {
    fn default() -> Self {
        Self::new(DEFAULT_SENTINEL)
    }
}
