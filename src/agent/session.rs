//! Session state of a run
//!
//! Holds the append-only event history together with the rotation cursor.
//! Only the scheduler mutates a session, and only between events.

use crate::agent::loop_state::LoopState;
use crate::core::{Author, Event};

/// History and progress of one run
#[derive(Debug, Clone)]
pub struct Session {
    /// The task the run was started with
    query: String,
    /// Events in append order
    history: Vec<Event>,
    /// Rotation and budget
    state: LoopState,
    /// Name of the agent that owns (or will own) the floor
    active_agent: String,
}

impl Session {
    /// Create a session for a roster whose first agent is `first_agent`
    pub(crate) fn new(
        query: impl Into<String>,
        state: LoopState,
        first_agent: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            history: Vec::new(),
            state,
            active_agent: first_agent.into(),
        }
    }

    /// Append an event
    pub(crate) fn append(&mut self, event: Event) {
        self.history.push(event);
    }

    pub(crate) fn state(&self) -> &LoopState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut LoopState {
        &mut self.state
    }

    pub(crate) fn set_active_agent(&mut self, name: impl Into<String>) {
        self.active_agent = name.into();
    }

    /// The task the run was started with
    pub fn query(&self) -> &str {
        &self.query
    }

    /// All events, oldest first
    pub fn history(&self) -> &[Event] {
        &self.history
    }

    /// Number of turns taken so far
    pub fn iteration(&self) -> usize {
        self.state.iteration
    }

    /// Name of the agent holding the floor
    pub fn active_agent(&self) -> &str {
        &self.active_agent
    }

    /// Get event count
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Events written by the orchestrator itself
    pub fn system_events(&self) -> impl Iterator<Item = &Event> {
        self.history.iter().filter(|e| e.author == Author::System)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("build it", LoopState::new(5, 2), "a")
    }

    #[test]
    fn test_append_keeps_order() {
        let mut s = session();
        s.append(Event::text(Author::agent("a"), "1"));
        s.append(Event::text(Author::agent("b"), "2"));
        s.append(Event::text(Author::System, "3"));

        assert_eq!(s.len(), 3);
        assert_eq!(s.history()[0].texts().next(), Some("1"));
        assert_eq!(s.system_events().count(), 1);
    }

    #[test]
    fn test_query_is_not_history() {
        let s = session();
        assert_eq!(s.query(), "build it");
        assert!(s.is_empty());
        assert_eq!(s.active_agent(), "a");
        assert_eq!(s.iteration(), 0);
    }
}
