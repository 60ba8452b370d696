//! Scheduler loop state
//!
//! Tracks the iteration budget and whose turn it is. One iteration is one
//! agent turn, whether it ran to completion or was cut short.

/// Cursor and budget of the round-robin loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopState {
    /// Turns taken so far
    pub iteration: usize,
    /// Maximum allowed turns
    pub max_iterations: usize,
    /// Rotation index of the agent that owns the next turn
    pub active_index: usize,
    roster_len: usize,
}

impl LoopState {
    /// Create a new loop state starting at the first roster entry
    pub fn new(max_iterations: usize, roster_len: usize) -> Self {
        Self {
            iteration: 0,
            max_iterations,
            active_index: 0,
            roster_len,
        }
    }

    /// Check if the budget allows another turn
    pub fn should_continue(&self) -> bool {
        self.iteration < self.max_iterations
    }

    /// Turns left in the budget
    pub fn remaining(&self) -> usize {
        self.max_iterations.saturating_sub(self.iteration)
    }

    /// Index that follows the active one in rotation order
    pub fn successor(&self) -> usize {
        if self.roster_len == 0 {
            0
        } else {
            (self.active_index + 1) % self.roster_len
        }
    }

    /// Close a finished turn and move the floor.
    ///
    /// `transfer` is a validated rotation index; `None` rotates to the
    /// successor.
    pub fn next_turn(&mut self, transfer: Option<usize>) {
        self.iteration += 1;
        self.active_index = match transfer {
            Some(index) if index < self.roster_len => index,
            _ => self.successor(),
        };
    }

    /// Close a turn that was cut short; the floor stays put
    pub fn end_turn(&mut self) {
        self.iteration += 1;
    }
}
