//! Transfer resolution
//!
//! Decides who takes the next turn when the last one asked for a handoff.
//! A handoff is honored only when it names another roster member; anything
//! else falls back to plain rotation.

use crate::agent::executor::TurnOutcome;
use crate::agent::roster::Roster;
use crate::core::{Author, Event};

/// Values a model emits when it means "no transfer"
const NO_OP_TARGETS: [&str; 3] = ["", "none", "null"];

/// How the transfer was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOrigin {
    /// An explicit transfer directive
    Directive,
    /// A peer agent was invoked as if it were a tool
    AgentAsTool,
}

/// A requested handoff, before validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub target: String,
    pub origin: TransferOrigin,
}

impl TransferRequest {
    pub fn directive(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            origin: TransferOrigin::Directive,
        }
    }

    pub fn agent_as_tool(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            origin: TransferOrigin::AgentAsTool,
        }
    }

    /// Whether the target is an empty or "no transfer" value
    pub fn is_no_op(&self) -> bool {
        let target = self.target.trim().to_ascii_lowercase();
        NO_OP_TARGETS.contains(&target.as_str())
    }
}

/// Validates transfer requests against the roster
pub struct TransferResolver;

impl TransferResolver {
    /// Next agent named by the outcome, if the transfer is valid
    pub fn resolve(outcome: &TurnOutcome, roster: &Roster) -> Option<String> {
        let request = outcome.transfer.as_ref()?;
        if request.is_no_op() {
            return None;
        }

        let target = request.target.trim();
        if target == outcome.agent || !roster.contains(target) {
            return None;
        }
        Some(target.to_string())
    }

    /// Warning event for a peer invoked as a tool
    pub fn diagnostic(outcome: &TurnOutcome, roster: &Roster) -> Option<Event> {
        let request = outcome.transfer.as_ref()?;
        if request.origin != TransferOrigin::AgentAsTool {
            return None;
        }

        let follow_up = match Self::resolve(outcome, roster) {
            Some(target) => format!("Transferring to {} agent...", target),
            None => "Transfer ignored.".to_string(),
        };
        Some(Event::text(
            Author::System,
            format!(
                "WARNING: {} called the agent '{}' as a tool. Don't do this. Use transfer_to_agent.\n{}",
                outcome.agent, request.target, follow_up
            ),
        ))
    }
}
