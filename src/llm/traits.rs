//! Turn service trait for abstracting the model backend
//!
//! The scheduler never talks to a model directly. It hands a `TurnRequest`
//! to a `TurnService` and consumes the actions that come back, one at a time.
//! A turn may take several steps: while the agent keeps calling tools, the
//! executor asks again with the tool results appended to the history.

use futures::Stream;
use std::pin::Pin;

use crate::agent::Agent;
use crate::core::{Event, Result, ToolCall};

/// One thing an agent decided to do
#[derive(Debug, Clone, PartialEq)]
pub enum AgentAction {
    /// Plain text output
    Text(String),
    /// A request to run a tool (or, by mistake, a peer agent)
    ToolInvocation(ToolCall),
    /// Hand the next turn to a named peer
    Transfer(String),
}

impl AgentAction {
    /// Create a text action
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// Create a tool invocation action
    pub fn tool(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self::ToolInvocation(ToolCall::new(name, arguments))
    }

    /// Create a transfer action
    pub fn transfer(target: impl Into<String>) -> Self {
        Self::Transfer(target.into())
    }
}

/// Everything a service needs to run one step of a turn
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// The acting agent, including its policy and capabilities
    pub agent: Agent,
    /// The task the run was started with
    pub query: String,
    /// Full history so far, oldest first, including this turn's earlier steps
    pub history: Vec<Event>,
    /// Zero-based step within the turn
    pub step: usize,
}

/// Lazy, single-pass sequence of agent actions
pub type ActionStream = Pin<Box<dyn Stream<Item = Result<AgentAction>> + Send>>;

/// Backend that produces an agent's actions for one turn
pub trait TurnService: Send + Sync {
    /// Run one step; actions are produced as the backend emits them
    fn run(&self, request: TurnRequest) -> ActionStream;

    /// Get the service name
    fn name(&self) -> &str;
}
