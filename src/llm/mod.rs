//! LLM module - turn services
//!
//! Defines the seam between the scheduler and a model backend, with Ollama
//! as the concrete implementation.

pub mod ollama;
pub mod traits;

pub use ollama::{OllamaTurnService, TRANSFER_TOOL};
pub use traits::{ActionStream, AgentAction, TurnRequest, TurnService};
