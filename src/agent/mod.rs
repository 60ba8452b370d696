//! Agent module - roster, turn execution and scheduling
//!
//! The scheduler owns the session and drives turns one at a time; the
//! executor runs a single turn; transfer and termination rules are applied
//! between and during turns.

pub mod executor;
pub mod loop_state;
pub mod roster;
pub mod scheduler;
pub mod session;
pub mod termination;
pub mod transfer;

pub use executor::{TurnExecutor, TurnItem, TurnOutcome, TurnStatus, TurnStream};
pub use loop_state::LoopState;
pub use roster::{Agent, AgentBuilder, Roster};
pub use scheduler::{EventObserver, RoundRobinScheduler, RunReport, TerminationReason};
pub use session::Session;
pub use termination::TerminationDetector;
pub use transfer::{TransferOrigin, TransferRequest, TransferResolver};
