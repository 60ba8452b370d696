//! Teddy - Round-Robin Multi-Agent Coding Loop
//!
//! A fixed roster of agents takes turns on a shared task. Each turn is run
//! by a pluggable turn service; tool calls go through a capability-checked
//! gateway, and long-running tools such as the test runner stream their
//! output into the shared history line by line.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Turn service seam with an Ollama implementation
//! - **Tools**: Tool gateway, workspace and the concrete tools
//! - **Agent**: Roster, turn executor, transfer and termination rules, scheduler
//! - **CLI**: Console rendering of events
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use teddy::agent::{RoundRobinScheduler, Roster};
//! use teddy::llm::OllamaTurnService;
//! use teddy::tools::{ToolGateway, Workspace};
//! use teddy::Config;
//!
//! #[tokio::main]
//! async fn main() -> teddy::Result<()> {
//!     let config = Config::load();
//!     let workspace = Arc::new(Workspace::open(&config.tools.workdir)?);
//!     let gateway = Arc::new(ToolGateway::with_defaults(workspace, &config.tools));
//!     let roster = Roster::default_roster()?;
//!     let service = OllamaTurnService::from_config(&config, gateway.clone(), &roster)?;
//!
//!     let report = RoundRobinScheduler::from_config(Arc::new(service), gateway, &config.run)
//!         .with_observer(teddy::cli::print_event)
//!         .run(roster.iter().cloned().collect(), config.run.max_iterations, "Write fizzbuzz")
//!         .await?;
//!     println!("{}", teddy::cli::summary(&report));
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod llm;
pub mod tools;

// Re-export commonly used items
pub use agent::{RoundRobinScheduler, RunReport, TerminationReason};
pub use core::{Config, Result, TeddyError};
