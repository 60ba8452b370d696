//! Tools module - Tool implementations for the agents
//!
//! Contains the gateway that authorizes and dispatches calls, the file system
//! and subprocess tools, and the streaming test runner.

pub mod filesystem;
pub mod gateway;
pub mod process;
pub mod test_runner;
pub mod workspace;

pub use gateway::{CapabilitySet, Invocation, ProgressStream, Tool, ToolGateway};
pub use workspace::{MarkerGuard, Workspace};
