//! Core module - shared infrastructure for Teddy
//!
//! This module contains foundational types, configuration, and error handling
//! used throughout the application.

pub mod config;
pub mod error;
pub mod types;

pub use config::{AgentSpec, Config, ModelConfig, OllamaConfig, RunConfig, ToolsConfig};
pub use error::{Result, TeddyError};
pub use types::*;
