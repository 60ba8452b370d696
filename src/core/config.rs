//! Configuration management for Teddy
//!
//! Supports environment variables, config files, and runtime overrides.
//! The config is built once at startup and handed to the scheduler, the
//! tool gateway and the turn service; nothing reads process-wide state
//! after that.
//!
//! Config file location: ~/.config/teddy/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::error::{Result, TeddyError};

/// Main configuration for Teddy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,
    /// Model configuration
    #[serde(default)]
    pub model: ModelConfig,
    /// Scheduler configuration
    #[serde(default)]
    pub run: RunConfig,
    /// Tool configuration
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Roster override; empty means the built-in roster
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<AgentSpec>,
}

/// Ollama server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Host address (default: localhost)
    pub host: String,
    /// Port number (default: 11434)
    pub port: u16,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Model used by every agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name as known to Ollama
    pub name: String,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Scheduler behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Total number of agent turns allowed
    /// Default: 20
    pub max_iterations: usize,
    /// Marker that ends the run when an agent writes it
    /// Default: TASK_COMPLETE
    pub sentinel: String,
    /// Optional wall-clock limit for a single turn
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_timeout_secs: Option<u64>,
    /// Model calls allowed within one turn while the agent keeps using tools
    /// Default: 8
    #[serde(default = "default_max_steps")]
    pub max_steps_per_turn: usize,
    /// Whether to show debug output
    pub debug: bool,
}

/// Tool behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Directory the tools operate in
    pub workdir: PathBuf,
    /// Test runner command; the requested directory is appended as last argument
    pub test_command: Vec<String>,
    /// Interpreter used by `run_script`
    pub python: String,
    /// Package installer; the package name is appended
    pub install_command: Vec<String>,
    /// Optional wall-clock limit for subprocess tools
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_timeout_secs: Option<u64>,
    /// Marker file that lets the external test harness discover tests
    pub marker_file: String,
    /// Remove the marker file once the run is over
    pub cleanup_marker: bool,
}

/// Roster entry as written in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instruction: String,
    #[serde(default)]
    pub tools: Vec<String>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: env::var("OLLAMA_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("OLLAMA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(11434),
            timeout_secs: 300,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: env::var("TEDDY_MODEL").unwrap_or_else(|_| "qwen3:8b".to_string()),
            temperature: Some(0.2),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: env::var("TEDDY_MAX_ITERATIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            sentinel: "TASK_COMPLETE".to_string(),
            turn_timeout_secs: None,
            max_steps_per_turn: default_max_steps(),
            debug: env::var("TEDDY_DEBUG")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            workdir: env::var("TEDDY_WORKDIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("workdir")),
            test_command: vec!["uv".to_string(), "run".to_string(), "pytest".to_string()],
            python: "python".to_string(),
            install_command: vec!["uv".to_string(), "pip".to_string(), "install".to_string()],
            tool_timeout_secs: Some(600),
            marker_file: "pytest.ini".to_string(),
            cleanup_marker: true,
        }
    }
}

fn default_max_steps() -> usize {
    env::var("TEDDY_MAX_STEPS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8)
}

impl RunConfig {
    /// Per-turn timeout as a duration
    pub fn turn_timeout(&self) -> Option<Duration> {
        self.turn_timeout_secs.map(Duration::from_secs)
    }
}

impl ToolsConfig {
    /// Per-invocation subprocess timeout as a duration
    pub fn tool_timeout(&self) -> Option<Duration> {
        self.tool_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("teddy")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();

        match Self::load_from(&Self::config_file()) {
            Ok(config) => config,
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TeddyError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| TeddyError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| TeddyError::config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| TeddyError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TeddyError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| TeddyError::config(format!("Failed to write config: {}", e)))?;

        Ok(config_path)
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.run.max_iterations == 0 {
            return Err(TeddyError::invalid("max_iterations must be positive"));
        }
        if self.run.max_steps_per_turn == 0 {
            return Err(TeddyError::invalid("max_steps_per_turn must be positive"));
        }
        if self.run.sentinel.is_empty() {
            return Err(TeddyError::invalid("sentinel must not be empty"));
        }
        if self.tools.test_command.is_empty() {
            return Err(TeddyError::invalid("test_command must not be empty"));
        }
        Ok(())
    }

    /// Get the full Ollama API URL
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ollama.port, 11434);
        assert_eq!(config.run.sentinel, "TASK_COMPLETE");
        assert_eq!(config.tools.marker_file, "pytest.ini");
        assert!(config.tools.cleanup_marker);
        assert!(config.agents.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [run]
            max_iterations = 7
            sentinel = "DONE"
            debug = true

            [[agents]]
            name = "solo"
            tools = ["read_file"]
            "#,
        )
        .unwrap();

        assert_eq!(config.run.max_iterations, 7);
        assert_eq!(config.run.sentinel, "DONE");
        assert!(config.run.max_steps_per_turn > 0);
        assert_eq!(config.agents.len(), 1);
        assert_eq!(config.agents[0].tools, vec!["read_file".to_string()]);
        assert_eq!(config.tools.test_command[0], "uv");
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let mut config = Config::default();
        config.run.max_iterations = 0;
        assert!(matches!(
            config.validate(),
            Err(TeddyError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_step_cap() {
        let mut config = Config::default();
        config.run.max_steps_per_turn = 0;
        assert!(matches!(
            config.validate(),
            Err(TeddyError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_marker_cleanup_can_be_disabled_in_toml() {
        let config = Config::from_toml(
            r#"
            [tools]
            workdir = "w"
            test_command = ["pytest"]
            python = "python3"
            install_command = ["pip", "install"]
            marker_file = "pytest.ini"
            cleanup_marker = false
            "#,
        )
        .unwrap();
        assert!(!config.tools.cleanup_marker);
        assert!(Config::default().tools.cleanup_marker);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("max_iterations"));
        assert!(toml_str.contains("test_command"));
    }

    #[test]
    fn test_config_dir() {
        let dir = Config::config_dir();
        assert!(dir.to_string_lossy().contains("teddy"));
    }
}
