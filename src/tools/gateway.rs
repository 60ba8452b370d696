//! Tool gateway - authorizes and dispatches tool calls
//!
//! Central hub for registering tools and routing tool calls to handlers.
//! The gateway enforces each agent's capability set before a tool runs and
//! hides whether a tool answers once or streams progress.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use tracing::{debug, warn};

use crate::core::config::ToolsConfig;
use crate::core::{
    ExecutionMode, Result, TeddyError, ToolCall, ToolDefinition, ToolProgress, ToolResult,
};
use crate::tools::filesystem::{FsOp, FsTool};
use crate::tools::process::{InstallPackageTool, RunScriptTool};
use crate::tools::test_runner::TestRunnerTool;
use crate::tools::workspace::Workspace;

/// Ordered, finite stream of payloads from a streaming tool
pub type ProgressStream = Pin<Box<dyn Stream<Item = ToolProgress> + Send>>;

/// What a tool hands back
pub enum Invocation {
    /// A single result; failures are carried in the result itself
    Sync(ToolResult),
    /// Progress payloads ending with exactly one terminal payload
    Streaming(ProgressStream),
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Invocation::Sync(result) => f.debug_tuple("Sync").field(result).finish(),
            Invocation::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

/// A capability the gateway can run
#[async_trait]
pub trait Tool: Send + Sync {
    /// Definition offered to the model
    fn definition(&self) -> ToolDefinition;

    /// How the tool reports back
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Sync
    }

    /// Run the tool
    async fn invoke(&self, call: &ToolCall, workspace: &Workspace) -> Invocation;
}

/// Ordered set of tool names an agent may call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    tools: Vec<String>,
}

impl CapabilitySet {
    /// Build a set, dropping duplicates but keeping first-seen order
    pub fn new<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for tool in tools {
            let tool = tool.into();
            if !set.tools.contains(&tool) {
                set.tools.push(tool);
            }
        }
        set
    }

    pub fn contains(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t == tool)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Registry of available tools
pub struct ToolGateway {
    /// Tools indexed by name
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Directory the tools operate in
    workspace: Arc<Workspace>,
}

impl ToolGateway {
    /// Create an empty gateway
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self {
            tools: HashMap::new(),
            workspace,
        }
    }

    /// Create a gateway with the full tool set
    pub fn with_defaults(workspace: Arc<Workspace>, config: &ToolsConfig) -> Self {
        let mut gateway = Self::new(workspace);

        for op in FsOp::ALL {
            gateway.register(FsTool::new(op));
        }
        gateway.register(RunScriptTool::new(
            config.python.clone(),
            config.tool_timeout(),
        ));
        gateway.register(InstallPackageTool::new(
            config.install_command.clone(),
            config.tool_timeout(),
        ));
        gateway.register(TestRunnerTool::new(
            config.test_command.clone(),
            config.tool_timeout(),
        ));

        gateway
    }

    /// Register a tool under its definition name
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.definition().function.name;
        self.tools.insert(name, Arc::new(tool));
    }

    /// Whether a tool is registered
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execution mode of a registered tool
    pub fn mode(&self, name: &str) -> Option<ExecutionMode> {
        self.tools.get(name).map(|tool| tool.mode())
    }

    /// Definitions for the tools in a capability set, in capability order
    pub fn definitions_for(&self, capabilities: &CapabilitySet) -> Vec<ToolDefinition> {
        capabilities
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    /// The workspace shared by all tools
    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    /// Execute a tool call on behalf of an agent
    ///
    /// Fails with `CapabilityDenied` when the tool is outside the caller's
    /// capability set; the tool is not touched in that case. Every other
    /// failure is reported inside the returned invocation.
    pub async fn invoke(
        &self,
        caller: &str,
        capabilities: &CapabilitySet,
        call: &ToolCall,
    ) -> Result<Invocation> {
        if !capabilities.contains(&call.name) {
            warn!(agent = caller, tool = %call.name, "tool call denied");
            return Err(TeddyError::denied(caller, &call.name));
        }

        let Some(tool) = self.tools.get(&call.name) else {
            return Ok(Invocation::Sync(ToolResult::failure(
                &call.name,
                format!("Error: Unknown tool: {}", call.name),
            )));
        };

        debug!(agent = caller, tool = %call.name, mode = ?tool.mode(), "invoking tool");
        Ok(tool.invoke(call, &self.workspace).await)
    }
}
