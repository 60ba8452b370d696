//! Subprocess tools that answer once
//!
//! `run_script` and `install_package` wait for the child to exit and return
//! its captured output as a string.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;

use crate::core::{ToolCall, ToolDefinition, ToolResult};
use crate::tools::gateway::{Invocation, Tool};
use crate::tools::workspace::Workspace;

/// Captured result of a finished child
struct Captured {
    success: bool,
    stdout: String,
    stderr: String,
}

/// Run a command to completion in `cwd`
async fn run_captured(
    program: &str,
    args: &[String],
    cwd: &Path,
    timeout: Option<Duration>,
) -> std::result::Result<Captured, String> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, cmd.output())
            .await
            .map_err(|_| format!("timed out after {:?}", limit))?,
        None => cmd.output().await,
    }
    .map_err(|e| e.to_string())?;

    Ok(Captured {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Executes a script with the configured interpreter
pub struct RunScriptTool {
    interpreter: String,
    timeout: Option<Duration>,
}

impl RunScriptTool {
    pub fn new(interpreter: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Tool for RunScriptTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "run_script",
            "Execute a script file and return its output",
            json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Script to run" }
                },
                "required": ["path"]
            }),
        )
    }

    async fn invoke(&self, call: &ToolCall, workspace: &Workspace) -> Invocation {
        let name = "run_script";
        let Some(path) = call.get_string("path") else {
            return Invocation::Sync(ToolResult::failure(
                name,
                "Error: missing required argument 'path'",
            ));
        };
        if !workspace.resolve(&path).exists() {
            return Invocation::Sync(ToolResult::failure(
                name,
                format!("Error: The file {} does not exist.", path),
            ));
        }

        let result = match run_captured(
            &self.interpreter,
            &[path.clone()],
            &workspace.cwd(),
            self.timeout,
        )
        .await
        {
            Ok(captured) if captured.success => ToolResult::success(name, captured.stdout),
            Ok(captured) => ToolResult::failure(name, format!("Error: {}", captured.stderr)),
            Err(e) => ToolResult::failure(
                name,
                format!("Error: Could not execute file {}. {}", path, e),
            ),
        };
        Invocation::Sync(result)
    }
}

/// Installs a package with the configured installer
pub struct InstallPackageTool {
    command: Vec<String>,
    timeout: Option<Duration>,
}

impl InstallPackageTool {
    pub fn new(command: Vec<String>, timeout: Option<Duration>) -> Self {
        Self { command, timeout }
    }
}

#[async_trait]
impl Tool for InstallPackageTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "install_package",
            "Install a package into the project environment",
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Package to install" }
                },
                "required": ["name"]
            }),
        )
    }

    async fn invoke(&self, call: &ToolCall, workspace: &Workspace) -> Invocation {
        let name = "install_package";
        let Some(package) = call.get_string("name").filter(|p| !p.trim().is_empty()) else {
            return Invocation::Sync(ToolResult::failure(
                name,
                "Error: missing required argument 'name'",
            ));
        };
        let Some((program, base_args)) = self.command.split_first() else {
            return Invocation::Sync(ToolResult::failure(
                name,
                "Error: no install command configured",
            ));
        };

        let mut args = base_args.to_vec();
        args.push(package.clone());

        let result = match run_captured(program, &args, &workspace.cwd(), self.timeout).await {
            Ok(captured) if captured.success => {
                ToolResult::success(name, format!("Package {} installed.", package))
            }
            Ok(captured) => ToolResult::failure(
                name,
                format!("Error: Could not install {}. {}", package, captured.stderr),
            ),
            Err(e) => ToolResult::failure(
                name,
                format!("Error: Could not install {}. {}", package, e),
            ),
        };
        Invocation::Sync(result)
    }
}
