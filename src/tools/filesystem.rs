//! File system tools
//!
//! Thin wrappers over `tokio::fs`. Every outcome, good or bad, comes back as
//! a human-readable string so the model can read it.

use async_trait::async_trait;
use serde_json::json;

use crate::core::{ToolCall, ToolDefinition, ToolResult};
use crate::tools::gateway::{Invocation, Tool};
use crate::tools::workspace::Workspace;

/// One file system operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    ReadFile,
    WriteFile,
    ListDir,
    ChangeDir,
    PrintWorkingDir,
    MakeDir,
    CreateEmptyFile,
    MovePath,
}

impl FsOp {
    /// Every operation, in registration order
    pub const ALL: [FsOp; 8] = [
        FsOp::ReadFile,
        FsOp::WriteFile,
        FsOp::ListDir,
        FsOp::ChangeDir,
        FsOp::PrintWorkingDir,
        FsOp::MakeDir,
        FsOp::CreateEmptyFile,
        FsOp::MovePath,
    ];

    /// Tool name exposed to agents
    pub fn name(&self) -> &'static str {
        match self {
            FsOp::ReadFile => "read_file",
            FsOp::WriteFile => "write_file",
            FsOp::ListDir => "list_dir",
            FsOp::ChangeDir => "change_dir",
            FsOp::PrintWorkingDir => "print_working_dir",
            FsOp::MakeDir => "make_dir",
            FsOp::CreateEmptyFile => "create_empty_file",
            FsOp::MovePath => "move_path",
        }
    }
}

/// A file system tool
#[derive(Debug, Clone, Copy)]
pub struct FsTool {
    op: FsOp,
}

impl FsTool {
    pub fn new(op: FsOp) -> Self {
        Self { op }
    }

    async fn run(&self, call: &ToolCall, workspace: &Workspace) -> ToolResult {
        let name = self.op.name();
        let arg = |key: &str| call.get_string(key);
        let missing = |key: &str| {
            ToolResult::failure(name, format!("Error: missing required argument '{}'", key))
        };

        match self.op {
            FsOp::ReadFile => {
                let Some(path) = arg("path") else {
                    return missing("path");
                };
                let full = workspace.resolve(&path);
                if !full.exists() {
                    return ToolResult::failure(
                        name,
                        format!("Error: The file {} does not exist.", path),
                    );
                }
                match tokio::fs::read_to_string(&full).await {
                    Ok(content) => ToolResult::success(name, content),
                    Err(e) => ToolResult::failure(
                        name,
                        format!("Error: Could not read file {}. {}", path, e),
                    ),
                }
            }
            FsOp::WriteFile => {
                let Some(path) = arg("path") else {
                    return missing("path");
                };
                let content = arg("content").unwrap_or_default();
                match tokio::fs::write(workspace.resolve(&path), content).await {
                    Ok(()) => ToolResult::success(name, format!("Content written to {}", path)),
                    Err(e) => ToolResult::failure(
                        name,
                        format!("Error: Could not write to file {}. {}", path, e),
                    ),
                }
            }
            FsOp::ListDir => {
                let path = arg("path")
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| ".".to_string());
                let full = workspace.resolve(&path);
                if !full.exists() {
                    return ToolResult::failure(
                        name,
                        format!("Error: The path {} does not exist.", path),
                    );
                }
                match list_entries(&full).await {
                    Ok(entries) => ToolResult::success(name, entries.join("\n")),
                    Err(e) => ToolResult::failure(
                        name,
                        format!("Error: Could not list contents of {}. {}", path, e),
                    ),
                }
            }
            FsOp::ChangeDir => {
                let Some(path) = arg("path") else {
                    return missing("path");
                };
                let full = workspace.resolve(&path);
                if !full.is_dir() {
                    return ToolResult::failure(
                        name,
                        format!("Error: The path {} does not exist.", path),
                    );
                }
                match tokio::fs::canonicalize(&full).await {
                    Ok(dir) => {
                        workspace.set_cwd(dir.clone());
                        ToolResult::success(name, dir.display().to_string())
                    }
                    Err(e) => ToolResult::failure(
                        name,
                        format!("Error: Could not change directory to {}. {}", path, e),
                    ),
                }
            }
            FsOp::PrintWorkingDir => ToolResult::success(name, workspace.cwd().display().to_string()),
            FsOp::MakeDir => {
                let Some(path) = arg("path") else {
                    return missing("path");
                };
                let full = workspace.resolve(&path);
                if full.exists() {
                    return ToolResult::failure(
                        name,
                        format!("Error: The directory {} already exists.", path),
                    );
                }
                match tokio::fs::create_dir_all(&full).await {
                    Ok(()) => ToolResult::success(name, format!("Directory {} created.", path)),
                    Err(e) => ToolResult::failure(
                        name,
                        format!("Error: Could not create directory {}. {}", path, e),
                    ),
                }
            }
            FsOp::CreateEmptyFile => {
                let Some(path) = arg("path") else {
                    return missing("path");
                };
                let opened = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(workspace.resolve(&path))
                    .await;
                match opened {
                    Ok(_) => ToolResult::success(name, format!("File {} created.", path)),
                    Err(e) => ToolResult::failure(
                        name,
                        format!("Error: Could not create file {}. {}", path, e),
                    ),
                }
            }
            FsOp::MovePath => {
                let (Some(source), Some(destination)) = (arg("source"), arg("destination")) else {
                    return missing("source/destination");
                };
                let from = workspace.resolve(&source);
                if !from.exists() {
                    return ToolResult::failure(
                        name,
                        format!("Error: The path {} does not exist.", source),
                    );
                }
                match tokio::fs::rename(&from, workspace.resolve(&destination)).await {
                    Ok(()) => {
                        ToolResult::success(name, format!("Moved {} to {}", source, destination))
                    }
                    Err(e) => ToolResult::failure(
                        name,
                        format!("Error: Could not move {} to {}. {}", source, destination, e),
                    ),
                }
            }
        }
    }
}

async fn list_entries(dir: &std::path::Path) -> std::io::Result<Vec<String>> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        entries.push(entry.file_name().to_string_lossy().into_owned());
    }
    entries.sort();
    Ok(entries)
}

fn path_schema(description: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": description
            }
        },
        "required": ["path"]
    })
}

#[async_trait]
impl Tool for FsTool {
    fn definition(&self) -> ToolDefinition {
        let name = self.op.name();
        match self.op {
            FsOp::ReadFile => ToolDefinition::function(
                name,
                "Read the contents of a file",
                path_schema("File to read"),
            ),
            FsOp::WriteFile => ToolDefinition::function(
                name,
                "Write content to a file, replacing what was there",
                json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "File to write" },
                        "content": { "type": "string", "description": "Full file content" }
                    },
                    "required": ["path", "content"]
                }),
            ),
            FsOp::ListDir => ToolDefinition::function(
                name,
                "List the entries of a directory",
                json!({
                    "type": "object",
                    "properties": {
                        "path": { "type": "string", "description": "Directory (defaults to the current one)" }
                    }
                }),
            ),
            FsOp::ChangeDir => ToolDefinition::function(
                name,
                "Change the current directory and return the new path",
                path_schema("Directory to move into"),
            ),
            FsOp::PrintWorkingDir => ToolDefinition::function(
                name,
                "Return the current directory",
                json!({ "type": "object", "properties": {} }),
            ),
            FsOp::MakeDir => ToolDefinition::function(
                name,
                "Create a directory (and any missing parents)",
                path_schema("Directory to create"),
            ),
            FsOp::CreateEmptyFile => ToolDefinition::function(
                name,
                "Create an empty file",
                path_schema("File to create"),
            ),
            FsOp::MovePath => ToolDefinition::function(
                name,
                "Move or rename a file or directory",
                json!({
                    "type": "object",
                    "properties": {
                        "source": { "type": "string", "description": "Existing path" },
                        "destination": { "type": "string", "description": "New path" }
                    },
                    "required": ["source", "destination"]
                }),
            ),
        }
    }

    async fn invoke(&self, call: &ToolCall, workspace: &Workspace) -> Invocation {
        Invocation::Sync(self.run(call, workspace).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run(op: FsOp, args: serde_json::Value, workspace: &Workspace) -> ToolResult {
        FsTool::new(op)
            .run(&ToolCall::new(op.name(), args), workspace)
            .await
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();

        let written = run(
            FsOp::WriteFile,
            json!({"path": "main.py", "content": "print(1)"}),
            &ws,
        )
        .await;
        assert!(written.success);
        assert_eq!(written.output, "Content written to main.py");

        let read = run(FsOp::ReadFile, json!({"path": "main.py"}), &ws).await;
        assert_eq!(read.output, "print(1)");
    }

    #[tokio::test]
    async fn test_missing_file_is_reported_as_data() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();

        let read = run(FsOp::ReadFile, json!({"path": "nope.py"}), &ws).await;
        assert!(!read.success);
        assert_eq!(read.output, "Error: The file nope.py does not exist.");

        let missing = run(FsOp::ReadFile, json!({}), &ws).await;
        assert!(missing.output.contains("missing required argument"));
    }

    #[tokio::test]
    async fn test_make_dir_change_dir_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();

        assert!(run(FsOp::MakeDir, json!({"path": "tests"}), &ws).await.success);
        let again = run(FsOp::MakeDir, json!({"path": "tests"}), &ws).await;
        assert!(again.output.contains("already exists"));

        let cd = run(FsOp::ChangeDir, json!({"path": "tests"}), &ws).await;
        assert!(cd.success);
        assert_eq!(ws.cwd(), ws.root().join("tests"));

        assert!(run(FsOp::CreateEmptyFile, json!({"path": "test_b.py"}), &ws).await.success);
        assert!(run(FsOp::CreateEmptyFile, json!({"path": "test_a.py"}), &ws).await.success);

        let listing = run(FsOp::ListDir, json!({}), &ws).await;
        assert_eq!(listing.output, "test_a.py\ntest_b.py");

        let pwd = run(FsOp::PrintWorkingDir, json!({}), &ws).await;
        assert!(pwd.output.ends_with("tests"));
    }

    #[tokio::test]
    async fn test_move_path() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        run(FsOp::CreateEmptyFile, json!({"path": "a.py"}), &ws).await;

        let moved = run(
            FsOp::MovePath,
            json!({"source": "a.py", "destination": "b.py"}),
            &ws,
        )
        .await;
        assert!(moved.success);
        assert!(ws.root().join("b.py").exists());
        assert!(!ws.root().join("a.py").exists());

        let gone = run(
            FsOp::MovePath,
            json!({"source": "a.py", "destination": "c.py"}),
            &ws,
        )
        .await;
        assert!(!gone.success);
    }

    #[test]
    fn test_definitions_match_names() {
        for op in FsOp::ALL {
            assert_eq!(FsTool::new(op).definition().function.name, op.name());
        }
    }
}
