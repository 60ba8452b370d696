//! Shared types used across Teddy modules
//!
//! Contains the event model, tool call structures and tool definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Who produced an event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    /// A roster agent, by name
    Agent(String),
    /// The orchestrator itself (faults, diagnostics)
    System,
}

impl Author {
    /// Create an agent author
    pub fn agent(name: impl Into<String>) -> Self {
        Self::Agent(name.into())
    }

    /// Name of the agent, if any
    pub fn agent_name(&self) -> Option<&str> {
        match self {
            Author::Agent(name) => Some(name),
            Author::System => None,
        }
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Author::Agent(name) => write!(f, "{}", name),
            Author::System => write!(f, "system"),
        }
    }
}

/// One typed piece of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Free-form text
    Text { content: String },
    /// A request to run a tool
    ToolCall {
        tool_name: String,
        arguments: serde_json::Value,
    },
    /// The (possibly partial) result of a tool run
    ToolResult {
        tool_name: String,
        payload: serde_json::Value,
    },
}

/// Immutable record produced during a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Producer of the event
    pub author: Author,
    /// Ordered parts
    pub parts: Vec<Part>,
}

impl Event {
    /// Create an event from parts
    pub fn new(author: Author, parts: Vec<Part>) -> Self {
        Self { author, parts }
    }

    /// Create a single-part text event
    pub fn text(author: Author, content: impl Into<String>) -> Self {
        Self::new(
            author,
            vec![Part::Text {
                content: content.into(),
            }],
        )
    }

    /// Create a single-part tool call event
    pub fn tool_call(author: Author, call: &ToolCall) -> Self {
        Self::new(
            author,
            vec![Part::ToolCall {
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
            }],
        )
    }

    /// Create a single-part tool result event
    pub fn tool_result(
        author: Author,
        tool_name: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::new(
            author,
            vec![Part::ToolResult {
                tool_name: tool_name.into(),
                payload,
            }],
        )
    }

    /// Iterate over the text parts in emission order
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            Part::Text { content } => Some(content.as_str()),
            _ => None,
        })
    }

    /// Whether any part is a tool call
    pub fn has_tool_call(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, Part::ToolCall { .. }))
    }
}

/// A tool call requested by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke
    pub name: String,
    /// JSON arguments for the tool
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Get a string argument by key
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

/// Definition of a tool that can be offered to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Type of tool (always "function" for now)
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function details
    pub function: FunctionDefinition,
}

/// Function definition within a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function
    pub name: String,
    /// Description of what the function does
    pub description: String,
    /// JSON Schema for the parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new function tool definition
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }

    /// Name of the described function
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// Result of a synchronous tool run
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// Name of the tool that was executed
    pub tool_name: String,
    /// Whether the execution was successful
    pub success: bool,
    /// Human-readable output (an error description on failure)
    pub output: String,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(tool_name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            output: output.into(),
        }
    }

    /// Create a failed result
    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            output: error.into(),
        }
    }

    /// Payload stored in a `ToolResult` part
    pub fn payload(&self) -> serde_json::Value {
        serde_json::Value::String(self.output.clone())
    }
}

/// How a tool reports back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Exactly one result
    Sync,
    /// A sequence of progress payloads ending in a terminal one
    Streaming,
}

/// Status tag of a streaming payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Error,
}

impl ProgressStatus {
    /// Whether this status ends a stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressStatus::Completed | ProgressStatus::Failed | ProgressStatus::Error
        )
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressStatus::Pending => write!(f, "pending"),
            ProgressStatus::Running => write!(f, "running"),
            ProgressStatus::Completed => write!(f, "completed"),
            ProgressStatus::Failed => write!(f, "failed"),
            ProgressStatus::Error => write!(f, "error"),
        }
    }
}

/// One payload of a streaming tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolProgress {
    pub status: ProgressStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ToolProgress {
    pub fn running(line: impl Into<String>) -> Self {
        Self {
            status: ProgressStatus::Running,
            message: Some(line.into()),
        }
    }

    pub fn completed(message: impl Into<String>) -> Self {
        Self {
            status: ProgressStatus::Completed,
            message: Some(message.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ProgressStatus::Failed,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ProgressStatus::Error,
            message: Some(message.into()),
        }
    }

    /// Payload stored in a `ToolResult` part
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_texts_skip_other_parts() {
        let event = Event::new(
            Author::agent("coder"),
            vec![
                Part::Text {
                    content: "first".to_string(),
                },
                Part::ToolCall {
                    tool_name: "ls".to_string(),
                    arguments: json!({}),
                },
                Part::Text {
                    content: "second".to_string(),
                },
            ],
        );

        let texts: Vec<&str> = event.texts().collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert!(event.has_tool_call());
    }

    #[test]
    fn test_part_serialization_is_tagged() {
        let part = Part::ToolResult {
            tool_name: "run_tests".to_string(),
            payload: json!({"status": "running"}),
        };
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["type"], "tool_result");
        assert_eq!(value["tool_name"], "run_tests");
    }

    #[test]
    fn test_progress_payload_shape() {
        let payload = ToolProgress::running("1 passed").payload();
        assert_eq!(payload, json!({"status": "running", "message": "1 passed"}));
        assert!(!ProgressStatus::Running.is_terminal());
        assert!(ProgressStatus::Failed.is_terminal());
    }

    #[test]
    fn test_author_display() {
        assert_eq!(Author::agent("planner").to_string(), "planner");
        assert_eq!(Author::System.to_string(), "system");
        assert_eq!(Author::System.agent_name(), None);
    }
}
