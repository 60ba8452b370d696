//! Ollama turn service
//!
//! Runs each step of an agent turn as one tool-enabled chat request against
//! the Ollama API. The agent's policy, the task and the shared history are
//! rendered into chat messages; the reply is split into text, tool
//! invocations and transfer directives. On follow-up steps the history ends
//! with the agent's own calls and their results, which render as assistant
//! `tool_calls` and `tool` messages so the model can act on them.

use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::agent::{Agent, Roster};
use crate::core::{Author, Config, Part, Result, TeddyError, ToolCall, ToolDefinition};
use crate::llm::traits::{ActionStream, AgentAction, TurnRequest, TurnService};
use crate::tools::ToolGateway;

/// Function the model calls to hand the floor to a peer
pub const TRANSFER_TOOL: &str = "transfer_to_agent";

const DEBUG_PREVIEW_CHARS: usize = 500;

/// Ollama-backed turn service
#[derive(Clone)]
pub struct OllamaTurnService {
    client: Client,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    sentinel: String,
    /// Roster members as (name, description), in rotation order
    peers: Arc<Vec<(String, String)>>,
    gateway: Arc<ToolGateway>,
}

/// Ollama chat request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    stream: bool,
}

/// Ollama message format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

impl OllamaMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            tool_calls: None,
            tool_name: None,
        }
    }
}

/// Ollama tool call format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

/// Ollama function in tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Ollama generation options
#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Ollama chat response (non-streaming)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: OllamaMessage,
}

/// Ollama models list response
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

/// Model information
#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

impl OllamaTurnService {
    /// Create a service from configuration for the given roster
    pub fn from_config(config: &Config, gateway: Arc<ToolGateway>, roster: &Roster) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.ollama.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.ollama_url(),
            model: config.model.name.clone(),
            temperature: config.model.temperature,
            sentinel: config.run.sentinel.clone(),
            peers: Arc::new(
                roster
                    .iter()
                    .map(|a| (a.name().to_string(), a.description().to_string()))
                    .collect(),
            ),
            gateway,
        })
    }

    /// Model every agent runs on
    pub fn model(&self) -> &str {
        &self.model
    }

    /// List models installed on the server
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| self.connect_error(e))?;

        if !response.status().is_success() {
            return Err(TeddyError::ollama("Failed to list models"));
        }

        let models_response: ModelsResponse = response.json().await?;
        Ok(models_response.models.into_iter().map(|m| m.name).collect())
    }

    /// Fail early when the configured model is not installed
    pub async fn check_model(&self) -> Result<()> {
        let models = self.list_models().await?;
        let wanted = self.model.split(':').next();
        if models
            .iter()
            .any(|m| *m == self.model || m.split(':').next() == wanted)
        {
            Ok(())
        } else {
            Err(TeddyError::ModelNotFound(self.model.clone()))
        }
    }

    fn connect_error(&self, e: reqwest::Error) -> TeddyError {
        if e.is_connect() {
            TeddyError::ollama(format!(
                "Cannot connect to Ollama at {}. Is it running?",
                self.base_url
            ))
        } else {
            TeddyError::from(e)
        }
    }

    /// System message for an agent: role, instruction, peers and sentinel
    fn system_prompt(&self, agent: &Agent) -> String {
        let mut prompt = format!(
            "You are the '{}' agent. {}\n",
            agent.name(),
            agent.description()
        );
        if !agent.instruction().is_empty() {
            prompt.push_str(&format!("\n{}\n", agent.instruction()));
        }

        let others: Vec<String> = self
            .peers
            .iter()
            .filter(|(name, _)| name != agent.name())
            .map(|(name, description)| format!("- {}: {}", name, description))
            .collect();
        if !others.is_empty() {
            prompt.push_str(&format!(
                "\nYou work in a team with these agents:\n{}\n\
                 To hand the next turn to one of them, call {} with its name. \
                 Never call an agent as a tool.\n",
                others.join("\n"),
                TRANSFER_TOOL
            ));
        }

        prompt.push_str(&format!(
            "\nWhen the whole task is done and verified, write {} in your reply.",
            self.sentinel
        ));
        prompt
    }

    /// Permitted tools plus the transfer function
    fn tools_for(&self, agent: &Agent) -> Vec<ToolDefinition> {
        let mut tools = self.gateway.definitions_for(agent.capabilities());
        let targets: Vec<&str> = self
            .peers
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| *name != agent.name())
            .collect();
        if !targets.is_empty() {
            tools.push(ToolDefinition::function(
                TRANSFER_TOOL,
                "Transfer the next turn to another agent",
                json!({
                    "type": "object",
                    "properties": {
                        "agent_name": {
                            "type": "string",
                            "enum": targets,
                            "description": "Agent that should act next"
                        }
                    },
                    "required": ["agent_name"]
                }),
            ));
        }
        tools
    }

    /// Render the task and history from the acting agent's point of view
    fn render_messages(&self, request: &TurnRequest) -> Vec<OllamaMessage> {
        let me = request.agent.name();
        let mut messages = vec![
            OllamaMessage::new("system", self.system_prompt(&request.agent)),
            OllamaMessage::new("user", request.query.clone()),
        ];

        for event in &request.history {
            let own = event.author.agent_name() == Some(me);
            for part in &event.parts {
                messages.push(render_part(&event.author, own, part));
            }
        }
        messages
    }

    /// Send one chat request and split the reply into actions
    async fn respond(&self, request: TurnRequest) -> Result<Vec<AgentAction>> {
        let chat = ChatRequest {
            model: &self.model,
            messages: self.render_messages(&request),
            tools: self.tools_for(&request.agent),
            options: Some(OllamaOptions {
                temperature: self.temperature,
            }),
            stream: false,
        };

        let request_json = serde_json::to_string(&chat)?;
        debug!(
            agent = request.agent.name(),
            step = request.step,
            request = %preview(&request_json),
            "ollama request"
        );

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&chat)
            .send()
            .await
            .map_err(|e| self.connect_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 404 && error_text.contains("not found") {
                return Err(TeddyError::ModelNotFound(self.model.clone()));
            }

            return Err(TeddyError::ollama(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let response_text = response.text().await?;
        debug!(agent = request.agent.name(), response = %preview(&response_text), "ollama response");

        let chat_response: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| TeddyError::ollama(format!("Failed to parse response: {}", e)))?;

        Ok(to_actions(chat_response.message))
    }
}

impl TurnService for OllamaTurnService {
    fn run(&self, request: TurnRequest) -> ActionStream {
        let service = self.clone();
        Box::pin(
            stream::once(async move { service.respond(request).await }).flat_map(|reply| {
                match reply {
                    Ok(actions) => stream::iter(actions.into_iter().map(Ok)).left_stream(),
                    Err(e) => stream::iter(vec![Err(e)]).right_stream(),
                }
            }),
        )
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Render one event part as a chat message
fn render_part(author: &Author, own: bool, part: &Part) -> OllamaMessage {
    match (own, part) {
        (true, Part::Text { content }) => OllamaMessage::new("assistant", content.clone()),
        (true, Part::ToolCall { tool_name, arguments }) => OllamaMessage {
            tool_calls: Some(vec![OllamaToolCall {
                function: OllamaFunction {
                    name: tool_name.clone(),
                    arguments: arguments.clone(),
                },
            }]),
            ..OllamaMessage::new("assistant", "")
        },
        (true, Part::ToolResult { tool_name, payload }) => OllamaMessage {
            tool_name: Some(tool_name.clone()),
            ..OllamaMessage::new("tool", payload_text(payload))
        },
        (false, Part::Text { content }) => {
            OllamaMessage::new("user", format!("For context: [{}] said: {}", author, content))
        }
        (false, Part::ToolCall { tool_name, arguments }) => OllamaMessage::new(
            "user",
            format!(
                "For context: [{}] called tool `{}` with parameters: {}",
                author, tool_name, arguments
            ),
        ),
        (false, Part::ToolResult { tool_name, payload }) => OllamaMessage::new(
            "user",
            format!(
                "For context: [{}] `{}` tool returned result: {}",
                author,
                tool_name,
                payload_text(payload)
            ),
        ),
    }
}

fn payload_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Split a reply into text, transfers and tool invocations
fn to_actions(message: OllamaMessage) -> Vec<AgentAction> {
    let mut actions = Vec::new();
    if !message.content.trim().is_empty() {
        actions.push(AgentAction::Text(message.content));
    }

    for call in message.tool_calls.unwrap_or_default() {
        let OllamaFunction { name, arguments } = call.function;
        if name == TRANSFER_TOOL {
            let target = arguments
                .get("agent_name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            actions.push(AgentAction::Transfer(target));
        } else {
            actions.push(AgentAction::ToolInvocation(ToolCall::new(name, arguments)));
        }
    }
    actions
}

fn preview(text: &str) -> String {
    if text.chars().count() > DEBUG_PREVIEW_CHARS {
        let head: String = text.chars().take(DEBUG_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Event;
    use crate::tools::Workspace;

    fn history(events: &[(&str, Part)]) -> Vec<Event> {
        events
            .iter()
            .map(|(author, part)| Event::new(Author::agent(*author), vec![part.clone()]))
            .collect()
    }

    fn service(dir: &tempfile::TempDir) -> OllamaTurnService {
        let ws = Arc::new(Workspace::open(dir.path()).unwrap());
        let gateway = Arc::new(ToolGateway::with_defaults(ws, &Default::default()));
        let roster = Roster::default_roster().unwrap();
        OllamaTurnService::from_config(&Config::default(), gateway, &roster).unwrap()
    }

    fn planner() -> Agent {
        Roster::default_roster().unwrap().get(0).unwrap().clone()
    }

    #[test]
    fn test_system_prompt_names_peers_and_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = service(&dir).system_prompt(&planner());

        assert!(prompt.starts_with("You are the 'planner' agent."));
        assert!(prompt.contains("- coder:"));
        assert!(!prompt.contains("- planner:"));
        assert!(prompt.contains("TASK_COMPLETE"));
    }

    #[test]
    fn test_tools_include_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let tools = service(&dir).tools_for(&planner());
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();

        assert!(names.contains(&"run_tests"));
        assert!(!names.contains(&"write_file"));
        assert_eq!(names.last(), Some(&TRANSFER_TOOL));
    }

    #[test]
    fn test_render_messages_by_perspective() {
        let dir = tempfile::tempdir().unwrap();
        let request = TurnRequest {
            agent: planner(),
            query: "build a calculator".to_string(),
            history: history(&[
                (
                    "planner",
                    Part::Text {
                        content: "coder, start".to_string(),
                    },
                ),
                (
                    "coder",
                    Part::ToolResult {
                        tool_name: "write_file".to_string(),
                        payload: json!("Content written to calc.py"),
                    },
                ),
            ]),
            step: 0,
        };

        let messages = service(&dir).render_messages(&request);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].content, "build a calculator");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[3].role, "user");
        assert!(messages[3].content.contains("[coder] `write_file` tool returned result"));
    }

    #[test]
    fn test_follow_up_step_ends_with_own_results() {
        let dir = tempfile::tempdir().unwrap();
        let request = TurnRequest {
            agent: planner(),
            query: "build a calculator".to_string(),
            history: history(&[
                (
                    "planner",
                    Part::ToolCall {
                        tool_name: "read_file".to_string(),
                        arguments: json!({"path": "plan.md"}),
                    },
                ),
                (
                    "planner",
                    Part::ToolResult {
                        tool_name: "read_file".to_string(),
                        payload: json!("1. add\n2. subtract"),
                    },
                ),
            ]),
            step: 1,
        };

        let messages = service(&dir).render_messages(&request);
        assert_eq!(messages.len(), 4);
        assert!(messages[2].tool_calls.is_some());
        assert_eq!(messages[3].role, "tool");
        assert_eq!(messages[3].tool_name.as_deref(), Some("read_file"));
        assert_eq!(messages[3].content, "1. add\n2. subtract");
    }

    #[test]
    fn test_reply_to_actions() {
        let reply: ChatResponse = serde_json::from_value(json!({
            "message": {
                "role": "assistant",
                "content": "Writing the module now.",
                "tool_calls": [
                    {"function": {"name": "write_file", "arguments": {"path": "a.py", "content": "x = 1"}}},
                    {"function": {"name": "transfer_to_agent", "arguments": {"agent_name": "tester"}}}
                ]
            }
        }))
        .unwrap();

        let actions = to_actions(reply.message);
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0], AgentAction::text("Writing the module now."));
        assert!(matches!(&actions[1], AgentAction::ToolInvocation(c) if c.name == "write_file"));
        assert_eq!(actions[2], AgentAction::transfer("tester"));
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(DEBUG_PREVIEW_CHARS + 10);
        assert!(preview(&long).ends_with("..."));
        assert_eq!(preview("short"), "short");
    }
}
