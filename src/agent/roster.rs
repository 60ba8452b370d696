//! Agents and the fixed roster they run in
//!
//! An agent is a name, the tools it may call and an opaque policy that is
//! handed to the turn service. Agents are immutable once built.

use std::collections::HashSet;

use crate::core::{AgentSpec, Result, TeddyError};
use crate::tools::CapabilitySet;

/// File and directory tools shared by the working agents
const WORKSPACE_TOOLS: [&str; 9] = [
    "change_dir",
    "list_dir",
    "move_path",
    "print_working_dir",
    "make_dir",
    "create_empty_file",
    "read_file",
    "write_file",
    "install_package",
];

/// A participant in the loop
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    /// Unique name within the roster
    name: String,
    /// Short role summary
    description: String,
    /// Behavioral instruction passed to the turn service
    instruction: String,
    /// Tools this agent may invoke
    capabilities: CapabilitySet,
}

/// Builder for creating Agents
pub struct AgentBuilder {
    name: String,
    description: Option<String>,
    instruction: Option<String>,
    tools: Vec<String>,
}

impl AgentBuilder {
    /// Create a new builder with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            instruction: None,
            tools: Vec::new(),
        }
    }

    /// Set the role summary
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the instruction
    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    /// Allow a tool
    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.tools.push(tool.into());
        self
    }

    /// Allow several tools
    pub fn tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools.extend(tools.into_iter().map(Into::into));
        self
    }

    /// Build the Agent
    pub fn build(self) -> Result<Agent> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(TeddyError::invalid("agent name must not be empty"));
        }

        Ok(Agent {
            description: self
                .description
                .unwrap_or_else(|| format!("The '{}' agent.", name)),
            instruction: self.instruction.unwrap_or_default(),
            capabilities: CapabilitySet::new(self.tools),
            name,
        })
    }
}

impl Agent {
    /// Create a builder
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    /// Get the name of this agent
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }
}

impl TryFrom<&AgentSpec> for Agent {
    type Error = TeddyError;

    fn try_from(spec: &AgentSpec) -> Result<Self> {
        let mut builder = Agent::builder(&spec.name)
            .instruction(&spec.instruction)
            .tools(spec.tools.iter().cloned());
        if !spec.description.is_empty() {
            builder = builder.description(&spec.description);
        }
        builder.build()
    }
}

/// The fixed, ordered list of agents of a run
#[derive(Debug, Clone)]
pub struct Roster {
    agents: Vec<Agent>,
}

impl Roster {
    /// Validate and wrap an ordered list of agents
    pub fn new(agents: Vec<Agent>) -> Result<Self> {
        if agents.is_empty() {
            return Err(TeddyError::invalid("roster must contain at least one agent"));
        }

        let mut seen = HashSet::new();
        for agent in &agents {
            if !seen.insert(agent.name()) {
                return Err(TeddyError::invalid(format!(
                    "duplicate agent name '{}' in roster",
                    agent.name()
                )));
            }
        }

        Ok(Self { agents })
    }

    /// Build a roster from config entries
    pub fn from_specs(specs: &[AgentSpec]) -> Result<Self> {
        let agents = specs
            .iter()
            .map(Agent::try_from)
            .collect::<Result<Vec<_>>>()?;
        Self::new(agents)
    }

    /// The built-in test-driven roster: planner, coder, tester, aligner
    pub fn default_roster() -> Result<Self> {
        let planner = Agent::builder("planner")
            .description("Plans and tracks the test-driven development process.")
            .instruction(
                "Break the task into the next single, small step and say which agent should \
                 take it. Inspect the workspace and run the tests to judge progress. When the \
                 program is complete and every test passes, reply with the termination token \
                 and a short summary.",
            )
            .tools(["change_dir", "list_dir", "print_working_dir", "read_file", "run_tests"])
            .build()?;

        let coder = Agent::builder("coder")
            .description("Writes one unit of code at a time by calling write_file.")
            .instruction(
                "Implement exactly the step the planner asked for. Keep modules small and free \
                 of input() calls. Always write code to disk with write_file, never only in \
                 chat.",
            )
            .tools(WORKSPACE_TOOLS)
            .tools(["run_script", "run_tests"])
            .build()?;

        let tester = Agent::builder("tester")
            .description("Designs and runs tests for the coder's work.")
            .instruction(
                "Write pytest tests named test_* for the latest change, then run them with \
                 run_tests and report the result in one or two sentences.",
            )
            .tools(WORKSPACE_TOOLS)
            .tools(["run_script", "run_tests"])
            .build()?;

        let aligner = Agent::builder("aligner")
            .description("Breaks loops and gets the system unstuck.")
            .instruction(
                "Read the recent history. If the agents repeat themselves or drift from the \
                 task, name the problem and the concrete next step. Otherwise stay brief.",
            )
            .build()?;

        Self::new(vec![planner, coder, tester, aligner])
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Agent at a rotation index
    pub fn get(&self, index: usize) -> Option<&Agent> {
        self.agents.get(index)
    }

    /// Rotation index of a named agent
    pub fn position(&self, name: &str) -> Option<usize> {
        self.agents.iter().position(|a| a.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_builder() {
        let agent = Agent::builder("coder")
            .instruction("write code")
            .tools(["write_file", "read_file", "write_file"])
            .build()
            .unwrap();

        assert_eq!(agent.name(), "coder");
        assert_eq!(agent.instruction(), "write code");
        assert_eq!(agent.capabilities().len(), 2);
        assert!(agent.capabilities().contains("read_file"));
        assert_eq!(agent.description(), "The 'coder' agent.");
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(Agent::builder("  ").build().is_err());
    }

    #[test]
    fn test_roster_rejects_empty_and_duplicates() {
        assert!(matches!(
            Roster::new(vec![]),
            Err(TeddyError::InvalidConfiguration(_))
        ));

        let a = Agent::builder("a").build().unwrap();
        assert!(Roster::new(vec![a.clone(), a]).is_err());
    }

    #[test]
    fn test_default_roster() {
        let roster = Roster::default_roster().unwrap();
        assert_eq!(roster.names(), vec!["planner", "coder", "tester", "aligner"]);
        assert_eq!(roster.position("tester"), Some(2));
        assert!(roster.get(3).unwrap().capabilities().is_empty());
        assert!(roster.get(0).unwrap().capabilities().contains("run_tests"));
        assert!(!roster.get(0).unwrap().capabilities().contains("write_file"));
    }

    #[test]
    fn test_from_specs() {
        let specs = vec![
            AgentSpec {
                name: "solo".to_string(),
                description: String::new(),
                instruction: "do it".to_string(),
                tools: vec!["read_file".to_string()],
            },
            AgentSpec {
                name: "pair".to_string(),
                description: "helps".to_string(),
                instruction: String::new(),
                tools: vec![],
            },
        ];

        let roster = Roster::from_specs(&specs).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.get(1).unwrap().description(), "helps");
        assert!(roster.contains("solo"));
        assert!(!roster.contains("trio"));
    }
}
