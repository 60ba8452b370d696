//! Round-robin scheduler
//!
//! Drives the top-level loop: picks the agent that owns the floor, runs its
//! turn, appends every event to the session and checks it for the
//! completion sentinel. Between turns it honors a valid transfer or rotates
//! to the next roster entry. The run ends on the sentinel or when the
//! iteration budget is spent.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::agent::executor::{
    TurnExecutor, TurnItem, TurnOutcome, TurnStatus, DEFAULT_MAX_STEPS,
};
use crate::agent::loop_state::LoopState;
use crate::agent::roster::{Agent, Roster};
use crate::agent::session::Session;
use crate::agent::termination::TerminationDetector;
use crate::agent::transfer::TransferResolver;
use crate::core::config::RunConfig;
use crate::core::{Author, Event, Result, TeddyError};
use crate::llm::TurnService;
use crate::tools::ToolGateway;

/// Callback that sees every appended event
pub type EventObserver = Box<dyn Fn(&Event) + Send + Sync>;

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// An event carried the sentinel
    TaskComplete,
    /// The iteration budget ran out
    BudgetExhausted,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminationReason::TaskComplete => write!(f, "task complete"),
            TerminationReason::BudgetExhausted => write!(f, "iteration budget exhausted"),
        }
    }
}

/// Result of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub reason: TerminationReason,
    /// Turns taken, including a turn cut short by the sentinel
    pub turns: usize,
    pub session: Session,
}

/// Round-robin multi-agent scheduler
pub struct RoundRobinScheduler {
    service: Arc<dyn TurnService>,
    gateway: Arc<ToolGateway>,
    detector: TerminationDetector,
    turn_timeout: Option<Duration>,
    max_steps: usize,
    observer: Option<EventObserver>,
}

impl RoundRobinScheduler {
    /// Create a scheduler with the default sentinel and no turn timeout
    pub fn new(service: Arc<dyn TurnService>, gateway: Arc<ToolGateway>) -> Self {
        Self {
            service,
            gateway,
            detector: TerminationDetector::default(),
            turn_timeout: None,
            max_steps: DEFAULT_MAX_STEPS,
            observer: None,
        }
    }

    /// Create a scheduler from the run configuration
    pub fn from_config(
        service: Arc<dyn TurnService>,
        gateway: Arc<ToolGateway>,
        config: &RunConfig,
    ) -> Self {
        Self::new(service, gateway)
            .with_sentinel(&config.sentinel)
            .with_turn_timeout(config.turn_timeout())
            .with_max_steps(config.max_steps_per_turn)
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.detector = TerminationDetector::new(sentinel);
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.turn_timeout = timeout;
        self
    }

    /// Cap the model calls one turn may make while it keeps using tools
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Observe events as they are appended
    pub fn with_observer(mut self, observer: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn sentinel(&self) -> &str {
        self.detector.sentinel()
    }

    /// Run the roster on a task until completion or budget exhaustion
    pub async fn run(
        &self,
        roster: Vec<Agent>,
        max_iterations: usize,
        initial_query: &str,
    ) -> Result<RunReport> {
        if max_iterations == 0 {
            return Err(TeddyError::invalid("max_iterations must be greater than 0"));
        }
        let roster = Roster::new(roster)?;
        let executor = TurnExecutor::new(
            self.service.clone(),
            self.gateway.clone(),
            roster.names(),
            self.turn_timeout,
        )
        .with_max_steps(self.max_steps);

        let first = roster.get(0).map(|a| a.name().to_string()).unwrap_or_default();
        let mut session = Session::new(
            initial_query,
            LoopState::new(max_iterations, roster.len()),
            first,
        );

        info!(
            agents = ?roster.names(),
            max_iterations,
            service = self.service.name(),
            "run started"
        );

        let reason = loop {
            if !session.state().should_continue() {
                break TerminationReason::BudgetExhausted;
            }

            let index = session.state().active_index;
            let Some(agent) = roster.get(index) else {
                return Err(TeddyError::Other(format!(
                    "rotation index {} outside roster",
                    index
                )));
            };
            info!(
                agent = agent.name(),
                iteration = session.iteration() + 1,
                remaining = session.state().remaining(),
                "turn started"
            );

            let mut turn = executor.execute(agent, session.query(), session.history());
            let mut outcome = None;
            let mut completed = false;

            while let Some(item) = turn.next().await {
                match item {
                    TurnItem::Event(event) => {
                        let hit = self.detector.scan(&event);
                        self.append(&mut session, event);
                        if hit {
                            completed = true;
                            break;
                        }
                    }
                    TurnItem::Finished(done) => {
                        outcome = Some(done);
                        break;
                    }
                }
            }
            // cancels whatever the turn still had in flight
            drop(turn);

            if completed {
                session.state_mut().end_turn();
                info!(agent = agent.name(), "sentinel found, stopping");
                break TerminationReason::TaskComplete;
            }

            let outcome = match outcome {
                Some(outcome) => outcome,
                None => {
                    warn!(agent = agent.name(), "turn ended without an outcome");
                    self.append(
                        &mut session,
                        Event::text(
                            Author::System,
                            format!("Error: turn of {} ended unexpectedly.", agent.name()),
                        ),
                    );
                    TurnOutcome {
                        agent: agent.name().to_string(),
                        transfer: None,
                        status: TurnStatus::CompletedWithError,
                    }
                }
            };

            self.advance(&mut session, &roster, &outcome);
        };

        info!(
            reason = %reason,
            turns = session.iteration(),
            events = session.len(),
            "run finished"
        );

        Ok(RunReport {
            reason,
            turns: session.iteration(),
            session,
        })
    }

    /// Apply the outcome of a finished turn and pick the next agent
    fn advance(&self, session: &mut Session, roster: &Roster, outcome: &TurnOutcome) {
        if let Some(warning) = TransferResolver::diagnostic(outcome, roster) {
            self.append(session, warning);
        }

        let next = match TransferResolver::resolve(outcome, roster) {
            Some(target) => {
                info!(from = %outcome.agent, to = %target, "transfer");
                roster.position(&target)
            }
            None => {
                if let Some(request) = &outcome.transfer {
                    debug!(from = %outcome.agent, target = %request.target, "transfer ignored");
                }
                None
            }
        };

        session.state_mut().next_turn(next);
        let active = session.state().active_index;
        if let Some(agent) = roster.get(active) {
            session.set_active_agent(agent.name());
        }
    }

    fn append(&self, session: &mut Session, event: Event) {
        if let Some(observer) = &self.observer {
            observer(&event);
        }
        session.append(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Result as TeddyResult;
    use crate::llm::{ActionStream, AgentAction, TurnRequest};
    use crate::tools::Workspace;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves one scripted turn per call, keyed by agent
    #[derive(Default)]
    struct Script {
        turns: Mutex<HashMap<String, Vec<Vec<AgentAction>>>>,
        calls: Mutex<Vec<(String, usize)>>,
    }

    impl Script {
        fn turn(self, agent: &str, actions: Vec<AgentAction>) -> Self {
            self.turns
                .lock()
                .unwrap()
                .entry(agent.to_string())
                .or_default()
                .push(actions);
            self
        }

        fn calls(&self) -> Vec<(String, usize)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl TurnService for Script {
        fn run(&self, request: TurnRequest) -> ActionStream {
            let name = request.agent.name().to_string();
            self.calls
                .lock()
                .unwrap()
                .push((name.clone(), request.history.len()));
            let mut turns = self.turns.lock().unwrap();
            let actions: Vec<TeddyResult<AgentAction>> = match turns.get_mut(&name) {
                Some(queue) if !queue.is_empty() => queue.remove(0).into_iter().map(Ok).collect(),
                _ => vec![Ok(AgentAction::text(format!("{} idle", name)))],
            };
            Box::pin(futures::stream::iter(actions))
        }

        fn name(&self) -> &str {
            "script"
        }
    }

    fn agents(names: &[&str]) -> Vec<Agent> {
        names
            .iter()
            .map(|n| Agent::builder(*n).build().unwrap())
            .collect()
    }

    fn scheduler(script: Arc<Script>, dir: &tempfile::TempDir) -> RoundRobinScheduler {
        let ws = Arc::new(Workspace::open(dir.path()).unwrap());
        RoundRobinScheduler::new(script, Arc::new(ToolGateway::new(ws)))
    }

    #[tokio::test]
    async fn test_rotation_order() {
        let dir = tempfile::tempdir().unwrap();
        let script = Arc::new(Script::default());
        let report = scheduler(script.clone(), &dir)
            .run(agents(&["a", "b", "c"]), 5, "go")
            .await
            .unwrap();

        let order: Vec<String> = script.calls().into_iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec!["a", "b", "c", "a", "b"]);
        assert_eq!(report.reason, TerminationReason::BudgetExhausted);
        assert_eq!(report.turns, 5);
    }

    #[tokio::test]
    async fn test_transfer_jumps_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let script = Arc::new(Script::default().turn("a", vec![AgentAction::transfer("c")]));
        scheduler(script.clone(), &dir)
            .run(agents(&["a", "b", "c"]), 3, "go")
            .await
            .unwrap();

        let order: Vec<String> = script.calls().into_iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec!["a", "c", "a"]);
    }

    #[tokio::test]
    async fn test_sentinel_stops_mid_turn() {
        let dir = tempfile::tempdir().unwrap();
        let script = Arc::new(Script::default().turn(
            "a",
            vec![
                AgentAction::text("done: TASK_COMPLETE"),
                AgentAction::text("this is never recorded"),
            ],
        ));
        let report = scheduler(script.clone(), &dir)
            .run(agents(&["a", "b"]), 10, "go")
            .await
            .unwrap();

        assert_eq!(report.reason, TerminationReason::TaskComplete);
        assert_eq!(report.turns, 1);
        assert_eq!(report.session.len(), 1);
        assert_eq!(script.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_start() {
        let dir = tempfile::tempdir().unwrap();
        let script = Arc::new(Script::default());
        let s = scheduler(script.clone(), &dir);

        assert!(matches!(
            s.run(vec![], 3, "go").await,
            Err(TeddyError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            s.run(agents(&["a"]), 0, "go").await,
            Err(TeddyError::InvalidConfiguration(_))
        ));
        assert!(script.calls().is_empty());
    }

    #[tokio::test]
    async fn test_observer_sees_events_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let script = Arc::new(Script::default());

        let report = scheduler(script, &dir)
            .with_observer(move |event| {
                let text = event.texts().next().unwrap_or_default().to_string();
                sink.lock().unwrap().push(text);
            })
            .run(agents(&["a", "b"]), 2, "go")
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["a idle", "b idle"]);
        assert_eq!(report.session.len(), 2);
    }
}
