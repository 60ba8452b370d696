//! Turn executor
//!
//! Runs one agent turn: pulls actions from the turn service, routes tool
//! calls through the gateway and yields every resulting event as soon as it
//! exists. A step that used a tool is followed by another step that sees the
//! results, until the agent stops calling tools or the step cap is reached.
//!
//! The turn runs on its own task and feeds a bounded channel, so the
//! consumer can stop at any event by dropping the stream. Dropping aborts
//! the task and with it any tool still in flight.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::agent::roster::Agent;
use crate::agent::transfer::TransferRequest;
use crate::core::{Author, Event, ToolCall};
use crate::llm::{AgentAction, TurnRequest, TurnService};
use crate::tools::{Invocation, ToolGateway};

const CHANNEL_CAPACITY: usize = 32;
pub(crate) const DEFAULT_MAX_STEPS: usize = 8;

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Completed,
    /// The turn ended early on a service fault or timeout
    CompletedWithError,
}

/// Terminal summary of a turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Agent that took the turn
    pub agent: String,
    /// Requested handoff, last one wins
    pub transfer: Option<TransferRequest>,
    pub status: TurnStatus,
}

impl TurnOutcome {
    fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            transfer: None,
            status: TurnStatus::Completed,
        }
    }
}

/// Item of a turn stream: events, then exactly one outcome
#[derive(Debug, Clone)]
pub enum TurnItem {
    Event(Event),
    Finished(TurnOutcome),
}

/// Event stream of a running turn
///
/// Dropping it cancels the turn.
pub struct TurnStream {
    inner: ReceiverStream<TurnItem>,
    task: JoinHandle<()>,
}

impl Stream for TurnStream {
    type Item = TurnItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<TurnItem>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for TurnStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The consumer dropped the stream
struct Hangup;

/// Executes agent turns against a service and a gateway
#[derive(Clone)]
pub struct TurnExecutor {
    service: Arc<dyn TurnService>,
    gateway: Arc<ToolGateway>,
    /// Roster names, used to spot peers invoked as tools
    peers: Arc<Vec<String>>,
    turn_timeout: Option<Duration>,
    max_steps: usize,
}

impl TurnExecutor {
    pub fn new(
        service: Arc<dyn TurnService>,
        gateway: Arc<ToolGateway>,
        peers: Vec<String>,
        turn_timeout: Option<Duration>,
    ) -> Self {
        Self {
            service,
            gateway,
            peers: Arc::new(peers),
            turn_timeout,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Cap the number of service steps per turn (at least one)
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Start a turn for `agent` over a snapshot of the history
    pub fn execute(&self, agent: &Agent, query: &str, history: &[Event]) -> TurnStream {
        let request = TurnRequest {
            agent: agent.clone(),
            query: query.to_string(),
            history: history.to_vec(),
            step: 0,
        };

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let executor = self.clone();
        let task = tokio::spawn(async move { executor.drive(request, tx).await });

        TurnStream {
            inner: ReceiverStream::new(rx),
            task,
        }
    }

    async fn drive(self, request: TurnRequest, tx: mpsc::Sender<TurnItem>) {
        let name = request.agent.name().to_string();
        let mut outcome = TurnOutcome::new(&name);

        let finished = match self.turn_timeout {
            Some(limit) => {
                let bounded =
                    tokio::time::timeout(limit, self.run_turn(request, &tx, &mut outcome)).await;
                match bounded {
                    Ok(finished) => finished,
                    Err(_) => {
                        warn!(agent = %name, ?limit, "turn timed out");
                        outcome.status = TurnStatus::CompletedWithError;
                        let fault = Event::text(
                            Author::System,
                            format!("Error: turn of {} timed out after {:?}.", name, limit),
                        );
                        send(&tx, TurnItem::Event(fault)).await
                    }
                }
            }
            None => self.run_turn(request, &tx, &mut outcome).await,
        };

        if finished.is_ok() {
            let _ = tx.send(TurnItem::Finished(outcome)).await;
        } else {
            debug!(agent = %name, "turn abandoned by consumer");
        }
    }

    async fn run_turn(
        &self,
        request: TurnRequest,
        tx: &mpsc::Sender<TurnItem>,
        outcome: &mut TurnOutcome,
    ) -> Result<(), Hangup> {
        let TurnRequest {
            agent,
            query,
            mut history,
            ..
        } = request;
        let author = Author::agent(agent.name());

        for step in 0..self.max_steps {
            let mut actions = self.service.run(TurnRequest {
                agent: agent.clone(),
                query: query.clone(),
                history: history.clone(),
                step,
            });
            let mut used_tool = false;

            while let Some(action) = actions.next().await {
                match action {
                    Ok(AgentAction::Text(content)) => {
                        if content.trim().is_empty() {
                            continue;
                        }
                        emit(tx, &mut history, Event::text(author.clone(), content)).await?;
                    }
                    Ok(AgentAction::Transfer(target)) => {
                        debug!(agent = %agent.name(), target = %target, "transfer requested");
                        outcome.transfer = Some(TransferRequest::directive(target));
                    }
                    Ok(AgentAction::ToolInvocation(call)) => {
                        emit(tx, &mut history, Event::tool_call(author.clone(), &call)).await?;
                        if self.peers.iter().any(|peer| *peer == call.name) {
                            warn!(agent = %agent.name(), peer = %call.name, "agent invoked a peer as a tool");
                            outcome.transfer = Some(TransferRequest::agent_as_tool(&call.name));
                            continue;
                        }
                        used_tool = true;
                        self.dispatch(&agent, &author, &call, tx, &mut history)
                            .await?;
                    }
                    Err(e) => {
                        warn!(agent = %agent.name(), error = %e, "turn service failed");
                        outcome.status = TurnStatus::CompletedWithError;
                        let fault = Event::text(
                            Author::System,
                            format!("Error: turn of {} failed. {}", agent.name(), e),
                        );
                        send(tx, TurnItem::Event(fault)).await?;
                        return Ok(());
                    }
                }
            }

            // a handoff or a tool-free reply ends the turn
            if !used_tool || outcome.transfer.is_some() {
                return Ok(());
            }
            debug!(agent = %agent.name(), step, "tool results fed back for another step");
        }

        warn!(agent = %agent.name(), max_steps = self.max_steps, "turn hit the step cap");
        Ok(())
    }

    /// Run one tool call and yield its result events
    async fn dispatch(
        &self,
        agent: &Agent,
        author: &Author,
        call: &ToolCall,
        tx: &mpsc::Sender<TurnItem>,
        history: &mut Vec<Event>,
    ) -> Result<(), Hangup> {
        let result = |payload: Value| Event::tool_result(author.clone(), &call.name, payload);

        match self
            .gateway
            .invoke(agent.name(), agent.capabilities(), call)
            .await
        {
            Ok(Invocation::Sync(tool_result)) => {
                emit(tx, history, result(tool_result.payload())).await
            }
            Ok(Invocation::Streaming(mut progress)) => {
                while let Some(payload) = progress.next().await {
                    emit(tx, history, result(payload.payload())).await?;
                }
                Ok(())
            }
            Err(e) => emit(tx, history, result(Value::String(format!("Error: {}", e)))).await,
        }
    }
}

/// Yield an agent event and keep it as context for the next step
async fn emit(
    tx: &mpsc::Sender<TurnItem>,
    history: &mut Vec<Event>,
    event: Event,
) -> Result<(), Hangup> {
    history.push(event.clone());
    send(tx, TurnItem::Event(event)).await
}

async fn send(tx: &mpsc::Sender<TurnItem>, item: TurnItem) -> Result<(), Hangup> {
    tx.send(item).await.map_err(|_| Hangup)
}
