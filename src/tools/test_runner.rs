//! Streaming test runner
//!
//! Runs the configured test command and forwards each stdout line as a
//! `running` payload the moment the child writes it. A dedicated reader task
//! pumps lines into a bounded channel; the consumer sees a finite stream that
//! always ends with exactly one `completed`, `failed` or `error` payload.
//!
//! Dropping the stream early closes the channel. The reader task watches for
//! that while it waits on the child, so even a silent child is killed at once.

use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::core::{ExecutionMode, ToolCall, ToolDefinition, ToolProgress};
use crate::tools::gateway::{Invocation, ProgressStream, Tool};
use crate::tools::workspace::Workspace;

const CHANNEL_CAPACITY: usize = 64;
const STDERR_TAIL_LINES: usize = 20;

/// Tool that runs the test suite and streams its output
pub struct TestRunnerTool {
    command: Vec<String>,
    timeout: Option<Duration>,
}

impl TestRunnerTool {
    pub fn new(command: Vec<String>, timeout: Option<Duration>) -> Self {
        Self { command, timeout }
    }

    /// Start the test command for `dir` and return its progress stream
    pub fn start(&self, dir: &str, workspace: &Workspace) -> ProgressStream {
        let full = workspace.resolve(dir);
        if !full.exists() {
            return single(ToolProgress::error(format!(
                "Error: The tests directory {} does not exist.",
                dir
            )));
        }
        if !full.is_dir() {
            return single(ToolProgress::error(format!(
                "Error: The tests path {} is not a directory.",
                dir
            )));
        }

        let Some((program, args)) = self.command.split_first() else {
            return single(ToolProgress::error("Error: no test command configured"));
        };

        let spawned = Command::new(program)
            .args(args)
            .arg(dir)
            .current_dir(workspace.cwd())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match spawned {
            Ok(child) => child,
            Err(e) => {
                return single(ToolProgress::error(format!(
                    "Error: Could not run tests. {}",
                    e
                )))
            }
        };

        debug!(program = %program, dir, "test runner started");

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(pump(child, tx, self.timeout));
        Box::pin(ReceiverStream::new(rx))
    }
}

fn single(payload: ToolProgress) -> ProgressStream {
    Box::pin(futures::stream::iter(vec![payload]))
}

/// Forward stdout lines; returns false once the consumer has gone away
async fn forward_lines<R>(reader: R, tx: &mpsc::Sender<ToolProgress>) -> std::io::Result<bool>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        let next = tokio::select! {
            next = lines.next_line() => next?,
            _ = tx.closed() => return Ok(false),
        };
        let Some(line) = next else {
            return Ok(true);
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if tx.send(ToolProgress::running(line)).await.is_err() {
            return Ok(false);
        }
    }
}

/// Keep only the last few stderr lines
async fn stderr_tail<R>(reader: R) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into_iter().collect()
}

enum Finish {
    Exited(ExitStatus),
    Failed(std::io::Error),
    ConsumerGone,
    TimedOut,
}

async fn pump(mut child: Child, tx: mpsc::Sender<ToolProgress>, timeout: Option<Duration>) {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take().map(|err| tokio::spawn(stderr_tail(err)));

    let finish = {
        let run = async {
            if let Some(stdout) = stdout {
                match forward_lines(stdout, &tx).await {
                    Ok(true) => {}
                    Ok(false) => return Finish::ConsumerGone,
                    Err(e) => return Finish::Failed(e),
                }
            }
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => Finish::Exited(status),
                    Err(e) => Finish::Failed(e),
                },
                _ = tx.closed() => Finish::ConsumerGone,
            }
        };

        match timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .unwrap_or(Finish::TimedOut),
            None => run.await,
        }
    };

    let terminal = match finish {
        Finish::Exited(status) if status.success() => ToolProgress::completed("All tests passed."),
        Finish::Exited(status) => {
            let mut message = match status.code() {
                Some(code) => format!("Tests failed with return code {}.", code),
                None => "Tests were terminated by a signal.".to_string(),
            };
            if let Some(handle) = stderr {
                let tail = handle.await.unwrap_or_default();
                if !tail.is_empty() {
                    message.push('\n');
                    message.push_str(&tail.join("\n"));
                }
            }
            ToolProgress::failed(message)
        }
        Finish::Failed(e) => {
            let _ = child.kill().await;
            ToolProgress::error(format!("Error: Could not run tests. {}", e))
        }
        Finish::TimedOut => {
            let _ = child.kill().await;
            let limit = timeout.unwrap_or_default();
            ToolProgress::error(format!("Error: Tests timed out after {:?}.", limit))
        }
        Finish::ConsumerGone => {
            let _ = child.kill().await;
            debug!("test runner output abandoned, child killed");
            return;
        }
    };

    let _ = tx.send(terminal).await;
}

#[async_trait]
impl Tool for TestRunnerTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "run_tests",
            "Run the test suite in a directory, streaming its output line by line",
            json!({
                "type": "object",
                "properties": {
                    "dir": {
                        "type": "string",
                        "description": "Directory containing the tests (defaults to the current one)"
                    }
                }
            }),
        )
    }

    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Streaming
    }

    async fn invoke(&self, call: &ToolCall, workspace: &Workspace) -> Invocation {
        let dir = call
            .get_string("dir")
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| ".".to_string());
        Invocation::Streaming(self.start(&dir, workspace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProgressStatus;
    use futures::StreamExt;

    fn shell(script: &str) -> Vec<String> {
        // the requested dir is appended and lands in $1
        vec![
            "sh".to_string(),
            "-c".to_string(),
            script.to_string(),
            "sh".to_string(),
        ]
    }

    #[tokio::test]
    async fn test_lines_then_completed() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        let tool = TestRunnerTool::new(shell("echo '1 passed'"), None);

        let payloads: Vec<ToolProgress> = tool.start(".", &ws).collect().await;
        assert_eq!(
            payloads,
            vec![
                ToolProgress::running("1 passed"),
                ToolProgress::completed("All tests passed."),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_failed_with_stderr_tail() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        let tool = TestRunnerTool::new(
            shell("echo 'test_a FAILED'; echo 'assert 1 == 2' >&2; exit 1"),
            None,
        );

        let payloads: Vec<ToolProgress> = tool.start(".", &ws).collect().await;
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0], ToolProgress::running("test_a FAILED"));
        assert_eq!(payloads[1].status, ProgressStatus::Failed);
        let message = payloads[1].message.as_deref().unwrap();
        assert!(message.starts_with("Tests failed with return code 1."));
        assert!(message.contains("assert 1 == 2"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_single_error() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        let tool = TestRunnerTool::new(shell("exit 0"), None);

        let payloads: Vec<ToolProgress> = tool.start("tests", &ws).collect().await;
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].status, ProgressStatus::Error);
    }

    #[tokio::test]
    async fn test_unknown_program_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        let tool = TestRunnerTool::new(vec!["definitely-not-a-real-binary-xyz".to_string()], None);

        let payloads: Vec<ToolProgress> = tool.start(".", &ws).collect().await;
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].status, ProgressStatus::Error);
        assert!(payloads[0]
            .message
            .as_deref()
            .unwrap()
            .starts_with("Error: Could not run tests."));
    }

    #[tokio::test]
    async fn test_timeout_ends_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        let tool = TestRunnerTool::new(
            shell("echo started; sleep 5"),
            Some(Duration::from_millis(300)),
        );

        let payloads: Vec<ToolProgress> = tool.start(".", &ws).collect().await;
        assert_eq!(payloads.first(), Some(&ToolProgress::running("started")));
        let last = payloads.last().unwrap();
        assert_eq!(last.status, ProgressStatus::Error);
        assert!(last.message.as_deref().unwrap().contains("timed out after 300ms"));
    }

    #[tokio::test]
    async fn test_first_line_arrives_before_process_exits() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        let tool = TestRunnerTool::new(shell("echo early; sleep 5; echo late"), None);

        let mut stream = tool.start(".", &ws);
        let first = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("first line should not wait for the child to exit");
        assert_eq!(first, Some(ToolProgress::running("early")));
        // abandoning the rest must not hang or panic
        drop(stream);
    }

    #[tokio::test]
    async fn test_dropped_stream_kills_silent_child() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        let tool = TestRunnerTool::new(shell("echo early; sleep 1; touch still_alive"), None);

        let mut stream = tool.start(".", &ws);
        let first = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .unwrap();
        assert_eq!(first, Some(ToolProgress::running("early")));
        drop(stream);

        // the child writes nothing more, so only the closed channel can stop it
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(!ws.root().join("still_alive").exists());
    }

    #[tokio::test]
    async fn test_dir_argument_is_passed_to_command() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path()).unwrap();
        std::fs::create_dir(ws.root().join("tests")).unwrap();
        let tool = TestRunnerTool::new(shell("echo \"dir=$1\""), None);

        let call = ToolCall::new("run_tests", json!({"dir": "tests"}));
        let Invocation::Streaming(stream) = tool.invoke(&call, &ws).await else {
            panic!("expected a stream");
        };
        let payloads: Vec<ToolProgress> = stream.collect().await;
        assert_eq!(payloads[0], ToolProgress::running("dir=tests"));
    }
}
