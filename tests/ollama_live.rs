//! Live runs against a local Ollama server
//!
//! Ignored by default. Run with `cargo test --test ollama_live -- --ignored`
//! once the configured model is pulled.

use std::sync::Arc;
use std::time::{Duration, Instant};

use teddy::agent::{RoundRobinScheduler, Roster};
use teddy::core::Config;
use teddy::llm::OllamaTurnService;
use teddy::tools::{ToolGateway, Workspace};
use tokio::time::timeout;

/// Build a scheduler over a temporary workspace, or skip when Ollama is down
async fn live_setup(
    dir: &tempfile::TempDir,
    max_iterations: usize,
) -> Option<(RoundRobinScheduler, Roster, Config)> {
    let mut config = Config::default();
    config.run.max_iterations = max_iterations;
    config.run.turn_timeout_secs = Some(180);

    let workspace = Arc::new(Workspace::open(dir.path()).ok()?);
    // the temp dir takes the marker with it
    workspace.install_marker(&config.tools.marker_file, false).ok()?;
    let gateway = Arc::new(ToolGateway::with_defaults(workspace, &config.tools));
    let roster = Roster::default_roster().ok()?;
    let service = OllamaTurnService::from_config(&config, gateway.clone(), &roster).ok()?;

    if let Err(e) = timeout(Duration::from_secs(10), service.check_model())
        .await
        .unwrap_or_else(|_| Err(teddy::TeddyError::ollama("timed out")))
    {
        eprintln!("Skipping live test: {}", e);
        return None;
    }

    let scheduler = RoundRobinScheduler::from_config(Arc::new(service), gateway, &config.run);
    Some((scheduler, roster, config))
}

#[tokio::test]
#[ignore] // Requires a running Ollama with the configured model
async fn test_short_run_produces_history() {
    let dir = tempfile::tempdir().unwrap();
    let Some((scheduler, roster, config)) = live_setup(&dir, 4).await else {
        return;
    };

    let started = Instant::now();
    let report = scheduler
        .run(
            roster.iter().cloned().collect(),
            config.run.max_iterations,
            "Write hello.py that prints 'hello' and a pytest test for it.",
        )
        .await
        .expect("run should not fail");

    println!(
        "{} turn(s), {} event(s) in {:.1}s ({})",
        report.turns,
        report.session.len(),
        started.elapsed().as_secs_f64(),
        report.reason
    );
    assert!(report.turns >= 1 && report.turns <= 4);
    assert!(!report.session.is_empty());
}
