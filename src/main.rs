//! Teddy - Round-Robin Multi-Agent Coding Loop
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use teddy::agent::{RoundRobinScheduler, Roster};
use teddy::cli;
use teddy::llm::OllamaTurnService;
use teddy::tools::{ToolGateway, Workspace};
use teddy::Config;
use tracing::info;

const DEFAULT_TASK: &str = "Build a program that allows me to track my spending by exposing an \
    interface where I can submit new transactions via the command line. These transactions are \
    captured and added to the list of transactions upon which statistics will be calculated and \
    a report will be generated. In testing, generate dummy data and ensure each step of the code \
    works. For persistence, save the transactions in a csv on the hard drive. Make your code very \
    modular, and have 100% test coverage writing python pytest tests as test_* in the root \
    directory such that the pytest command will pick them up. Code should never contain input \
    statements, and should be able to run without any user input.";

/// Teddy - Round-Robin Multi-Agent Coding Loop
#[derive(Parser, Debug)]
#[command(name = "teddy")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Task for the agents to build
    task: Option<String>,

    /// Model used by every agent
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Maximum number of agent turns
    #[arg(long, short = 'n')]
    max_iterations: Option<usize>,

    /// Maximum model calls within one turn while an agent keeps using tools
    #[arg(long)]
    max_steps: Option<usize>,

    /// Directory the tools operate in
    #[arg(long, short = 'w')]
    workdir: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,

    /// Leave the test marker file in place after the run
    #[arg(long)]
    keep_marker: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = match &args.config {
        Some(path) => {
            let _ = dotenvy::dotenv();
            Config::load_from(path)?
        }
        None => Config::load(),
    };

    // Apply CLI overrides
    if let Some(model) = args.model {
        config.model.name = model;
    }
    if let Some(max_iterations) = args.max_iterations {
        config.run.max_iterations = max_iterations;
    }
    if let Some(max_steps) = args.max_steps {
        config.run.max_steps_per_turn = max_steps;
    }
    if let Some(workdir) = args.workdir {
        config.tools.workdir = workdir;
    }
    if args.debug {
        config.run.debug = true;
    }
    if args.keep_marker {
        config.tools.cleanup_marker = false;
    }
    config.validate()?;

    init_logging(config.run.debug)?;

    let workspace = Arc::new(Workspace::open(&config.tools.workdir)?);
    let gateway = Arc::new(ToolGateway::with_defaults(workspace.clone(), &config.tools));
    let roster = if config.agents.is_empty() {
        Roster::default_roster()?
    } else {
        Roster::from_specs(&config.agents)?
    };

    let service = OllamaTurnService::from_config(&config, gateway.clone(), &roster)?;
    service
        .check_model()
        .await
        .with_context(|| format!("Ollama is not ready at {}", config.ollama_url()))?;
    info!(model = service.model(), url = %config.ollama_url(), "model ready");

    // only once everything else is ready; removed when the guard drops
    let marker =
        workspace.install_marker(&config.tools.marker_file, config.tools.cleanup_marker)?;
    info!(
        workdir = %workspace.root().display(),
        marker = %marker.path().display(),
        "workspace ready"
    );

    let task = args.task.unwrap_or_else(|| DEFAULT_TASK.to_string());
    println!("\n--- Running Query: {} ---", task);

    let result = RoundRobinScheduler::from_config(Arc::new(service), gateway, &config.run)
        .with_observer(cli::print_event)
        .run(
            roster.iter().cloned().collect(),
            config.run.max_iterations,
            &task,
        )
        .await;
    drop(marker);

    let report = result?;
    println!("\n{}", cli::summary(&report));
    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(debug: bool) -> anyhow::Result<()> {
    let level = if debug { "teddy=debug" } else { "teddy=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    Ok(())
}
