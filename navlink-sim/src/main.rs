//! navlink simulator
//!
//! Replays a scenario of panel events (windows, chart panels, deductions,
//! document panels, clicks) against an in-process board and prints the
//! resulting links and the display commands panels received.
//!
//! Usage:
//!   navlink-sim --scenario navlink-sim/scenarios/basic.toml [--config linking.toml]

mod scenario;

use clap::{Parser, ValueEnum};
use navlink::{Board, BoardSnapshot, DisplayCommand, LinkingConfig};
use scenario::Scenario;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Summary,
}

#[derive(Parser, Debug)]
#[command(name = "navlink-sim")]
#[command(about = "Replay panel scenarios against the linking engine")]
struct Args {
    /// Scenario file (TOML)
    #[arg(long, env = "NAVLINK_SCENARIO")]
    scenario: PathBuf,

    /// Linking configuration (TOML); overrides the scenario's [linking] table
    #[arg(long, env = "NAVLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Run pending repairs after every step instead of only on `settle` steps
    #[arg(long, env = "NAVLINK_AUTO_SETTLE", default_value = "false")]
    auto_settle: bool,

    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct SimOutput {
    steps: usize,
    repairs: usize,
    links: BoardSnapshot,
    commands: Vec<DisplayCommand>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("navlink_sim=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();
    let scenario = Scenario::load(&args.scenario)?;
    let config = match &args.config {
        Some(path) => {
            info!("Using configuration: {}", path.display());
            LinkingConfig::load(path).map_err(|e| {
                anyhow::anyhow!("Failed to load config '{}': {}", path.display(), e)
            })?
        }
        None => scenario.linking.clone().unwrap_or_default(),
    };

    let mut board = Board::new(config);
    let log = scenario::run(&mut board, &scenario.steps, args.auto_settle).await?;

    let output = SimOutput {
        steps: log.steps,
        repairs: log.repairs,
        links: board.snapshot().await?,
        commands: board.director().take().await,
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Summary => print_summary(&output),
    }
    Ok(())
}

fn print_summary(output: &SimOutput) {
    println!(
        "{} step(s), {} repair(s), {} command(s)",
        output.steps,
        output.repairs,
        output.commands.len()
    );
    println!("chart -> document:");
    for t in &output.links.charts {
        println!("  {} [{}] -> {}", t.source, t.key, t.target);
    }
    println!("document -> chart:");
    for t in &output.links.documents {
        println!("  {} [{}] -> {}", t.source, t.key, t.target);
    }
    if !output.links.notes.is_empty() {
        println!("notes -> document:");
        for t in &output.links.notes {
            println!("  {} [{}] -> {}", t.source, t.key, t.target);
        }
    }
}
