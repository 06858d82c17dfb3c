use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use webpilot_cli::{
    AutomationEngine, EngineConfig, FileStore, StaticSurface, TaskId, TaskStatus,
};

#[derive(Parser)]
#[command(name = "webpilot", about = "Natural-language browser automation", version)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Interpret an instruction and run it (or schedule it when it carries
    /// a time phrase).
    Run {
        /// The instruction, e.g. "open baidu and search for rust books".
        instruction: String,
    },
    /// Show how an instruction would be interpreted, without running it.
    Parse { instruction: String },
    /// List known tasks, newest first.
    Tasks,
    /// Cancel a pending task.
    Cancel { id: String },
}

fn init_tracing(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();
}

async fn build_engine(config: &EngineConfig) -> Result<AutomationEngine> {
    // The CLI runs against the offline in-memory surface; embedding hosts
    // supply a real browser through the same trait.
    let surface = Arc::new(StaticSurface::new());
    let store = Arc::new(FileStore::new(&config.data_dir));
    AutomationEngine::new(surface, None, store, config)
        .await
        .context("failed to assemble the engine")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::load().context("failed to load configuration")?;
    init_tracing(&config.log_filter);

    match cli.command {
        CliCommand::Run { instruction } => {
            let engine = build_engine(&config).await?;
            let task = engine.run(&instruction).await?;
            match task.status {
                TaskStatus::Pending => {
                    println!(
                        "scheduled task {} for {}",
                        task.id,
                        task.scheduled_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
                status => {
                    let outcome = task
                        .result
                        .map(|r| r.message)
                        .unwrap_or_else(|| status.name().to_string());
                    println!("task {}: {} ({})", task.id, outcome, status.name());
                    if let Some(error) = task.error {
                        eprintln!("  {error}");
                    }
                }
            }
            engine.shutdown();
        }
        CliCommand::Parse { instruction } => {
            let engine = build_engine(&config).await?;
            let (command, spec) = engine.interpret(&instruction).await;
            println!("{}", serde_json::to_string_pretty(&command)?);
            if let Some(at) = spec.scheduled_at() {
                println!("scheduled for {}", at.format("%Y-%m-%d %H:%M:%S"));
            }
            engine.shutdown();
        }
        CliCommand::Tasks => {
            let engine = build_engine(&config).await?;
            let tasks = engine.list_tasks().await;
            if tasks.is_empty() {
                println!("no tasks");
            }
            for task in tasks {
                println!(
                    "{}  {:<9}  {}  {}",
                    task.id,
                    task.status.name(),
                    task.scheduled_at.format("%Y-%m-%d %H:%M"),
                    task.raw_text
                );
            }
            engine.shutdown();
        }
        CliCommand::Cancel { id } => {
            let engine = build_engine(&config).await?;
            let id = TaskId(id);
            if engine.cancel_task(&id).await? {
                info!(id = %id, "cancelled");
                println!("cancelled {id}");
            } else {
                println!("task {id} is not pending (already started or finished)");
            }
            engine.shutdown();
        }
    }
    Ok(())
}
