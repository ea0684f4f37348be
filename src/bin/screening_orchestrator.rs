//! # Screening Orchestrator CLI
//!
//! Command-line entry point for creating batches, inspecting them, re-driving
//! stuck dispatches, and running the batch control loop.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use screening_core::config::ConfigManager;
use screening_core::database::{create_pool, DatabaseMigrations};
use screening_core::logging::init_structured_logging;
use screening_core::orchestration::{CreateBatchRequest, OrchestrationError, ScreeningSystem};
use std::path::PathBuf;
use std::process;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "screening-orchestrator")]
#[command(about = "Create and drive material screening batches")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment (development, test, production, ...); defaults to SCREENING_ENV
    #[arg(short, long, env = "SCREENING_ENV")]
    environment: Option<String>,

    /// Configuration directory (default: config)
    #[arg(short, long, env = "SCREENING_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a batch from a prompt and a materials directory
    Create {
        /// Natural-language screening request
        #[arg(short, long)]
        prompt: String,

        /// Directory holding the candidate structure files
        #[arg(short, long)]
        directory: PathBuf,

        /// Optional label for the batch
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Show a batch and the status of its sub-tasks
    Status { batch_uuid: Uuid },

    /// Re-submit the undispatched sub-tasks of a pending batch
    Redrive { batch_uuid: Uuid },

    /// Re-drive every stale pending batch once
    Reconcile,

    /// Run the batch control loop
    Control {
        /// Run a single pass and exit
        #[arg(long)]
        once: bool,
    },

    /// Apply database migrations
    Migrate,

    /// Print the resolved configuration with secrets masked
    ShowConfig,
}

#[tokio::main]
async fn main() {
    init_structured_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %format!("{e:#}"), "Command failed");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let environment = cli
        .environment
        .unwrap_or_else(ConfigManager::detect_environment);
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir, &environment)
        .context("failed to load configuration")?;
    let config = manager.config().clone();

    match cli.command {
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&manager.sanitized())?);
            return Ok(());
        }
        Commands::Migrate => {
            let pool = create_pool(&config.database).await?;
            DatabaseMigrations::run_all(&pool).await?;
            println!("Migrations applied");
            return Ok(());
        }
        _ => {}
    }

    let system = ScreeningSystem::from_config(config)
        .await
        .context("failed to bootstrap screening system")?;

    match cli.command {
        Commands::Create {
            prompt,
            directory,
            name,
        } => {
            let mut request = CreateBatchRequest::new(prompt, directory);
            if let Some(name) = name {
                request = request.with_task_name(name);
            }

            match system.orchestrator().create_batch(request).await {
                Ok(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                Err(e @ OrchestrationError::Dispatch { .. }) => {
                    warn!(error = %e, "Batch persisted but not fully dispatched");
                    if let Some(batch_uuid) = e.batch_uuid() {
                        println!("Batch {batch_uuid} is pending; retry with `redrive {batch_uuid}`");
                    }
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Status { batch_uuid } => {
            let batch = system.orchestrator().get_batch(batch_uuid).await?;
            println!("{}", serde_json::to_string_pretty(&batch)?);
        }
        Commands::Redrive { batch_uuid } => {
            let result = system.reconciler().redrive_batch(batch_uuid).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Reconcile => {
            let summary = system.reconciler().redrive_stalled().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Control { once } => {
            let controller = system.controller();
            if once {
                let summary = controller.run_once().await?;
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                let (shutdown_tx, shutdown_rx) = watch::channel(false);
                let interval = system.config().orchestration.controller_interval();
                let loop_handle = async { controller.run(interval, shutdown_rx).await };
                let signal = async {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Shutdown requested");
                    }
                    let _ = shutdown_tx.send(true);
                };
                tokio::join!(loop_handle, signal);
            }
        }
        Commands::ShowConfig | Commands::Migrate => {}
    }

    Ok(())
}
