//! # Backfill Worker Service
//!
//! Long-running worker that consumes backfill requests from the job queue
//! and fills each token's daily price history.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin backfill_worker              # run the worker loop
//! cargo run --bin backfill_worker -- enqueue 0xToken ethereum
//! ```
//!
//! Press Ctrl+C to stop gracefully: the in-flight job finishes first, then
//! the worker declines new work and the store connection is closed.

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};
use price_backfill_sdk::{
    backfill::BackfillEngine,
    database::{self, PostgresPriceStore},
    market_data::AlchemyMarketData,
    metrics,
    queue::JobQueue,
    settings::Settings,
    worker::JobRunner,
    BackfillRequest,
};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "backfill_worker")]
#[command(about = "Historical daily token price backfill worker")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "Config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker loop (the default)
    Run,
    /// Enqueue a single backfill request and exit
    Enqueue {
        /// Token contract address
        token_address: String,
        /// Logical network name (e.g. ethereum, polygon)
        network: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let settings = Settings::from_file(&cli.config)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Enqueue {
            token_address,
            network,
        } => {
            let mut queue = JobQueue::new(&settings.queue).await?;
            queue
                .push_request(&BackfillRequest::new(token_address, network))
                .await?;
            Ok(())
        }
        Command::Run => run_worker(settings).await,
    }
}

async fn run_worker(settings: Settings) -> Result<()> {
    if settings.provider.api_key.is_empty() {
        warn!("Provider API key is empty; set BACKFILL_PROVIDER_API_KEY");
    }

    metrics::describe_metrics();
    #[cfg(feature = "observability")]
    metrics::install_prometheus_exporter(9090)?;

    // The pool is the process-wide store handle: connected once here,
    // shared for the worker's lifetime, closed on shutdown.
    let pool = database::connect(&settings.database).await?;

    let provider = Arc::new(AlchemyMarketData::new(&settings.provider)?);
    let store = Arc::new(PostgresPriceStore::new(pool.clone()));
    let engine = BackfillEngine::new(provider, store, &settings.backfill);
    let queue = JobQueue::new(&settings.queue).await?;
    let runner = JobRunner::new(queue, engine);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(runner.run(shutdown_rx));

    signal::ctrl_c().await?;
    info!("🛑 Shutdown signal received, finishing in-flight job...");
    let _ = shutdown_tx.send(true);

    worker_handle.await??;
    pool.close().await;
    info!("Record store connection closed. Bye.");

    Ok(())
}
