use anyhow::Context;
use card_enricher::app::BatchHandle;
use card_enricher::config::Config;
use card_enricher::reader::CsvIdentifierReader;
use card_enricher::server::{start_server, AppState};
use card_enricher::storage::{JsonFileStorage, Storage};
use card_enricher::{infra, logging};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "card_enricher")]
#[command(about = "Enriches trading card numbers with catalog details and market prices")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file; defaults apply when it is missing
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Overrides the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Enrich every card number in a CSV file and wait for the batch
    EnrichFile { path: PathBuf },
    /// Re-enrich every stored card and wait for the batch
    EnrichStored,
    /// Enrich a single card number
    EnrichOne { number: String },
}

/// Cancel the token on Ctrl-C.
fn spawn_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, shutting down");
            token.cancel();
        }
    });
}

async fn wait_for(batch: BatchHandle) -> anyhow::Result<()> {
    info!(count = batch.count(), "Batch started");
    let outcome = batch.join().await.context("batch task failed")?;
    println!(
        "{} of {} cards processed successfully ({} failed)",
        outcome.succeeded,
        outcome.attempted,
        outcome.failed()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    let storage: Arc<dyn Storage> = Arc::new(JsonFileStorage::open(&config.storage.path).await?);
    let use_case = infra::build_use_case(&config, storage.clone())?;

    let shutdown = CancellationToken::new();
    spawn_ctrl_c(shutdown.clone());

    match cli.command {
        Commands::Serve { port } => {
            let state = AppState {
                use_case: Arc::new(use_case),
                storage,
                reader: Arc::new(CsvIdentifierReader),
                shutdown,
                metrics: card_enricher::metrics::init_metrics(),
            };
            start_server(state, port.unwrap_or(config.server.port)).await?;
        }
        Commands::EnrichFile { path } => {
            let identifiers = CsvIdentifierReader
                .read_path(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let batch = use_case
                .trigger_from_identifiers(identifiers, shutdown.child_token())
                .await?;
            wait_for(batch).await?;
        }
        Commands::EnrichStored => {
            let batch = use_case.trigger_from_storage(shutdown.child_token()).await?;
            wait_for(batch).await?;
        }
        Commands::EnrichOne { number } => {
            let record = use_case.enrich_single(&number).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    Ok(())
}
