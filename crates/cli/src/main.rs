use crate::{commands::Commands, env::EnvManager, error::CliError};
use clap::Parser;
use client::{
    client::{BatchOptions, BatchOutput, Client},
    config::ClientConfig,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod env;
mod error;
mod output;

#[derive(Parser)]
#[command(
    name = "parlfetch",
    version,
    about = "Fetch tables from an OData service, paging past its row limit"
)]
struct Cli {
    /// Service root URL (overrides PARLFETCH_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// .env file to load before reading PARLFETCH_* variables
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// JSON file with client settings; environment and flags override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log window progress and debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli).await?;
    debug!("Client settings: {config:?}");
    let client = Client::connect(config).await?;

    match cli.command {
        Commands::Tables => output::emit(&client.get_tables(), None).await?,
        Commands::Columns { table } => output::emit(client.get_variables(&table)?, None).await?,
        Commands::Overview => output::emit(client.get_overview(), None).await?,
        Commands::Glimpse { table, rows } => {
            let response = client.get_glimpse(&table, rows).await?;
            output::emit(&response, None).await?;
        }
        Commands::Count { table, selection } => {
            let count = client
                .get_count(&table, &selection.filter(), &selection.constraints()?)
                .await?;
            output::emit(&count, None).await?;
        }
        Commands::Data {
            table,
            selection,
            batch_size,
            retries,
            spill_dir,
            output: destination,
        } => {
            let options = BatchOptions {
                batch_size,
                retries,
                spill_dir,
            };
            let fetched = client
                .get_data_batched(
                    &table,
                    &selection.filter(),
                    &selection.constraints()?,
                    &options,
                )
                .await?;
            info!("Fetched {} rows from {}", fetched.len(), table);

            match fetched {
                BatchOutput::InMemory(response) => {
                    output::emit(&response, destination.as_deref()).await?
                }
                BatchOutput::Spilled(batches) => {
                    let summary = json!({
                        "rows": batches.len(),
                        "files": batches.paths(),
                    });
                    output::emit(&summary, destination.as_deref()).await?
                }
            }
        }
    }

    debug!("Metrics: {:?}", client.metrics());
    Ok(())
}

/// Defaults, then the `--config` file, then `PARLFETCH_*` variables, then flags.
async fn load_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let base = match &cli.config {
        Some(path) => read_config_file(path).await?,
        None => ClientConfig::default(),
    };

    let env = EnvManager::discover(cli.env_file.as_deref())?;
    let mut config = base.overlay(env.all())?;

    if let Some(url) = &cli.url {
        config.url = url.clone();
    }
    if cli.verbose {
        config.verbose = true;
    }
    config.validate()?;
    Ok(config)
}

async fn read_config_file(path: &Path) -> Result<ClientConfig, CliError> {
    let source = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&source).map_err(CliError::ConfigDeserialize)
}
