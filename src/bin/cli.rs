//! Repo Census CLI
//!
//! Local entry point for crawling and serving the dashboard API.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use repo_census::{
    error::Result,
    models::Config,
    pipeline::{CrawlOptions, Crawler},
    query::QueryService,
    storage::CheckpointStore,
};

/// Repo Census - GitHub repository and contributor crawler
#[derive(Parser, Debug)]
#[command(
    name = "repo-census",
    version,
    about = "GitHub repository and contributor crawler with a dashboard API"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search, detail and collect contributors, resuming from the checkpoint
    Crawl {
        /// Ignore the checkpoint and start a new snapshot
        #[arg(long)]
        fresh: bool,

        /// GitHub API token
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Serve the dashboard API over the latest snapshot
    #[cfg(feature = "server")]
    Serve {
        /// Override the configured host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Validate the configuration file
    Validate,

    /// Show checkpoint and latest snapshot info
    Info,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config);
    let mut config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => Config::default(),
    };
    init_logging(cli.verbose, &config.logging.level);

    match &loaded {
        Ok(_) => log::info!("Loaded configuration from {}", cli.config.display()),
        Err(e) => log::warn!(
            "Config load failed from {}: {}. Using defaults.",
            cli.config.display(),
            e
        ),
    }

    match cli.command {
        Command::Crawl { fresh, token } => {
            config.validate()?;
            let config = Arc::new(config);
            let crawler = Crawler::from_config(Arc::clone(&config), token)?;

            let summary = crawler.run(CrawlOptions { fresh }).await?;
            log::info!(
                "Snapshot {}: {} repositories ({} detailed, {} failed), {} contributors",
                summary.timestamp,
                summary.repositories_found,
                summary.repositories_detailed,
                summary.repository_failures,
                summary.contributors
            );
            log::info!("Crawl complete!");
        }

        #[cfg(feature = "server")]
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            repo_census::server::serve(&config).await?;
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} keywords, repo limit {})",
                config.search.keywords.len(),
                config.search.repo_limit
            );
        }

        Command::Info => {
            log::info!("Data directory: {}", config.paths.data_dir.display());

            let checkpoints = CheckpointStore::new(&config.paths.checkpoint_file)?;
            match checkpoints.load().await {
                Ok(Some(checkpoint)) => {
                    log::info!("Checkpoint: run {}", checkpoint.timestamp);
                    log::info!(
                        "  search complete: {}, next index: {}, processed repositories: {}",
                        checkpoint.search_complete,
                        checkpoint.last_processed_repo_index,
                        checkpoint.processed_repos.len()
                    );
                    log::info!("  last saved: {}", checkpoint.updated_at);
                }
                Ok(None) => log::info!("No checkpoint found."),
                Err(e) => log::warn!("Checkpoint unreadable: {}", e),
            }

            let service = QueryService::new(&config.paths.data_dir);
            match service.latest_snapshot().await {
                Ok(snapshot) => {
                    log::info!("Latest snapshot: {}", snapshot.timestamp);
                    log::info!(
                        "  {} repositories, {} detailed, {} contributors",
                        snapshot.repositories.len(),
                        snapshot.repositories_detailed.len(),
                        snapshot.contributors.len()
                    );
                }
                Err(e) => log::info!("No snapshot available: {}", e),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
