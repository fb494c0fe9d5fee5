//! Scribe CLI - command-line interface for the commit mirror.

mod commands;
mod config;
mod progress;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scribe")]
#[command(version)]
#[command(about = "Mirrors source-control commit activity into a record store")]
#[command(
    long_about = "Scribe keeps an external record store in sync with commit activity. It \
receives push notifications through a signed webhook, backfills history \
from the source platform, and writes only the commits that are not already \
mirrored."
)]
#[command(after_long_help = r#"EXAMPLES
    Backfill the last six months of two repositories:
        $ scribe backfill --months 6 acme/widgets acme/gears

    Incrementally sync from each repository's last stored commit:
        $ scribe backfill --incremental acme/widgets

    Run the webhook receiver:
        $ scribe serve

CONFIGURATION
    Scribe reads configuration from:
      1. ~/.config/scribe/config.toml (or $XDG_CONFIG_HOME/scribe/config.toml)
      2. ./scribe.toml
      3. Environment variables (SCRIBE_* prefix, e.g., SCRIBE_STORE_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    SCRIBE_STORE_BASE_URL     Records API base URL
    SCRIBE_STORE_TOKEN        Records API token
    SCRIBE_STORE_COLLECTION   Collection holding commit records
    SCRIBE_GITHUB_TOKEN       GitHub personal access token (backfill)
    SCRIBE_WEBHOOK_SECRET     Shared secret for event signatures (serve)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backfill commit history into the record store
    Backfill {
        /// Repositories to sync (owner/name) - can specify multiple
        #[arg(required = true)]
        repos: Vec<String>,

        #[command(flatten)]
        opts: BackfillOptions,
    },
    /// Run the webhook receiver
    Serve {
        /// Listen address (default from config or 127.0.0.1:8404)
        #[arg(short, long)]
        bind: Option<std::net::SocketAddr>,
    },
}

/// Options shared by backfill runs.
#[derive(Debug, Clone, clap::Args)]
struct BackfillOptions {
    /// Fixed look-back window in months
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=72), conflicts_with = "incremental")]
    months: Option<u32>,

    /// Derive each repository's window from its most recent stored commit
    #[arg(short, long)]
    incremental: bool,

    /// Skip the legacy fingerprint scan (faster on identifier-indexed stores,
    /// small dedup-accuracy risk for rows written before the identifier column existed)
    #[arg(long)]
    fast: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing for non-TTY mode (structured logging)
    // Only initialize if not connected to a TTY
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("scribe=info,scribe_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    let cli = Cli::parse();

    match cli.command {
        Commands::Backfill { repos, opts } => {
            commands::backfill::handle_backfill(repos, opts, &config).await?;
        }
        Commands::Serve { bind } => {
            commands::serve::handle_serve(bind, &config).await?;
        }
    }

    Ok(())
}
