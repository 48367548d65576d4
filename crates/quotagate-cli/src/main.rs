//! quotagate CLI - quota-aware search/scrape gateway
//!
//! Serves the HTTP dispatcher and inspects or resets the shared quota
//! database from the command line.

mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use quotagate_core::{Database, GatewayConfig};

#[derive(Parser)]
#[command(name = "quotagate")]
#[command(author, version, about = "Quota-aware search and scrape gateway", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: table (default) or json
    #[arg(long, global = true, default_value = "table")]
    format: output::OutputFormat,

    /// Suppress progress messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Override database path (or set QUOTAGATE_DB_PATH env var)
    #[arg(long, env = "QUOTAGATE_DB_PATH", global = true)]
    db: Option<String>,

    /// Configuration file (or set QUOTAGATE_CONFIG env var)
    #[arg(long, env = "QUOTAGATE_CONFIG", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Address to listen on (overrides the config file)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Inspect and reset provider quotas
    Quota {
        #[command(subcommand)]
        action: commands::quota::QuotaAction,
    },

    /// List configured providers
    Providers,
}

fn init_logging(serving: bool) {
    let default_level = if serving { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(matches!(cli.command, Commands::Serve { .. }));

    // Set up database path if provided
    if let Some(db_path) = &cli.db {
        std::env::set_var("QUOTAGATE_DB_PATH", db_path);
    }

    let config = GatewayConfig::load(cli.config.as_deref())?;
    let db = Database::open(config.resolve_db_path()?).await?;

    let ctx = commands::Context {
        db,
        config,
        format: cli.format,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Serve { bind } => commands::serve::execute(&ctx, bind).await,
        Commands::Quota { action } => commands::quota::execute(&ctx, action).await,
        Commands::Providers => commands::providers::execute(&ctx).await,
    }
}
