//! Pump.fun Sentinel - security monitor for newly migrated pump.fun tokens
//!
//! Alerts are informational. A passing score is a heuristic, not an audit.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

// Use the library crate
use pumpfun_sentinel::cli::commands;
use pumpfun_sentinel::config::Config;

/// Pump.fun Sentinel - migrated token security monitor
#[derive(Parser)]
#[command(name = "sentinel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "sentinel.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "SENTINEL_LOG_JSON")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the monitoring loop
    Start {
        /// Log alerts instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the security checks against one mint (nothing is stored or sent)
    Check {
        /// Token mint address
        address: String,

        /// Initial liquidity in SOL (default: validation minimum)
        #[arg(long)]
        liquidity: Option<f64>,

        /// Creator fee percent (default: 0)
        #[arg(long)]
        creator_fee: Option<f64>,

        /// Holder count (default: validation minimum)
        #[arg(long)]
        holders: Option<u32>,
    },

    /// Show stored token and assessment counts
    Stats,

    /// Show current configuration (secrets masked)
    Config,

    /// Check system health (RPC, feed, Telegram)
    Health,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        "pumpfun_sentinel=info"
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::INFO.into()),
    );

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    init_tracing(cli.json_logs);

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Execute command
    let result = match cli.command {
        Commands::Start { dry_run } => commands::start(&config, dry_run).await,
        Commands::Check {
            address,
            liquidity,
            creator_fee,
            holders,
        } => commands::check(&config, &address, liquidity, creator_fee, holders).await,
        Commands::Stats => commands::stats(&config).await,
        Commands::Config => commands::show_config(&config),
        Commands::Health => commands::health(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
