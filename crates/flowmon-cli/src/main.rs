//! Flowmon CLI - carrier data-quota monitoring
//!
//! A command-line interface for managing monitored accounts, polling the
//! carrier for usage reports and inspecting stored snapshots.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "flowmon")]
#[command(author, version, about = "Carrier data-quota monitoring CLI", long_about = None)]
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

    /// Override database path (or set FLOWMON_DB_PATH env var)
    #[arg(long, env = "FLOWMON_DB_PATH", global = true)]
    db: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage monitored accounts
    Account {
        #[command(subcommand)]
        action: commands::account::AccountAction,
    },

    /// Poll the carrier for fresh usage reports
    Poll {
        /// Poll a single account instead of all registered ones
        #[arg(long)]
        account: Option<String>,

        /// Number of accounts polled concurrently
        #[arg(long, default_value_t = flowmon_core::DEFAULT_WORKER_LIMIT)]
        concurrency: usize,
    },

    /// Show the most recent snapshot per account
    Latest {
        /// Limit to one account
        #[arg(long)]
        account: Option<String>,
    },

    /// Show snapshot history for an account
    History {
        /// Subscriber phone number
        account: String,

        /// How many days back to show
        #[arg(long, default_value_t = 7)]
        days: i64,
    },

    /// Delete snapshots past the retention window
    Prune {
        /// Retention window in days
        #[arg(long, default_value_t = flowmon_core::RETENTION_DAYS)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    // Set up database path if provided
    if let Some(db_path) = &cli.db {
        std::env::set_var("FLOWMON_DB_PATH", db_path);
    }

    // Initialize database
    let db = flowmon_core::Database::new().await?;

    // Create context for commands
    let ctx = commands::Context {
        db,
        format: cli.format,
        quiet: cli.quiet,
    };

    // Execute command
    match cli.command {
        Commands::Account { action } => commands::account::execute(&ctx, action).await,
        Commands::Poll {
            account,
            concurrency,
        } => commands::poll::execute(&ctx, account, concurrency).await,
        Commands::Latest { account } => commands::history::latest(&ctx, account).await,
        Commands::History { account, days } => {
            commands::history::history(&ctx, &account, days).await
        }
        Commands::Prune { days } => commands::prune::execute(&ctx, days).await,
    }
}
