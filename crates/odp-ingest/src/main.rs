//! ODP Ingest - command-line ingestion and run inspection

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use odp_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::path::PathBuf;
use std::process;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "odp-ingest")]
#[command(author, version, about = "ODP data ingestion tool")]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply database migrations
    Migrate,

    /// Insert the reference countries, sources and categories
    Seed,

    /// Ingest one or more sources from JSON-lines dumps
    Ingest {
        /// Source code to ingest (repeatable)
        #[arg(short, long = "source", required = true)]
        sources: Vec<String>,

        /// First year of the range (inclusive)
        #[arg(long)]
        start: i32,

        /// Last year of the range (inclusive)
        #[arg(long)]
        end: i32,

        /// Directory holding `<SOURCE>.jsonl` files
        #[arg(short, long, env = "INGEST_COLLECTOR_DIR")]
        dir: Option<PathBuf>,

        /// Run against an in-memory store; nothing is written to the database
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect ingestion runs
    Runs {
        #[command(subcommand)]
        command: RunsCommand,
    },

    /// Show catalog and observation counts
    Status,
}

#[derive(Subcommand, Debug)]
enum RunsCommand {
    /// List recent runs
    List {
        /// Filter by source code
        #[arg(short, long)]
        source: Option<String>,

        /// Filter by status (running, succeeded, failed)
        #[arg(long)]
        status: Option<String>,

        /// Maximum number of runs
        #[arg(short = 'n', long, default_value = "20")]
        limit: i64,
    },

    /// List runs still marked running past the threshold
    Stale {
        /// Override the configured threshold
        #[arg(long)]
        threshold_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Info })
        .output(LogOutput::Console)
        .log_file_prefix("odp-ingest")
        .filter_directives("sqlx=warn")
        .build();

    let log_config = match log_config.merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {}", e);
            process::exit(2);
        }
    };

    match execute(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Run the command and return the process exit code
async fn execute(cli: Cli) -> Result<i32> {
    let output = commands::Output { json: cli.json };

    match cli.command {
        Commands::Migrate => commands::db::migrate().await.map(|_| 0),
        Commands::Seed => commands::db::seed(&output).await.map(|_| 0),
        Commands::Ingest {
            sources,
            start,
            end,
            dir,
            dry_run,
        } => {
            let options = commands::ingest::IngestOptions {
                sources,
                start,
                end,
                dir,
                dry_run,
            };
            commands::ingest::run(options, &output).await
        }
        Commands::Runs { command } => match command {
            RunsCommand::List {
                source,
                status,
                limit,
            } => commands::runs::list(source, status, limit, &output)
                .await
                .map(|_| 0),
            RunsCommand::Stale { threshold_secs } => {
                commands::runs::stale(threshold_secs, &output).await
            }
        },
        Commands::Status => commands::status::run(&output).await.map(|_| 0),
    }
}
