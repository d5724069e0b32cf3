//! LTM CLI: the main entry point.
//!
//! Commands:
//! - `list`: show every pipeline found in the config directory
//! - `run`: build one pipeline and run a query through it
//!
//! Exit codes: 0 solved, 2 incomplete, 3 run-time failure, 4 build or
//! configuration error.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod output;

#[derive(Parser)]
#[command(
    name = "ltm",
    about = "LTM: declarative multi-agent pipelines with a bounded thinking loop",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Pipeline config file or directory
    #[arg(short, long, global = true, env = "LTM_CONFIG", default_value = "pipelines")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List config files, external tools and pipelines
    List,

    /// Run a query through a pipeline
    Run {
        /// Pipeline reference: `file::name`, or a bare name that is unique across files
        pipeline: String,

        /// The query, passed verbatim
        query: String,

        /// Stop the run after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List => commands::list::run(&cli.config),
        Commands::Run {
            pipeline,
            query,
            timeout,
        } => commands::run::run(&cli.config, &pipeline, &query, timeout).await,
    }
}
