//! reqlog CLI — the main entry point.
//!
//! Commands:
//! - `keys`    — List built-in property keys, optionally through a pattern
//! - `check`   — Validate key patterns and show what they select
//! - `export`  — Export a request described in a JSON file
//! - `init`    — Print a default configuration file

use clap::{Parser, Subcommand};
use reqlog_config::AppConfig;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "reqlog",
    about = "reqlog: request context export for structured logs",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in property keys in canonical order
    Keys {
        /// Only list the keys this pattern selects
        #[arg(short, long)]
        pattern: Option<String>,
    },

    /// Validate key patterns (from arguments, or the config file)
    Check {
        /// Patterns to check instead of `export.key_patterns`
        patterns: Vec<String>,
    },

    /// Export a request described in a JSON file
    Export {
        /// Path to the request description
        #[arg(short, long)]
        request: PathBuf,

        /// Key patterns to use instead of `export.key_patterns`
        #[arg(short, long = "pattern")]
        patterns: Vec<String>,

        /// Print the fields as a JSON object instead of key=value pairs
        #[arg(long)]
        json: bool,
    },

    /// Print a default configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let verbose = cli.verbose.then_some("debug");

    // Config loading logs before the configured subscriber exists.
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose.unwrap_or("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, AppConfig::load)?;

    // Initialize tracing. Logs go to stderr; stdout carries command output.
    let filter = env_filter(verbose.unwrap_or(config.logging.level.as_str()));
    if config.logging.is_json() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Keys { pattern } => commands::keys::run(pattern.as_deref())?,
        Commands::Check { patterns } => commands::check::run(&config, &patterns)?,
        Commands::Export {
            request,
            patterns,
            json,
        } => commands::export::run(&config, &request, &patterns, json).await?,
        Commands::Init => commands::init::run(),
    }

    Ok(())
}

/// `RUST_LOG` wins over the level picked from flags and config.
fn env_filter(level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level))
}
