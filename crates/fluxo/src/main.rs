//! Fluxo - Streaming data-export middleware
//!
//! # Usage
//!
//! ```bash
//! # Run the server (default)
//! fluxo
//! fluxo --config configs/config.toml
//!
//! # Explicit subcommand
//! fluxo serve --config configs/config.toml --log-level debug
//! ```

mod cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Fluxo - Streaming data-export middleware
#[derive(Parser, Debug)]
#[command(name = "fluxo")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    // Global args that apply to serve when no subcommand given
    /// Path to configuration file
    #[arg(short, long, default_value = "configs/config.toml", global = true)]
    config: std::path::PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the export server
    Serve(cmd::serve::ServeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Serve(args)) => {
            init_logging(&args.log_level)?;
            cmd::serve::run(args).await
        }
        // No subcommand = run server (default behavior)
        None => {
            init_logging(&cli.log_level)?;
            let args = cmd::serve::ServeArgs {
                config: Some(cli.config),
                log_level: cli.log_level,
            };
            cmd::serve::run(args).await
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}
