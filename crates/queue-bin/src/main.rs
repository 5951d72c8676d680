//! Request Queue - persisted sequential request queue command-line tool.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use queue_config_and_utils::{init_logging, Config, Paths};

/// Request queue command-line interface.
#[derive(Parser)]
#[command(name = "request-queue")]
#[command(about = "Persisted sequential request queue")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for runtime files (database, logs, config). Defaults to ~/.request-queue
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a request and send everything pending
    Push {
        /// Command name, posted to {api}/api/{command}
        #[arg(short, long)]
        command: String,

        /// JSON object payload
        #[arg(short, long)]
        data: Option<String>,

        /// How the request merges with waiting requests of the same command
        #[arg(long, value_enum, default_value_t = Merge::Push)]
        merge: Merge,

        /// Only queue the request; do not send
        #[arg(long)]
        no_send: bool,
    },
    /// Send everything pending
    Flush,
    /// Show the pending requests
    Status,
    /// Drop every pending request
    Clear,
}

/// Conflict policy selectable from the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Merge {
    /// Always append
    Push,
    /// Replace a waiting request with the same command
    Replace,
    /// Drop this request if one with the same command is waiting
    Skip,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;
    let config = Config::load(&paths)?;

    // Initialize logging
    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(&paths, level);

    match cli.command {
        Commands::Push {
            command,
            data,
            merge,
            no_send,
        } => {
            app::push(&config, &paths, &command, data.as_deref(), merge, !no_send).await?;
        }
        Commands::Flush => {
            app::flush(&config, &paths).await?;
        }
        Commands::Status => {
            app::status(&paths).await?;
        }
        Commands::Clear => {
            app::clear(&paths).await?;
        }
    }

    Ok(())
}
