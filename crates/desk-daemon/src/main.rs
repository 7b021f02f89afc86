//! Research Desk daemon.
//!
//! # Usage
//!
//! ```bash
//! desk-daemon serve [--port PORT] [--host HOST] [--db-path PATH]
//! desk-daemon backfill [--stocks] [--members] [--delay-ms N] [--limit N]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/research-desk/config.toml)
//! 3. Environment variables (DESK_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use desk_daemon::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            db_path,
        } => {
            commands::serve(
                cli.config.as_deref(),
                port,
                host.as_deref(),
                db_path.as_deref(),
                cli.log_level.as_deref(),
            )
            .await?;
        }
        Commands::Backfill {
            stocks,
            members,
            delay_ms,
            limit,
        } => {
            commands::backfill(
                cli.config.as_deref(),
                stocks,
                members,
                delay_ms,
                limit,
                cli.log_level.as_deref(),
            )
            .await?;
        }
    }

    Ok(())
}
