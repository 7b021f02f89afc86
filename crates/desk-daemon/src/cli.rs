//! CLI argument parsing for the desk daemon.

use clap::{Parser, Subcommand};

/// Research Desk daemon
///
/// Local stock and member research store with hybrid keyword/semantic
/// search over provider-generated embeddings.
#[derive(Parser, Debug)]
#[command(name = "desk-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/research-desk/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Daemon commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override listen host
        #[arg(long)]
        host: Option<String>,

        /// Override database path
        #[arg(long)]
        db_path: Option<String>,
    },

    /// Embed entities that are still missing a vector
    Backfill {
        /// Backfill stocks (default: both kinds when neither flag is given)
        #[arg(long)]
        stocks: bool,

        /// Backfill members
        #[arg(long)]
        members: bool,

        /// Pause between provider calls, in milliseconds
        #[arg(long, default_value_t = 500)]
        delay_ms: u64,

        /// Stop each kind after this many entities
        #[arg(long)]
        limit: Option<usize>,
    },
}
