//! Research Desk daemon: CLI entry points for serving the HTTP API and
//! running bulk embedding backfills in-process.

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
