//! Error types shared across the Research Desk crates.

use thiserror::Error;

/// Errors raised by the shared types layer.
#[derive(Debug, Error)]
pub enum DeskError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
