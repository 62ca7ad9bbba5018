//! CLI module
//!
//! Argument parsing, logging setup and command dispatch for the
//! `phishguard` binary.

pub mod args;
pub mod dispatch;
pub mod logging;

pub use args::{Cli, Command};
pub use dispatch::{run, ExitCode};
pub use logging::init_logging;

use phishguard_core::PipelineError;
use phishguard_databases::StoreError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Server error: {0}")]
    Server(String),
}

/// Exit codes
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_SOURCE_ERROR: i32 = 2;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, Error>;
