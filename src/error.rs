//! Error types for Ferry
//!
//! Uses `thiserror` for library errors; the binary surfaces them via `anyhow`.

use std::path::PathBuf;
use thiserror::Error;

use crate::remote::RemoteError;

/// Result type alias for Ferry operations
pub type FerryResult<T> = Result<T, FerryError>;

/// Main error type for Ferry operations
#[derive(Error, Debug)]
pub enum FerryError {
    /// Remote session or command failure
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Config file does not exist
    #[error("config file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Config file failed to parse
    #[error("invalid config in {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    /// Host list is empty after loading configuration
    #[error("no deploy hosts configured - 'hosts' must list at least one host")]
    NoHosts,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
