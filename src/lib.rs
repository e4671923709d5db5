//! Ferry - remote deploy runner for static sites
//!
//! Ferry connects to each configured host over SSH, changes into the site
//! directory, pulls the latest revision, and runs the site build, optionally
//! inside a pinned Ruby version. Configuration comes from `ferry.toml`; the
//! built-in defaults reproduce the devel.io deployment.

pub mod config;
pub mod deploy;
pub mod error;
pub mod remote;

// Re-exports for convenience
pub use config::{Config, ConfigWarning, SiteConfig};
pub use deploy::{DeployEvent, DeployOptions, DeployReport, DeployRunner};
pub use error::{FerryError, FerryResult};
pub use remote::{scoped, RemoteError, RemoteResult, RemoteShell, SshShell};
