//! Deploy sequencing
//!
//! - runner.rs drives the command sequence over a `RemoteShell`
//! - options.rs defines invocation options

mod options;
mod runner;

pub use options::DeployOptions;
pub use runner::{DeployEvent, DeployReport, DeployRunner};
