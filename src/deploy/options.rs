//! Deploy options configuration

/// Options for one deploy invocation
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Print the command sequence without connecting
    pub dry_run: bool,
    /// JSON output mode
    pub json: bool,
    /// Verbosity level
    pub verbose: u8,
}

impl DeployOptions {
    pub fn new() -> Self {
        Self {
            dry_run: false,
            json: false,
            verbose: 0,
        }
    }
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self::new()
    }
}
