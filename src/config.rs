//! Configuration module for Ferry
//!
//! Configuration hierarchy:
//! 1. `--config` CLI flag (highest priority)
//! 2. Project config (./ferry.toml)
//! 3. User config (~/.config/ferry/config.toml)
//! 4. Built-in defaults (lowest priority)
//!
//! The built-in defaults reproduce the devel.io deployment so `ferry deploy`
//! works from a clean checkout with no config file at all.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FerryError, FerryResult};

/// Name of the project-local config file
pub const PROJECT_CONFIG: &str = "ferry.toml";

/// Non-fatal configuration warning surfaced to CLI users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub file: PathBuf,
}

/// Deploy configuration: which hosts to reach and what to run there
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Hosts to deploy to, in order
    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,

    /// The deploy sequence run on each host
    #[serde(default)]
    pub site: SiteConfig,
}

/// Per-site deploy sequence configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SiteConfig {
    /// Remote working directory for the deploy sequence. Interpreted by the
    /// remote login shell, so `~` refers to the remote home directory.
    #[serde(default = "default_path")]
    pub path: String,

    /// Build command run after `git pull`
    #[serde(default = "default_build")]
    pub build: String,

    /// Ruby version selected (via rvm) around the build command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruby: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            site: SiteConfig::default(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            build: default_build(),
            ruby: None,
        }
    }
}

fn default_hosts() -> Vec<String> {
    vec!["thedevel.webfactional.com".to_string()]
}

fn default_path() -> String {
    "~/sites/devel.io".to_string()
}

fn default_build() -> String {
    "jekyll build".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> FerryResult<Self> {
        let (config, _warnings) = Self::load_with_warnings(path)?;
        Ok(config)
    }

    /// Load configuration and collect non-fatal warnings (e.g. unknown keys).
    pub fn load_with_warnings(path: &Path) -> FerryResult<(Self, Vec<ConfigWarning>)> {
        if !path.exists() {
            return Err(FerryError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)?;

        let mut unknown_keys: Vec<String> = Vec::new();
        let deserializer = toml::de::Deserializer::new(&content);

        let config: Self = serde_ignored::deserialize(deserializer, |key| {
            unknown_keys.push(key.to_string());
        })
        .map_err(|e| FerryError::InvalidConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        config.validate()?;

        let warnings = unknown_keys
            .into_iter()
            .map(|key| ConfigWarning {
                key,
                file: path.to_path_buf(),
            })
            .collect();

        Ok((config, warnings))
    }

    /// Load the first config found in the discovery hierarchy, or defaults
    pub fn discover() -> FerryResult<(Self, Vec<ConfigWarning>)> {
        let project = PathBuf::from(PROJECT_CONFIG);
        if project.exists() {
            return Self::load_with_warnings(&project);
        }

        if let Some(user) = Self::user_config_path() {
            if user.exists() {
                return Self::load_with_warnings(&user);
            }
        }

        Ok((Self::default(), Vec::new()))
    }

    /// Location of the per-user config file
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ferry").join("config.toml"))
    }

    /// Check the invariants a deployable config must hold
    pub fn validate(&self) -> FerryResult<()> {
        if self.hosts.is_empty() {
            return Err(FerryError::NoHosts);
        }
        Ok(())
    }
}
