//! # Configuration Management
//!
//! Locates the branchwise config directory and loads the view configuration
//! from `config.toml`. Every field is optional; a missing file means defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::branches::{ListScope, SortMethod};
use crate::context::{DEFAULT_DISCOVERY_TIMEOUT, PassOptions};
use crate::git::{BackendKind, GIT_EXECUTABLE};
use crate::relations::DEFAULT_MAX_CONCURRENCY;
use crate::tree::{ChildOrder, DEFAULT_PINNED, TreeOptions};

/// Name of the view configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration directories for branchwise.
#[derive(Debug, Clone)]
pub struct ConfigDirs {
  pub config_dir: PathBuf,
}

impl ConfigDirs {
  pub fn new() -> Result<Self> {
    let proj_dirs = ProjectDirs::from("", "", "branchwise").context("Failed to determine project directories")?;
    Ok(Self {
      config_dir: proj_dirs.config_dir().to_path_buf(),
    })
  }

  pub fn config_dir(&self) -> &Path {
    &self.config_dir
  }

  /// Path to the view configuration file
  pub fn config_path(&self) -> PathBuf {
    self.config_dir.join(CONFIG_FILE_NAME)
  }
}

/// Errors raised while validating a loaded configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("max_concurrency must be at least 1")]
  ZeroConcurrency,
  #[error("watch_interval_ms must be at least 1")]
  ZeroWatchInterval,
  #[error("git_path must not be empty")]
  EmptyGitPath,
}

/// How the branch tree is computed and presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
  /// List remote-tracking branches next to local ones.
  pub include_remotes: bool,
  pub expand_primary: bool,
  pub expand_secondary: bool,
  pub sort: SortMethod,
  /// Short branch names listed first, in this order.
  pub pinned: Vec<String>,
  pub head_first: bool,
  pub child_order: ChildOrder,
  pub backend: BackendKind,
  pub git_path: PathBuf,
  pub discovery_timeout_secs: u64,
  pub max_concurrency: usize,
  pub watch_interval_ms: u64,
}

impl Default for ViewConfig {
  fn default() -> Self {
    Self {
      include_remotes: false,
      expand_primary: true,
      expand_secondary: false,
      sort: SortMethod::default(),
      pinned: DEFAULT_PINNED.iter().map(|name| name.to_string()).collect(),
      head_first: false,
      child_order: ChildOrder::default(),
      backend: BackendKind::default(),
      git_path: PathBuf::from(GIT_EXECUTABLE),
      discovery_timeout_secs: DEFAULT_DISCOVERY_TIMEOUT.as_secs(),
      max_concurrency: DEFAULT_MAX_CONCURRENCY,
      watch_interval_ms: 2000,
    }
  }
}

impl ViewConfig {
  /// Load the configuration at `path`, falling back to defaults when the file
  /// does not exist.
  pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    if !path.exists() {
      debug!(path = %path.display(), "no config file, using defaults");
      return Ok(Self::default());
    }

    let contents =
      fs::read_to_string(path).with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: ViewConfig =
      toml::from_str(&contents).with_context(|| format!("Failed to parse config from {}", path.display()))?;

    config
      .validate()
      .with_context(|| format!("Invalid config in {}", path.display()))?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.max_concurrency == 0 {
      return Err(ConfigError::ZeroConcurrency);
    }
    if self.watch_interval_ms == 0 {
      return Err(ConfigError::ZeroWatchInterval);
    }
    if self.git_path.as_os_str().is_empty() {
      return Err(ConfigError::EmptyGitPath);
    }
    Ok(())
  }

  pub fn to_toml(&self) -> Result<String> {
    toml::to_string_pretty(self).context("Failed to serialize config to TOML")
  }

  pub fn list_scope(&self) -> ListScope {
    ListScope::with_remotes(self.include_remotes)
  }

  pub fn pass_options(&self) -> PassOptions {
    PassOptions {
      scope: self.list_scope(),
      max_concurrency: self.max_concurrency,
    }
  }

  pub fn tree_options(&self) -> TreeOptions {
    TreeOptions {
      sort: self.sort,
      pinned: self.pinned.clone(),
      head_first: self.head_first,
      child_order: self.child_order,
      expand_primary: self.expand_primary,
      expand_secondary: self.expand_secondary,
    }
  }

  pub fn discovery_timeout(&self) -> Duration {
    Duration::from_secs(self.discovery_timeout_secs)
  }

  pub fn watch_interval(&self) -> Duration {
    Duration::from_millis(self.watch_interval_ms)
  }
}
