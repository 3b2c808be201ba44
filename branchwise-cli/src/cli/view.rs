//! Options shared by the commands that read a repository.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use branchwise_core::config::ConfigDirs;
use branchwise_core::{BackendKind, RepoContext, SortMethod, ViewConfig, print_warning};
use clap::Args;
use tracing::debug;

/// Repository selection and view overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct ViewArgs {
  /// Path to a repository (defaults to the current directory)
  #[arg(short, long, value_name = "PATH")]
  pub repo: Option<PathBuf>,

  /// Include remote-tracking branches
  #[arg(long)]
  pub remotes: bool,

  /// Base order of branches
  #[arg(long, value_enum)]
  pub sort: Option<SortMethod>,

  /// Pin a branch name to the top (repeatable, replaces the configured pins)
  #[arg(long = "pin", value_name = "NAME")]
  pub pinned: Vec<String>,

  /// Git access implementation
  #[arg(long, value_enum)]
  pub backend: Option<BackendKind>,

  /// Seconds to wait for a repository to appear
  #[arg(long, value_name = "SECONDS")]
  pub timeout: Option<u64>,

  /// Maximum number of concurrent git queries
  #[arg(short = 'j', long = "jobs", value_name = "N")]
  pub jobs: Option<usize>,
}

impl ViewArgs {
  /// Layer the command-line overrides on top of `config`.
  pub fn apply(&self, config: &mut ViewConfig) -> Result<()> {
    if self.remotes {
      config.include_remotes = true;
    }
    if let Some(sort) = self.sort {
      config.sort = sort;
    }
    if !self.pinned.is_empty() {
      config.pinned = self.pinned.clone();
    }
    if let Some(backend) = self.backend {
      config.backend = backend;
    }
    if let Some(timeout) = self.timeout {
      config.discovery_timeout_secs = timeout;
    }
    if let Some(jobs) = self.jobs {
      config.max_concurrency = jobs;
    }
    config.validate().context("Invalid command-line options")?;
    Ok(())
  }

  fn start_dir(&self) -> Result<PathBuf> {
    match &self.repo {
      Some(path) => Ok(path.clone()),
      None => std::env::current_dir().context("Failed to determine the current directory"),
    }
  }

  /// Discover the repository, warning when none shows up in time.
  pub async fn open_context(&self, config: &ViewConfig) -> Result<Option<RepoContext>> {
    let start = self.start_dir()?;
    let ctx = RepoContext::discover(&start, config.discovery_timeout(), config.backend, &config.git_path)
      .await
      .with_context(|| format!("Failed to open repository at {}", start.display()))?;

    match &ctx {
      Some(ctx) => debug!(workdir = %ctx.workdir().display(), "repository ready"),
      None => print_warning(&format!("No repository found at or above {}", start.display())),
    }
    Ok(ctx)
  }
}

/// Load the configuration from `explicit` or the default location.
pub fn load_config(explicit: Option<&Path>) -> Result<(ViewConfig, PathBuf)> {
  let path = match explicit {
    Some(path) => path.to_path_buf(),
    None => ConfigDirs::new()?.config_path(),
  };
  let config = ViewConfig::load(&path)?;
  Ok((config, path))
}
