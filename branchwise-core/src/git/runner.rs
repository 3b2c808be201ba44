//! # Git Process Runner
//!
//! Spawns `git` plumbing subcommands and captures their output. Arguments are
//! always passed as an argv vector, never through a shell.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::trace;

/// Default executable used when no explicit git path is configured.
pub const GIT_EXECUTABLE: &str = "git";

/// Stderr fragments git prints when a revision does not resolve to a commit.
const MISSING_REVISION_MARKERS: &[&str] = &[
  "unknown revision or path not in the working tree",
  "bad revision",
  "Needed a single revision",
  "does not have any commits yet",
  "not a valid object name",
  "Not a valid object name",
];

/// A git invocation that exited non-zero or wrote to stderr.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`git {subcommand}` failed ({}): {stderr}", describe_exit(.exit_code))]
pub struct RunFailure {
  pub subcommand: String,
  /// Exit code, or `None` when the process was terminated by a signal.
  pub exit_code: Option<i32>,
  pub stderr: String,
}

impl RunFailure {
  /// Whether git complained that a revision does not exist, which callers
  /// treat as the "no revision" state rather than a tool failure.
  pub fn is_missing_revision(&self) -> bool {
    MISSING_REVISION_MARKERS
      .iter()
      .any(|marker| self.stderr.contains(marker))
  }

  /// A quiet "not found" answer: exit code 1 with nothing on stderr, as given
  /// by `merge-base` without a common ancestor or `symbolic-ref -q` on a
  /// detached HEAD.
  pub fn is_quiet_miss(&self) -> bool {
    self.exit_code == Some(1) && self.stderr.is_empty()
  }
}

fn describe_exit(code: &Option<i32>) -> String {
  match code {
    Some(code) => format!("exit code {code}"),
    None => "terminated by signal".to_string(),
  }
}

/// Errors produced while running git.
#[derive(Debug, Error)]
pub enum RunError {
  /// The executable could not be started (not installed, not on `PATH`).
  #[error("failed to run {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },
  #[error(transparent)]
  Failed(#[from] RunFailure),
}

/// Runs git subcommands inside one repository.
#[derive(Debug, Clone)]
pub struct GitRunner {
  git_path: PathBuf,
  repo_path: PathBuf,
}

impl GitRunner {
  pub fn new(git_path: impl Into<PathBuf>, repo_path: impl Into<PathBuf>) -> Self {
    Self {
      git_path: git_path.into(),
      repo_path: repo_path.into(),
    }
  }

  pub fn repo_path(&self) -> &Path {
    &self.repo_path
  }

  /// Run `git <subcommand> <args...>` and return trimmed stdout.
  ///
  /// The command fails when git exits non-zero or prints anything to stderr.
  /// Output is forced to the C locale so stderr classification is stable.
  pub fn run<I, S>(&self, subcommand: &str, args: I) -> Result<String, RunError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
  {
    let args: Vec<S> = args.into_iter().collect();
    trace!(
      subcommand,
      args = ?args.iter().map(|arg| arg.as_ref().to_string_lossy()).collect::<Vec<_>>(),
      "running git"
    );

    let output = Command::new(&self.git_path)
      .arg(subcommand)
      .args(&args)
      .current_dir(&self.repo_path)
      .env("LC_ALL", "C")
      .env("GIT_TERMINAL_PROMPT", "0")
      .output()
      .map_err(|source| RunError::Spawn {
        program: self.git_path.display().to_string(),
        source,
      })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() || !stderr.trim().is_empty() {
      return Err(
        RunFailure {
          subcommand: subcommand.to_string(),
          exit_code: output.status.code(),
          stderr: stderr.trim().to_string(),
        }
        .into(),
      );
    }

    Ok(stdout.trim().to_string())
  }
}
