//! The version-control boundary of the relationship engine.
//!
//! Everything branchwise needs from git is expressed by [`GitBackend`]. Two
//! interchangeable implementations exist: [`CliBackend`] shells out to the
//! `git` executable and [`LibBackend`] uses libgit2 through `git2`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cli_backend::CliBackend;
use super::lib_backend::LibBackend;
use super::runner::{GitRunner, RunError};
use crate::branches::ListScope;
use crate::commit::{CommitId, CommitInfo};

/// Selects the [`GitBackend`] implementation.
#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
  /// Spawn the `git` executable for every query
  #[default]
  Cli,
  /// Query the repository in-process through libgit2
  Lib,
}

impl fmt::Display for BackendKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BackendKind::Cli => f.write_str("cli"),
      BackendKind::Lib => f.write_str("lib"),
    }
  }
}

/// One ref as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefListing {
  /// Full ref name, e.g. `refs/heads/main`.
  pub name: String,
  /// Whether HEAD points at this ref.
  pub is_head: bool,
}

/// A HEAD that points directly at a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedHead {
  /// Tag exactly matching the commit, or its abbreviated id.
  pub describe: String,
  pub commit: CommitId,
}

/// A one-sided commit range `exclude..include`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevRange {
  pub exclude: String,
  pub include: String,
}

impl RevRange {
  /// Commits reachable from `include` but not from `exclude`.
  pub fn new(exclude: impl Into<String>, include: impl Into<String>) -> Self {
    Self {
      exclude: exclude.into(),
      include: include.into(),
    }
  }
}

impl fmt::Display for RevRange {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}", self.exclude, self.include)
  }
}

/// Snapshot of branch refs and HEAD used to detect repository changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefsFingerprint {
  /// Ref name to target (object id, or symbolic target for symbolic refs).
  pub refs: BTreeMap<String, String>,
  /// Symbolic HEAD target and/or commit HEAD resolves to.
  pub head: String,
}

/// Errors raised by backends.
#[derive(Debug, Error)]
pub enum GitError {
  #[error(transparent)]
  Run(#[from] RunError),
  #[error(transparent)]
  Git(#[from] git2::Error),
  /// The revision does not resolve to a commit.
  #[error("no revision for '{0}'")]
  NoRevision(String),
  #[error("unexpected output from `git {command}`: {output:?}")]
  Parse { command: &'static str, output: String },
  #[error("background git query failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

impl GitError {
  /// Whether this is the expected "no revision" condition (an empty branch,
  /// an unborn HEAD) rather than a tool failure.
  pub fn is_no_revision(&self) -> bool {
    match self {
      GitError::NoRevision(_) => true,
      GitError::Run(RunError::Failed(failure)) => failure.is_missing_revision(),
      GitError::Git(err) => matches!(
        err.code(),
        git2::ErrorCode::NotFound | git2::ErrorCode::Peel | git2::ErrorCode::UnbornBranch
      ),
      _ => false,
    }
  }
}

/// Plumbing operations the relationship engine depends on.
///
/// Implementations are read-only and must be safe to call concurrently from
/// blocking worker threads.
pub trait GitBackend: Send + Sync {
  fn kind(&self) -> BackendKind;

  /// Branch refs in `scope`, sorted by ref name, excluding symbolic `HEAD`
  /// pseudo-refs.
  fn list_refs(&self, scope: ListScope) -> Result<Vec<RefListing>, GitError>;

  /// The detached HEAD, if HEAD does not point at a branch.
  fn detached_head(&self) -> Result<Option<DetachedHead>, GitError>;

  /// Number of commits in `range`.
  fn rev_count(&self, range: &RevRange) -> Result<usize, GitError>;

  /// Nearest common ancestor of `a` and `b`, `None` for unrelated histories.
  fn merge_base(&self, a: &str, b: &str) -> Result<Option<CommitId>, GitError>;

  /// Metadata of the commit `rev` resolves to.
  fn last_commit_info(&self, rev: &str) -> Result<CommitInfo, GitError>;

  fn refs_fingerprint(&self) -> Result<RefsFingerprint, GitError>;

  /// Commits reachable from `a` but not `b`, and from `b` but not `a`.
  fn ahead_behind(&self, a: &str, b: &str) -> Result<(usize, usize), GitError> {
    let ahead = self.rev_count(&RevRange::new(b, a))?;
    let behind = self.rev_count(&RevRange::new(a, b))?;
    Ok((ahead, behind))
  }
}

/// Open the backend selected by `kind` for the repository at `workdir`.
pub fn open_backend(kind: BackendKind, workdir: &Path, git_path: &Path) -> Result<Arc<dyn GitBackend>, GitError> {
  let backend: Arc<dyn GitBackend> = match kind {
    BackendKind::Cli => Arc::new(CliBackend::new(GitRunner::new(PathBuf::from(git_path), workdir))),
    BackendKind::Lib => Arc::new(LibBackend::open(workdir)?),
  };
  Ok(backend)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::git::runner::RunFailure;

  #[test]
  fn rev_range_formats_as_two_dot_range() {
    let range = RevRange::new("refs/heads/main", "refs/heads/feature");
    assert_eq!(range.to_string(), "refs/heads/main..refs/heads/feature");
  }

  #[test]
  fn classifies_expected_failures() {
    assert!(GitError::NoRevision("refs/heads/x".into()).is_no_revision());

    let missing = GitError::Run(RunError::Failed(RunFailure {
      subcommand: "log".into(),
      exit_code: Some(128),
      stderr: "fatal: bad revision 'refs/heads/x'".into(),
    }));
    assert!(missing.is_no_revision());

    let corrupt = GitError::Run(RunError::Failed(RunFailure {
      subcommand: "log".into(),
      exit_code: Some(128),
      stderr: "fatal: loose object is corrupt".into(),
    }));
    assert!(!corrupt.is_no_revision());

    let unparsable = GitError::Parse {
      command: "rev-list",
      output: "many".into(),
    };
    assert!(!unparsable.is_no_revision());
  }

  #[test]
  fn backend_kind_display_matches_config_names() {
    assert_eq!(BackendKind::Cli.to_string(), "cli");
    assert_eq!(BackendKind::Lib.to_string(), "lib");
    assert_eq!(BackendKind::default(), BackendKind::Cli);
  }
}
