//! [`GitBackend`] implementation that shells out to the `git` executable.
//!
//! Only machine-readable output formats are parsed: `for-each-ref` with a NUL
//! separated format, `rev-list --count`, `merge-base` and `log` with an
//! explicit `--format`.

use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use tracing::debug;

use super::backend::{BackendKind, DetachedHead, GitBackend, GitError, RefListing, RefsFingerprint, RevRange};
use super::runner::{GitRunner, RunError};
use crate::branches::ListScope;
use crate::commit::{CommitId, CommitInfo, Signature};

const REF_LISTING_FORMAT: &str = "--format=%(refname)%00%(HEAD)%00%(symref)";
const REF_TARGET_FORMAT: &str = "--format=%(refname)%00%(objectname)%00%(symref)";
const COMMIT_FORMAT: &str = "--format=%H%x00%an%x00%ae%x00%cn%x00%ce%x00%ct%x00%s";

/// Backend driving the `git` command-line tool.
#[derive(Debug, Clone)]
pub struct CliBackend {
  runner: GitRunner,
}

impl CliBackend {
  pub fn new(runner: GitRunner) -> Self {
    Self { runner }
  }

  /// Run a command whose quiet exit code 1 means "nothing found".
  fn run_optional(&self, subcommand: &str, args: &[&str]) -> Result<Option<String>, GitError> {
    match self.runner.run(subcommand, args) {
      Ok(output) => Ok(Some(output)),
      Err(RunError::Failed(failure)) if failure.is_quiet_miss() => Ok(None),
      Err(err) => Err(err.into()),
    }
  }
}

fn scope_patterns(scope: ListScope) -> &'static [&'static str] {
  match scope {
    ListScope::Local => &["refs/heads"],
    ListScope::Remote => &["refs/remotes"],
    ListScope::All => &["refs/heads", "refs/remotes"],
  }
}

/// Parse `for-each-ref --format=%(refname)%00%(HEAD)%00%(symref)` output.
///
/// Symbolic refs such as `refs/remotes/origin/HEAD` are skipped; a branch
/// that merely ends in `/HEAD` is kept.
pub(crate) fn parse_ref_listing(output: &str) -> Vec<RefListing> {
  output
    .lines()
    .filter_map(|line| {
      let mut fields = line.split('\0');
      let name = fields.next().unwrap_or_default().trim();
      let marker = fields.next().unwrap_or_default();
      let symref = fields.next().unwrap_or_default().trim();
      if name.is_empty() || !symref.is_empty() {
        return None;
      }
      Some(RefListing {
        name: name.to_string(),
        is_head: marker.trim() == "*",
      })
    })
    .collect()
}

/// Parse one commit line produced with [`COMMIT_FORMAT`].
pub(crate) fn parse_commit_line(rev: &str, output: &str) -> Result<CommitInfo, GitError> {
  let line = output.lines().next().unwrap_or_default();
  if line.is_empty() {
    return Err(GitError::NoRevision(rev.to_string()));
  }

  let fields: Vec<&str> = line.splitn(7, '\0').collect();
  let [id, author_name, author_email, committer_name, committer_email, seconds, summary] = fields.as_slice() else {
    return Err(GitError::Parse {
      command: "log",
      output: output.to_string(),
    });
  };

  let timestamp = seconds
    .parse::<i64>()
    .ok()
    .and_then(|seconds| Utc.timestamp_opt(seconds, 0).single())
    .ok_or_else(|| GitError::Parse {
      command: "log",
      output: output.to_string(),
    })?;

  Ok(CommitInfo {
    id: CommitId::new(*id),
    author: Signature {
      name: author_name.to_string(),
      email: author_email.to_string(),
    },
    committer: Signature {
      name: committer_name.to_string(),
      email: committer_email.to_string(),
    },
    summary: summary.to_string(),
    timestamp,
  })
}

impl GitBackend for CliBackend {
  fn kind(&self) -> BackendKind {
    BackendKind::Cli
  }

  fn list_refs(&self, scope: ListScope) -> Result<Vec<RefListing>, GitError> {
    let mut args = vec![REF_LISTING_FORMAT];
    args.extend_from_slice(scope_patterns(scope));
    let output = self.runner.run("for-each-ref", &args)?;
    Ok(parse_ref_listing(&output))
  }

  fn detached_head(&self) -> Result<Option<DetachedHead>, GitError> {
    if self.run_optional("symbolic-ref", &["-q", "HEAD"])?.is_some() {
      return Ok(None);
    }

    let Some(hash) = self.run_optional("rev-parse", &["-q", "--verify", "HEAD^{commit}"])? else {
      return Ok(None);
    };
    let commit = CommitId::new(hash);

    let describe = match self.runner.run("describe", ["--tags", "--exact-match", "HEAD"]) {
      Ok(tag) if !tag.is_empty() => tag,
      Ok(_) | Err(RunError::Failed(_)) => commit.short().to_string(),
      Err(err) => return Err(err.into()),
    };

    debug!(%describe, "HEAD is detached");
    Ok(Some(DetachedHead { describe, commit }))
  }

  fn rev_count(&self, range: &RevRange) -> Result<usize, GitError> {
    let output = self.runner.run("rev-list", ["--count".to_string(), range.to_string()])?;
    output.parse().map_err(|_| GitError::Parse {
      command: "rev-list",
      output,
    })
  }

  fn merge_base(&self, a: &str, b: &str) -> Result<Option<CommitId>, GitError> {
    Ok(
      self
        .run_optional("merge-base", &[a, b])?
        .filter(|hash| !hash.is_empty())
        .map(CommitId::new),
    )
  }

  fn last_commit_info(&self, rev: &str) -> Result<CommitInfo, GitError> {
    let output = self.runner.run("log", ["-1", COMMIT_FORMAT, rev, "--"])?;
    parse_commit_line(rev, &output)
  }

  fn refs_fingerprint(&self) -> Result<RefsFingerprint, GitError> {
    let output = self
      .runner
      .run("for-each-ref", [REF_TARGET_FORMAT, "refs/heads", "refs/remotes"])?;

    let mut refs = BTreeMap::new();
    for line in output.lines() {
      let mut fields = line.split('\0');
      let name = fields.next().unwrap_or_default();
      let target = fields.next().unwrap_or_default();
      let symref = fields.next().unwrap_or_default();
      if name.is_empty() {
        continue;
      }
      let target = if symref.is_empty() { target } else { symref };
      refs.insert(name.to_string(), target.to_string());
    }

    let symbolic = self.run_optional("symbolic-ref", &["-q", "HEAD"])?.unwrap_or_default();
    let commit = self
      .run_optional("rev-parse", &["-q", "--verify", "HEAD^{commit}"])?
      .unwrap_or_default();

    Ok(RefsFingerprint {
      refs,
      head: format!("{symbolic}@{commit}"),
    })
  }
}
