//! [`GitBackend`] implementation on top of libgit2.
//!
//! `git2::Repository` is `Send` but not `Sync`, so the backend only keeps the
//! repository path and opens a fresh handle per query. Queries run on blocking
//! worker threads concurrently and never share a handle.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use git2::{BranchType, DescribeFormatOptions, DescribeOptions, ErrorCode, Oid, Repository};
use tracing::debug;

use super::backend::{BackendKind, DetachedHead, GitBackend, GitError, RefListing, RefsFingerprint, RevRange};
use crate::branches::ListScope;
use crate::commit::{CommitId, CommitInfo, Signature};

/// Backend using an embedded libgit2.
#[derive(Debug, Clone)]
pub struct LibBackend {
  repo_path: PathBuf,
}

impl LibBackend {
  /// Discover the repository containing `path`.
  pub fn open(path: &Path) -> Result<Self, GitError> {
    let repo = Repository::discover(path)?;
    let repo_path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();
    Ok(Self { repo_path })
  }

  fn repo(&self) -> Result<Repository, GitError> {
    Ok(Repository::open(&self.repo_path)?)
  }

  fn resolve(repo: &Repository, rev: &str) -> Result<Oid, GitError> {
    let object = repo.revparse_single(rev)?;
    Ok(object.peel_to_commit()?.id())
  }

  fn collect_branch_type(
    repo: &Repository,
    branch_type: BranchType,
    refs: &mut Vec<RefListing>,
  ) -> Result<(), GitError> {
    let mut listed = Vec::new();
    for branch_result in repo.branches(Some(branch_type))? {
      let (branch, _) = branch_result?;
      if branch.get().symbolic_target().is_some() {
        continue;
      }
      let Some(name) = branch.get().name().map(str::to_string) else {
        continue;
      };
      listed.push(RefListing {
        name,
        is_head: branch.is_head(),
      });
    }

    listed.sort_by(|a, b| a.name.cmp(&b.name));
    refs.extend(listed);
    Ok(())
  }
}

fn signature(signature: &git2::Signature<'_>) -> Signature {
  Signature {
    name: String::from_utf8_lossy(signature.name_bytes()).into_owned(),
    email: String::from_utf8_lossy(signature.email_bytes()).into_owned(),
  }
}

fn commit_info(commit: &git2::Commit<'_>) -> CommitInfo {
  let committer = commit.committer();
  let timestamp = Utc
    .timestamp_opt(committer.when().seconds(), 0)
    .single()
    .unwrap_or_default();

  CommitInfo {
    id: CommitId::from(commit.id()),
    author: signature(&commit.author()),
    committer: signature(&committer),
    summary: commit.summary().unwrap_or_default().to_string(),
    timestamp,
  }
}

impl GitBackend for LibBackend {
  fn kind(&self) -> BackendKind {
    BackendKind::Lib
  }

  fn list_refs(&self, scope: ListScope) -> Result<Vec<RefListing>, GitError> {
    let repo = self.repo()?;
    let mut refs = Vec::new();

    if matches!(scope, ListScope::Local | ListScope::All) {
      Self::collect_branch_type(&repo, BranchType::Local, &mut refs)?;
    }
    if matches!(scope, ListScope::Remote | ListScope::All) {
      Self::collect_branch_type(&repo, BranchType::Remote, &mut refs)?;
    }

    Ok(refs)
  }

  fn detached_head(&self) -> Result<Option<DetachedHead>, GitError> {
    let repo = self.repo()?;
    if !repo.head_detached()? {
      return Ok(None);
    }

    let commit = repo.head()?.peel_to_commit()?;
    let id = CommitId::from(commit.id());

    let mut options = DescribeOptions::new();
    options.describe_tags().max_candidates_tags(0);
    let describe = commit
      .as_object()
      .describe(&options)
      .and_then(|description| description.format(Some(&DescribeFormatOptions::new())))
      .unwrap_or_else(|_| id.short().to_string());

    debug!(%describe, "HEAD is detached");
    Ok(Some(DetachedHead { describe, commit: id }))
  }

  fn rev_count(&self, range: &RevRange) -> Result<usize, GitError> {
    let repo = self.repo()?;
    let include = Self::resolve(&repo, &range.include)?;
    let exclude = Self::resolve(&repo, &range.exclude)?;
    let (ahead, _) = repo.graph_ahead_behind(include, exclude)?;
    Ok(ahead)
  }

  fn ahead_behind(&self, a: &str, b: &str) -> Result<(usize, usize), GitError> {
    let repo = self.repo()?;
    let a = Self::resolve(&repo, a)?;
    let b = Self::resolve(&repo, b)?;
    Ok(repo.graph_ahead_behind(a, b)?)
  }

  fn merge_base(&self, a: &str, b: &str) -> Result<Option<CommitId>, GitError> {
    let repo = self.repo()?;
    let a = Self::resolve(&repo, a)?;
    let b = Self::resolve(&repo, b)?;

    match repo.merge_base(a, b) {
      Ok(oid) => Ok(Some(CommitId::from(oid))),
      Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
      Err(err) => Err(err.into()),
    }
  }

  fn last_commit_info(&self, rev: &str) -> Result<CommitInfo, GitError> {
    let repo = self.repo()?;
    let commit = repo.revparse_single(rev)?.peel_to_commit()?;
    Ok(commit_info(&commit))
  }

  fn refs_fingerprint(&self) -> Result<RefsFingerprint, GitError> {
    let repo = self.repo()?;
    let mut refs = BTreeMap::new();

    for reference in repo.references()? {
      let reference = reference?;
      let Some(name) = reference.name() else {
        continue;
      };
      if !(name.starts_with("refs/heads/") || name.starts_with("refs/remotes/")) {
        continue;
      }
      let target = match (reference.target(), reference.symbolic_target()) {
        (Some(oid), _) => oid.to_string(),
        (None, Some(symbolic)) => symbolic.to_string(),
        (None, None) => String::new(),
      };
      refs.insert(name.to_string(), target);
    }

    let head = repo.find_reference("HEAD")?;
    let symbolic = head.symbolic_target().unwrap_or_default().to_string();
    let commit = head
      .resolve()
      .ok()
      .and_then(|resolved| resolved.target())
      .map(|oid| oid.to_string())
      .unwrap_or_default();

    Ok(RefsFingerprint {
      refs,
      head: format!("{symbolic}@{commit}"),
    })
  }
}
