//! # Branch Lister
//!
//! Turns ref listings into [`Branch`] descriptors, synthesises the detached
//! HEAD branch and provides the two branch orders.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::commit::CommitInfo;
use crate::fanout::fan_out;
use crate::git::{DetachedHead, GitBackend, GitError, RefListing};

const LOCAL_PREFIX: &str = "refs/heads/";
const REMOTE_PREFIX: &str = "refs/remotes/";

/// Where a branch lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchScope {
  Local,
  Remote,
  Detached,
}

impl BranchScope {
  /// Presentation order of the scope partitions.
  pub const ORDER: [BranchScope; 3] = [BranchScope::Local, BranchScope::Remote, BranchScope::Detached];

  pub fn heading(&self) -> &'static str {
    match self {
      BranchScope::Local => "Local branches",
      BranchScope::Remote => "Remote branches",
      BranchScope::Detached => "Detached HEAD",
    }
  }
}

/// Which refs a listing covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListScope {
  #[default]
  Local,
  Remote,
  /// Local branches followed by remote-tracking branches.
  All,
}

impl ListScope {
  pub fn with_remotes(include_remotes: bool) -> Self {
    if include_remotes {
      ListScope::All
    } else {
      ListScope::Local
    }
  }
}

/// A branch, remote-tracking branch or detached HEAD.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Branch {
  /// Human-readable name, e.g. `feature/x` or `origin/main`.
  pub id: String,
  pub scope: BranchScope,
  /// Canonical ref used for every query. For a detached HEAD this is the full
  /// commit hash.
  #[serde(rename = "ref")]
  pub reference: String,
  pub is_head: bool,
}

impl Branch {
  pub fn local(id: impl Into<String>) -> Self {
    let id = id.into();
    Self {
      reference: format!("{LOCAL_PREFIX}{id}"),
      id,
      scope: BranchScope::Local,
      is_head: false,
    }
  }

  pub fn remote(id: impl Into<String>) -> Self {
    let id = id.into();
    Self {
      reference: format!("{REMOTE_PREFIX}{id}"),
      id,
      scope: BranchScope::Remote,
      is_head: false,
    }
  }

  pub fn detached(head: &DetachedHead) -> Self {
    Self {
      id: head.describe.clone(),
      scope: BranchScope::Detached,
      reference: head.commit.to_string(),
      is_head: true,
    }
  }

  pub fn with_head(mut self, is_head: bool) -> Self {
    self.is_head = is_head;
    self
  }

  /// Parse a listed ref; refs outside `refs/heads` and `refs/remotes` are
  /// ignored.
  pub fn from_ref_listing(listing: &RefListing) -> Option<Self> {
    if let Some(id) = listing.name.strip_prefix(LOCAL_PREFIX) {
      Some(Self::local(id).with_head(listing.is_head))
    } else {
      listing
        .name
        .strip_prefix(REMOTE_PREFIX)
        .map(|id| Self::remote(id).with_head(listing.is_head))
    }
  }

  /// Last `/`-separated segment of the id, used for pin matching.
  pub fn name(&self) -> &str {
    self.id.rsplit('/').next().unwrap_or(&self.id)
  }
}

impl fmt::Display for Branch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.id)
  }
}

/// Base order applied to branches.
#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMethod {
  /// Most recently committed first
  #[default]
  Recency,
  /// By branch name
  Alphabetic,
}

/// The commit a branch points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchTip {
  Commit(CommitInfo),
  /// The branch has no commits (unborn or dangling ref).
  NoRevision,
}

impl BranchTip {
  pub fn commit(&self) -> Option<&CommitInfo> {
    match self {
      BranchTip::Commit(info) => Some(info),
      BranchTip::NoRevision => None,
    }
  }
}

/// Tips keyed by branch reference.
pub type BranchTips = HashMap<String, BranchTip>;

/// List branches in `scope`. The detached HEAD is included unless only
/// remotes were requested. An empty repository yields an empty list.
pub fn list_branches(backend: &dyn GitBackend, scope: ListScope) -> Result<Vec<Branch>, GitError> {
  let mut branches: Vec<Branch> = backend
    .list_refs(scope)?
    .iter()
    .filter_map(Branch::from_ref_listing)
    .collect();

  if scope != ListScope::Remote
    && let Some(head) = backend.detached_head()?
  {
    branches.push(Branch::detached(&head));
  }

  debug!(count = branches.len(), ?scope, "listed branches");
  Ok(branches)
}

/// Resolve the tip commit of every branch concurrently.
pub async fn resolve_tips(
  backend: Arc<dyn GitBackend>,
  branches: &[Branch],
  max_concurrency: usize,
) -> Result<BranchTips, GitError> {
  let jobs = branches
    .iter()
    .map(|branch| {
      let backend = Arc::clone(&backend);
      let reference = branch.reference.clone();
      let job = move || match backend.last_commit_info(&reference) {
        Ok(info) => Ok(BranchTip::Commit(info)),
        Err(err) if err.is_no_revision() => {
          debug!(%reference, "branch has no revision");
          Ok(BranchTip::NoRevision)
        }
        Err(err) => Err(err),
      };
      (branch.reference.clone(), job)
    })
    .collect();

  Ok(fan_out(jobs, max_concurrency).await?.into_iter().collect())
}

/// Total order used by [`SortMethod`].
pub fn compare_branches(a: &Branch, b: &Branch, method: SortMethod, tips: &BranchTips) -> Ordering {
  let by_name = a.id.cmp(&b.id);
  match method {
    SortMethod::Alphabetic => by_name,
    SortMethod::Recency => {
      let when = |branch: &Branch| {
        tips
          .get(&branch.reference)
          .and_then(BranchTip::commit)
          .map(|info| info.timestamp)
      };
      match (when(a), when(b)) {
        (Some(a_time), Some(b_time)) => b_time.cmp(&a_time).then(by_name),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => by_name,
      }
    }
  }
}

/// Sort `branches` in place.
pub fn sort_branches(branches: &mut [Branch], method: SortMethod, tips: &BranchTips) {
  branches.sort_by(|a, b| compare_branches(a, b, method, tips));
}

#[cfg(test)]
mod tests {
  use branchwise_test_utils::TestRepo;

  use super::*;
  use crate::git::fake::FakeBackend;
  use crate::git::{BackendKind, GIT_EXECUTABLE, open_backend};

  fn ids(branches: &[Branch]) -> Vec<&str> {
    branches.iter().map(|branch| branch.id.as_str()).collect()
  }

  #[test]
  fn parses_local_and_remote_refs() {
    let local = Branch::from_ref_listing(&RefListing {
      name: "refs/heads/feature/login".into(),
      is_head: true,
    })
    .unwrap();
    assert_eq!(local.id, "feature/login");
    assert_eq!(local.scope, BranchScope::Local);
    assert_eq!(local.name(), "login");
    assert!(local.is_head);

    let remote = Branch::from_ref_listing(&RefListing {
      name: "refs/remotes/origin/main".into(),
      is_head: false,
    })
    .unwrap();
    assert_eq!(remote.id, "origin/main");
    assert_eq!(remote.reference, "refs/remotes/origin/main");
    assert_eq!(remote.name(), "main");

    assert!(
      Branch::from_ref_listing(&RefListing {
        name: "refs/tags/v1".into(),
        is_head: false,
      })
      .is_none()
    );
  }

  #[test]
  fn detached_head_is_listed_unless_remote_only() {
    let backend = FakeBackend::new();
    backend
      .commit("c1", &[], 100)
      .branch("main", "c1")
      .remote("origin/main", "c1")
      .detach("c1", Some("v1.0"));

    let local = list_branches(&backend, ListScope::Local).unwrap();
    assert_eq!(ids(&local), vec!["main", "v1.0"]);
    let detached = &local[1];
    assert_eq!(detached.scope, BranchScope::Detached);
    assert_eq!(detached.reference, "c1");
    assert!(detached.is_head);

    let remote = list_branches(&backend, ListScope::Remote).unwrap();
    assert_eq!(ids(&remote), vec!["origin/main"]);

    let all = list_branches(&backend, ListScope::All).unwrap();
    assert_eq!(ids(&all), vec!["main", "origin/main", "v1.0"]);
  }

  #[test]
  fn empty_repository_lists_no_branches() {
    let repo = TestRepo::new();
    for kind in [BackendKind::Cli, BackendKind::Lib] {
      let backend = open_backend(kind, repo.path(), GIT_EXECUTABLE.as_ref()).unwrap();
      assert!(list_branches(backend.as_ref(), ListScope::All).unwrap().is_empty());
    }
  }

  #[tokio::test]
  async fn recency_sorts_newest_first_and_no_revision_last() {
    let backend = FakeBackend::new();
    backend
      .commit("old", &[], 100)
      .commit("new", &["old"], 300)
      .branch("zeta", "old")
      .branch("alpha", "old")
      .branch("beta", "new")
      .branch("empty", "missing-commit");
    let backend: Arc<dyn GitBackend> = Arc::new(backend);

    let mut branches = list_branches(backend.as_ref(), ListScope::Local).unwrap();
    let tips = resolve_tips(Arc::clone(&backend), &branches, 2).await.unwrap();
    assert_eq!(tips["refs/heads/empty"], BranchTip::NoRevision);

    sort_branches(&mut branches, SortMethod::Recency, &tips);
    assert_eq!(ids(&branches), vec!["beta", "alpha", "zeta", "empty"]);

    sort_branches(&mut branches, SortMethod::Alphabetic, &tips);
    assert_eq!(ids(&branches), vec!["alpha", "beta", "empty", "zeta"]);
  }

  #[tokio::test]
  async fn unexpected_tip_failure_is_an_error() {
    let backend = FakeBackend::new();
    backend
      .commit("c1", &[], 100)
      .branch("main", "c1")
      .fail_on("refs/heads/main");
    let backend: Arc<dyn GitBackend> = Arc::new(backend);

    let branches = vec![Branch::local("main")];
    let err = resolve_tips(backend, &branches, 1).await.unwrap_err();
    assert!(!err.is_no_revision());
  }

  #[tokio::test]
  async fn tips_from_a_real_repository() {
    let repo = TestRepo::new();
    repo.commit("a.txt", "a", "first").unwrap();
    repo.branch("older").unwrap();
    repo.commit("b.txt", "b", "second").unwrap();

    let backend = open_backend(BackendKind::Cli, repo.path(), GIT_EXECUTABLE.as_ref()).unwrap();
    let mut branches = list_branches(backend.as_ref(), ListScope::Local).unwrap();
    let tips = resolve_tips(Arc::clone(&backend), &branches, 4).await.unwrap();

    sort_branches(&mut branches, SortMethod::Recency, &tips);
    assert_eq!(ids(&branches), vec!["main", "older"]);
    assert_eq!(tips["refs/heads/main"].commit().unwrap().summary, "second");
  }
}
