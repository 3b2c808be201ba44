//! Repository context and the computation pass.
//!
//! A [`RepoContext`] is created once a repository has been discovered and is
//! handed explicitly to every pass. A pass lists branches, resolves their tips,
//! compares every pair, gathers merge-base metadata and assembles the tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::branches::{ListScope, list_branches, resolve_tips};
use crate::commit::CommitCatalog;
use crate::fanout::fan_out;
use crate::git::{BackendKind, GitBackend, GitError, open_backend, wait_for_repository};
use crate::relations::{CompareOptions, DEFAULT_MAX_CONCURRENCY, compare_all};
use crate::tree::{PassData, TreeNode, TreeOptions, assemble};

/// Default bound on waiting for a repository to appear.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// An open repository and the backend used to query it.
#[derive(Clone)]
pub struct RepoContext {
  workdir: PathBuf,
  backend: Arc<dyn GitBackend>,
}

impl std::fmt::Debug for RepoContext {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RepoContext")
      .field("workdir", &self.workdir)
      .field("backend", &self.backend.kind())
      .finish()
  }
}

impl RepoContext {
  pub fn new(workdir: impl Into<PathBuf>, backend: Arc<dyn GitBackend>) -> Self {
    Self {
      workdir: workdir.into(),
      backend,
    }
  }

  /// Open the repository at `workdir` with the selected backend.
  pub fn open(workdir: &Path, kind: BackendKind, git_path: &Path) -> Result<Self, GitError> {
    let backend = open_backend(kind, workdir, git_path)?;
    Ok(Self::new(workdir, backend))
  }

  /// Wait up to `timeout` for a repository at or above `path`.
  ///
  /// `Ok(None)` means no repository was found in time.
  pub async fn discover(
    path: &Path,
    timeout: Duration,
    kind: BackendKind,
    git_path: &Path,
  ) -> Result<Option<Self>, GitError> {
    match wait_for_repository(path, timeout).await {
      Some(workdir) => {
        info!(workdir = %workdir.display(), backend = %kind, "opening repository");
        Self::open(&workdir, kind, git_path).map(Some)
      }
      None => Ok(None),
    }
  }

  pub fn workdir(&self) -> &Path {
    &self.workdir
  }

  pub fn backend(&self) -> &Arc<dyn GitBackend> {
    &self.backend
  }
}

/// What one pass reads from the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOptions {
  pub scope: ListScope,
  pub max_concurrency: usize,
}

impl Default for PassOptions {
  fn default() -> Self {
    Self {
      scope: ListScope::Local,
      max_concurrency: DEFAULT_MAX_CONCURRENCY,
    }
  }
}

/// Gather branches, tips, relationships and commit metadata.
pub async fn run_pass(ctx: &RepoContext, options: &PassOptions) -> Result<PassData, GitError> {
  let backend = Arc::clone(ctx.backend());
  let scope = options.scope;

  let listing_backend = Arc::clone(&backend);
  let branches = tokio::task::spawn_blocking(move || list_branches(listing_backend.as_ref(), scope)).await??;

  let tips = resolve_tips(Arc::clone(&backend), &branches, options.max_concurrency).await?;
  let relationships = compare_all(
    Arc::clone(&backend),
    &branches,
    &tips,
    &CompareOptions {
      max_concurrency: options.max_concurrency,
    },
  )
  .await?;

  let mut commits = CommitCatalog::new();
  for tip in tips.values().filter_map(|tip| tip.commit()) {
    commits.insert(tip.clone());
  }

  let jobs: Vec<_> = relationships
    .merge_bases()
    .into_iter()
    .filter(|id| !commits.contains(id))
    .map(|id| {
      let backend = Arc::clone(&backend);
      let rev = id.to_string();
      (id, move || backend.last_commit_info(&rev))
    })
    .collect();
  debug!(count = jobs.len(), "fetching merge-base commits");
  for (_, info) in fan_out(jobs, options.max_concurrency).await? {
    commits.insert(info);
  }

  Ok(PassData {
    branches,
    tips,
    relationships,
    commits,
  })
}

/// Run a pass and assemble its tree.
pub async fn build_tree(
  ctx: &RepoContext,
  pass: &PassOptions,
  tree: &TreeOptions,
) -> Result<(PassData, Vec<TreeNode>), GitError> {
  let data = run_pass(ctx, pass).await?;
  let nodes = assemble(&data, tree);
  Ok((data, nodes))
}

#[cfg(test)]
mod tests {
  use branchwise_test_utils::TestRepo;
  use tempfile::TempDir;

  use super::*;
  use crate::commit::CommitId;
  use crate::git::GIT_EXECUTABLE;
  use crate::tree::{CommitRole, SecondaryStatus};

  /// main: C1 - C2 - C3, feature: C1 - C2 - C4
  fn scenario() -> (TestRepo, git2::Oid) {
    let repo = TestRepo::new();
    repo.commit("c1.txt", "1", "C1").unwrap();
    let c2 = repo.commit("c2.txt", "2", "C2").unwrap();
    repo.branch("feature").unwrap();
    repo.commit("c3.txt", "3", "C3").unwrap();
    repo.checkout("feature").unwrap();
    repo.commit("c4.txt", "4", "C4").unwrap();
    (repo, c2)
  }

  #[tokio::test]
  async fn discovery_gives_up_without_repository() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = RepoContext::discover(
      temp_dir.path(),
      Duration::ZERO,
      BackendKind::Cli,
      GIT_EXECUTABLE.as_ref(),
    )
    .await
    .unwrap();
    assert!(ctx.is_none());
  }

  #[tokio::test]
  async fn pass_resolves_merge_base_metadata() {
    let (repo, c2) = scenario();
    for kind in [BackendKind::Cli, BackendKind::Lib] {
      let ctx = RepoContext::discover(repo.path(), Duration::ZERO, kind, GIT_EXECUTABLE.as_ref())
        .await
        .unwrap()
        .unwrap();
      let (data, nodes) = build_tree(&ctx, &PassOptions::default(), &TreeOptions::default())
        .await
        .unwrap();

      assert_eq!(data.branches.len(), 2);
      assert_eq!(data.relationships.len(), 1);

      let main = nodes[0].as_primary().unwrap();
      assert_eq!(main.branch.id, "main");
      let feature = main.children[0].as_secondary().unwrap();
      assert_eq!(
        feature.status,
        SecondaryStatus::Unmerged {
          ahead: 1,
          behind: 1,
          symmetric: 2
        }
      );

      let base = feature
        .children
        .iter()
        .find_map(|node| match node {
          TreeNode::Commit(leaf) if leaf.role == CommitRole::MergeBase => leaf.commit.clone(),
          _ => None,
        })
        .unwrap();
      assert_eq!(base.id, CommitId::from(c2));
      assert_eq!(base.summary(), Some("C2"));
    }
  }
}
