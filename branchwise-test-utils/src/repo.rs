//! Temporary git repositories for tests
//!
//! [`TestRepo`] owns a freshly initialised repository inside a [`TempDir`]
//! whose initial branch is always `main`, independent of the host's
//! `init.defaultBranch` setting. Commits are created through `git2` with
//! explicit, monotonically increasing timestamps so recency ordering is
//! deterministic.

use std::cell::Cell;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use git2::build::CheckoutBuilder;
use git2::{Oid, Repository, RepositoryInitOptions, Signature, Time};
use tempfile::TempDir;

/// Timestamp (seconds since the epoch) of the first commit created by a
/// [`TestRepo`]. Each further commit is one minute later.
pub const TEST_EPOCH: i64 = 1_700_000_000;

/// A temporary git repository that is deleted when dropped.
pub struct TestRepo {
  /// The temporary directory containing the repository
  pub temp_dir: TempDir,
  /// The repository handle
  pub repo: Repository,
  clock: Cell<i64>,
}

impl TestRepo {
  /// Initialise an empty repository whose unborn HEAD points at `main`.
  pub fn new() -> Self {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");

    let mut options = RepositoryInitOptions::new();
    options.initial_head("main");
    let repo = Repository::init_opts(temp_dir.path(), &options).expect("Failed to initialize git repository");

    let mut config = repo.config().expect("Failed to get repository config");
    config
      .set_str("user.name", "Branchwise Test User")
      .expect("Failed to set user.name");
    config
      .set_str("user.email", "branchwise-test@example.com")
      .expect("Failed to set user.email");

    Self {
      temp_dir,
      repo,
      clock: Cell::new(TEST_EPOCH),
    }
  }

  /// Path to the repository working directory.
  pub fn path(&self) -> &Path {
    self.temp_dir.path()
  }

  /// Write `file_name`, stage it and commit on top of HEAD (or as a root
  /// commit when HEAD is unborn). Returns the new commit id.
  pub fn commit(&self, file_name: &str, content: &str, message: &str) -> Result<Oid> {
    let seconds = self.clock.get();
    self.clock.set(seconds + 60);
    self.commit_at(file_name, content, message, seconds)
  }

  /// Same as [`TestRepo::commit`] with an explicit commit timestamp.
  pub fn commit_at(&self, file_name: &str, content: &str, message: &str, seconds: i64) -> Result<Oid> {
    fs::write(self.path().join(file_name), content).with_context(|| format!("Failed to write {file_name}"))?;

    let mut index = self.repo.index()?;
    index.add_path(Path::new(file_name))?;
    index.write()?;

    let tree = self.repo.find_tree(index.write_tree()?)?;
    let signature = Signature::new("Test User", "test@example.com", &Time::new(seconds, 0))?;

    let parent = self.repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

    let oid = self
      .repo
      .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
    Ok(oid)
  }

  /// Create a local branch pointing at the current HEAD commit.
  pub fn branch(&self, name: &str) -> Result<Oid> {
    let head = self.repo.head()?.peel_to_commit()?;
    self.repo.branch(name, &head, false)?;
    Ok(head.id())
  }

  /// Create a local branch pointing at `target`.
  pub fn branch_at(&self, name: &str, target: Oid) -> Result<()> {
    let commit = self.repo.find_commit(target)?;
    self.repo.branch(name, &commit, false)?;
    Ok(())
  }

  /// Point HEAD at an existing local branch and update the working tree.
  pub fn checkout(&self, name: &str) -> Result<()> {
    let refname = format!("refs/heads/{name}");
    let commit = self.repo.revparse_single(&refname)?.peel_to_commit()?;

    self
      .repo
      .checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))?;
    self.repo.set_head(&refname)?;
    Ok(())
  }

  /// Point HEAD at a new unborn branch so the next commit starts an unrelated
  /// history.
  pub fn orphan(&self, name: &str) -> Result<()> {
    self.repo.set_head(&format!("refs/heads/{name}"))?;
    Ok(())
  }

  /// Detach HEAD at `target`.
  pub fn detach(&self, target: Oid) -> Result<()> {
    let commit = self.repo.find_commit(target)?;
    self
      .repo
      .checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))?;
    self.repo.set_head_detached(target)?;
    Ok(())
  }

  /// Create a lightweight tag at `target`.
  pub fn tag(&self, name: &str, target: Oid) -> Result<()> {
    let object = self.repo.find_object(target, None)?;
    self.repo.tag_lightweight(name, &object, false)?;
    Ok(())
  }

  /// Create a remote-tracking ref `refs/remotes/<remote>/<name>` at `target`
  /// without configuring or fetching from a real remote.
  pub fn remote_branch(&self, remote: &str, name: &str, target: Oid) -> Result<()> {
    self.repo.reference(
      &format!("refs/remotes/{remote}/{name}"),
      target,
      true,
      "branchwise test remote branch",
    )?;
    Ok(())
  }

  /// Create the symbolic `refs/remotes/<remote>/HEAD` pointing at
  /// `refs/remotes/<remote>/<name>`.
  pub fn remote_head(&self, remote: &str, name: &str) -> Result<()> {
    self.repo.reference_symbolic(
      &format!("refs/remotes/{remote}/HEAD"),
      &format!("refs/remotes/{remote}/{name}"),
      true,
      "branchwise test remote head",
    )?;
    Ok(())
  }

  /// Commit id of the tip of a local branch.
  pub fn tip(&self, name: &str) -> Result<Oid> {
    let commit = self
      .repo
      .revparse_single(&format!("refs/heads/{name}"))?
      .peel_to_commit()?;
    Ok(commit.id())
  }
}

impl Default for TestRepo {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_repository_starts_on_unborn_main() {
    let repo = TestRepo::new();
    assert!(repo.path().join(".git").exists());
    assert!(repo.repo.head().is_err());

    repo.commit("a.txt", "a", "first").unwrap();
    assert_eq!(repo.repo.head().unwrap().shorthand(), Some("main"));
  }

  #[test]
  fn commits_advance_the_clock() {
    let repo = TestRepo::new();
    let first = repo.commit("a.txt", "a", "first").unwrap();
    let second = repo.commit("b.txt", "b", "second").unwrap();

    let first = repo.repo.find_commit(first).unwrap();
    let second = repo.repo.find_commit(second).unwrap();
    assert_eq!(first.time().seconds(), TEST_EPOCH);
    assert_eq!(second.time().seconds(), TEST_EPOCH + 60);
    assert_eq!(second.parent_id(0).unwrap(), first.id());
  }

  #[test]
  fn orphan_branch_has_unrelated_root() {
    let repo = TestRepo::new();
    let main_root = repo.commit("a.txt", "a", "main root").unwrap();

    repo.orphan("pages").unwrap();
    let pages_root = repo.commit("index.html", "<html/>", "pages root").unwrap();

    let pages = repo.repo.find_commit(pages_root).unwrap();
    assert_eq!(pages.parent_count(), 0);
    assert!(repo.repo.merge_base(main_root, pages_root).is_err());
    assert_eq!(repo.tip("pages").unwrap(), pages_root);
  }

  #[test]
  fn remote_refs_and_detached_head() {
    let repo = TestRepo::new();
    let oid = repo.commit("a.txt", "a", "first").unwrap();

    repo.remote_branch("origin", "main", oid).unwrap();
    repo.remote_head("origin", "main").unwrap();
    assert!(repo.repo.find_reference("refs/remotes/origin/main").is_ok());

    repo.detach(oid).unwrap();
    assert!(repo.repo.head_detached().unwrap());
  }
}
