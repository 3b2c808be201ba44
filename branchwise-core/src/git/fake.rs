//! In-memory [`GitBackend`] for unit tests.
//!
//! Commits form a small DAG keyed by arbitrary ids. Refs point at commit ids;
//! a ref pointing at an unknown id behaves like a branch without revision.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{TimeZone, Utc};

use super::backend::{BackendKind, DetachedHead, GitBackend, GitError, RefListing, RefsFingerprint, RevRange};
use crate::branches::ListScope;
use crate::commit::{CommitId, CommitInfo, Signature};

#[derive(Debug, Clone)]
struct FakeCommit {
  parents: Vec<String>,
  seconds: i64,
}

#[derive(Debug, Clone)]
enum FakeHead {
  Branch(String),
  Detached(String),
}

#[derive(Debug, Default)]
struct State {
  commits: HashMap<String, FakeCommit>,
  refs: BTreeMap<String, String>,
  tags: HashMap<String, String>,
  head: Option<FakeHead>,
  failing: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct FakeBackend {
  state: Mutex<State>,
  pair_queries: AtomicUsize,
}

impl FakeBackend {
  pub fn new() -> Self {
    Self::default()
  }

  fn state(&self) -> std::sync::MutexGuard<'_, State> {
    self.state.lock().unwrap()
  }

  pub fn commit(&self, id: &str, parents: &[&str], seconds: i64) -> &Self {
    self.state().commits.insert(
      id.to_string(),
      FakeCommit {
        parents: parents.iter().map(|parent| parent.to_string()).collect(),
        seconds,
      },
    );
    self
  }

  /// Point `refs/heads/<name>` at `target`.
  pub fn branch(&self, name: &str, target: &str) -> &Self {
    self.state().refs.insert(format!("refs/heads/{name}"), target.to_string());
    self
  }

  /// Point `refs/remotes/<name>` at `target`.
  pub fn remote(&self, name: &str, target: &str) -> &Self {
    self.state().refs.insert(format!("refs/remotes/{name}"), target.to_string());
    self
  }

  pub fn checkout(&self, name: &str) -> &Self {
    self.state().head = Some(FakeHead::Branch(format!("refs/heads/{name}")));
    self
  }

  pub fn detach(&self, commit: &str, tag: Option<&str>) -> &Self {
    let mut state = self.state();
    state.head = Some(FakeHead::Detached(commit.to_string()));
    if let Some(tag) = tag {
      state.tags.insert(commit.to_string(), tag.to_string());
    }
    drop(state);
    self
  }

  /// Make every query touching `rev` fail with an unexpected error.
  pub fn fail_on(&self, rev: &str) -> &Self {
    self.state().failing.insert(rev.to_string());
    self
  }

  /// Number of `rev_count` and `merge_base` calls served so far.
  pub fn pair_queries(&self) -> usize {
    self.pair_queries.load(Ordering::SeqCst)
  }

  fn resolve(state: &State, rev: &str) -> Result<String, GitError> {
    if state.failing.contains(rev) {
      return Err(GitError::Parse {
        command: "fake",
        output: rev.to_string(),
      });
    }
    let id = state.refs.get(rev).map(String::as_str).unwrap_or(rev);
    if state.commits.contains_key(id) {
      Ok(id.to_string())
    } else {
      Err(GitError::NoRevision(rev.to_string()))
    }
  }

  fn ancestors(state: &State, id: &str) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut stack = vec![id.to_string()];
    while let Some(next) = stack.pop() {
      if !seen.insert(next.clone()) {
        continue;
      }
      if let Some(commit) = state.commits.get(&next) {
        stack.extend(commit.parents.iter().cloned());
      }
    }
    seen
  }
}

impl GitBackend for FakeBackend {
  fn kind(&self) -> BackendKind {
    BackendKind::Cli
  }

  fn list_refs(&self, scope: ListScope) -> Result<Vec<RefListing>, GitError> {
    let state = self.state();
    let head = match &state.head {
      Some(FakeHead::Branch(name)) => Some(name.as_str()),
      _ => None,
    };

    let listed: Vec<RefListing> = state
      .refs
      .keys()
      .filter(|name| match scope {
        ListScope::Local => name.starts_with("refs/heads/"),
        ListScope::Remote => name.starts_with("refs/remotes/"),
        ListScope::All => true,
      })
      .map(|name| RefListing {
        name: name.clone(),
        is_head: head == Some(name.as_str()),
      })
      .collect();

    Ok(listed)
  }

  fn detached_head(&self) -> Result<Option<DetachedHead>, GitError> {
    let state = self.state();
    let Some(FakeHead::Detached(commit)) = &state.head else {
      return Ok(None);
    };
    let id = CommitId::new(commit.clone());
    let describe = state
      .tags
      .get(commit)
      .cloned()
      .unwrap_or_else(|| id.short().to_string());
    Ok(Some(DetachedHead { describe, commit: id }))
  }

  fn rev_count(&self, range: &RevRange) -> Result<usize, GitError> {
    self.pair_queries.fetch_add(1, Ordering::SeqCst);
    let state = self.state();
    let include = Self::resolve(&state, &range.include)?;
    let exclude = Self::resolve(&state, &range.exclude)?;
    let excluded = Self::ancestors(&state, &exclude);
    Ok(
      Self::ancestors(&state, &include)
        .difference(&excluded)
        .count(),
    )
  }

  fn merge_base(&self, a: &str, b: &str) -> Result<Option<CommitId>, GitError> {
    self.pair_queries.fetch_add(1, Ordering::SeqCst);
    let state = self.state();
    let a = Self::ancestors(&state, &Self::resolve(&state, a)?);
    let b = Self::ancestors(&state, &Self::resolve(&state, b)?);
    let common: Vec<&String> = a.intersection(&b).collect();

    // Best common ancestors are those not reachable from another common one.
    let best = common
      .iter()
      .filter(|candidate| {
        !common
          .iter()
          .any(|other| other != *candidate && Self::ancestors(&state, other).contains(**candidate))
      })
      .max_by_key(|candidate| {
        let seconds = state.commits.get(**candidate).map_or(0, |commit| commit.seconds);
        (seconds, (**candidate).clone())
      });

    Ok(best.map(|id| CommitId::new((*id).clone())))
  }

  fn last_commit_info(&self, rev: &str) -> Result<CommitInfo, GitError> {
    let state = self.state();
    let id = Self::resolve(&state, rev)?;
    let seconds = state.commits.get(&id).map_or(0, |commit| commit.seconds);
    let who = Signature {
      name: "Test User".into(),
      email: "test@example.com".into(),
    };
    Ok(CommitInfo {
      id: CommitId::new(id.clone()),
      author: who.clone(),
      committer: who,
      summary: format!("commit {id}"),
      timestamp: Utc.timestamp_opt(seconds, 0).single().unwrap_or_default(),
    })
  }

  fn refs_fingerprint(&self) -> Result<RefsFingerprint, GitError> {
    let state = self.state();
    let head = match &state.head {
      Some(FakeHead::Branch(name)) => name.clone(),
      Some(FakeHead::Detached(commit)) => format!("@{commit}"),
      None => String::new(),
    };
    Ok(RefsFingerprint {
      refs: state.refs.clone(),
      head,
    })
  }
}
