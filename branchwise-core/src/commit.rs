//! Commit identifiers and metadata.
//!
//! Commits are referenced by their full hex object id ([`CommitId`]). The
//! metadata shown next to a commit ([`CommitInfo`]) is fetched lazily and
//! memoized for one computation pass in a [`CommitCatalog`].

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of hex digits shown for abbreviated commit ids.
pub const SHORT_HASH_LEN: usize = 7;

/// Full hex object id of a commit.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitId(String);

impl CommitId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Abbreviated form used in tree labels.
  pub fn short(&self) -> &str {
    let end = self.0.len().min(SHORT_HASH_LEN);
    &self.0[..end]
  }
}

impl fmt::Debug for CommitId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("CommitId").field(&self.short()).finish()
  }
}

impl fmt::Display for CommitId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<git2::Oid> for CommitId {
  fn from(oid: git2::Oid) -> Self {
    Self(oid.to_string())
  }
}

/// Name and email of a commit author or committer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
  pub name: String,
  pub email: String,
}

impl fmt::Display for Signature {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} <{}>", self.name, self.email)
  }
}

/// Metadata for a single commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
  pub id: CommitId,
  pub author: Signature,
  pub committer: Signature,
  /// First line of the commit message.
  pub summary: String,
  /// Committer timestamp.
  pub timestamp: DateTime<Utc>,
}

/// A commit id with its metadata, when it has been resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRef {
  pub id: CommitId,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub info: Option<CommitInfo>,
}

impl CommitRef {
  pub fn unresolved(id: CommitId) -> Self {
    Self { id, info: None }
  }

  pub fn summary(&self) -> Option<&str> {
    self.info.as_ref().map(|info| info.summary.as_str())
  }
}

impl From<CommitInfo> for CommitRef {
  fn from(info: CommitInfo) -> Self {
    Self {
      id: info.id.clone(),
      info: Some(info),
    }
  }
}

/// Commit metadata gathered during one pass.
#[derive(Debug, Clone, Default)]
pub struct CommitCatalog {
  entries: HashMap<CommitId, CommitInfo>,
}

impl CommitCatalog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, info: CommitInfo) {
    self.entries.entry(info.id.clone()).or_insert(info);
  }

  pub fn get(&self, id: &CommitId) -> Option<&CommitInfo> {
    self.entries.get(id)
  }

  pub fn contains(&self, id: &CommitId) -> bool {
    self.entries.contains_key(id)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Build a [`CommitRef`] for `id`, attaching metadata when known.
  pub fn commit_ref(&self, id: &CommitId) -> CommitRef {
    CommitRef {
      id: id.clone(),
      info: self.get(id).cloned(),
    }
  }
}
