//! # Relationship Engine
//!
//! Computes, for every unordered pair of branches, the ahead/behind counts and
//! the merge base. Pairs are stored once under a canonical key and read back
//! from either side through [`RelationshipMap::view`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::branches::{Branch, BranchTip, BranchTips};
use crate::commit::CommitId;
use crate::fanout::fan_out;
use crate::git::{GitBackend, GitError};

/// Default number of git queries in flight during a pass.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Unordered pair of references, stored sorted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
  lo: String,
  hi: String,
}

impl PairKey {
  pub fn new(a: &str, b: &str) -> Self {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    Self {
      lo: lo.to_string(),
      hi: hi.to_string(),
    }
  }

  pub fn lo(&self) -> &str {
    &self.lo
  }

  pub fn hi(&self) -> &str {
    &self.hi
  }

  /// Whether `(viewpoint, counterpart)` is the stored orientation.
  pub fn is_forward(&self, viewpoint: &str) -> bool {
    self.lo == viewpoint
  }
}

/// Map keyed by unordered pairs; each key is written at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymmetricMap<V> {
  entries: HashMap<PairKey, V>,
}

impl<V> Default for SymmetricMap<V> {
  fn default() -> Self {
    Self {
      entries: HashMap::new(),
    }
  }
}

impl<V> SymmetricMap<V> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert unless the pair is already present. Returns whether the value was
  /// stored.
  pub fn insert(&mut self, key: PairKey, value: V) -> bool {
    if self.entries.contains_key(&key) {
      return false;
    }
    self.entries.insert(key, value);
    true
  }

  pub fn get(&self, a: &str, b: &str) -> Option<&V> {
    self.entries.get(&PairKey::new(a, b))
  }

  pub fn contains(&self, a: &str, b: &str) -> bool {
    self.entries.contains_key(&PairKey::new(a, b))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &V)> {
    self.entries.iter()
  }
}

/// How a counterpart branch relates to a viewpoint branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relationship {
  /// Commits reachable from the viewpoint but not the counterpart.
  pub ahead: usize,
  /// Commits reachable from the counterpart but not the viewpoint.
  pub behind: usize,
  /// `None` for unrelated histories.
  pub merge_base: Option<CommitId>,
}

impl Relationship {
  /// Symmetric difference of the two histories.
  pub fn symmetric(&self) -> usize {
    self.ahead + self.behind
  }

  /// The counterpart adds nothing the viewpoint lacks, i.e. it is fully merged
  /// into the viewpoint.
  pub fn is_fully_merged(&self) -> bool {
    self.behind == 0
  }

  /// The same relationship seen from the counterpart.
  pub fn reversed(&self) -> Self {
    Self {
      ahead: self.behind,
      behind: self.ahead,
      merge_base: self.merge_base.clone(),
    }
  }
}

/// Result of comparing one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
  Compared(Relationship),
  /// `reference` has no commits, so the pair was not compared.
  NoRevision { reference: String },
}

/// Pairwise outcomes for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipMap {
  pairs: SymmetricMap<PairOutcome>,
}

impl RelationshipMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// Store `outcome`, expressed from `viewpoint`, in canonical orientation.
  pub fn record(&mut self, viewpoint: &str, counterpart: &str, outcome: PairOutcome) -> bool {
    let key = PairKey::new(viewpoint, counterpart);
    let outcome = match outcome {
      PairOutcome::Compared(relationship) if !key.is_forward(viewpoint) => {
        PairOutcome::Compared(relationship.reversed())
      }
      other => other,
    };
    self.pairs.insert(key, outcome)
  }

  /// The outcome for the pair, oriented from `viewpoint`.
  pub fn view(&self, viewpoint: &str, counterpart: &str) -> Option<PairOutcome> {
    let key = PairKey::new(viewpoint, counterpart);
    let stored = self.pairs.get(viewpoint, counterpart)?;
    Some(match stored {
      PairOutcome::Compared(relationship) if !key.is_forward(viewpoint) => {
        PairOutcome::Compared(relationship.reversed())
      }
      other => other.clone(),
    })
  }

  /// The relationship for a compared pair, oriented from `viewpoint`.
  pub fn relationship(&self, viewpoint: &str, counterpart: &str) -> Option<Relationship> {
    match self.view(viewpoint, counterpart)? {
      PairOutcome::Compared(relationship) => Some(relationship),
      PairOutcome::NoRevision { .. } => None,
    }
  }

  pub fn len(&self) -> usize {
    self.pairs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.pairs.is_empty()
  }

  /// Every distinct merge base found in the pass.
  pub fn merge_bases(&self) -> Vec<CommitId> {
    let mut bases: Vec<CommitId> = self
      .pairs
      .iter()
      .filter_map(|(_, outcome)| match outcome {
        PairOutcome::Compared(relationship) => relationship.merge_base.clone(),
        PairOutcome::NoRevision { .. } => None,
      })
      .collect();
    bases.sort();
    bases.dedup();
    bases
  }
}

/// Tuning for [`compare_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareOptions {
  pub max_concurrency: usize,
}

impl Default for CompareOptions {
  fn default() -> Self {
    Self {
      max_concurrency: DEFAULT_MAX_CONCURRENCY,
    }
  }
}

/// Compare `counterpart` against `viewpoint`.
pub fn compare_pair(backend: &dyn GitBackend, viewpoint: &str, counterpart: &str) -> Result<Relationship, GitError> {
  let merge_base = backend.merge_base(viewpoint, counterpart)?;
  let (ahead, behind) = backend.ahead_behind(viewpoint, counterpart)?;
  Ok(Relationship {
    ahead,
    behind,
    merge_base,
  })
}

fn has_no_revision(tips: &BranchTips, reference: &str) -> bool {
  matches!(tips.get(reference), Some(BranchTip::NoRevision))
}

/// The side of a pair that no longer resolves to a commit, if either does.
fn missing_side(backend: &dyn GitBackend, sides: [&String; 2]) -> Option<String> {
  sides
    .into_iter()
    .find(|reference| {
      backend
        .last_commit_info(reference)
        .is_err_and(|err| err.is_no_revision())
    })
    .cloned()
}

/// Compare every unordered pair of `branches`.
///
/// Pairs touching a branch without revision are recorded as
/// [`PairOutcome::NoRevision`] without querying git. Any unexpected failure
/// aborts the pass.
pub async fn compare_all(
  backend: Arc<dyn GitBackend>,
  branches: &[Branch],
  tips: &BranchTips,
  options: &CompareOptions,
) -> Result<RelationshipMap, GitError> {
  let mut map = RelationshipMap::new();
  let mut jobs = Vec::new();

  for (index, a) in branches.iter().enumerate() {
    for b in &branches[index + 1..] {
      let key = PairKey::new(&a.reference, &b.reference);
      if key.lo() == key.hi() || map.pairs.contains(key.lo(), key.hi()) {
        continue;
      }

      if let Some(missing) = [key.lo(), key.hi()]
        .into_iter()
        .find(|reference| has_no_revision(tips, reference))
      {
        let outcome = PairOutcome::NoRevision {
          reference: missing.to_string(),
        };
        map.record(key.lo(), key.hi(), outcome);
        continue;
      }

      let backend = Arc::clone(&backend);
      let (lo, hi) = (key.lo().to_string(), key.hi().to_string());
      let job = move || match compare_pair(backend.as_ref(), &lo, &hi) {
        Ok(relationship) => Ok(PairOutcome::Compared(relationship)),
        Err(err) if err.is_no_revision() => match missing_side(backend.as_ref(), [&lo, &hi]) {
          Some(reference) => {
            debug!(%lo, %hi, %reference, error = %err, "pair has no revision");
            Ok(PairOutcome::NoRevision { reference })
          }
          None => Err(err),
        },
        Err(err) => Err(err),
      };
      jobs.push((key, job));
    }
  }

  let queued = jobs.len();
  for (key, outcome) in fan_out(jobs, options.max_concurrency).await? {
    map.record(key.lo(), key.hi(), outcome);
  }

  info!(pairs = map.len(), queried = queued, "relationships computed");
  Ok(map)
}
