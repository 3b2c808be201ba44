//! # Refresh Pipeline
//!
//! A single writer publishes tree snapshots on a `watch` channel. Every
//! [`RefreshPipeline::request`] starts a new pass with a higher generation.
//! Passes are not cancelled; a finished pass publishes only while it is still
//! the newest one requested, so a slow stale pass can never overwrite a newer
//! tree. A failed pass leaves the previous snapshot in place.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::{PassOptions, RepoContext, build_tree};
use crate::git::{GitBackend, GitError, RefsFingerprint};
use crate::tree::{TreeNode, TreeOptions};

/// One published tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeSnapshot {
  pub generation: u64,
  pub computed_at: DateTime<Utc>,
  pub branch_count: usize,
  pub nodes: Vec<TreeNode>,
}

/// What subscribers see.
#[derive(Debug, Clone, Default)]
pub enum LoadState {
  /// No pass has succeeded yet.
  #[default]
  NotLoaded,
  Loaded(Arc<TreeSnapshot>),
}

impl LoadState {
  pub fn snapshot(&self) -> Option<&Arc<TreeSnapshot>> {
    match self {
      LoadState::NotLoaded => None,
      LoadState::Loaded(snapshot) => Some(snapshot),
    }
  }

  fn generation(&self) -> u64 {
    self.snapshot().map_or(0, |snapshot| snapshot.generation)
  }
}

/// Result of a computation before it is stamped and published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeBuild {
  pub branch_count: usize,
  pub nodes: Vec<TreeNode>,
}

/// Produces the tree for one pass.
pub trait PassSource: Send + Sync + 'static {
  fn compute(&self) -> impl Future<Output = anyhow::Result<TreeBuild>> + Send;
}

/// Computes trees from a repository.
#[derive(Debug, Clone)]
pub struct RepoSource {
  pub ctx: RepoContext,
  pub pass: PassOptions,
  pub tree: TreeOptions,
}

impl PassSource for RepoSource {
  async fn compute(&self) -> anyhow::Result<TreeBuild> {
    let (data, nodes) = build_tree(&self.ctx, &self.pass, &self.tree).await?;
    Ok(TreeBuild {
      branch_count: data.branches.len(),
      nodes,
    })
  }
}

/// How a requested pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
  Published(u64),
  /// A newer pass was requested while this one ran.
  Superseded(u64),
  Failed(u64),
}

/// Single-writer publisher of tree snapshots.
pub struct RefreshPipeline<S> {
  source: Arc<S>,
  latest: Arc<AtomicU64>,
  state: Arc<watch::Sender<LoadState>>,
}

impl<S: PassSource> RefreshPipeline<S> {
  pub fn new(source: S) -> Self {
    let (state, _) = watch::channel(LoadState::NotLoaded);
    Self {
      source: Arc::new(source),
      latest: Arc::new(AtomicU64::new(0)),
      state: Arc::new(state),
    }
  }

  pub fn subscribe(&self) -> watch::Receiver<LoadState> {
    self.state.subscribe()
  }

  pub fn current(&self) -> LoadState {
    self.state.borrow().clone()
  }

  /// Generation of the most recently requested pass.
  pub fn latest_generation(&self) -> u64 {
    self.latest.load(Ordering::SeqCst)
  }

  /// Start a new pass, superseding any pass still running.
  pub fn request(&self) -> JoinHandle<PassOutcome> {
    let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
    let source = Arc::clone(&self.source);
    let latest = Arc::clone(&self.latest);
    let state = Arc::clone(&self.state);
    debug!(generation, "refresh requested");

    tokio::spawn(async move {
      let result = source.compute().await;

      if latest.load(Ordering::SeqCst) != generation {
        debug!(generation, "discarding superseded pass");
        return PassOutcome::Superseded(generation);
      }

      match result {
        Ok(build) => {
          let snapshot = Arc::new(TreeSnapshot {
            generation,
            computed_at: Utc::now(),
            branch_count: build.branch_count,
            nodes: build.nodes,
          });
          let published = state.send_if_modified(|current| {
            if current.generation() >= generation {
              return false;
            }
            *current = LoadState::Loaded(snapshot);
            true
          });

          if published {
            info!(generation, "published tree");
            PassOutcome::Published(generation)
          } else {
            PassOutcome::Superseded(generation)
          }
        }
        Err(err) => {
          warn!(generation, error = %format!("{err:#}"), "refresh failed, keeping previous tree");
          PassOutcome::Failed(generation)
        }
      }
    })
  }
}

/// Detects repository changes by sampling [`RefsFingerprint`]s.
pub struct ChangeMonitor {
  backend: Arc<dyn GitBackend>,
  last: Option<RefsFingerprint>,
}

impl ChangeMonitor {
  pub fn new(backend: Arc<dyn GitBackend>) -> Self {
    Self { backend, last: None }
  }

  /// Sample the refs. Returns whether they changed since the previous sample;
  /// the first sample only records a baseline.
  pub async fn poll(&mut self) -> Result<bool, GitError> {
    let backend = Arc::clone(&self.backend);
    let current = tokio::task::spawn_blocking(move || backend.refs_fingerprint()).await??;

    let changed = self.last.as_ref().is_some_and(|last| *last != current);
    if changed {
      debug!("repository refs changed");
    }
    self.last = Some(current);
    Ok(changed)
  }
}

#[cfg(test)]
mod tests {
  use std::collections::VecDeque;
  use std::sync::Mutex;
  use std::time::Duration;

  use tokio::time::sleep;

  use super::*;
  use crate::git::fake::FakeBackend;

  /// Source that answers each pass after a scripted delay.
  struct ScriptedSource {
    script: Mutex<VecDeque<(Duration, Result<usize, String>)>>,
  }

  impl ScriptedSource {
    fn new(steps: Vec<(u64, Result<usize, String>)>) -> Self {
      Self {
        script: Mutex::new(
          steps
            .into_iter()
            .map(|(millis, result)| (Duration::from_millis(millis), result))
            .collect(),
        ),
      }
    }
  }

  impl PassSource for ScriptedSource {
    async fn compute(&self) -> anyhow::Result<TreeBuild> {
      let (delay, result) = self.script.lock().unwrap().pop_front().unwrap();
      sleep(delay).await;
      match result {
        Ok(branch_count) => Ok(TreeBuild {
          branch_count,
          nodes: Vec::new(),
        }),
        Err(message) => Err(anyhow::anyhow!(message)),
      }
    }
  }

  fn branch_count(pipeline: &RefreshPipeline<ScriptedSource>) -> Option<usize> {
    pipeline.current().snapshot().map(|snapshot| snapshot.branch_count)
  }

  #[tokio::test(start_paused = true)]
  async fn starts_not_loaded_and_publishes_first_pass() {
    let pipeline = RefreshPipeline::new(ScriptedSource::new(vec![(10, Ok(3))]));
    assert!(matches!(pipeline.current(), LoadState::NotLoaded));

    let mut receiver = pipeline.subscribe();
    let outcome = pipeline.request().await.unwrap();

    assert_eq!(outcome, PassOutcome::Published(1));
    assert!(receiver.has_changed().unwrap());
    let snapshot = receiver.borrow_and_update().snapshot().cloned().unwrap();
    assert_eq!(snapshot.generation, 1);
    assert_eq!(snapshot.branch_count, 3);
  }

  #[tokio::test(start_paused = true)]
  async fn slow_superseded_pass_is_discarded() {
    let pipeline = RefreshPipeline::new(ScriptedSource::new(vec![(500, Ok(1)), (10, Ok(2))]));

    let slow = pipeline.request();
    // Let the first pass take its step from the script before the second starts.
    tokio::task::yield_now().await;
    let fast = pipeline.request();

    assert_eq!(fast.await.unwrap(), PassOutcome::Published(2));
    assert_eq!(slow.await.unwrap(), PassOutcome::Superseded(1));
    assert_eq!(branch_count(&pipeline), Some(2));
    assert_eq!(pipeline.latest_generation(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn failed_pass_keeps_previous_snapshot() {
    let pipeline = RefreshPipeline::new(ScriptedSource::new(vec![(10, Ok(4)), (10, Err("git exploded".into()))]));

    assert_eq!(pipeline.request().await.unwrap(), PassOutcome::Published(1));
    assert_eq!(pipeline.request().await.unwrap(), PassOutcome::Failed(2));

    let snapshot = pipeline.current().snapshot().cloned().unwrap();
    assert_eq!(snapshot.generation, 1);
    assert_eq!(snapshot.branch_count, 4);
  }

  #[tokio::test(start_paused = true)]
  async fn failure_before_first_success_stays_not_loaded() {
    let pipeline = RefreshPipeline::new(ScriptedSource::new(vec![(10, Err("no git".into()))]));
    assert_eq!(pipeline.request().await.unwrap(), PassOutcome::Failed(1));
    assert!(matches!(pipeline.current(), LoadState::NotLoaded));
  }

  #[tokio::test]
  async fn change_monitor_reports_moved_refs() {
    let backend = Arc::new(FakeBackend::new());
    backend.commit("c1", &[], 100).commit("c2", &["c1"], 200).branch("main", "c1");
    let mut monitor = ChangeMonitor::new(backend.clone());

    assert!(!monitor.poll().await.unwrap());
    assert!(!monitor.poll().await.unwrap());

    backend.branch("main", "c2");
    assert!(monitor.poll().await.unwrap());
    assert!(!monitor.poll().await.unwrap());

    backend.branch("topic", "c1");
    assert!(monitor.poll().await.unwrap());
  }
}
