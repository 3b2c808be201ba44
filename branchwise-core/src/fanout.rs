//! Bounded concurrent execution of blocking git queries.

use tokio::task::JoinSet;

use crate::git::GitError;

/// Run `jobs` on the blocking pool with at most `limit` in flight.
///
/// Results come back keyed, in completion order. The first failing job aborts
/// the whole batch; jobs that should tolerate expected failures must turn them
/// into values themselves.
pub async fn fan_out<K, T, F>(jobs: Vec<(K, F)>, limit: usize) -> Result<Vec<(K, T)>, GitError>
where
  K: Send + 'static,
  T: Send + 'static,
  F: FnOnce() -> Result<T, GitError> + Send + 'static,
{
  let limit = limit.max(1);
  let mut results = Vec::with_capacity(jobs.len());
  let mut set = JoinSet::new();

  for (key, job) in jobs {
    while set.len() >= limit {
      if let Some(joined) = set.join_next().await {
        results.push(joined??);
      }
    }
    set.spawn_blocking(move || job().map(|value| (key, value)));
  }

  while let Some(joined) = set.join_next().await {
    results.push(joined??);
  }

  Ok(results)
}
