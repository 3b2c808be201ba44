//! Repository discovery helpers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use git2::Repository;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

/// Interval between discovery attempts while waiting for a repository.
pub const DISCOVERY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Working directory of the repository containing `path`, if any.
pub fn detect_repository_from_path<P: AsRef<Path>>(path: P) -> Option<PathBuf> {
  match Repository::discover(path.as_ref()) {
    Ok(repo) => repo.workdir().map(Path::to_path_buf),
    Err(_) => None,
  }
}

/// Wait until a repository appears at or above `path`.
///
/// Gives up after `timeout` and returns `None` ("no repository found") rather
/// than waiting indefinitely. A zero timeout performs a single check.
pub async fn wait_for_repository(path: &Path, timeout: Duration) -> Option<PathBuf> {
  let deadline = Instant::now() + timeout;

  loop {
    if let Some(workdir) = detect_repository_from_path(path) {
      debug!(workdir = %workdir.display(), "repository discovered");
      return Some(workdir);
    }

    let now = Instant::now();
    if now >= deadline {
      info!(path = %path.display(), ?timeout, "no repository found");
      return None;
    }

    sleep(DISCOVERY_POLL_INTERVAL.min(deadline - now)).await;
  }
}
