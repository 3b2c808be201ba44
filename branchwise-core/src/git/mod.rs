//! Git access for the relationship engine.
//!
//! The module is split into focused submodules: the process runner, the
//! backend trait with its CLI and libgit2 implementations, and repository
//! discovery.

pub mod backend;
pub mod cli_backend;
pub mod detection;
pub mod lib_backend;
pub mod runner;

#[cfg(test)]
pub(crate) mod fake;

pub use backend::{BackendKind, DetachedHead, GitBackend, GitError, RefListing, RefsFingerprint, RevRange, open_backend};
pub use cli_backend::CliBackend;
pub use detection::{detect_repository_from_path, wait_for_repository};
pub use lib_backend::LibBackend;
pub use runner::{GIT_EXECUTABLE, GitRunner, RunError, RunFailure};
