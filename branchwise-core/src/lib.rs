//! # Branchwise Core Library
//!
//! Computes how every branch of a git repository relates to every other one:
//! ahead/behind counts, merge bases and whether a branch is fully merged. The
//! results are assembled into a primary/secondary/leaf tree that front ends
//! render, and a refresh pipeline keeps that tree current.

pub mod branches;
pub mod commit;
pub mod config;
pub mod context;
mod fanout;
pub mod git;
pub mod output;
pub mod refresh;
pub mod relations;
pub mod render;
pub mod tree;

pub use branches::{Branch, BranchScope, BranchTip, BranchTips, ListScope, SortMethod, list_branches, sort_branches};
pub use commit::{CommitCatalog, CommitId, CommitInfo, CommitRef};
pub use config::{ConfigDirs, ConfigError, ViewConfig};
pub use context::{PassOptions, RepoContext, build_tree, run_pass};
pub use git::{BackendKind, GitBackend, GitError};
pub use output::{ColorMode, print_error, print_header, print_info, print_success, print_warning};
pub use refresh::{ChangeMonitor, LoadState, PassOutcome, RefreshPipeline, RepoSource, TreeSnapshot};
pub use relations::{PairOutcome, Relationship, RelationshipMap, compare_all, compare_pair};
pub use render::{TreeRenderer, render_json};
pub use tree::{ChildOrder, TreeNode, TreeOptions, assemble};
