//! # Compare Command
//!
//! Relationship of one branch to another, from the first branch's viewpoint.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use branchwise_core::render::{describe_commit, describe_relationship};
use branchwise_core::{
  Branch, CommitRef, GitBackend, ListScope, ViewConfig, compare_pair, list_branches, print_info, print_success,
};
use clap::Args;
use serde_json::json;
use tokio::runtime::Runtime;

use super::ViewArgs;

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
  /// Viewpoint branch
  #[arg(value_name = "BRANCH")]
  pub viewpoint: String,

  /// Branch compared against the viewpoint
  #[arg(value_name = "OTHER")]
  pub counterpart: String,

  #[command(flatten)]
  pub view: ViewArgs,

  /// Print the result as JSON
  #[arg(long)]
  pub json: bool,
}

pub fn handle_compare_command(args: CompareArgs, mut config: ViewConfig) -> Result<()> {
  args.view.apply(&mut config)?;
  let rt = Runtime::new().context("Failed to create tokio runtime")?;
  rt.block_on(run(&args, &config))
}

/// Resolve a branch name to its ref; anything else is used as a revision.
fn resolve_reference(branches: &[Branch], name: &str) -> String {
  branches
    .iter()
    .find(|branch| branch.id == name || branch.reference == name)
    .map_or_else(|| name.to_string(), |branch| branch.reference.clone())
}

async fn run(args: &CompareArgs, config: &ViewConfig) -> Result<()> {
  let Some(ctx) = args.view.open_context(config).await? else {
    return Ok(());
  };

  let backend: Arc<dyn GitBackend> = Arc::clone(ctx.backend());
  let viewpoint = args.viewpoint.clone();
  let counterpart = args.counterpart.clone();

  let (relationship, base) = tokio::task::spawn_blocking(move || -> Result<_> {
    let branches = list_branches(backend.as_ref(), ListScope::All)?;
    let lhs = resolve_reference(&branches, &viewpoint);
    let rhs = resolve_reference(&branches, &counterpart);

    let relationship = match compare_pair(backend.as_ref(), &lhs, &rhs) {
      Ok(relationship) => relationship,
      Err(err) if err.is_no_revision() => bail!("Cannot compare {viewpoint} with {counterpart}: {err}"),
      Err(err) => return Err(err).context("Failed to compare branches"),
    };
    let base = match &relationship.merge_base {
      Some(id) => Some(CommitRef::from(backend.last_commit_info(id.as_str())?)),
      None => None,
    };
    Ok((relationship, base))
  })
  .await
  .context("Comparison task failed")??;

  if args.json {
    let value = json!({
      "viewpoint": args.viewpoint,
      "counterpart": args.counterpart,
      "ahead": relationship.ahead,
      "behind": relationship.behind,
      "symmetric": relationship.symmetric(),
      "fully_merged": relationship.is_fully_merged(),
      "merge_base": base,
    });
    println!("{}", serde_json::to_string_pretty(&value).context("Failed to serialize comparison")?);
    return Ok(());
  }

  let sentence = describe_relationship(&args.viewpoint, &args.counterpart, &relationship);
  if relationship.is_fully_merged() {
    print_success(&sentence);
  } else {
    print_info(&sentence);
  }
  if let Some(base) = &base {
    println!("  Merge base: {}", describe_commit(base));
  }
  Ok(())
}
