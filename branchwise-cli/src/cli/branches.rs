//! # Branches Command
//!
//! Lists branches in the order the tree presents them.

use std::sync::Arc;

use anyhow::{Context, Result};
use branchwise_core::branches::resolve_tips;
use branchwise_core::output::format_timestamp;
use branchwise_core::tree::order_branches;
use branchwise_core::{BranchTip, ViewConfig, list_branches, print_info};
use clap::Args;
use serde_json::json;
use tokio::runtime::Runtime;

use super::ViewArgs;

#[derive(Args, Debug, Clone)]
pub struct BranchesArgs {
  #[command(flatten)]
  pub view: ViewArgs,

  /// Print the list as JSON
  #[arg(long)]
  pub json: bool,
}

pub fn handle_branches_command(args: BranchesArgs, mut config: ViewConfig) -> Result<()> {
  args.view.apply(&mut config)?;
  let rt = Runtime::new().context("Failed to create tokio runtime")?;
  rt.block_on(run(&args, &config))
}

async fn run(args: &BranchesArgs, config: &ViewConfig) -> Result<()> {
  let Some(ctx) = args.view.open_context(config).await? else {
    return Ok(());
  };

  let backend = Arc::clone(ctx.backend());
  let scope = config.list_scope();
  let listing_backend = Arc::clone(&backend);
  let branches = tokio::task::spawn_blocking(move || list_branches(listing_backend.as_ref(), scope))
    .await
    .context("Branch listing task failed")?
    .context("Failed to list branches")?;
  let tips = resolve_tips(backend, &branches, config.max_concurrency)
    .await
    .context("Failed to read branch tips")?;

  let tree_options = config.tree_options();
  let partitions = order_branches(&branches, &tips, &tree_options);

  if args.json {
    let entries: Vec<_> = partitions
      .iter()
      .flat_map(|partition| partition.branches.iter())
      .map(|branch| {
        json!({
          "branch": branch,
          "pinned": tree_options.is_pinned(branch),
          "tip": tips.get(&branch.reference).and_then(BranchTip::commit),
        })
      })
      .collect();
    println!("{}", serde_json::to_string_pretty(&entries).context("Failed to serialize branches")?);
    return Ok(());
  }

  if branches.is_empty() {
    print_info("No branches found");
    return Ok(());
  }

  for partition in &partitions {
    println!("{}:", partition.scope.heading());
    for branch in &partition.branches {
      let marker = if branch.is_head { "*" } else { " " };
      let tip = match tips.get(&branch.reference).and_then(BranchTip::commit) {
        Some(info) => format!(
          "{} {} {}",
          info.id.short(),
          format_timestamp(&info.timestamp.format("%Y-%m-%d").to_string()),
          info.summary
        ),
        None => "No Revision".to_string(),
      };
      println!("{marker} {:<30} {tip}", branch.id);
    }
  }
  Ok(())
}
