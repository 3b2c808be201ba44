//! # Tree Command
//!
//! Computes one pass and prints the assembled tree as text or JSON.

use std::io;

use anyhow::{Context, Result};
use branchwise_core::{TreeRenderer, ViewConfig, build_tree, print_info, render_json};
use clap::Args;
use tokio::runtime::Runtime;

use super::ViewArgs;

#[derive(Args, Debug, Clone)]
pub struct TreeArgs {
  #[command(flatten)]
  pub view: ViewArgs,

  /// Print the tree as JSON
  #[arg(long)]
  pub json: bool,

  /// Also print the children of collapsed entries
  #[arg(short, long)]
  pub all: bool,

  /// Put the checked-out branch right after the pinned ones
  #[arg(long)]
  pub head_first: bool,

  /// Expand every unmerged branch to show its commits
  #[arg(long)]
  pub expand_unmerged: bool,
}

pub fn handle_tree_command(args: TreeArgs, mut config: ViewConfig) -> Result<()> {
  args.view.apply(&mut config)?;
  if args.head_first {
    config.head_first = true;
  }
  if args.expand_unmerged {
    config.expand_secondary = true;
  }

  let rt = Runtime::new().context("Failed to create tokio runtime")?;
  rt.block_on(run(&args, &config))
}

async fn run(args: &TreeArgs, config: &ViewConfig) -> Result<()> {
  let Some(ctx) = args.view.open_context(config).await? else {
    return Ok(());
  };

  let (data, nodes) = build_tree(&ctx, &config.pass_options(), &config.tree_options())
    .await
    .with_context(|| format!("Failed to compute branch tree for {}", ctx.workdir().display()))?;

  if args.json {
    println!("{}", render_json(&nodes).context("Failed to serialize tree")?);
    return Ok(());
  }

  if nodes.is_empty() {
    print_info(&format!(
      "Found {} branch(es); at least two are needed to compare",
      data.branches.len()
    ));
    return Ok(());
  }

  TreeRenderer::new(false, args.all)
    .render(&mut io::stdout().lock(), &nodes)
    .context("Failed to write tree")
}
