//! # Watch Command
//!
//! Runs the refresh pipeline: the tree is recomputed whenever branch refs or
//! HEAD move, and every published snapshot is printed.

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use branchwise_core::refresh::RepoSource;
use branchwise_core::{
  ChangeMonitor, LoadState, RefreshPipeline, TreeRenderer, TreeSnapshot, ViewConfig, print_header, print_warning,
};
use clap::Args;
use tokio::runtime::Runtime;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use super::ViewArgs;

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
  #[command(flatten)]
  pub view: ViewArgs,

  /// Milliseconds between checks for repository changes
  #[arg(long, value_name = "MS")]
  pub interval: Option<u64>,

  /// Also print the children of collapsed entries
  #[arg(short, long)]
  pub all: bool,

  /// Exit after the first tree has been printed
  #[arg(long)]
  pub once: bool,
}

pub fn handle_watch_command(args: WatchArgs, mut config: ViewConfig) -> Result<()> {
  args.view.apply(&mut config)?;
  if let Some(interval) = args.interval {
    config.watch_interval_ms = interval;
    config.validate().context("Invalid watch interval")?;
  }

  let rt = Runtime::new().context("Failed to create tokio runtime")?;
  rt.block_on(run(&args, &config))
}

fn print_snapshot(snapshot: &TreeSnapshot, renderer: &TreeRenderer) -> Result<()> {
  print_header(&format!(
    "{} branches, refreshed {} (pass {})",
    snapshot.branch_count,
    snapshot.computed_at.format("%H:%M:%S"),
    snapshot.generation
  ));
  renderer
    .render(&mut io::stdout().lock(), &snapshot.nodes)
    .context("Failed to write tree")
}

async fn run(args: &WatchArgs, config: &ViewConfig) -> Result<()> {
  let Some(ctx) = args.view.open_context(config).await? else {
    return Ok(());
  };

  let mut monitor = ChangeMonitor::new(Arc::clone(ctx.backend()));
  let pipeline = RefreshPipeline::new(RepoSource {
    ctx,
    pass: config.pass_options(),
    tree: config.tree_options(),
  });
  let mut snapshots = pipeline.subscribe();
  let renderer = TreeRenderer::new(false, args.all);

  if let Err(err) = monitor.poll().await {
    warn!(error = %err, "failed to sample repository refs");
  }
  let first = pipeline.request();
  if args.once {
    first.await.context("Refresh task failed")?;
    match pipeline.current() {
      LoadState::Loaded(snapshot) => print_snapshot(&snapshot, &renderer)?,
      LoadState::NotLoaded => print_warning("Failed to compute the branch tree"),
    }
    return Ok(());
  }

  let mut ticker = interval(config.watch_interval());
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  loop {
    tokio::select! {
      _ = ticker.tick() => {
        match monitor.poll().await {
          Ok(true) => {
            debug!("repository changed, refreshing");
            drop(pipeline.request());
          }
          Ok(false) => {}
          Err(err) => warn!(error = %err, "failed to sample repository refs"),
        }
      }
      changed = snapshots.changed() => {
        if changed.is_err() {
          break;
        }
        let state = snapshots.borrow_and_update().clone();
        if let LoadState::Loaded(snapshot) = state {
          print_snapshot(&snapshot, &renderer)?;
        }
      }
      _ = tokio::signal::ctrl_c() => {
        debug!("interrupted, stopping watch");
        break;
      }
    }
  }

  Ok(())
}
