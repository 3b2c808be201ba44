//! # Command Line Interface
//!
//! Defines the CLI structure and dispatches to the command handlers.

mod branches;
mod compare;
mod config;
mod tree;
mod view;
mod watch;

use std::path::PathBuf;

use anyhow::Result;
use branchwise_core::ColorMode;
use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{ArgAction, Parser, Subcommand};

pub use view::{ViewArgs, load_config};

/// Top-level CLI command for branchwise
#[derive(Parser)]
#[command(name = "branchwise")]
#[command(about = "See how every branch relates to every other branch")]
#[command(
  long_about = "Branchwise compares every pair of branches in a git repository.\n\n\
        For each branch it shows which other branches are fully merged into it and,\n\
        for the rest, how many commits they are ahead and behind and where their\n\
        histories meet."
)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
#[command(subcommand_required(true))]
#[command(disable_help_subcommand = true)]
#[command(max_term_width = 120)]
#[command(styles = Styles::styled()
    .header(AnsiColor::BrightGreen.on_default().bold().underline())
    .usage(AnsiColor::Green.on_default().bold())
    .literal(AnsiColor::BrightGreen.on_default().bold())
    .placeholder(AnsiColor::BrightWhite.on_default().italic())
    .valid(AnsiColor::Green.on_default())
    .invalid(AnsiColor::BrightRed.on_default().bold())
)]
pub struct Cli {
  /// Sets the level of verbosity (can be used multiple times)
  #[arg(
    short = 'v',
    long = "verbose",
    action = ArgAction::Count,
    global = true,
    long_help = "Sets the level of verbosity for tracing and logging output.\n\n\
             -v: Show info level messages\n\
             -vv: Show debug level messages\n\
             -vvv: Show trace level messages"
  )]
  pub verbose: u8,

  /// Controls when colored output is used
  #[arg(
    long,
    value_enum,
    ignore_case = true,
    global = true,
    default_value_t = ColorMode::Auto,
  )]
  pub colors: ColorMode,

  /// Read the configuration from this file instead of the default location
  #[arg(long, global = true, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// Subcommands
  #[command(subcommand)]
  pub command: Commands,
}

/// Subcommands for branchwise
#[derive(Subcommand)]
pub enum Commands {
  /// Show every branch with the branches merged and unmerged into it
  #[command(
    long_about = "Display one entry per branch. Under each entry, every other branch is listed\n\
            as merged (all of its commits are reachable) or unmerged, with ahead/behind\n\
            counts, its latest commit and the merge base of the two branches."
  )]
  #[command(alias = "t")]
  Tree(tree::TreeArgs),

  /// Compare two branches
  Compare(compare::CompareArgs),

  /// List branches in display order
  #[command(alias = "ls")]
  Branches(branches::BranchesArgs),

  /// Keep the tree on screen and refresh it when branches move
  Watch(watch::WatchArgs),

  /// Show the effective configuration
  Config,
}

pub fn handle_cli(cli: Cli) -> Result<()> {
  cli.colors.apply();

  let (config, config_path) = load_config(cli.config.as_deref())?;

  match cli.command {
    Commands::Tree(args) => tree::handle_tree_command(args, config),
    Commands::Compare(args) => compare::handle_compare_command(args, config),
    Commands::Branches(args) => branches::handle_branches_command(args, config),
    Commands::Watch(args) => watch::handle_watch_command(args, config),
    Commands::Config => config::handle_config_command(&config, &config_path),
  }
}
