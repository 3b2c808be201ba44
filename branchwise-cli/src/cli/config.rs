//! # Config Command
//!
//! Prints where the configuration is read from and its effective values.

use std::path::Path;

use anyhow::Result;
use branchwise_core::output::format_repo_path;
use branchwise_core::{ViewConfig, print_info};

pub fn handle_config_command(config: &ViewConfig, path: &Path) -> Result<()> {
  let state = if path.exists() { "" } else { " (not found, using defaults)" };
  print_info(&format!(
    "Configuration file: {}{state}",
    format_repo_path(&path.display().to_string())
  ));
  println!();
  print!("{}", config.to_toml()?);
  Ok(())
}
