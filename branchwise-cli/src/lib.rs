//! # Branchwise CLI Library
//!
//! Command definitions and handlers for the branchwise command-line tool.

pub mod cli;
