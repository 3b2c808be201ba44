//! Test utilities shared across the branchwise workspace
//!
//! This crate provides a temporary git repository fixture ([`TestRepo`]) with
//! helpers for shaping commit graphs: linear histories, diverging branches,
//! unrelated root commits, remote-tracking refs and detached HEADs.
//!
//! The clippy dead_code lint is disabled for this crate because test utilities
//! may not be used by all tests, and the compiler cannot detect usage across
//! crate boundaries in development dependencies.

#![allow(dead_code)]

pub mod repo;

pub use repo::{TEST_EPOCH, TestRepo};
