//! Test utilities for the fogbench load driver.
//!
//! This crate provides a fake `/matmul` target and log setup for tests. See the modules for all
//! available utilities.

pub mod server;
pub mod tracing;
