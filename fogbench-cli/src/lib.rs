//! The `fogbench` command line.
//!
//! Loads a [`Config`](config::Config), builds a [`Driver`](fogbench_driver::Driver) from it and
//! reports the resulting metrics. See the [`config`] module for all options.
#![warn(missing_debug_implementations)]

pub mod cli;
pub mod config;
pub mod observability;
pub mod plan;
pub mod report;
pub mod run;
