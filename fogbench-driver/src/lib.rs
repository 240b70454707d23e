//! A load driver for fog/edge deployments of a matrix multiplication service.
//!
//! The driver sends `POST /matmul` requests to the edge nodes of a [`Topology`], following a
//! [`Schedule`] that either ramps a number of concurrent workers through stages, or starts
//! requests at a constant arrival rate. Every request produces an
//! [`Outcome`](executor::Outcome), and all outcomes are aggregated into [`RunMetrics`].
//!
//! Only configuration errors abort a run. Unreachable or slow targets show up as failures in the
//! metrics, since characterizing target health is the point of a run.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use fogbench_driver::{
//!     Driver, HttpExecutor, RequestSpec, Schedule, Stage, TargetResolver, TargetSelection,
//!     Topology,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), fogbench_driver::ConfigurationError> {
//! let topology = Topology::builder("172.20.0.")
//!     .fog_count(3)
//!     .edge_per_fog(3)
//!     .build()?;
//! let resolver = TargetResolver::new(topology, TargetSelection::RoundRobin)?;
//! let schedule = Schedule::StagedRamp {
//!     stages: vec![
//!         Stage::new(Duration::from_secs(15), 30),
//!         Stage::new(Duration::from_secs(120), 30),
//!         Stage::new(Duration::from_secs(15), 0),
//!     ],
//! };
//!
//! let driver = Driver::new(resolver, schedule, HttpExecutor::new(), RequestSpec::new(1000))?;
//! let metrics = driver.run(CancellationToken::new()).await;
//! println!("{} requests, {} errors", metrics.total, metrics.errors);
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod driver;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod pool;
pub mod schedule;
pub mod topology;

pub use crate::driver::{Driver, DriverOptions, DriverState};
pub use crate::error::ConfigurationError;
pub use crate::executor::{Failure, HttpExecutor, Outcome, RequestExecutor, RequestSpec};
pub use crate::metrics::{MetricsAggregator, RunMetrics};
pub use crate::schedule::{Action, RateScheduler, Schedule, Stage};
pub use crate::topology::{Address, TargetResolver, TargetSelection, Topology};
