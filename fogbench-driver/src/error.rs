//! Errors raised while configuring a run.

use std::time::Duration;

use thiserror::Error;

/// Errors in the topology or schedule of a run.
///
/// These are the only errors that propagate out of the driver. They are raised while building a
/// run, before any request has been sent. Failures of individual requests are recorded as
/// [`Outcome`](crate::executor::Outcome)s instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The topology does not contain a single addressable target.
    #[error(
        "topology has no eligible targets ({fog_count} fog groups, {edge_per_fog} edge nodes per group)"
    )]
    NoEligibleTargets {
        /// Configured number of fog groups.
        fog_count: u32,
        /// Configured number of edge nodes in each group.
        edge_per_fog: u32,
    },

    /// The highest resolved host number does not fit into the address space.
    #[error("topology address range overflows at start index {start_index}")]
    AddressOverflow {
        /// The first edge host number.
        start_index: u32,
    },

    /// A fixed target selection was configured without an address.
    #[error("fixed target selection requires a non-empty address")]
    EmptyFixedTarget,

    /// A staged ramp was configured without any stages.
    #[error("staged ramp requires at least one stage")]
    EmptyStages,

    /// A constant arrival rate was configured without workers to run the arrivals.
    #[error("constant arrival rate requires at least one preallocated worker")]
    NoWorkers,

    /// A constant arrival rate was configured with a zero time unit.
    #[error("arrival time unit must be greater than zero")]
    ZeroTimeUnit,

    /// The request timeout must allow at least some time for the request.
    #[error("request timeout must be greater than zero, got {0:?}")]
    ZeroTimeout(Duration),

    /// A configured request header is not a valid HTTP header.
    #[error("invalid request header `{0}`")]
    InvalidHeader(String),

    /// The same request header was configured twice with different capitalization.
    #[error("duplicate request header `{0}`")]
    DuplicateHeader(String),
}

/// Result type for building runs.
pub type Result<T, E = ConfigurationError> = std::result::Result<T, E>;
