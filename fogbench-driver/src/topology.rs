//! Node layout of a fog/edge deployment and the mapping from iterations to targets.
//!
//! A [`Topology`] describes `fog_count` groups of `edge_per_fog` edge nodes each, addressed by
//! consecutive host numbers within a network prefix. The edge nodes start at
//! [`Topology::start_index`]; by default that is `3 + fog_count`, since the low host numbers
//! belong to the gateway, the load generator and the fog nodes themselves.
//!
//! When only representative nodes are eligible (`all_edge_nodes = false`), the
//! [`address_stride`](Topology::address_stride) skips over the remaining members of each group,
//! so exactly one edge node per fog group receives traffic.

use std::fmt;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::{ConfigurationError, Result};

/// Number of host numbers reserved in front of the fog nodes.
const RESERVED_HOSTS: u32 = 3;

/// A network address of a single target, in `host[:port]` form.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct Address(String);

impl Address {
    /// Creates an address from a `host[:port]` string.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A builder for creating a [`Topology`].
#[derive(Debug)]
pub struct TopologyBuilder {
    network: String,
    port: Option<u16>,
    fog_count: u32,
    edge_per_fog: u32,
    start_index: Option<u32>,
    all_edge_nodes: bool,
}

impl TopologyBuilder {
    /// The number of fog groups.
    pub fn fog_count(mut self, fog_count: u32) -> Self {
        self.fog_count = fog_count;
        self
    }

    /// The number of edge nodes within each fog group.
    pub fn edge_per_fog(mut self, edge_per_fog: u32) -> Self {
        self.edge_per_fog = edge_per_fog;
        self
    }

    /// The host number of the first edge node.
    ///
    /// Defaults to `3 + fog_count`.
    pub fn start_index(mut self, start_index: u32) -> Self {
        self.start_index = Some(start_index);
        self
    }

    /// Whether every edge node is addressable, or only one representative per fog group.
    pub fn all_edge_nodes(mut self, all_edge_nodes: bool) -> Self {
        self.all_edge_nodes = all_edge_nodes;
        self
    }

    /// An optional port appended to every resolved address.
    pub fn port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    /// Validates the layout and creates the topology.
    ///
    /// Fails if the layout leaves no eligible target, or if the host numbers overflow.
    pub fn build(self) -> Result<Topology> {
        let start_index = self
            .start_index
            .unwrap_or(RESERVED_HOSTS.saturating_add(self.fog_count));

        let topology = Topology {
            network: self.network,
            port: self.port,
            fog_count: self.fog_count,
            edge_per_fog: self.edge_per_fog,
            start_index,
            all_edge_nodes: self.all_edge_nodes,
        };

        if topology.address_stride() == 0 || topology.total_eligible() == 0 {
            return Err(ConfigurationError::NoEligibleTargets {
                fog_count: topology.fog_count,
                edge_per_fog: topology.edge_per_fog,
            });
        }
        if u32::try_from(topology.end_index()).is_err() {
            return Err(ConfigurationError::AddressOverflow { start_index });
        }

        Ok(topology)
    }
}

/// Immutable layout of fog groups and their edge nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topology {
    network: String,
    port: Option<u16>,
    fog_count: u32,
    edge_per_fog: u32,
    start_index: u32,
    all_edge_nodes: bool,
}

impl Topology {
    /// Constructs a new topology builder for the given network prefix, such as `"172.20.0."`.
    pub fn builder(network: impl Into<String>) -> TopologyBuilder {
        TopologyBuilder {
            network: network.into(),
            port: None,
            fog_count: 1,
            edge_per_fog: 1,
            start_index: None,
            all_edge_nodes: false,
        }
    }

    /// The number of fog groups.
    pub fn fog_count(&self) -> u32 {
        self.fog_count
    }

    /// The number of edge nodes in each fog group.
    pub fn edge_per_fog(&self) -> u32 {
        self.edge_per_fog
    }

    /// Whether every edge node is eligible as a target.
    pub fn all_edge_nodes(&self) -> bool {
        self.all_edge_nodes
    }

    /// Total number of edge nodes across all groups.
    pub fn total_nodes(&self) -> u64 {
        u64::from(self.fog_count) * u64::from(self.edge_per_fog)
    }

    /// Host number of the first edge node.
    pub fn start_index(&self) -> u64 {
        u64::from(self.start_index)
    }

    /// Host number of the last edge node.
    pub fn end_index(&self) -> u64 {
        // A validated topology always has at least one node.
        self.start_index() + self.total_nodes().saturating_sub(1)
    }

    /// Distance between two consecutive eligible host numbers.
    pub fn address_stride(&self) -> u64 {
        if self.all_edge_nodes {
            1
        } else {
            u64::from(self.edge_per_fog)
        }
    }

    /// Number of distinct targets that receive traffic.
    pub fn total_eligible(&self) -> u64 {
        match self.address_stride() {
            0 => 0,
            stride => self.total_nodes() / stride,
        }
    }

    /// Deterministically maps an iteration index to a target.
    ///
    /// Index `1` maps to the first eligible node, and indexes wrap around after
    /// [`total_eligible`](Self::total_eligible) targets. Index `0` wraps to the last slot.
    pub fn address_for(&self, index: u64) -> Address {
        let eligible = self.total_eligible();
        let slot = (index % eligible + eligible - 1) % eligible;
        self.address_of_slot(slot)
    }

    /// Returns all eligible targets in slot order.
    pub fn eligible(&self) -> impl Iterator<Item = Address> + '_ {
        (0..self.total_eligible()).map(|slot| self.address_of_slot(slot))
    }

    fn address_of_slot(&self, slot: u64) -> Address {
        let offset = self.start_index() + slot * self.address_stride();
        match self.port {
            Some(port) => Address(format!("{}{offset}:{port}", self.network)),
            None => Address(format!("{}{offset}", self.network)),
        }
    }
}

/// How the driver picks a target for each iteration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TargetSelection {
    /// Cycle through the eligible targets by iteration index.
    #[default]
    RoundRobin,
    /// Pick an eligible target uniformly at random.
    ///
    /// A fixed seed makes the sequence of targets reproducible across runs.
    Random {
        /// Seed of the RNG, or `None` to seed from the operating system.
        seed: Option<u64>,
    },
    /// Send every request to the same address, regardless of the topology.
    Fixed(Address),
}

/// Resolves iteration indexes to target addresses.
#[derive(Debug)]
pub struct TargetResolver {
    topology: Topology,
    strategy: Strategy,
}

#[derive(Debug)]
enum Strategy {
    RoundRobin,
    Random(SmallRng),
    Fixed(Address),
}

impl TargetResolver {
    /// Creates a resolver over the given topology.
    pub fn new(topology: Topology, selection: TargetSelection) -> Result<Self> {
        let strategy = match selection {
            TargetSelection::RoundRobin => Strategy::RoundRobin,
            TargetSelection::Random { seed } => Strategy::Random(match seed {
                Some(seed) => SmallRng::seed_from_u64(seed),
                None => SmallRng::from_os_rng(),
            }),
            TargetSelection::Fixed(address) => {
                if address.as_str().is_empty() {
                    return Err(ConfigurationError::EmptyFixedTarget);
                }
                Strategy::Fixed(address)
            }
        };

        Ok(Self { topology, strategy })
    }

    /// The topology this resolver maps onto.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Resolves the target for the iteration with the given index.
    pub fn resolve(&mut self, index: u64) -> Address {
        match &mut self.strategy {
            Strategy::RoundRobin => self.topology.address_for(index),
            Strategy::Random(rng) => {
                let slot = rng.random_range(0..self.topology.total_eligible());
                self.topology.address_of_slot(slot)
            }
            Strategy::Fixed(address) => address.clone(),
        }
    }
}
