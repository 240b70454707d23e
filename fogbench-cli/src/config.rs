//! Configuration for the fogbench load driver.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `FB__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! See [`Config`] for a description of all configuration fields and their defaults.
//!
//! # Environment Variables
//!
//! Environment variables use `FB__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `FB__TOPOLOGY__FOG_COUNT=16` sets the number of fog groups
//! - `FB__SCENARIO__EXECUTOR=constant-arrival-rate` switches to a constant arrival rate
//! - `FB__REQUEST__MATRIX_SIZE=1` sets the requested matrix dimension
//!
//! # YAML Configuration File
//!
//! The reference benchmark of 16 fog groups with 300 workers per group looks like this:
//!
//! ```yaml
//! topology:
//!   network: "172.20.0."
//!   fog_count: 16
//!   edge_per_fog: 6
//!
//! scenario:
//!   executor: ramping-vus
//!   stages:
//!     - { duration: 1m, target: 4800 }
//!     - { duration: 3m, target: 4800 }
//!     - { duration: 1m, target: 0 }
//!
//! request:
//!   matrix_size: 1000
//!   timeout: 60s
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use fogbench_driver::{
    Address, ConfigurationError, DriverOptions, RequestSpec, Schedule, Stage, TargetResolver,
    TargetSelection, Topology,
};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "FB__";

/// Layout of the fog/edge deployment under test.
///
/// Used in: [`Config::topology`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Network prefix that host numbers are appended to.
    ///
    /// # Default
    ///
    /// `"172.20.0."`
    ///
    /// # Environment Variable
    ///
    /// `FB__TOPOLOGY__NETWORK`
    pub network: String,

    /// Optional port appended to every target address.
    ///
    /// # Default
    ///
    /// `None` (port 80)
    pub port: Option<u16>,

    /// Number of fog groups.
    ///
    /// # Default
    ///
    /// `3`
    ///
    /// # Environment Variable
    ///
    /// `FB__TOPOLOGY__FOG_COUNT`
    pub fog_count: u32,

    /// Number of edge nodes in each fog group.
    ///
    /// # Default
    ///
    /// `3`
    ///
    /// # Environment Variable
    ///
    /// `FB__TOPOLOGY__EDGE_PER_FOG`
    pub edge_per_fog: u32,

    /// Host number of the first edge node.
    ///
    /// # Default
    ///
    /// `None`, which places the first edge node right after the fog nodes at `3 + fog_count`.
    pub start_index: Option<u32>,

    /// Whether every edge node receives traffic.
    ///
    /// If `false`, only the first edge node of every fog group is addressed.
    ///
    /// # Default
    ///
    /// `false`
    ///
    /// # Environment Variable
    ///
    /// `FB__TOPOLOGY__ALL_EDGE_NODES`
    pub all_edge_nodes: bool,

    /// How targets are picked for each request. See [`Selection`].
    pub selection: Selection,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            network: "172.20.0.".into(),
            port: None,
            fog_count: 3,
            edge_per_fog: 3,
            start_index: None,
            all_edge_nodes: false,
            selection: Selection::RoundRobin,
        }
    }
}

/// Target selection mode.
///
/// The `mode` field in YAML or `__MODE` in environment variables determines which variant is
/// used.
///
/// # Example
///
/// ```yaml
/// topology:
///   selection:
///     mode: random
///     seed: 42
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Selection {
    /// Cycle through the eligible edge nodes by iteration (mode `"round_robin"`).
    #[default]
    RoundRobin,
    /// Pick an eligible edge node at random (mode `"random"`).
    Random {
        /// Optional seed for reproducible target sequences.
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Send all requests to a single address (mode `"fixed"`).
    Fixed {
        /// The `host[:port]` of the target.
        address: String,
    },
}

/// Load profile of the run.
///
/// The `executor` field in YAML or `__EXECUTOR` in environment variables determines which variant
/// is used.
///
/// Used in: [`Config::scenario`]
#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "executor", rename_all = "kebab-case")]
pub enum Scenario {
    /// Ramp a number of concurrently looping workers through stages (executor
    /// `"ramping-vus"`).
    ///
    /// The number of workers changes linearly from one stage target to the next.
    ///
    /// # Example
    ///
    /// ```yaml
    /// scenario:
    ///   executor: ramping-vus
    ///   stages:
    ///     - { duration: 15s, target: 30 }
    ///     - { duration: 2m, target: 30 }
    ///     - { duration: 15s, target: 0 }
    /// ```
    RampingVus {
        /// The ramp stages in order.
        stages: Vec<StageConfig>,
    },

    /// Start requests at a fixed rate (executor `"constant-arrival-rate"`).
    ///
    /// # Example
    ///
    /// ```yaml
    /// scenario:
    ///   executor: constant-arrival-rate
    ///   rate: 3
    ///   time_unit: 1s
    ///   duration: 10m
    ///   preallocated_vus: 180
    /// ```
    ConstantArrivalRate {
        /// Number of requests started per `time_unit`.
        rate: u32,
        /// Time unit of the rate. Defaults to `1s`.
        #[serde(default = "default_time_unit", with = "humantime_serde")]
        time_unit: Duration,
        /// How long requests are started.
        #[serde(with = "humantime_serde")]
        duration: Duration,
        /// The maximum number of concurrent requests.
        preallocated_vus: usize,
    },
}

fn default_time_unit() -> Duration {
    Duration::from_secs(1)
}

impl Default for Scenario {
    fn default() -> Self {
        Self::RampingVus {
            stages: vec![
                StageConfig::new(Duration::from_secs(15), 30),
                StageConfig::new(Duration::from_secs(120), 30),
                StageConfig::new(Duration::from_secs(15), 0),
            ],
        }
    }
}

/// A single stage of [`Scenario::RampingVus`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct StageConfig {
    /// Length of the stage.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Number of workers at the end of the stage.
    pub target: u32,
}

impl StageConfig {
    fn new(duration: Duration, target: u32) -> Self {
        Self { duration, target }
    }
}

/// Shape of each request.
///
/// Used in: [`Config::request`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Request {
    /// Path of the endpoint on every target.
    ///
    /// # Default
    ///
    /// `"/matmul"`
    pub path: String,

    /// Dimension of the matrices each target multiplies per request.
    ///
    /// # Default
    ///
    /// `1000`
    ///
    /// # Environment Variable
    ///
    /// `FB__REQUEST__MATRIX_SIZE`
    pub matrix_size: u32,

    /// Opaque metadata forwarded with every request.
    pub metadata: String,

    /// Deadline for a single request, including the response body.
    ///
    /// # Default
    ///
    /// `60s`
    ///
    /// # Environment Variable
    ///
    /// `FB__REQUEST__TIMEOUT`
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Additional headers, with case-insensitive names. `Content-Type: application/json` is sent
    /// unless a `content-type` entry replaces it.
    pub headers: BTreeMap<String, String>,
}

impl Default for Request {
    fn default() -> Self {
        let defaults = RequestSpec::new(1000);
        Self {
            path: defaults.path,
            matrix_size: defaults.matrix_size,
            metadata: defaults.metadata,
            timeout: defaults.timeout,
            headers: BTreeMap::new(),
        }
    }
}

/// Tuning of the driver loop.
///
/// Used in: [`Config::driver`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Driver {
    /// Pause of a worker after each request.
    ///
    /// # Default
    ///
    /// `1s`
    ///
    /// # Environment Variable
    ///
    /// `FB__DRIVER__THINK_TIME`
    #[serde(with = "humantime_serde")]
    pub think_time: Duration,

    /// Interval at which the schedule is evaluated.
    ///
    /// # Default
    ///
    /// `10ms`
    #[serde(with = "humantime_serde")]
    pub tick: Duration,

    /// Interval of progress logs. `0s` disables them.
    ///
    /// # Default
    ///
    /// `10s`
    #[serde(with = "humantime_serde")]
    pub report_interval: Duration,
}

impl Default for Driver {
    fn default() -> Self {
        Self {
            think_time: Duration::from_secs(1),
            tick: Duration::from_millis(10),
            report_interval: Duration::from_secs(10),
        }
    }
}

/// Runtime configuration for the Tokio async runtime.
///
/// Used in: [`Config::runtime`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Runtime {
    /// Number of worker threads for the runtime.
    ///
    /// # Default
    ///
    /// Defaults to the number of CPU cores on the host machine.
    ///
    /// # Environment Variable
    ///
    /// `FB__RUNTIME__WORKER_THREADS`
    pub worker_threads: usize,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
        }
    }
}

/// Log output format.
///
/// Parsed case-insensitively, so `json`, `JSON` and `Json` are equivalent. An empty value selects
/// [`LogFormat::Auto`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LogFormat {
    /// [`LogFormat::Pretty`] when stderr is a terminal, [`LogFormat::Simplified`] otherwise.
    Auto,

    /// Compact output with colors.
    Pretty,

    /// Plain text without colors, for log files and CI output.
    Simplified,

    /// One JSON object per line.
    Json,
}

impl LogFormat {
    const NAMES: [(&'static str, LogFormat); 4] = [
        ("auto", LogFormat::Auto),
        ("pretty", LogFormat::Pretty),
        ("simplified", LogFormat::Simplified),
        ("json", LogFormat::Json),
    ];

    fn name(self) -> &'static str {
        match self {
            LogFormat::Auto => "auto",
            LogFormat::Pretty => "pretty",
            LogFormat::Simplified => "simplified",
            LogFormat::Json => "json",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unknown [`LogFormat`] name.
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown log format `{}`, expected one of ", self.0)?;
        let names: Vec<_> = LogFormat::NAMES.iter().map(|(name, _)| *name).collect();
        f.write_str(&names.join(", "))
    }
}

impl std::error::Error for FormatParseError {}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(LogFormat::Auto);
        }

        LogFormat::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, format)| *format)
            .ok_or_else(|| FormatParseError(s.to_owned()))
    }
}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
///
/// Logs are always written to stderr, so they never mix with the report on stdout.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable takes precedence and provides more granular control
    /// per module if needed.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `FB__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format. See [`LogFormat`].
    ///
    /// # Default
    ///
    /// `Auto`
    ///
    /// # Environment Variable
    ///
    /// `FB__LOGGING__FORMAT`
    #[serde(with = "display_fromstr")]
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Main configuration struct for a fogbench run.
///
/// Configuration is loaded with the following precedence (highest to lowest):
/// 1. Environment variables (prefixed with `FB__`)
/// 2. YAML configuration file (if provided via `-c` flag)
/// 3. Default values
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Layout of the deployment under test.
    pub topology: TopologyConfig,

    /// Load profile. Defaults to a 15 second ramp to 30 workers, two minutes at 30 workers and a
    /// 15 second ramp down.
    pub scenario: Scenario,

    /// Shape of each request.
    pub request: Request,

    /// Tuning of the driver loop.
    pub driver: Driver,

    /// Configuration of the internal task runtime.
    pub runtime: Runtime,

    /// Logging configuration.
    pub logging: Logging,
}

impl Config {
    /// Loads configuration from the provided arguments.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if provided in `args`)
    /// 3. Environment variables (prefixed with `FB__`)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The YAML configuration file cannot be read or parsed
    /// - Environment variables contain invalid values
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }

    /// Builds the topology described by [`Config::topology`].
    pub fn topology(&self) -> Result<Topology, ConfigurationError> {
        let config = &self.topology;
        let mut builder = Topology::builder(config.network.as_str())
            .fog_count(config.fog_count)
            .edge_per_fog(config.edge_per_fog)
            .all_edge_nodes(config.all_edge_nodes)
            .port(config.port);
        if let Some(start_index) = config.start_index {
            builder = builder.start_index(start_index);
        }
        builder.build()
    }

    /// Builds the target resolver for the configured topology and selection mode.
    pub fn resolver(&self) -> Result<TargetResolver, ConfigurationError> {
        let selection = match &self.topology.selection {
            Selection::RoundRobin => TargetSelection::RoundRobin,
            Selection::Random { seed } => TargetSelection::Random { seed: *seed },
            Selection::Fixed { address } => TargetSelection::Fixed(Address::new(address.as_str())),
        };
        TargetResolver::new(self.topology()?, selection)
    }

    /// Converts [`Config::scenario`] into a driver schedule.
    pub fn schedule(&self) -> Schedule {
        match &self.scenario {
            Scenario::RampingVus { stages } => Schedule::StagedRamp {
                stages: stages
                    .iter()
                    .map(|stage| Stage::new(stage.duration, stage.target))
                    .collect(),
            },
            Scenario::ConstantArrivalRate {
                rate,
                time_unit,
                duration,
                preallocated_vus,
            } => Schedule::ConstantArrivalRate {
                rate: *rate,
                time_unit: *time_unit,
                duration: *duration,
                preallocated_workers: *preallocated_vus,
            },
        }
    }

    /// Builds the request spec from [`Config::request`].
    pub fn request_spec(&self) -> RequestSpec {
        let mut spec = RequestSpec::new(self.request.matrix_size);
        spec.path = self.request.path.clone();
        spec.metadata = self.request.metadata.clone();
        spec.timeout = self.request.timeout;
        for (name, value) in &self.request.headers {
            spec.header(name, value.as_str());
        }
        spec
    }

    /// Builds the driver options from [`Config::driver`].
    pub fn driver_options(&self) -> DriverOptions {
        let report_interval = self.driver.report_interval;
        DriverOptions {
            think_time: self.driver.think_time,
            tick: self.driver.tick,
            report_interval: (!report_interval.is_zero()).then_some(report_interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_reference_ramp() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            let topology = config.topology().unwrap();
            assert_eq!(topology.start_index(), 6);
            assert_eq!(topology.total_eligible(), 3);

            let Schedule::StagedRamp { stages } = config.schedule() else {
                panic!("expected staged ramp");
            };
            assert_eq!(stages.len(), 3);
            assert_eq!(config.schedule().total_duration(), Duration::from_secs(150));

            let spec = config.request_spec();
            assert_eq!(spec.matrix_size, 1000);
            assert_eq!(spec.timeout, Duration::from_secs(60));
            assert_eq!(config.driver_options().think_time, Duration::from_secs(1));

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FB__TOPOLOGY__FOG_COUNT", "16");
            jail.set_env("FB__TOPOLOGY__EDGE_PER_FOG", "6");
            jail.set_env("FB__TOPOLOGY__ALL_EDGE_NODES", "true");
            jail.set_env("FB__SCENARIO__EXECUTOR", "constant-arrival-rate");
            jail.set_env("FB__SCENARIO__RATE", "3");
            jail.set_env("FB__SCENARIO__DURATION", "10m");
            jail.set_env("FB__SCENARIO__PREALLOCATED_VUS", "180");
            jail.set_env("FB__REQUEST__MATRIX_SIZE", "1");
            jail.set_env("FB__REQUEST__TIMEOUT", "30s");
            jail.set_env("FB__LOGGING__LEVEL", "debug");
            jail.set_env("FB__LOGGING__FORMAT", "json");

            let config = Config::load(None).unwrap();

            let topology = config.topology().unwrap();
            assert_eq!(topology.address_stride(), 1);
            assert_eq!(topology.total_eligible(), 96);

            assert_eq!(
                config.schedule(),
                Schedule::ConstantArrivalRate {
                    rate: 3,
                    time_unit: Duration::from_secs(1),
                    duration: Duration::from_secs(600),
                    preallocated_workers: 180,
                }
            );

            assert_eq!(config.request.matrix_size, 1);
            assert_eq!(config.request.timeout, Duration::from_secs(30));
            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            topology:
                network: "10.1.0."
                port: 8080
                fog_count: 2
                edge_per_fog: 4
                start_index: 10
                selection:
                    mode: random
                    seed: 42
            scenario:
                executor: ramping-vus
                stages:
                    - { duration: 1m, target: 4800 }
                    - { duration: 3m, target: 4800 }
                    - { duration: 1m, target: 0 }
            request:
                metadata: benchmark
                headers:
                    X-Run: nightly
            driver:
                think_time: 0s
                report_interval: 0s
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();

            let topology = config.topology().unwrap();
            assert_eq!(topology.address_for(1).as_str(), "10.1.0.10:8080");
            assert_eq!(topology.address_for(2).as_str(), "10.1.0.14:8080");
            assert_eq!(
                config.topology.selection,
                Selection::Random { seed: Some(42) }
            );

            assert_eq!(
                config.schedule(),
                Schedule::StagedRamp {
                    stages: vec![
                        Stage::new(Duration::from_secs(60), 4800),
                        Stage::new(Duration::from_secs(180), 4800),
                        Stage::new(Duration::from_secs(60), 0),
                    ]
                }
            );

            let spec = config.request_spec();
            assert_eq!(spec.metadata, "benchmark");
            assert_eq!(spec.headers.get("x-run").map(String::as_str), Some("nightly"));
            assert_eq!(
                spec.headers.get("content-type").map(String::as_str),
                Some("application/json")
            );

            let options = config.driver_options();
            assert_eq!(options.think_time, Duration::ZERO);
            assert_eq!(options.report_interval, None);

            Ok(())
        });
    }

    #[test]
    fn configured_with_env_and_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            scenario:
                executor: constant-arrival-rate
                rate: 3
                duration: 10m
                preallocated_vus: 180
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("FB__SCENARIO__RATE", "9");

            let config = Config::load(Some(tempfile.path())).unwrap();

            // Env should overwrite the yaml config
            let Schedule::ConstantArrivalRate { rate, .. } = config.schedule() else {
                panic!("expected constant arrival rate");
            };
            assert_eq!(rate, 9);

            Ok(())
        });
    }

    #[test]
    fn fixed_target_selection() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FB__TOPOLOGY__SELECTION__MODE", "fixed");
            jail.set_env("FB__TOPOLOGY__SELECTION__ADDRESS", "172.20.0.5");

            let config = Config::load(None).unwrap();
            let mut resolver = config.resolver().unwrap();
            assert_eq!(resolver.resolve(1).as_str(), "172.20.0.5");
            assert_eq!(resolver.resolve(2).as_str(), "172.20.0.5");

            Ok(())
        });
    }

    #[test]
    fn configured_content_type_replaces_default() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "fogbench.yml",
                r#"
                request:
                    headers:
                        content-type: application/json; charset=utf-8
                "#,
            )?;

            let config = Config::load(Some(Path::new("fogbench.yml"))).unwrap();
            let spec = config.request_spec();
            assert_eq!(spec.headers.len(), 1);
            assert_eq!(
                spec.headers.get("content-type").map(String::as_str),
                Some("application/json; charset=utf-8")
            );
            assert_eq!(spec.validate(), Ok(()));

            Ok(())
        });
    }

    #[test]
    fn log_format_is_case_insensitive() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FB__LOGGING__FORMAT", "JSON");
            let config = Config::load(None).unwrap();
            assert_eq!(config.logging.format, LogFormat::Json);

            jail.set_env("FB__LOGGING__FORMAT", "Simplified");
            let config = Config::load(None).unwrap();
            assert_eq!(config.logging.format, LogFormat::Simplified);

            Ok(())
        });
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        assert_eq!("".parse::<LogFormat>().unwrap(), LogFormat::Auto);

        let err = "xml".parse::<LogFormat>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown log format `xml`, expected one of auto, pretty, simplified, json"
        );

        figment::Jail::expect_with(|jail| {
            jail.set_env("FB__LOGGING__FORMAT", "xml");
            assert!(Config::load(None).is_err());
            Ok(())
        });
    }

    #[test]
    fn invalid_topology_is_a_configuration_error() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FB__TOPOLOGY__EDGE_PER_FOG", "0");

            let config = Config::load(None).unwrap();
            assert!(matches!(
                config.resolver(),
                Err(ConfigurationError::NoEligibleTargets { .. })
            ));

            Ok(())
        });
    }
}
