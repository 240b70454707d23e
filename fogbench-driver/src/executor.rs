//! Execution of single `/matmul` requests.
//!
//! The [`RequestExecutor`] trait is the seam between the driver and the network. Production runs
//! use [`HttpExecutor`], which posts the configured payload with `reqwest`.
//!
//! Executors never fail. Timeouts, connection errors and unexpected status codes all produce a
//! failed [`Outcome`], so that a single unhealthy target cannot abort a run.

use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use serde::Serialize;

use crate::error::{ConfigurationError, Result};
use crate::topology::Address;

/// Default deadline for a single request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// The shape of every request sent during a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestSpec {
    /// Path of the endpoint on each target.
    pub path: String,
    /// Headers sent with every request, keyed by lowercase name.
    ///
    /// Use [`header`](Self::header) to add entries. Names that only differ in case are rejected by
    /// [`validate`](Self::validate).
    pub headers: BTreeMap<String, String>,
    /// Dimension of the matrices the target multiplies.
    pub matrix_size: u32,
    /// Opaque metadata forwarded to the target.
    pub metadata: String,
    /// Deadline for the full request, including the response body.
    pub timeout: Duration,
}

impl RequestSpec {
    /// Creates a spec for `/matmul` with the given matrix size and default settings.
    pub fn new(matrix_size: u32) -> Self {
        Self {
            path: "/matmul".into(),
            headers: BTreeMap::from([("content-type".into(), "application/json".into())]),
            matrix_size,
            metadata: String::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets a header, replacing any previous value under the same case-insensitive name.
    pub fn header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Checks the request settings for configuration errors.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(ConfigurationError::ZeroTimeout(self.timeout));
        }

        let mut seen = HashSet::new();
        for (name, value) in &self.headers {
            let Ok(header) = HeaderName::try_from(name.as_str()) else {
                return Err(ConfigurationError::InvalidHeader(name.clone()));
            };
            if HeaderValue::try_from(value.as_str()).is_err() {
                return Err(ConfigurationError::InvalidHeader(name.clone()));
            }
            // `HeaderName` is always lowercase
            if !seen.insert(header) {
                return Err(ConfigurationError::DuplicateHeader(name.clone()));
            }
        }

        Ok(())
    }

    /// The full URL of the endpoint on the given target.
    pub fn url(&self, address: &Address) -> String {
        let path = self.path.trim_start_matches('/');
        format!("http://{address}/{path}")
    }

    fn body(&self) -> MatmulRequest<'_> {
        MatmulRequest {
            n: self.matrix_size,
            metadata: &self.metadata,
        }
    }
}

#[derive(Debug, Serialize)]
struct MatmulRequest<'a> {
    n: u32,
    metadata: &'a str,
}

/// Why a request did not succeed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Failure {
    /// The request did not complete within its deadline.
    Timeout,
    /// The connection could not be established or broke down.
    Transport,
    /// The target answered with a status other than `200 OK`.
    Status,
}

/// The result of a single request.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    status: Option<u16>,
    latency: Duration,
    failure: Option<Failure>,
}

impl Outcome {
    /// An outcome for a request that received a complete response.
    pub fn completed(status: u16, latency: Duration) -> Self {
        let failure = (status != 200).then_some(Failure::Status);
        Self {
            status: Some(status),
            latency,
            failure,
        }
    }

    /// An outcome for a request that did not receive a complete response.
    ///
    /// The status is kept if the response headers arrived before the failure.
    pub fn failed(failure: Failure, status: Option<u16>, latency: Duration) -> Self {
        Self {
            status,
            latency,
            failure: Some(failure),
        }
    }

    /// The HTTP status code, if a response arrived.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Wall-clock time from sending the request to the end of the response or the failure.
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// The reason the request failed, if it did.
    pub fn failure(&self) -> Option<Failure> {
        self.failure
    }

    /// Whether the target answered `200 OK` with a complete response.
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Issues a single request against a target.
#[async_trait]
pub trait RequestExecutor: Send + Sync + 'static {
    /// Sends one request built from `spec` to `address` and reports how it went.
    async fn execute(&self, address: &Address, spec: &RequestSpec) -> Outcome;
}

/// A [`RequestExecutor`] posting JSON payloads over HTTP.
#[derive(Clone, Debug, Default)]
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    /// Creates an executor with a default HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor that shares the given client and its connection pool.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(&self, address: &Address, spec: &RequestSpec) -> Outcome {
        let mut request = self.client.post(spec.url(address)).timeout(spec.timeout);
        for (name, value) in &spec.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let request = request.json(&spec.body());

        let start = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(
                    %address,
                    error = &err as &dyn std::error::Error,
                    "request failed"
                );
                return Outcome::failed(classify(&err), None, start.elapsed());
            }
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(_) => Outcome::completed(status, start.elapsed()),
            Err(err) => {
                tracing::debug!(
                    %address,
                    status,
                    error = &err as &dyn std::error::Error,
                    "reading response failed"
                );
                Outcome::failed(classify(&err), Some(status), start.elapsed())
            }
        }
    }
}

fn classify(err: &reqwest::Error) -> Failure {
    if err.is_timeout() {
        Failure::Timeout
    } else {
        Failure::Transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_requires_ok_status() {
        let ok = Outcome::completed(200, Duration::from_millis(5));
        assert!(ok.success());
        assert_eq!(ok.failure(), None);

        let created = Outcome::completed(201, Duration::from_millis(5));
        assert!(!created.success());
        assert_eq!(created.failure(), Some(Failure::Status));

        let truncated = Outcome::failed(Failure::Transport, Some(200), Duration::from_millis(5));
        assert!(!truncated.success());
        assert_eq!(truncated.status(), Some(200));
    }

    #[test]
    fn body_has_matmul_shape() {
        let mut spec = RequestSpec::new(1000);
        spec.metadata = "fog-1".into();

        let body = serde_json::to_value(spec.body()).unwrap();
        assert_eq!(body, serde_json::json!({"n": 1000, "metadata": "fog-1"}));
    }

    #[test]
    fn url_joins_address_and_path() {
        let spec = RequestSpec::new(1);
        assert_eq!(
            spec.url(&Address::new("172.20.0.6")),
            "http://172.20.0.6/matmul"
        );
    }

    #[test]
    fn invalid_specs_are_rejected() {
        let mut spec = RequestSpec::new(1);
        spec.timeout = Duration::ZERO;
        assert!(matches!(
            spec.validate(),
            Err(ConfigurationError::ZeroTimeout(_))
        ));

        let mut spec = RequestSpec::new(1);
        spec.headers.insert("bad header".into(), "x".into());
        assert_eq!(
            spec.validate(),
            Err(ConfigurationError::InvalidHeader("bad header".into()))
        );
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let mut spec = RequestSpec::new(1);
        spec.header("Content-Type", "application/json; charset=utf-8")
            .header("X-Run", "nightly");

        assert_eq!(spec.headers.len(), 2);
        assert_eq!(
            spec.headers.get("content-type").map(String::as_str),
            Some("application/json; charset=utf-8")
        );
        assert_eq!(spec.validate(), Ok(()));

        spec.headers.insert("X-RUN".into(), "weekly".into());
        assert_eq!(
            spec.validate(),
            Err(ConfigurationError::DuplicateHeader("x-run".into()))
        );
    }
}
