//! Exposes an in-process fake `/matmul` target for use in integration tests.
//!
//! ```
//! use fogbench_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    let address = server.address();
//!    // point the driver at the address...
//! }
//! ```
//!
//! The server does not multiply any matrices. It records the requests it receives and answers
//! each of them with a configurable status code after a configurable delay.

use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

/// A request body as received by the fake target.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct MatmulRequest {
    /// The requested matrix dimension.
    pub n: u64,
    /// Opaque metadata sent along with the request.
    pub metadata: String,
}

/// A request as observed by the fake target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedRequest {
    /// The value of the `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// The parsed JSON body.
    pub body: MatmulRequest,
}

#[derive(Debug)]
struct Behavior {
    status: AtomicU16,
    delay_ms: AtomicU64,
    received: Mutex<Vec<ReceivedRequest>>,
}

/// An in-process `/matmul` target for use in integration tests.
///
/// The server listens on a random available port on localhost and stops when dropped.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    behavior: Arc<Behavior>,
}

impl TestServer {
    /// Starts a server that answers `200 OK` immediately.
    pub async fn new() -> Self {
        Self::with_behavior(200, Duration::ZERO).await
    }

    /// Starts a server that answers with `status` after `delay`.
    pub async fn with_behavior(status: u16, delay: Duration) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let behavior = Arc::new(Behavior {
            status: AtomicU16::new(status),
            delay_ms: AtomicU64::new(delay.as_millis() as u64),
            received: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/matmul", post(matmul))
            .with_state(Arc::clone(&behavior));

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            handle,
            socket,
            behavior,
        }
    }

    /// Returns the `host:port` address of the server.
    pub fn address(&self) -> String {
        self.socket.to_string()
    }

    /// Returns the port the server listens on.
    pub fn port(&self) -> u16 {
        self.socket.port()
    }

    /// Changes the status code returned for subsequent requests.
    pub fn set_status(&self, status: u16) {
        self.behavior.status.store(status, Ordering::Relaxed);
    }

    /// Changes the delay before subsequent responses.
    pub fn set_delay(&self, delay: Duration) {
        self.behavior
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::Relaxed);
    }

    /// Returns all requests received so far.
    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.behavior.received.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn matmul(
    State(behavior): State<Arc<Behavior>>,
    headers: HeaderMap,
    Json(body): Json<MatmulRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let n = body.n;
    behavior
        .received
        .lock()
        .unwrap()
        .push(ReceivedRequest { content_type, body });

    let delay = Duration::from_millis(behavior.delay_ms.load(Ordering::Relaxed));
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let status = StatusCode::from_u16(behavior.status.load(Ordering::Relaxed))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(serde_json::json!({ "n": n })))
}
