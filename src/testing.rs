//! Test doubles for the charm's external collaborators.
//!
//! Provides:
//! - [`MockRuntime`]: records container runtime commands, returns a fixed id
//! - [`RecordingHost`]: records status, port and relation calls
//! - [`MockCheServer`]: a local HTTP server standing in for Che
//!
//! # Usage
//!
//! ```rust,no_run
//! use che_charm::testing::MockCheServer;
//!
//! # async fn example() {
//! let server = MockCheServer::builder().not_ready_for(2).start().await;
//! // Point the installer at server.endpoint().
//! println!("Che stand-in at {}", server.endpoint());
//! # }
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::sync::oneshot;

use crate::error::{HostError, RuntimeError};
use crate::host::{AddressKind, HostFramework, PortRange, WorkloadStatus};
use crate::runtime::{ContainerHandle, ContainerRuntime, RunMode, RunSpec};
use crate::service::ServiceEndpoint;

// ---------------------------------------------------------------------------
// Container runtime
// ---------------------------------------------------------------------------

/// A command the charm issued to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    /// Full argument list, starting with `run`.
    Run(Vec<String>),
    Stop(String),
    Remove(String),
}

/// Runtime stub that records every call.
///
/// Detached runs print `container_id` followed by a newline, like the real
/// CLI does.
#[derive(Debug)]
pub struct MockRuntime {
    container_id: String,
    fail_stop: bool,
    fail_remove: bool,
    failing_images: Vec<String>,
    calls: Mutex<Vec<RuntimeCall>>,
}

impl MockRuntime {
    pub fn new(container_id: impl Into<String>) -> Self {
        Self {
            container_id: container_id.into(),
            fail_stop: false,
            fail_remove: false,
            failing_images: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Make `stop` fail, as when the container already exited.
    pub fn fail_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn fail_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    /// Make any `run` of `image` exit non-zero.
    pub fn fail_run_of(mut self, image: impl Into<String>) -> Self {
        self.failing_images.push(image.into());
        self
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.calls.lock().expect("mock runtime poisoned").clone()
    }

    fn record(&self, call: RuntimeCall) {
        self.calls.lock().expect("mock runtime poisoned").push(call);
    }

    fn failure(command: String) -> RuntimeError {
        RuntimeError::CommandFailed {
            command,
            code: 1,
            stderr: "mock failure".to_string(),
        }
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn run(&self, spec: &RunSpec) -> Result<String, RuntimeError> {
        let args = spec.to_args();
        self.record(RuntimeCall::Run(args.clone()));

        if self.failing_images.contains(&spec.image) {
            return Err(Self::failure(args.join(" ")));
        }
        match spec.mode {
            RunMode::Detached => Ok(format!("{}\n", self.container_id)),
            RunMode::Foreground | RunMode::Interactive => Ok(String::new()),
        }
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Stop(handle.to_string()));
        if self.fail_stop {
            return Err(Self::failure(format!("stop {}", handle)));
        }
        Ok(())
    }

    async fn remove(&self, handle: &ContainerHandle) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Remove(handle.to_string()));
        if self.fail_remove {
            return Err(Self::failure(format!("rm {}", handle)));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Host framework
// ---------------------------------------------------------------------------

/// A call the charm made into the host framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Status(WorkloadStatus, String),
    /// Rendered port, e.g. `8080/tcp`.
    OpenPort(String),
    RelationSet {
        relation: String,
        settings: Vec<(String, String)>,
    },
}

/// Host framework stub that records every mutating call.
#[derive(Debug)]
pub struct RecordingHost {
    public_address: String,
    private_address: String,
    calls: Mutex<Vec<HostCall>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            public_address: "203.0.113.10".to_string(),
            private_address: "10.0.0.10".to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_public_address(mut self, address: impl Into<String>) -> Self {
        self.public_address = address.into();
        self
    }

    pub fn with_private_address(mut self, address: impl Into<String>) -> Self {
        self.private_address = address.into();
        self
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().expect("recording host poisoned").clone()
    }

    /// Ports opened so far, rendered.
    pub fn opened_ports(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::OpenPort(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// The most recent status set.
    pub fn last_status(&self) -> Option<(WorkloadStatus, String)> {
        self.calls().into_iter().rev().find_map(|c| match c {
            HostCall::Status(s, m) => Some((s, m)),
            _ => None,
        })
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().expect("recording host poisoned").push(call);
    }
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostFramework for RecordingHost {
    async fn status_set(&self, status: WorkloadStatus, message: &str) -> Result<(), HostError> {
        self.record(HostCall::Status(status, message.to_string()));
        Ok(())
    }

    async fn open_port(&self, port: &PortRange) -> Result<(), HostError> {
        self.record(HostCall::OpenPort(port.to_string()));
        Ok(())
    }

    async fn unit_address(&self, kind: AddressKind) -> Result<String, HostError> {
        Ok(match kind {
            AddressKind::Public => self.public_address.clone(),
            AddressKind::Private => self.private_address.clone(),
        })
    }

    async fn relation_set(
        &self,
        relation: &str,
        settings: &[(String, String)],
    ) -> Result<(), HostError> {
        self.record(HostCall::RelationSet {
            relation: relation.to_string(),
            settings: settings.to_vec(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Che HTTP API
// ---------------------------------------------------------------------------

/// How the mock answers `POST /api/stack`.
#[derive(Debug, Clone)]
pub enum StackResponse {
    /// 201 with this JSON body.
    Created(String),
    /// Bare status code, empty body.
    Status(u16),
}

/// A POST the mock received.
#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub path: String,
    pub content_type: Option<String>,
    /// Body parsed as JSON, when it is JSON.
    pub json: Option<serde_json::Value>,
    pub body_len: usize,
}

struct ServerState {
    not_ready_remaining: AtomicU32,
    ready_status: StatusCode,
    probes: AtomicU32,
    stack_response: StackResponse,
    icon_status: StatusCode,
    posts: Mutex<Vec<RecordedPost>>,
}

impl ServerState {
    fn record(&self, uri: &Uri, headers: &HeaderMap, body: &Bytes) {
        let post = RecordedPost {
            path: uri.path().to_string(),
            content_type: headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            json: serde_json::from_slice(body).ok(),
            body_len: body.len(),
        };
        self.posts.lock().expect("mock server poisoned").push(post);
    }
}

/// Builder for [`MockCheServer`].
pub struct MockCheServerBuilder {
    port: u16,
    not_ready_for: u32,
    ready_status: u16,
    stack_response: StackResponse,
    icon_status: u16,
}

impl MockCheServerBuilder {
    /// Bind a specific port instead of an ephemeral one.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Answer `GET /` with 503 this many times before becoming ready.
    pub fn not_ready_for(mut self, probes: u32) -> Self {
        self.not_ready_for = probes;
        self
    }

    /// Status returned by `GET /` once "ready" (200 by default).
    pub fn ready_status(mut self, status: u16) -> Self {
        self.ready_status = status;
        self
    }

    pub fn stack_response(mut self, response: StackResponse) -> Self {
        self.stack_response = response;
        self
    }

    pub fn icon_status(mut self, status: u16) -> Self {
        self.icon_status = status;
        self
    }

    pub async fn start(self) -> MockCheServer {
        let status =
            |code: u16| StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let state = Arc::new(ServerState {
            not_ready_remaining: AtomicU32::new(self.not_ready_for),
            ready_status: status(self.ready_status),
            probes: AtomicU32::new(0),
            stack_response: self.stack_response,
            icon_status: status(self.icon_status),
            posts: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/", get(probe_handler))
            .route("/api/stack", post(stack_handler))
            .route("/api/stack/{id}/icon", post(icon_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", self.port))
            .await
            .expect("failed to bind mock Che server");
        let port = listener
            .local_addr()
            .expect("mock Che server has no local address")
            .port();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        MockCheServer {
            port,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }
}

/// Local HTTP server impersonating Che's readiness and stack endpoints.
///
/// Shuts down when dropped.
pub struct MockCheServer {
    port: u16,
    state: Arc<ServerState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockCheServer {
    pub fn builder() -> MockCheServerBuilder {
        MockCheServerBuilder {
            port: 0,
            not_ready_for: 0,
            ready_status: 200,
            stack_response: StackResponse::Created(r#"{"id":"stack-1"}"#.to_string()),
            icon_status: 200,
        }
    }

    pub fn endpoint(&self) -> ServiceEndpoint {
        ServiceEndpoint {
            host: "127.0.0.1".to_string(),
            port: self.port,
        }
    }

    /// Number of `GET /` requests served.
    pub fn probe_count(&self) -> u32 {
        self.state.probes.load(Ordering::SeqCst)
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.state.posts.lock().expect("mock server poisoned").clone()
    }
}

impl Drop for MockCheServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn probe_handler(State(state): State<Arc<ServerState>>) -> StatusCode {
    state.probes.fetch_add(1, Ordering::SeqCst);
    let not_ready = state
        .not_ready_remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if not_ready {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        state.ready_status
    }
}

async fn stack_handler(
    State(state): State<Arc<ServerState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.record(&uri, &headers, &body);
    match &state.stack_response {
        StackResponse::Created(json) => (
            StatusCode::CREATED,
            [(header::CONTENT_TYPE, "application/json")],
            json.clone(),
        )
            .into_response(),
        StackResponse::Status(code) => StatusCode::from_u16(*code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
    }
}

async fn icon_handler(
    State(state): State<Arc<ServerState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    state.record(&uri, &headers, &body);
    state.icon_status
}
