//! Scriptable mock vendor API for integration tests
//!
//! Accepts any request, records it, and answers from a queue of scripted
//! responses, falling back to a fixed response once the queue is empty.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Canned reply
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: StatusCode,
    content_type: &'static str,
    body: String,
}

impl MockResponse {
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status: StatusCode::from_u16(status).expect("valid status"),
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    pub fn ok(body: &Value) -> Self {
        Self::json(200, body)
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status: StatusCode::from_u16(status).expect("valid status"),
            content_type: "text/plain",
            body: body.to_owned(),
        }
    }
}

/// A request as the mock received it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

struct MockState {
    scripted: Mutex<VecDeque<MockResponse>>,
    fallback: MockResponse,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Mock vendor server bound to an ephemeral local port
pub struct MockVendor {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

impl MockVendor {
    /// Start a mock answering every request with `fallback`
    pub async fn start(fallback: MockResponse) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            scripted: Mutex::new(VecDeque::new()),
            fallback,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Answer the next request with `response` before falling back
    pub fn then(&self, response: MockResponse) -> &Self {
        self.state.scripted.lock().expect("lock").push_back(response);
        self
    }

    /// Base URL including `/v1`, the way the vendors version their APIs
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub fn request_count(&self) -> usize {
        self.state.requests.lock().expect("lock").len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().expect("lock").clone()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests().pop().expect("at least one request")
    }
}

impl Drop for MockVendor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle(State(state): State<Arc<MockState>>, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    state.requests.lock().expect("lock").push(RecordedRequest {
        path: uri.path().to_owned(),
        headers,
        body,
    });

    let response = state
        .scripted
        .lock()
        .expect("lock")
        .pop_front()
        .unwrap_or_else(|| state.fallback.clone());

    (response.status, [(header::CONTENT_TYPE, response.content_type)], response.body).into_response()
}
