#![allow(dead_code)]

//! In-process stand-in for Qdrant, OpenAI and Anthropic.
//!
//! One axum router answers every upstream the pipeline talks to; requests
//! are recorded so tests can assert on call order and bodies.

use std::collections::{HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::thread;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::oneshot;

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Recorded {
    /// Value of header `name`, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

#[derive(Debug, Default)]
pub struct UpstreamState {
    pub requests: Vec<Recorded>,
    pub collections: HashSet<String>,
    pub points: Vec<Value>,
    pub dim: usize,
    pub fail_chat: bool,
    /// Statuses returned by the next embedding calls, one per call.
    pub embedding_errors: VecDeque<StatusCode>,
}

#[derive(Clone)]
pub struct Upstream {
    inner: Arc<Mutex<UpstreamState>>,
}

impl Upstream {
    pub fn new(dim: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(UpstreamState {
                dim,
                ..UpstreamState::default()
            })),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, UpstreamState> {
        self.inner.lock().expect("upstream state poisoned")
    }

    /// Requests whose method and path match, in arrival order.
    pub fn requests_to(&self, method: &str, path: &str) -> Vec<Recorded> {
        self.state()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .cloned()
            .collect()
    }

    /// `METHOD path` for every Qdrant call, in arrival order.
    pub fn qdrant_calls(&self) -> Vec<String> {
        self.state()
            .requests
            .iter()
            .filter(|r| r.path.starts_with("/collections"))
            .map(|r| format!("{} {}", r.method, r.path))
            .collect()
    }
}

pub struct MockServer {
    pub base_url: String,
    pub upstream: Upstream,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockServer {
    pub fn start(dim: usize) -> Self {
        let upstream = Upstream::new(dim);
        let app = Router::new().fallback(handle).with_state(upstream.clone());
        let (addr_tx, addr_rx) = mpsc::channel::<SocketAddr>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("build mock runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind mock listener");
                addr_tx
                    .send(listener.local_addr().expect("mock address"))
                    .expect("report mock address");
                axum::serve(listener, app)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await
                    .expect("serve mock");
            });
        });
        let addr = addr_rx.recv().expect("mock server address");
        Self {
            base_url: format!("http://{addr}"),
            upstream,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn openai_base(&self) -> String {
        format!("{}/v1", self.base_url)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Deterministic vector for `text`: its length followed by ones.
pub fn fake_vector(text: &str, dim: usize) -> Vec<f32> {
    let mut vector = vec![1.0; dim];
    if let Some(first) = vector.first_mut() {
        *first = text.chars().count() as f32;
    }
    vector
}

async fn handle(
    State(upstream): State<Upstream>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let path = uri.path().to_string();
    let mut state = upstream.state();
    state.requests.push(Recorded {
        method: method.to_string(),
        path: path.clone(),
        headers,
        body: body.clone(),
    });

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match (method.as_str(), segments.as_slice()) {
        ("POST", ["v1", "embeddings"]) => embeddings(&mut state, &body),
        ("POST", ["v1", "chat", "completions"]) => {
            if state.fail_chat {
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "error": { "message": "model overloaded" } })),
                );
            }
            (
                StatusCode::OK,
                Json(json!({
                    "choices": [
                        { "message": { "role": "assistant", "content": "Grow fast [<id>0</id>, <id>1</id>]" } }
                    ]
                })),
            )
        }
        ("POST", ["v1", "messages"]) => (
            StatusCode::OK,
            Json(json!({
                "content": [
                    { "type": "thinking", "thinking": "hmm" },
                    { "type": "text", "text": "Grow fast [<id>0</id>]" }
                ]
            })),
        ),
        ("DELETE", ["collections", name]) => {
            if state.collections.remove(*name) {
                (StatusCode::OK, Json(json!({ "result": true })))
            } else {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "status": { "error": "Not found" } })),
                )
            }
        }
        ("PUT", ["collections", name]) => {
            state.collections.insert(name.to_string());
            state.points.clear();
            (StatusCode::OK, Json(json!({ "result": true })))
        }
        ("PATCH", ["collections", _]) => (StatusCode::OK, Json(json!({ "result": true }))),
        ("PUT", ["collections", _, "points"]) => {
            let points = body["points"].as_array().cloned().unwrap_or_default();
            state.points.extend(points);
            (
                StatusCode::OK,
                Json(json!({ "result": { "status": "completed" } })),
            )
        }
        ("POST", ["collections", _, "points", "search"]) => {
            let limit = body["limit"].as_u64().unwrap_or(10) as usize;
            let hits: Vec<Value> = state
                .points
                .iter()
                .take(limit)
                .enumerate()
                .map(|(rank, point)| {
                    json!({
                        "id": point["id"],
                        "version": 0,
                        "score": 0.9 - 0.1 * rank as f64,
                        "payload": point["payload"],
                    })
                })
                .collect();
            (StatusCode::OK, Json(json!({ "result": hits, "status": "ok" })))
        }
        _ => (StatusCode::NOT_FOUND, Json(json!({ "error": "no route" }))),
    }
}

fn embeddings(state: &mut UpstreamState, body: &Value) -> (StatusCode, Json<Value>) {
    if let Some(status) = state.embedding_errors.pop_front() {
        return (
            status,
            Json(json!({ "error": { "message": format!("scripted {}", status.as_u16()) } })),
        );
    }
    let inputs: Vec<String> = body["input"]
        .as_array()
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    if inputs.iter().any(|text| text.contains("boom")) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "message": "boom is not allowed" } })),
        );
    }
    // reversed on purpose; clients must sort by index
    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .rev()
        .map(|(index, text)| json!({ "index": index, "embedding": fake_vector(text, state.dim) }))
        .collect();
    (StatusCode::OK, Json(json!({ "data": data })))
}
