//! In-process mock of the dashboard backend

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
    routing::get,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use guardian_client::config::Config;

/// Code the mock accepts
pub const VALID_CODE: &str = "abc123";
/// Token the mock issues for [`VALID_CODE`]
pub const ISSUED_TOKEN: &str = "T1";

/// Shared mock state
pub struct MockState {
    pub exchange_calls: AtomicUsize,
    /// When set, the exchange waits for a permit before answering
    pub gated: bool,
    pub release: Semaphore,
    /// Ordered record of what the backend saw
    pub log: Mutex<Vec<String>>,
}

impl MockState {
    pub fn exchange_calls(&self) -> usize {
        self.exchange_calls.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn record(&self, entry: impl Into<String>) {
        self.log.lock().push(entry.into());
    }
}

/// Running mock backend
pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    server: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        Self::start_with(false).await
    }

    /// Start with the exchange held until [`MockBackend::release_exchange`]
    pub async fn start_gated() -> Self {
        Self::start_with(true).await
    }

    async fn start_with(gated: bool) -> Self {
        let state = Arc::new(MockState {
            exchange_calls: AtomicUsize::new(0),
            gated,
            release: Semaphore::new(0),
            log: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/auth/exchange-code", get(exchange_code))
            .route("/auth/status", get(auth_status))
            .route("/auth/logout", get(logout))
            .route("/api/health", get(health))
            .route("/api/echo", get(echo))
            .route("/api/protected", get(protected))
            .route("/api/broken", get(broken))
            .route("/api/user/profile", get(get_profile).post(save_profile))
            .route("/api/chat", axum::routing::post(chat))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Config pointing at this backend
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.api.base_url = Some(self.url());
        config.auth.exchange_timeout = Duration::from_secs(5);
        config.auth.failure_redirect_delay = Duration::from_millis(300);
        config
    }

    pub fn release_exchange(&self) {
        self.state.release.add_permits(1);
    }

    /// Wait until the exchange endpoint has been hit `n` times
    pub async fn wait_for_exchange_calls(&self, n: usize) {
        for _ in 0..200 {
            if self.state.exchange_calls() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("exchange endpoint was not called {n} time(s)");
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn is_valid(headers: &HeaderMap) -> bool {
    bearer(headers) == Some(format!("Bearer {ISSUED_TOKEN}"))
}

async fn exchange_code(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    state.exchange_calls.fetch_add(1, Ordering::SeqCst);
    state.record("exchange-start");

    if state.gated {
        state.release.acquire().await.unwrap().forget();
    }

    state.record("exchange-done");
    if params.get("code").map(String::as_str) == Some(VALID_CODE) {
        (StatusCode::OK, Json(json!({ "token": ISSUED_TOKEN })))
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid or expired code" })),
        )
    }
}

async fn auth_status(headers: HeaderMap) -> Json<Value> {
    if is_valid(&headers) {
        Json(json!({ "authenticated": true, "email": "user@example.com" }))
    } else {
        Json(json!({ "authenticated": false }))
    }
}

async fn logout() -> Json<Value> {
    Json(json!({ "message": "Logged out" }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn echo(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Json<Value> {
    let auth = bearer(&headers);
    state.record(format!("request:{}", auth.as_deref().unwrap_or("none")));
    Json(json!({ "authorization": auth }))
}

async fn protected(headers: HeaderMap) -> impl IntoResponse {
    if is_valid(&headers) {
        (StatusCode::OK, Json(json!({ "ok": true })))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Not authenticated" })),
        )
    }
}

async fn broken() -> impl IntoResponse {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Database down" })),
    )
}

async fn get_profile(headers: HeaderMap) -> impl IntoResponse {
    if !is_valid(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Not authenticated" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": { "full_name": "Ada", "salary": 30000.0, "city": "Pune" }
        })),
    )
}

async fn save_profile(Json(body): Json<Value>) -> Json<Value> {
    if body.get("salary").and_then(Value::as_f64).unwrap_or(0.0) > 0.0 {
        Json(json!({ "success": true, "data": body }))
    } else {
        Json(json!({ "success": false, "message": "Salary must be positive" }))
    }
}

async fn chat(Json(body): Json<Value>) -> Json<Value> {
    let turns = body
        .get("history")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    Json(json!({ "reply": format!("{} turn(s) so far", turns) }))
}
