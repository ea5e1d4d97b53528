// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: a scriptable fake backend and a manual clock.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{OriginalUri, Path, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::config::BffConfig;

pub const TEST_EMAIL: &str = "user@example.com";
pub const TEST_PASSWORD: &str = "hunter2";
pub const DISABLED_EMAIL: &str = "disabled@example.com";
pub const TEST_PRINCIPAL: &str = "user-1";
pub const GOOD_CODE: &str = "good-code";

/// `GET {prefix}/slow` streams this many chunks, one per [`SLOW_CHUNK_GAP`].
pub const SLOW_CHUNKS: u8 = 5;
pub const SLOW_CHUNK_GAP: Duration = Duration::from_millis(120);

/// Config pointing at `backend`, with plain-http cookies and an ephemeral port.
pub fn test_config(backend: &FakeBackend) -> BffConfig {
    BffConfig {
        host: "127.0.0.1".into(),
        port: 0,
        backend_url: backend.url(),
        api_prefix: backend.api_prefix().into(),
        request_timeout_ms: 5_000,
        refresh_margin_secs: 10,
        session_cookie: "shortbff_session".into(),
        secure_cookies: false,
        session_sweep_ms: 60_000,
        log_format: "text".into(),
        log_level: "info".into(),
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// One request observed by the fake backend's echo routes.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Default)]
struct IssuedTokens {
    /// access token -> refresh token of the same pair
    access: HashMap<String, String>,
    /// refresh token -> principal id
    refresh: HashMap<String, String>,
}

struct FakeState {
    access_ttl_secs: AtomicU64,
    refresh_ttl_secs: AtomicU64,
    refresh_delay_ms: AtomicU64,
    fail_refresh: AtomicBool,
    login_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    next_token: AtomicU64,
    tokens: Mutex<IssuedTokens>,
    seen: Mutex<Vec<SeenRequest>>,
}

impl FakeState {
    fn issue(&self, principal: &str) -> serde_json::Value {
        let n = self.next_token.fetch_add(1, Ordering::SeqCst);
        let access = format!("access-{n}");
        let refresh = format!("refresh-{n}");
        {
            let mut tokens = self.tokens.lock();
            tokens.access.insert(access.clone(), refresh.clone());
            tokens.refresh.insert(refresh.clone(), principal.to_owned());
        }
        json!({
            "principal": { "id": principal },
            "accessToken": access,
            "refreshToken": refresh,
            "accessExpiresIn": self.access_ttl_secs.load(Ordering::SeqCst),
            "refreshExpiresIn": self.refresh_ttl_secs.load(Ordering::SeqCst),
        })
    }

    fn access_valid(&self, headers: &HeaderMap) -> bool {
        let Some(token) = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
        else {
            return false;
        };
        self.tokens.lock().access.contains_key(token)
    }
}

/// In-process stand-in for the shortcut backend, served over real TCP.
///
/// Refresh rotates the token pair and invalidates the old one, like the real
/// backend. The server stops when the handle is dropped.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Arc<FakeState>,
    shutdown: CancellationToken,
}

impl FakeBackend {
    pub async fn start() -> anyhow::Result<Self> {
        let state = Arc::new(FakeState {
            access_ttl_secs: AtomicU64::new(60),
            refresh_ttl_secs: AtomicU64::new(3600),
            refresh_delay_ms: AtomicU64::new(0),
            fail_refresh: AtomicBool::new(false),
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            next_token: AtomicU64::new(1),
            tokens: Mutex::new(IssuedTokens::default()),
            seen: Mutex::new(Vec::new()),
        });

        let api = Router::new()
            .route("/auth/token", post(password_token))
            .route("/auth/oauth2/token", post(exchange_token))
            .route("/auth/refresh", post(refresh_token))
            .route("/shortcuts/{id}", get(get_shortcut))
            .route("/redirect", get(redirect))
            .route("/slow", get(slow_stream))
            .route("/unauthorized", any(unauthorized))
            .route("/echo", any(echo))
            .route("/echo/{*rest}", any(echo));
        let router = Router::new()
            .nest("/api/v1", api)
            .route("/oauth2/{*rest}", any(echo))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(stop.cancelled_owned())
                .await;
        });

        Ok(Self { addr, state, shutdown })
    }

    /// Base URL without a trailing slash, e.g. `http://127.0.0.1:41234`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn api_prefix(&self) -> &'static str {
        "/api/v1"
    }

    pub fn set_access_ttl(&self, secs: u64) {
        self.state.access_ttl_secs.store(secs, Ordering::SeqCst);
    }

    pub fn set_refresh_ttl(&self, secs: u64) {
        self.state.refresh_ttl_secs.store(secs, Ordering::SeqCst);
    }

    /// Delay every refresh response, widening the window for concurrent callers.
    pub fn set_refresh_delay(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.refresh_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn fail_refresh(&self, fail: bool) {
        self.state.fail_refresh.store(fail, Ordering::SeqCst);
    }

    /// Invalidate every issued access token, as if they all expired backend-side.
    /// Refresh tokens stay valid.
    pub fn expire_access_tokens(&self) {
        self.state.tokens.lock().access.clear();
    }

    pub fn login_calls(&self) -> usize {
        self.state.login_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    /// Requests recorded by the echo routes, oldest first.
    pub fn seen(&self) -> Vec<SeenRequest> {
        self.state.seen.lock().clone()
    }

    pub fn last_seen(&self) -> Option<SeenRequest> {
        self.state.seen.lock().last().cloned()
    }

    /// Whether `token` is a currently valid access token.
    pub fn access_token_valid(&self, token: &str) -> bool {
        self.state.tokens.lock().access.contains_key(token)
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn api_error(status: StatusCode, error: &str) -> Response {
    (status, Json(json!({ "error": error }))).into_response()
}

#[derive(Deserialize)]
struct PasswordBody {
    email: String,
    password: String,
}

async fn password_token(
    State(s): State<Arc<FakeState>>,
    Json(body): Json<PasswordBody>,
) -> Response {
    s.login_calls.fetch_add(1, Ordering::SeqCst);
    if body.email == DISABLED_EMAIL {
        return api_error(StatusCode::UNAUTHORIZED, "AccountDisabledError");
    }
    if body.email != TEST_EMAIL || body.password != TEST_PASSWORD {
        return api_error(StatusCode::UNAUTHORIZED, "InvalidCredentialsError");
    }
    Json(s.issue(TEST_PRINCIPAL)).into_response()
}

#[derive(Deserialize)]
struct ExchangeBody {
    provider: String,
    code: String,
}

async fn exchange_token(
    State(s): State<Arc<FakeState>>,
    Json(body): Json<ExchangeBody>,
) -> Response {
    s.login_calls.fetch_add(1, Ordering::SeqCst);
    if body.code != GOOD_CODE {
        return api_error(StatusCode::UNAUTHORIZED, "InvalidCredentialsError");
    }
    Json(s.issue(&format!("{}-user", body.provider))).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody {
    refresh_token: String,
}

async fn refresh_token(
    State(s): State<Arc<FakeState>>,
    Json(body): Json<RefreshBody>,
) -> Response {
    s.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = s.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if s.fail_refresh.load(Ordering::SeqCst) {
        return api_error(StatusCode::UNAUTHORIZED, "InvalidRefreshTokenError");
    }

    let principal = {
        let mut tokens = s.tokens.lock();
        let Some(principal) = tokens.refresh.remove(&body.refresh_token) else {
            return api_error(StatusCode::UNAUTHORIZED, "InvalidRefreshTokenError");
        };
        tokens.access.retain(|_, refresh| *refresh != body.refresh_token);
        principal
    };
    Json(s.issue(&principal)).into_response()
}

async fn get_shortcut(
    State(s): State<Arc<FakeState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !s.access_valid(&headers) {
        return api_error(StatusCode::UNAUTHORIZED, "UnauthorizedError");
    }
    if id == "abc123" {
        let body = json!({ "error": "NotFoundError", "message": "Shortcut abc123 not found" });
        return (StatusCode::NOT_FOUND, Json(body)).into_response();
    }
    Json(json!({ "id": id, "url": format!("https://example.com/{id}") })).into_response()
}

async fn redirect() -> Response {
    (StatusCode::FOUND, [("location", "/api/v1/echo/after-redirect")]).into_response()
}

/// A body that keeps making progress but takes longer than a short timeout.
async fn slow_stream() -> Response {
    let chunks = futures_util::stream::unfold(0u8, |i| async move {
        if i >= SLOW_CHUNKS {
            return None;
        }
        tokio::time::sleep(SLOW_CHUNK_GAP).await;
        Some((Ok::<_, std::convert::Infallible>(Bytes::from(format!("chunk-{i}\n"))), i + 1))
    });
    Body::from_stream(chunks).into_response()
}

/// Records the request like the echo routes, then rejects it.
async fn unauthorized(
    State(s): State<Arc<FakeState>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    s.seen.lock().push(SeenRequest {
        method,
        path: uri.path().to_owned(),
        query: uri.query().map(str::to_owned),
        headers,
        body: Bytes::new(),
    });
    api_error(StatusCode::UNAUTHORIZED, "UnauthorizedError")
}

async fn echo(
    State(s): State<Arc<FakeState>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let authenticated = s.access_valid(&headers);
    let reply = json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "bodyLen": body.len(),
        "authenticated": authenticated,
    });
    s.seen.lock().push(SeenRequest {
        method,
        path: uri.path().to_owned(),
        query: uri.query().map(str::to_owned),
        headers,
        body,
    });
    (
        StatusCode::OK,
        [
            ("x-backend", "fake"),
            ("keep-alive", "timeout=5"),
            ("proxy-authenticate", "Basic"),
            ("trailers", "x-checksum"),
        ],
        Json(reply),
    )
        .into_response()
}
