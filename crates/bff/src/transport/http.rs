// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for health and the browser-facing session endpoints.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::credential::{AuthError, Credential, Grant};
use crate::error::ErrorCode;
use crate::session::lifecycle::short;
use crate::session::{SessionPhase, SessionView};
use crate::state::BffState;
use crate::transport::cookies;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub session_count: usize,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ExchangeRequest {
    pub provider: String,
    pub code: String,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/health`
pub async fn health(State(s): State<Arc<BffState>>) -> impl IntoResponse {
    Json(HealthResponse { status: "running".to_owned(), session_count: s.sessions.len().await })
}

/// `POST /api/auth/login`: password sign-in.
pub async fn login(
    State(s): State<Arc<BffState>>,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(b) => b,
        Err(e) => return bad_request(e),
    };
    if req.email.is_empty() || req.password.is_empty() {
        return ErrorCode::BadRequest
            .to_http_response(None, "email and password are required")
            .into_response();
    }
    sign_in(&s, jar, Grant::Password { email: req.email, password: req.password }).await
}

/// `POST /api/auth/exchange`: external identity provider code exchange.
pub async fn exchange(
    State(s): State<Arc<BffState>>,
    jar: CookieJar,
    body: Result<Json<ExchangeRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(b) => b,
        Err(e) => return bad_request(e),
    };
    if req.provider.is_empty() || req.code.is_empty() {
        return ErrorCode::BadRequest
            .to_http_response(None, "provider and code are required")
            .into_response();
    }
    sign_in(&s, jar, Grant::External { provider: req.provider, code: req.code }).await
}

/// `GET /api/auth/session`: describe the session, renewing it if due.
pub async fn session(State(s): State<Arc<BffState>>, jar: CookieJar) -> Response {
    let Some(id) = cookies::session_id(&s.config, &jar) else {
        return ErrorCode::Unauthenticated.to_http_response(None, "not signed in").into_response();
    };
    match s.sessions.view(&id).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => session_gone(&s, jar, &e),
    }
}

/// `POST /api/auth/session/refresh`: renew now, regardless of expiry.
pub async fn refresh_session(State(s): State<Arc<BffState>>, jar: CookieJar) -> Response {
    let Some(id) = cookies::session_id(&s.config, &jar) else {
        return ErrorCode::Unauthenticated.to_http_response(None, "not signed in").into_response();
    };
    match s.sessions.force_refresh(&id).await {
        Ok(credential) => issue(&s, jar, &id, &credential),
        Err(e) => session_gone(&s, jar, &e),
    }
}

/// `POST /api/auth/logout`
pub async fn logout(State(s): State<Arc<BffState>>, jar: CookieJar) -> Response {
    if let Some(id) = cookies::session_id(&s.config, &jar) {
        s.sessions.sign_out(&id).await;
    }
    (jar.add(cookies::clear_session_cookie(&s.config)), StatusCode::NO_CONTENT).into_response()
}

// -- Helpers ------------------------------------------------------------------

async fn sign_in(s: &BffState, jar: CookieJar, grant: Grant) -> Response {
    match s.sessions.sign_in(&grant).await {
        Ok((session, credential)) => {
            // A browser signing in again gets a fresh session id.
            if let Some(previous) = cookies::session_id(&s.config, &jar) {
                s.sessions.sign_out(&previous).await;
            }
            issue(s, jar, &session.id, &credential)
        }
        Err(e) => {
            if let AuthError::Backend(ref inner) = e {
                tracing::warn!(err = %inner, "sign-in failed against backend");
            }
            auth_failure(&e).into_response()
        }
    }
}

fn issue(s: &BffState, jar: CookieJar, id: &str, credential: &Credential) -> Response {
    let cookie = cookies::session_cookie(&s.config, id, credential, s.sessions.clock().now());
    let view = SessionView::new(credential, SessionPhase::Authenticated);
    (jar.add(cookie), Json(view)).into_response()
}

fn session_gone(s: &BffState, jar: CookieJar, err: &AuthError) -> Response {
    if let Some(id) = cookies::session_id(&s.config, &jar) {
        tracing::debug!(session_id = %short(&id), err = %err, "session unavailable");
    }
    let jar = jar.add(cookies::clear_session_cookie(&s.config));
    (jar, auth_failure(err)).into_response()
}

fn auth_failure(err: &AuthError) -> impl IntoResponse {
    let message = match err {
        AuthError::Backend(_) => "authentication backend unavailable".to_owned(),
        // The detail may name backend URLs; it is logged, not returned.
        AuthError::RefreshFailed(_) => "authentication refresh failed".to_owned(),
        other => other.to_string(),
    };
    ErrorCode::from(err).to_http_response(None, message)
}

fn bad_request(rejection: JsonRejection) -> Response {
    ErrorCode::BadRequest.to_http_response(None, rejection.body_text()).into_response()
}
