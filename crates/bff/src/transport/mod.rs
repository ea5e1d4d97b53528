// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the BFF: session endpoints and the reverse proxy.

pub mod auth;
pub mod cookies;
pub mod http;
pub mod proxy;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{any, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::BffState;

/// Build the axum `Router` with all BFF routes.
pub fn build_router(state: Arc<BffState>) -> Router {
    let proxied = Router::new()
        .route("/api/bff/{*path}", any(proxy::bff_proxy))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::session_layer));

    Router::new()
        // Health
        .route("/api/health", get(http::health))
        // Session lifecycle
        .route("/api/auth/login", post(http::login))
        .route("/api/auth/exchange", post(http::exchange))
        .route("/api/auth/session", get(http::session))
        .route("/api/auth/session/refresh", post(http::refresh_session))
        .route("/api/auth/logout", post(http::logout))
        // OAuth passthrough (no credential injection)
        .route("/api/oauth2/{*path}", any(proxy::oauth2_proxy))
        .merge(proxied)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
