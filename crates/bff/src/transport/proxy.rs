// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Same-origin reverse proxy to the backend.
//!
//! `/api/bff/*` is forwarded under the API prefix with the session's bearer
//! token attached. `/api/oauth2/*` is forwarded to the backend's `/oauth2/`
//! tree as is. Bodies stream in both directions.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::state::BffState;
use crate::transport::auth::Caller;
use crate::upstream::client::BackendError;

/// Connection-scoped headers never relayed in either direction.
pub const HOP_BY_HOP: [&str; 9] = [
    "host",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Which proxy route a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyRoute {
    Bff,
    OAuth2,
}

impl ProxyRoute {
    fn mount(self) -> &'static str {
        match self {
            Self::Bff => "/api/bff/",
            Self::OAuth2 => "/api/oauth2/",
        }
    }

    fn error_code(self) -> ErrorCode {
        match self {
            Self::Bff => ErrorCode::BffProxy,
            Self::OAuth2 => ErrorCode::OAuth2Proxy,
        }
    }
}

/// `ANY /api/bff/{*path}`
pub async fn bff_proxy(
    State(s): State<Arc<BffState>>,
    Extension(caller): Extension<Caller>,
    req: Request,
) -> Response {
    forward(&s, ProxyRoute::Bff, caller.access_token(), req).await
}

/// `ANY /api/oauth2/{*path}`
pub async fn oauth2_proxy(State(s): State<Arc<BffState>>, req: Request) -> Response {
    forward(&s, ProxyRoute::OAuth2, None, req).await
}

async fn forward(s: &BffState, route: ProxyRoute, bearer: Option<&str>, req: Request) -> Response {
    let Some(path) = forward_path(req.uri().path(), route.mount()) else {
        return ErrorCode::BadRequest
            .to_http_response(None, "invalid proxy path")
            .into_response();
    };
    let backend_path = format!("/{path}");
    let url = match route {
        ProxyRoute::Bff => s.backend.api_url(path),
        ProxyRoute::OAuth2 => s.backend.root_url(&format!("oauth2/{path}")),
    };
    let url = with_query(url, req.uri().query());

    let method = req.method().clone();
    let mut headers = req.headers().clone();
    sanitize_request_headers(&mut headers, &s.config.session_cookie);
    if route == ProxyRoute::Bff {
        headers.remove(header::AUTHORIZATION);
        if let Some(token) = bearer {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(header::AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("access token is not a valid header value"),
            }
        }
    }

    let mut outbound = s.backend.proxy_http().request(method.clone(), url.as_str()).headers(headers);
    if method != Method::GET && method != Method::HEAD {
        outbound = outbound.body(reqwest::Body::wrap_stream(req.into_body().into_data_stream()));
    }

    let request_id = Uuid::new_v4();
    let upstream = match outbound.send().await {
        Ok(resp) => resp,
        Err(e) => {
            let err = BackendError::from(e);
            tracing::warn!(
                %request_id,
                %method,
                path = %backend_path,
                target = %url,
                err = %err,
                "proxy request failed"
            );
            let message = match err {
                BackendError::Timeout => "backend request timed out",
                _ => "backend unavailable",
            };
            return route
                .error_code()
                .to_http_response(Some(backend_path), message)
                .into_response();
        }
    };

    let status = upstream.status();
    tracing::debug!(%request_id, %method, path = %backend_path, status = status.as_u16(), "proxied");
    let mut headers = upstream.headers().clone();
    sanitize_response_headers(&mut headers);

    let mut resp = Body::from_stream(upstream.bytes_stream()).into_response();
    *resp.status_mut() = status;
    *resp.headers_mut() = headers;
    resp
}

/// The raw (still percent-encoded) path after `mount`, or `None` when it is
/// empty or contains a dot segment.
pub fn forward_path<'a>(full: &'a str, mount: &str) -> Option<&'a str> {
    let rest = full.strip_prefix(mount)?;
    if rest.is_empty() || rest.split('/').any(is_dot_segment) {
        return None;
    }
    Some(rest)
}

fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

/// Append the raw query verbatim so repeated keys keep their order and count.
pub fn with_query(url: String, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{url}?{q}"),
        _ => url,
    }
}

/// Headers named in `Connection` are hop-by-hop too (RFC 9110 §7.6.1).
fn connection_listed(headers: &HeaderMap) -> Vec<HeaderName> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect()
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in connection_listed(headers) {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Prepare browser headers for the backend leg.
///
/// The BFF's own session cookie never leaves the BFF; other cookies pass
/// byte for byte, duplicates and encoding included.
pub fn sanitize_request_headers(headers: &mut HeaderMap, session_cookie: &str) {
    strip_hop_by_hop(headers);
    headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));

    let cookies: Vec<HeaderValue> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| without_cookie(v, session_cookie))
        .collect();
    headers.remove(header::COOKIE);
    for value in cookies {
        headers.append(header::COOKIE, value);
    }
}

/// `value` with every `name=...` pair removed, or `None` if nothing is left.
fn without_cookie(value: &HeaderValue, name: &str) -> Option<HeaderValue> {
    let is_named = |pair: &[u8]| {
        let key = pair.split(|b| *b == b'=').next().unwrap_or_default();
        key.trim_ascii() == name.as_bytes()
    };
    let pairs: Vec<&[u8]> = value.as_bytes().split(|b| *b == b';').map(<[u8]>::trim_ascii).collect();
    if !pairs.iter().any(|&p| is_named(p)) {
        return Some(value.clone());
    }
    let kept: Vec<&[u8]> = pairs.into_iter().filter(|&p| !p.is_empty() && !is_named(p)).collect();
    if kept.is_empty() {
        return None;
    }
    HeaderValue::from_bytes(&kept.join(&b"; "[..])).ok()
}

/// Prepare backend headers for the browser leg. The body is re-framed here,
/// so its original length and encoding no longer apply.
pub fn sanitize_response_headers(headers: &mut HeaderMap) {
    strip_hop_by_hop(headers);
    headers.remove(header::CONTENT_ENCODING);
    headers.remove(header::CONTENT_LENGTH);
}

#[cfg(test)]
#[path = "proxy_tests.rs"]
mod tests;
