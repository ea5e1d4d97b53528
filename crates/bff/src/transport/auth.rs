// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;

use crate::credential::Credential;
use crate::session::lifecycle::short;
use crate::state::BffState;
use crate::transport::cookies;

/// Who is behind a proxied request, resolved from the session cookie.
#[derive(Debug, Clone)]
pub enum Caller {
    /// No session cookie was presented.
    Anonymous,
    /// A live session with a usable access token.
    Authenticated { session_id: String, credential: Credential },
    /// The cookie named a session that is gone or could not be renewed.
    Expired,
}

impl Caller {
    pub fn access_token(&self) -> Option<&str> {
        match self {
            Self::Authenticated { credential, .. } => Some(&credential.access_token),
            Self::Anonymous | Self::Expired => None,
        }
    }
}

/// Axum middleware that resolves the caller's session before proxying.
///
/// Renewal happens here, so the handler only ever sees a fresh access token
/// or none. When the session turned out to be expired the response also
/// clears the browser's cookie.
pub async fn session_layer(
    State(s): State<Arc<BffState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    let caller = match cookies::session_id(&s.config, &jar) {
        None => Caller::Anonymous,
        Some(id) => match s.sessions.resolve(&id).await {
            Ok(credential) => Caller::Authenticated { session_id: id, credential },
            Err(e) => {
                tracing::debug!(session_id = %short(&id), err = %e, "proxying without session");
                Caller::Expired
            }
        },
    };

    let expired = matches!(caller, Caller::Expired);
    req.extensions_mut().insert(caller);
    let resp = next.run(req).await;
    if expired {
        (jar.add(cookies::clear_session_cookie(&s.config)), resp).into_response()
    } else {
        resp
    }
}
