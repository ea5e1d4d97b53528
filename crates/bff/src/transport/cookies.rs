// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session cookie helpers. The cookie value is the opaque session id only.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use time::Duration;

use crate::config::BffConfig;
use crate::credential::Credential;

/// Session cookie living until the credential's refresh token expires.
pub fn session_cookie(
    config: &BffConfig,
    session_id: &str,
    credential: &Credential,
    now: DateTime<Utc>,
) -> Cookie<'static> {
    let remaining = (credential.refresh_expires_at - now).num_seconds().max(0);
    Cookie::build((config.session_cookie.clone(), session_id.to_owned()))
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(remaining))
        .build()
}

/// Removal cookie for the session.
pub fn clear_session_cookie(config: &BffConfig) -> Cookie<'static> {
    Cookie::build((config.session_cookie.clone(), ""))
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}

/// The session id presented by the browser, if any.
pub fn session_id(config: &BffConfig, jar: &CookieJar) -> Option<String> {
    jar.get(&config.session_cookie)
        .map(|c| c.value().to_owned())
        .filter(|v| !v.is_empty())
}
