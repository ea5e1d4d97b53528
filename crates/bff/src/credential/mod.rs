// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credentials: token pairs, their per-session store, and single-flight refresh.
//!
//! A [`Credential`] is replaced wholesale on every refresh. The backend
//! invalidates the previous pair as soon as a new one is minted, so every
//! refresh for a session goes through that session's
//! [`refresh::RefreshCoordinator`].

pub mod flight;
pub mod refresh;
pub mod store;

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::upstream::client::BackendError;

/// An access/refresh token pair bound to one principal.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub principal_id: String,
}

impl Credential {
    /// Build a credential from a backend grant issued at `now`.
    ///
    /// The access expiry is clamped so it never outlives the refresh token.
    pub fn from_grant(grant: TokenGrant, now: DateTime<Utc>) -> Self {
        let refresh_expires_at = expires_at(now, grant.refresh_expires_in);
        let access_expires_at = expires_at(now, grant.access_expires_in).min(refresh_expires_at);
        Self {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            access_expires_at,
            refresh_expires_at,
            principal_id: grant.principal.into_id(),
        }
    }

    /// True when the access token is expired or expires within `margin`.
    pub fn access_expiring(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.access_expires_at.checked_sub_signed(margin).unwrap_or(DateTime::<Utc>::MIN_UTC) <= now
    }

    pub fn refresh_expired(&self, now: DateTime<Utc>) -> bool {
        self.refresh_expires_at <= now
    }
}

// Tokens stay out of logs and panic messages.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("principal_id", &self.principal_id)
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish_non_exhaustive()
    }
}

fn expires_at(now: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Token response shared by the backend's login, exchange, and refresh endpoints.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub principal: PrincipalRef,
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires.
    pub access_expires_in: u64,
    /// Seconds until the refresh token expires.
    pub refresh_expires_in: u64,
}

/// The backend reports the principal either as a bare id or as a user object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrincipalRef {
    Id(String),
    Object { id: String },
}

impl PrincipalRef {
    pub fn into_id(self) -> String {
        match self {
            Self::Id(id) | Self::Object { id } => id,
        }
    }
}

/// Sign-in material submitted by the browser.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Grant {
    /// Email + password against `POST /auth/token`.
    Password { email: String, password: String },
    /// External identity provider authorization code against `POST /auth/oauth2/token`.
    External { provider: String, code: String },
}

/// Authentication failures. `Clone` so one refresh outcome fans out to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account disabled")]
    AccountDisabled,
    #[error("refresh token expired")]
    RefreshTokenExpired,
    #[error("authentication refresh failed: {0}")]
    RefreshFailed(String),
    #[error("session expired")]
    SessionExpired,
    #[error(transparent)]
    Backend(BackendError),
}

impl AuthError {
    /// Map a failed login/exchange call onto the user-facing taxonomy.
    pub fn from_login(err: BackendError) -> Self {
        match &err {
            BackendError::Unauthorized(Some(body)) => match body.error.as_str() {
                "AccountDisabledError" => Self::AccountDisabled,
                _ => Self::InvalidCredentials,
            },
            BackendError::Unauthorized(None) => Self::InvalidCredentials,
            _ => Self::Backend(err),
        }
    }

    /// True when the session cannot be recovered and must be signed out.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RefreshTokenExpired | Self::RefreshFailed(_) | Self::SessionExpired)
    }
}
