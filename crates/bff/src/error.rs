// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::credential::AuthError;

/// Error codes emitted by the BFF in its JSON error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    BffProxy,
    OAuth2Proxy,
    BadRequest,
    InvalidCredentials,
    AccountDisabled,
    SessionExpired,
    Unauthenticated,
    AuthBackend,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BffProxy => 500,
            Self::OAuth2Proxy => 500,
            Self::BadRequest => 400,
            Self::InvalidCredentials => 401,
            Self::AccountDisabled => 403,
            Self::SessionExpired => 401,
            Self::Unauthenticated => 401,
            Self::AuthBackend => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BffProxy => "BFF_PROXY_ERROR",
            Self::OAuth2Proxy => "OAUTH2_PROXY_ERROR",
            Self::BadRequest => "BAD_REQUEST",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountDisabled => "ACCOUNT_DISABLED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::AuthBackend => "AUTH_BACKEND_ERROR",
        }
    }

    pub fn to_error_body(
        &self,
        path: Option<String>,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> ErrorBody {
        ErrorBody {
            code: self.as_str().to_owned(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            path,
            message: message.into(),
        }
    }

    /// Build the `(status, envelope)` pair stamped with the current wall clock.
    pub fn to_http_response(
        &self,
        path: Option<String>,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorBody>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_error_body(path, message, Utc::now())))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&AuthError> for ErrorCode {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::AccountDisabled => Self::AccountDisabled,
            AuthError::RefreshTokenExpired
            | AuthError::RefreshFailed(_)
            | AuthError::SessionExpired => Self::SessionExpired,
            AuthError::Backend(_) => Self::AuthBackend,
        }
    }
}

/// Error envelope returned to the browser.
///
/// `path` carries the attempted backend path for proxy failures and is `null`
/// elsewhere. Never carries internal URLs or error chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub timestamp: String,
    pub path: Option<String>,
    pub message: String,
}
