// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the shortcut backend API.

use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::credential::{Grant, TokenGrant};

/// Failure talking to the backend, tagged by what went wrong.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("backend request timed out")]
    Timeout,
    #[error("backend unreachable: {0}")]
    Network(String),
    #[error("backend rejected credentials")]
    Unauthorized(Option<ApiErrorBody>),
    #[error("backend returned {status}")]
    Api { status: u16, body: Option<ApiErrorBody> },
    #[error("undecodable backend response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Structured error body the backend sends with 4xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Client for one backend deployment. Cheap to clone.
#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    api_prefix: String,
    /// Auth calls: the whole exchange is bounded by the request timeout.
    client: Client,
    /// Proxied calls: connect and each read are bounded, the total is not, so
    /// a long transfer that keeps making progress is never cut mid-body.
    proxy: Client,
}

impl BackendClient {
    pub fn new(base_url: &str, api_prefix: &str, timeout: Duration) -> Self {
        crate::ensure_crypto();
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .unwrap_or_default();
        let proxy = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .redirect(Policy::none())
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_prefix: api_prefix.trim_end_matches('/').to_owned(),
            client,
            proxy,
        }
    }

    /// The reqwest client for relayed traffic (no redirect following, idle
    /// timeout rather than a total deadline).
    pub fn proxy_http(&self) -> &Client {
        &self.proxy
    }

    /// Backend URL for a path under the API prefix. `path` has no leading slash.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}/{}", self.base_url, self.api_prefix, path)
    }

    /// Backend URL for a path outside the API prefix. `path` has no leading slash.
    pub fn root_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Exchange sign-in material for a token grant.
    pub async fn login(&self, grant: &Grant) -> Result<TokenGrant, BackendError> {
        let req = match grant {
            Grant::Password { .. } => self.client.post(self.api_url("auth/token")),
            Grant::External { .. } => self.client.post(self.api_url("auth/oauth2/token")),
        };
        let resp = req.json(grant).send().await?;
        decode_grant(resp).await
    }

    /// Exchange a refresh token for a fresh grant. Single attempt, no retries.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, BackendError> {
        let resp = self
            .client
            .post(self.api_url("auth/refresh"))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;
        decode_grant(resp).await
    }
}

async fn decode_grant(resp: reqwest::Response) -> Result<TokenGrant, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json::<TokenGrant>().await?);
    }
    let body = resp.json::<ApiErrorBody>().await.ok();
    if status == StatusCode::UNAUTHORIZED {
        return Err(BackendError::Unauthorized(body));
    }
    Err(BackendError::Api { status: status.as_u16(), body })
}
