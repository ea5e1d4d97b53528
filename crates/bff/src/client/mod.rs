// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser-side HTTP pipeline against the BFF.
//!
//! Credentials travel only as the session cookie. A 401 triggers one session
//! resync through `POST /api/auth/session/refresh` and one replay of the
//! original request; nothing loops.

pub mod poller;

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::credential::flight::SingleFlight;

pub const RESYNC_PATH: &str = "/api/auth/session/refresh";

/// Sign-in endpoints. Their 401 is a verdict on the submitted material, not a
/// stale session, so it is returned with its envelope and never recovered.
pub const SIGN_IN_PATHS: [&str; 2] = ["/api/auth/login", "/api/auth/exchange"];

/// Failure of a request made through [`AuthenticatedHttpClient`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("unauthorized")]
    Unauthorized,
    /// A 401 on a replayed request. Surfaced to callers as `Unauthorized`.
    #[error("request already retried")]
    RequestAlreadyRetried,
    #[error("request failed with status {status}")]
    Status { status: u16, body: String },
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// One outbound call, replayable byte for byte.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub method: Method,
    /// Path on the BFF origin, e.g. `/api/bff/shortcuts`.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Set on the replay so a second 401 is final.
    pub retried: bool,
}

impl RequestConfig {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, ClientError> {
        let body = serde_json::to_vec(value).map_err(|e| ClientError::Transport(e.to_string()))?;
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(body));
        Ok(self)
    }

    fn is_resync(&self) -> bool {
        self.method == Method::POST && self.path == RESYNC_PATH
    }

    fn is_sign_in(&self) -> bool {
        self.method == Method::POST && SIGN_IN_PATHS.contains(&self.path.as_str())
    }
}

/// HTTP client for browser-like callers of the BFF.
///
/// Holds a cookie store, so it keeps the session cookie issued at sign-in and
/// any cookie renewed by a resync.
pub struct AuthenticatedHttpClient {
    base_url: String,
    locale: Option<HeaderValue>,
    http: Client,
    resync: SingleFlight<(), ClientError>,
}

impl AuthenticatedHttpClient {
    pub fn new(base_url: &str, locale: Option<&str>, timeout: Duration) -> Self {
        crate::ensure_crypto();
        let http = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .redirect(Policy::none())
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            locale: locale.and_then(|l| HeaderValue::from_str(l).ok()),
            http,
            resync: SingleFlight::new(),
        }
    }

    /// Send `config`, recovering once from a 401 by resyncing the session.
    ///
    /// Responses below 400 are returned. A 401 on the replay, a failed resync,
    /// or a 401 on the resync call itself yields [`ClientError::Unauthorized`].
    /// A rejected sign-in is not recovered and comes back as
    /// [`ClientError::Status`] carrying the BFF's error envelope.
    pub async fn request(&self, config: RequestConfig) -> Result<Response, ClientError> {
        let first = self.attempt(&config).await;
        match first {
            Err(ClientError::Unauthorized) if !config.retried && !config.is_resync() => {
                if let Err(e) = self.resync_session().await {
                    tracing::debug!(err = %e, path = %config.path, "session resync failed");
                    return Err(ClientError::Unauthorized);
                }
                let replay = RequestConfig { retried: true, ..config };
                self.attempt(&replay).await.map_err(|e| match e {
                    ClientError::RequestAlreadyRetried => ClientError::Unauthorized,
                    other => other,
                })
            }
            Err(ClientError::RequestAlreadyRetried) => Err(ClientError::Unauthorized),
            other => other,
        }
    }

    /// [`Self::request`] and decode the JSON body.
    pub async fn json<T: DeserializeOwned>(&self, config: RequestConfig) -> Result<T, ClientError> {
        let resp = self.request(config).await?;
        Ok(resp.json::<T>().await?)
    }

    /// Ask the BFF to renew the session. Concurrent 401s share one call.
    pub async fn resync_session(&self) -> Result<(), ClientError> {
        let http = self.http.clone();
        let url = format!("{}{RESYNC_PATH}", self.base_url);
        let locale = self.locale.clone();
        self.resync
            .run(move || async move {
                let mut req = http.post(url);
                if let Some(locale) = locale {
                    req = req.header(ACCEPT_LANGUAGE, locale);
                }
                let resp = req.send().await?;
                match resp.status() {
                    s if s.is_success() => Ok(()),
                    StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
                    s => Err(ClientError::Status {
                        status: s.as_u16(),
                        body: resp.text().await.unwrap_or_default(),
                    }),
                }
            })
            .await
    }

    async fn attempt(&self, config: &RequestConfig) -> Result<Response, ClientError> {
        let resp = self.send(config).await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED && !config.is_sign_in() {
            return Err(if config.retried {
                ClientError::RequestAlreadyRetried
            } else {
                ClientError::Unauthorized
            });
        }
        if status.is_client_error() || status.is_server_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status { status: status.as_u16(), body });
        }
        Ok(resp)
    }

    async fn send(&self, config: &RequestConfig) -> Result<Response, ClientError> {
        let mut url = format!("{}{}", self.base_url, config.path);
        if let Some(q) = config.query.as_deref().filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }
        let mut req = self.http.request(config.method.clone(), url).headers(config.headers.clone());
        if let Some(locale) = &self.locale {
            if !config.headers.contains_key(ACCEPT_LANGUAGE) {
                req = req.header(ACCEPT_LANGUAGE, locale.clone());
            }
        }
        if let Some(body) = &config.body {
            req = req.body(body.clone());
        }
        Ok(req.send().await?)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
