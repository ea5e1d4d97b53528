// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;

/// Backend-for-frontend proxy for the shortcut service.
#[derive(Debug, Clone, Parser)]
#[command(name = "shortbff", version, about)]
pub struct BffConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "SHORTBFF_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 3000, env = "SHORTBFF_PORT")]
    pub port: u16,

    /// Base URL of the backend API (scheme + authority, no trailing path).
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "SHORTBFF_BACKEND_URL")]
    pub backend_url: String,

    /// Path prefix under which the backend serves its API.
    #[arg(long, default_value = "/api/v1", env = "SHORTBFF_API_PREFIX")]
    pub api_prefix: String,

    /// Timeout for every outbound backend call, in milliseconds.
    #[arg(long, default_value_t = 10_000, env = "SHORTBFF_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Refresh the access token when it expires within this many seconds.
    #[arg(long, default_value_t = 10, env = "SHORTBFF_REFRESH_MARGIN_SECS")]
    pub refresh_margin_secs: u64,

    /// Name of the session cookie handed to browsers.
    #[arg(long, default_value = "shortbff_session", env = "SHORTBFF_SESSION_COOKIE")]
    pub session_cookie: String,

    /// Mark the session cookie `Secure` (disable only for plain-http development).
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, env = "SHORTBFF_SECURE_COOKIES")]
    pub secure_cookies: bool,

    /// Interval of the expired-session sweeper, in milliseconds.
    #[arg(long, default_value_t = 60_000, env = "SHORTBFF_SESSION_SWEEP_MS")]
    pub session_sweep_ms: u64,

    /// Log format (text or json).
    #[arg(long, default_value = "text", env = "SHORTBFF_LOG_FORMAT")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "SHORTBFF_LOG_LEVEL")]
    pub log_level: String,
}

impl BffConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = reqwest::Url::parse(&self.backend_url)
            .map_err(|e| anyhow::anyhow!("invalid --backend-url {}: {e}", self.backend_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("--backend-url must be http or https, got {}", url.scheme());
        }
        if !self.api_prefix.is_empty() && !self.api_prefix.starts_with('/') {
            anyhow::bail!("--api-prefix must start with '/'");
        }
        if self.session_cookie.is_empty() {
            anyhow::bail!("--session-cookie must not be empty");
        }
        if self.request_timeout_ms == 0 {
            anyhow::bail!("--request-timeout-ms must be greater than zero");
        }
        if self.session_sweep_ms == 0 {
            anyhow::bail!("--session-sweep-ms must be greater than zero");
        }
        if !matches!(self.log_format.as_str(), "text" | "json") {
            anyhow::bail!("--log-format must be text or json");
        }
        Ok(())
    }

    /// Backend base URL with any trailing slash removed.
    pub fn backend_base(&self) -> &str {
        self.backend_url.trim_end_matches('/')
    }

    /// API prefix with any trailing slash removed.
    pub fn api_prefix(&self) -> &str {
        self.api_prefix.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_margin(&self) -> chrono::Duration {
        i64::try_from(self.refresh_margin_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.session_sweep_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
