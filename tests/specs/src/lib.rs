// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end scenarios.
//!
//! Runs a fake backend and a real BFF listener in-process, both over TCP, and
//! drives them with a cookie-keeping HTTP client like a browser would.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use shortbff::client::AuthenticatedHttpClient;
use shortbff::config::BffConfig;
use shortbff::state::BffState;
use shortbff::test_support::{test_config, FakeBackend, ManualClock, TEST_EMAIL, TEST_PASSWORD};

pub use shortbff::ensure_crypto;

pub const TIMEOUT: Duration = Duration::from_secs(10);

/// A running BFF in front of a [`FakeBackend`], stopped on drop.
pub struct BffHarness {
    pub backend: FakeBackend,
    pub clock: Arc<ManualClock>,
    pub state: Arc<BffState>,
    base_url: String,
    shutdown: CancellationToken,
}

impl BffHarness {
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(|_| {}).await
    }

    /// Start with a config tweak applied on top of the test defaults.
    pub async fn start_with(tweak: impl FnOnce(&mut BffConfig)) -> anyhow::Result<Self> {
        ensure_crypto();
        let backend = FakeBackend::start().await?;
        let mut config = test_config(&backend);
        tweak(&mut config);

        let clock = Arc::new(ManualClock::default());
        let shutdown = CancellationToken::new();
        let state = Arc::new(BffState::with_clock(config, clock.clone(), shutdown.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        tokio::spawn(shortbff::serve_state(listener, Arc::clone(&state)));

        Ok(Self { backend, clock, state, base_url, shutdown })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A browser-like client: keeps cookies, never follows redirects.
    pub fn browser(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(TIMEOUT)
            .build()
            .unwrap_or_default()
    }

    /// The resyncing client pipeline pointed at this BFF.
    pub fn authenticated_client(&self) -> AuthenticatedHttpClient {
        AuthenticatedHttpClient::new(&self.base_url, Some("en-US"), TIMEOUT)
    }

    /// Sign `browser` in with the test account; returns the login response body.
    pub async fn login(&self, browser: &reqwest::Client) -> anyhow::Result<serde_json::Value> {
        let resp = browser
            .post(self.url("/api/auth/login"))
            .json(&serde_json::json!({ "email": TEST_EMAIL, "password": TEST_PASSWORD }))
            .send()
            .await?;
        anyhow::ensure!(resp.status().is_success(), "login failed: {}", resp.status());
        Ok(resp.json().await?)
    }

    pub fn advance(&self, secs: i64) {
        self.clock.advance(chrono::Duration::seconds(secs));
    }
}

impl Drop for BffHarness {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
