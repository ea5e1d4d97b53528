// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::config::BffConfig;
use crate::session::lifecycle::SessionLifecycle;
use crate::upstream::client::BackendClient;

/// Shared BFF state. Holds no credentials itself; those live per session.
pub struct BffState {
    pub config: BffConfig,
    pub backend: BackendClient,
    pub sessions: SessionLifecycle,
    pub shutdown: CancellationToken,
}

impl BffState {
    pub fn new(config: BffConfig, shutdown: CancellationToken) -> Self {
        Self::with_clock(config, Arc::new(SystemClock), shutdown)
    }

    pub fn with_clock(config: BffConfig, clock: Arc<dyn Clock>, shutdown: CancellationToken) -> Self {
        let backend =
            BackendClient::new(config.backend_base(), config.api_prefix(), config.request_timeout());
        let sessions = SessionLifecycle::new(backend.clone(), clock, config.refresh_margin());
        Self { config, backend, sessions, shutdown }
    }
}
