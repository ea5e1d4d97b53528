// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server-side browser sessions.

pub mod lifecycle;
pub mod sweeper;

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::Serialize;

use crate::clock::Clock;
use crate::credential::refresh::RefreshCoordinator;
use crate::credential::store::TokenStore;
use crate::credential::Credential;
use crate::upstream::client::BackendClient;

/// One signed-in browser. The browser only ever sees [`Session::id`].
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    tokens: Arc<TokenStore>,
    refresh: RefreshCoordinator,
}

impl Session {
    pub(crate) fn new(
        credential: Credential,
        backend: BackendClient,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let created_at = clock.now();
        let tokens = Arc::new(TokenStore::new(credential));
        let refresh = RefreshCoordinator::new(backend, clock, Arc::clone(&tokens));
        Self { id: new_session_id(), created_at, tokens, refresh }
    }

    pub fn credential(&self) -> Option<Credential> {
        self.tokens.get()
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    pub fn phase(&self, now: DateTime<Utc>) -> SessionPhase {
        match self.tokens.get() {
            None => SessionPhase::Expired,
            Some(c) if c.refresh_expired(now) => SessionPhase::Expired,
            Some(_) if self.refresh.in_flight() => SessionPhase::Refreshing,
            Some(_) => SessionPhase::Authenticated,
        }
    }
}

/// Where a session stands in its lifecycle.
///
/// `Anonymous` and `Authenticating` have no server-side session yet, so only
/// the states a stored session can be in are represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Authenticated,
    Refreshing,
    Expired,
}

/// Browser-facing description of a session. Never carries tokens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub principal_id: String,
    pub access_expires_at: String,
    pub refresh_expires_at: String,
    pub state: SessionPhase,
}

impl SessionView {
    pub fn new(credential: &Credential, state: SessionPhase) -> Self {
        Self {
            principal_id: credential.principal_id.clone(),
            access_expires_at: credential
                .access_expires_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            refresh_expires_at: credential
                .refresh_expires_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            state,
        }
    }
}

/// 256 random bits, base64url without padding (43 chars).
pub fn new_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
