// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token refresh with at most one outbound call per session at a time.

use std::sync::Arc;

use crate::clock::Clock;
use crate::credential::flight::SingleFlight;
use crate::credential::store::TokenStore;
use crate::credential::{AuthError, Credential};
use crate::upstream::client::BackendClient;

/// Refreshes one session's credential through a single-flight slot.
///
/// Concurrent callers that all saw an expiring access token converge on one
/// backend refresh and one resulting credential. The backend invalidates the
/// old pair on rotation, so two racing refreshes would leave one caller with
/// a dead token pair.
pub struct RefreshCoordinator {
    backend: BackendClient,
    clock: Arc<dyn Clock>,
    store: Arc<TokenStore>,
    flight: SingleFlight<Credential, AuthError>,
}

impl RefreshCoordinator {
    pub fn new(backend: BackendClient, clock: Arc<dyn Clock>, store: Arc<TokenStore>) -> Self {
        Self { backend, clock, store, flight: SingleFlight::new() }
    }

    pub fn in_flight(&self) -> bool {
        self.flight.in_flight()
    }

    /// Exchange `current_refresh_token` for a new credential.
    ///
    /// Fails fast without a network call when the token is empty, when the
    /// session holds no credential, or when the refresh token already expired.
    /// If the stored credential was rotated since the caller read it, the
    /// stored one is returned as is. On success the new credential is in the
    /// store before any waiter resumes.
    pub async fn refresh(&self, current_refresh_token: &str) -> Result<Credential, AuthError> {
        if current_refresh_token.is_empty() {
            return Err(AuthError::RefreshFailed("missing refresh token".to_owned()));
        }
        let stored = self.store.get().ok_or(AuthError::SessionExpired)?;
        if stored.refresh_expired(self.clock.now()) {
            return Err(AuthError::RefreshTokenExpired);
        }

        let backend = self.backend.clone();
        let clock = Arc::clone(&self.clock);
        let store = Arc::clone(&self.store);
        let token = current_refresh_token.to_owned();
        self.flight
            .run(move || async move {
                let latest = store.get().ok_or(AuthError::SessionExpired)?;
                if latest.refresh_token != token {
                    return Ok(latest);
                }
                let grant = backend.refresh(&token).await.map_err(|e| {
                    tracing::warn!(err = %e, "token refresh rejected by backend");
                    AuthError::RefreshFailed(e.to_string())
                })?;
                let credential = Credential::from_grant(grant, clock.now());
                if !store.replace_if(&token, credential.clone()) {
                    // Signed out while the refresh was in flight.
                    return Err(AuthError::SessionExpired);
                }
                tracing::debug!(principal = %credential.principal_id, "credential refreshed");
                Ok(credential)
            })
            .await
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
