// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session issuance, lazy renewal, and termination.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::credential::{AuthError, Credential, Grant};
use crate::session::{Session, SessionPhase, SessionView};
use crate::upstream::client::BackendClient;

/// Owns every live session and drives its state transitions.
///
/// A session is either live in the map (authenticated or refreshing) or gone.
/// Terminal refresh outcomes remove it; nothing retries on its behalf.
pub struct SessionLifecycle {
    backend: BackendClient,
    clock: Arc<dyn Clock>,
    margin: Duration,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionLifecycle {
    pub fn new(backend: BackendClient, clock: Arc<dyn Clock>, margin: Duration) -> Self {
        Self { backend, clock, margin, sessions: RwLock::new(HashMap::new()) }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Submit sign-in material to the backend and open a session on success.
    pub async fn sign_in(&self, grant: &Grant) -> Result<(Arc<Session>, Credential), AuthError> {
        let token_grant = self.backend.login(grant).await.map_err(AuthError::from_login)?;
        let credential = Credential::from_grant(token_grant, self.clock.now());
        let session =
            Arc::new(Session::new(credential.clone(), self.backend.clone(), Arc::clone(&self.clock)));
        self.sessions.write().await.insert(session.id.clone(), Arc::clone(&session));
        tracing::info!(
            session_id = %short(&session.id),
            principal = %credential.principal_id,
            "session opened"
        );
        Ok((session, credential))
    }

    /// Current credential for `id`, renewed first when the access token is
    /// within the refresh margin.
    ///
    /// Any terminal failure destroys the session before returning.
    pub async fn resolve(&self, id: &str) -> Result<Credential, AuthError> {
        self.renew(id, false).await
    }

    /// Renew the credential for `id` regardless of the access token's expiry.
    pub async fn force_refresh(&self, id: &str) -> Result<Credential, AuthError> {
        self.renew(id, true).await
    }

    /// Resolve and describe the session for the browser.
    pub async fn view(&self, id: &str) -> Result<SessionView, AuthError> {
        let credential = self.resolve(id).await?;
        let phase = match self.get(id).await {
            Some(session) => session.phase(self.clock.now()),
            None => SessionPhase::Expired,
        };
        Ok(SessionView::new(&credential, phase))
    }

    async fn renew(&self, id: &str, force: bool) -> Result<Credential, AuthError> {
        let session = self.get(id).await.ok_or(AuthError::SessionExpired)?;
        let Some(credential) = session.credential() else {
            self.expire(id, &AuthError::SessionExpired).await;
            return Err(AuthError::SessionExpired);
        };

        let now = self.clock.now();
        if credential.refresh_expired(now) {
            let err = AuthError::RefreshTokenExpired;
            self.expire(id, &err).await;
            return Err(err);
        }
        if !force && !credential.access_expiring(now, self.margin) {
            return Ok(credential);
        }

        match session.refresher().refresh(&credential.refresh_token).await {
            Ok(renewed) => Ok(renewed),
            Err(e) => {
                if e.is_terminal() {
                    self.expire(id, &e).await;
                }
                Err(e)
            }
        }
    }

    /// Explicit sign-out. Returns whether a session existed.
    pub async fn sign_out(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(session) => {
                session.tokens().clear();
                tracing::info!(session_id = %short(id), "session signed out");
                true
            }
            None => false,
        }
    }

    async fn expire(&self, id: &str, reason: &AuthError) {
        if let Some(session) = self.sessions.write().await.remove(id) {
            session.tokens().clear();
            tracing::warn!(session_id = %short(id), reason = %reason, "session expired");
        }
    }

    /// Remove every session whose refresh token has expired. Returns how many.
    pub async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            let keep = session.phase(now) != SessionPhase::Expired;
            if !keep {
                session.tokens().clear();
            }
            keep
        });
        before - sessions.len()
    }
}

/// Enough of a session id to correlate log lines without logging the secret.
pub(crate) fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
