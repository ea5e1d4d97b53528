// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic session re-validation from the client side.
//!
//! Reading the session makes the BFF renew a near-expiry access token, so a
//! steady poll keeps an idle tab signed in instead of waiting for a 401.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::client::{AuthenticatedHttpClient, ClientError, RequestConfig};

/// Last known state of the browser's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// No poll has completed yet.
    Unknown,
    Active { principal_id: String, access_expires_at: String },
    SignedOut,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteSession {
    principal_id: String,
    access_expires_at: String,
}

/// Poll `GET /api/auth/session` every `interval` until `shutdown` fires or
/// every receiver is dropped.
///
/// Transport failures keep the previous status; only an authoritative answer
/// from the BFF changes it.
pub fn spawn_session_poller(
    client: Arc<AuthenticatedHttpClient>,
    interval: Duration,
    shutdown: CancellationToken,
) -> watch::Receiver<SessionStatus> {
    let (tx, rx) = watch::channel(SessionStatus::Unknown);

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tx.closed() => break,
                _ = timer.tick() => {}
            }

            let next = match client.json::<RemoteSession>(RequestConfig::get("/api/auth/session")).await {
                Ok(s) => SessionStatus::Active {
                    principal_id: s.principal_id,
                    access_expires_at: s.access_expires_at,
                },
                Err(ClientError::Unauthorized) => SessionStatus::SignedOut,
                Err(e) => {
                    tracing::warn!(err = %e, "session poll failed");
                    continue;
                }
            };
            tx.send_if_modified(|current| {
                if *current == next {
                    false
                } else {
                    *current = next;
                    true
                }
            });
        }
    });

    rx
}
