// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background removal of sessions whose refresh token has expired.

use std::sync::Arc;

use crate::state::BffState;

/// Spawn a single background task that periodically drops expired sessions.
///
/// Lazy expiry on read already covers active browsers; this reclaims sessions
/// that are never read again.
pub fn spawn_session_sweeper(state: Arc<BffState>) {
    let interval = state.config.session_sweep_interval();

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            let removed = state.sessions.sweep_expired().await;
            if removed > 0 {
                let remaining = state.sessions.len().await;
                tracing::info!(removed, remaining, "swept expired sessions");
            }
        }
    });
}
