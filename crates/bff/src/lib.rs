// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shortbff: session-aware backend-for-frontend proxy for the shortcut API.

pub mod client;
pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod session;
pub mod state;
pub mod test_support;
pub mod transport;
pub mod upstream;

use std::sync::{Arc, Once};

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::BffConfig;
use crate::session::sweeper::spawn_session_sweeper;
use crate::state::BffState;
use crate::transport::build_router;

/// Install the rustls ring provider once per process, before any reqwest
/// client is built.
pub fn ensure_crypto() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Run the BFF until Ctrl-C.
pub async fn run(config: BffConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
            }
            shutdown.cancel();
        });
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(backend = %config.backend_base(), "shortbff listening on {addr}");
    serve(listener, config, shutdown).await
}

/// Serve on an already-bound listener until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    config: BffConfig,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let state = Arc::new(BffState::new(config, shutdown.clone()));
    serve_state(listener, state).await
}

/// Serve prebuilt state, e.g. one carrying a manual clock.
pub async fn serve_state(listener: TcpListener, state: Arc<BffState>) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    spawn_session_sweeper(Arc::clone(&state));
    let router = build_router(state);
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;
    Ok(())
}
