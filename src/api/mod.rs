//! src/api/mod.rs
//!
//! The status/observability surface: `GET /status` for a single snapshot,
//! `GET /ws` for a streaming feed. Reports node health, not the P2P wire
//! protocol itself — entirely optional, enabled only when `status_addr`
//! is configured.

use crate::runtime::StatusSnapshot;
use axum::{extract::State, routing::get, Json, Router};
use std::net::SocketAddr;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub mod ws;

/// The shared state accessible by all Axum handlers.
#[derive(Clone)]
pub struct ApiState {
    pub status_rx: watch::Receiver<StatusSnapshot>,
}

pub struct ApiServer {
    bind_addr: SocketAddr,
    status_rx: watch::Receiver<StatusSnapshot>,
}

impl ApiServer {
    pub fn new(bind_addr: SocketAddr, status_rx: watch::Receiver<StatusSnapshot>) -> Self {
        Self { bind_addr, status_rx }
    }

    pub async fn run(self, shutdown_token: CancellationToken) -> crate::error::Result<()> {
        let app_state = ApiState { status_rx: self.status_rx };

        let app = Router::new()
            .route("/status", get(status_handler))
            .route("/ws", get(ws::websocket_handler))
            .with_state(app_state);

        tracing::info!(listen_addr = %self.bind_addr, "status API listening");

        let listener = tokio::net::TcpListener::bind(self.bind_addr).await?;

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_token.cancelled().await;
                tracing::info!("status API received shutdown signal.");
            })
            .await?;

        Ok(())
    }
}

async fn status_handler(State(state): State<ApiState>) -> Json<StatusSnapshot> {
    Json(state.status_rx.borrow().clone())
}
