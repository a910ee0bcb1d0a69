//! src/app.rs
//!
//! Defines the main `App` struct, which encapsulates the application's state
//! and manages the lifecycle of the node runtime and its optional status
//! server.

use crate::{
    api::ApiServer,
    config::Config,
    error::Result,
    runtime::{NodeRuntime, StatusSnapshot},
    transport::{Transport, UdpTransport},
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Encapsulates the entire application, including its configuration and the
/// lifecycle management of the node runtime and status server.
pub struct App {
    config: Config,
    shutdown_token: CancellationToken,
}

impl App {
    /// Creates a new `App` from the given configuration.
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            config,
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Runs the node against a real UDP transport bound to `config.endpoint`.
    pub async fn run(self) -> Result<()> {
        let bind_addr = self.config.endpoint.parse().map_err(|_| {
            crate::error::Error::InvalidParameters(format!(
                "endpoint {:?} is not a valid socket address",
                self.config.endpoint
            ))
        })?;
        let transport = Arc::new(UdpTransport::bind(bind_addr)?);
        self.run_with_transport(transport).await
    }

    /// Runs the node against an arbitrary transport — the real entry point
    /// used by `run()`, and the one exercised directly by tests that wire
    /// up an `InMemoryTransport` instead.
    pub async fn run_with_transport(self, transport: Arc<dyn Transport>) -> Result<()> {
        tracing::info!(
            node_id = %self.config.node_id,
            endpoint = %transport.own_endpoint(),
            "starting node"
        );

        let (status_tx, status_rx) = watch::channel(StatusSnapshot::default());
        let mut runtime = NodeRuntime::new(self.config.clone(), transport)?.with_status_channel(status_tx);
        runtime.bootstrap().await?;

        let runtime_token = self.shutdown_token.clone();
        let runtime_task = tokio::spawn(async move { runtime.run(runtime_token).await });

        let api_task = if let Some(status_addr) = self.config.status_addr {
            tracing::info!(%status_addr, "status API enabled");
            let api_server = ApiServer::new(status_addr, status_rx);
            Some(tokio::spawn(api_server.run(self.shutdown_token.clone())))
        } else {
            None
        };

        let shutdown_token = self.shutdown_token.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.expect("failed to listen for Ctrl+C");
            tracing::info!("Ctrl+C received, initiating graceful shutdown");
            shutdown_token.cancel();
        });

        self.shutdown_token.cancelled().await;

        match runtime_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "node runtime failed"),
            Err(e) => tracing::error!(error = %e, "node runtime task panicked"),
        }
        if let Some(task) = api_task {
            if let Err(e) = task.await {
                tracing::error!(error = ?e, "status API task failed");
            }
        }
        tracing::info!("node has shut down gracefully");

        Ok(())
    }
}
