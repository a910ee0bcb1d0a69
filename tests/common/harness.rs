//! tests/common/harness.rs
//!
//! A small test harness for spinning up in-memory node runtimes sharing a
//! single `Registry`, so integration tests exercise the real dispatcher and
//! periodic tasks without touching a socket.

use overlay_node::config::Config;
use overlay_node::runtime::{NodeRuntime, StatusSnapshot};
use overlay_node::transport::memory::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// A handle to a running node's background task.
pub struct TestNode {
    pub config: Config,
    pub status_rx: watch::Receiver<StatusSnapshot>,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl TestNode {
    /// Stops the node's background loop. Does not wait for the task.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// A config tuned for tests: short enough intervals that periodic tasks
/// fire within a couple of seconds, but still distinct from each other so
/// ordering bugs would show up as flaky tests.
pub fn fast_config(node_id: &str, endpoint: &str, bootstrap_peers: Vec<String>) -> Config {
    Config {
        node_id: node_id.into(),
        endpoint: endpoint.into(),
        bootstrap_peers,
        gossip_interval_ms: 40,
        heartbeat_interval_ms: 40,
        choking_interval_ms: 120,
        reputation_interval_ms: 120,
        publish_interval_ms: 60,
        audit_interval_ms: 200,
        ..Config::default()
    }
}

pub async fn spawn_node(registry: &Registry, config: Config) -> TestNode {
    let transport = registry.join(config.endpoint.clone());
    let (status_tx, status_rx) = watch::channel(StatusSnapshot::default());
    let mut runtime = NodeRuntime::new(config.clone(), Arc::new(transport))
        .expect("test config should satisfy heartbeat invariants")
        .with_status_channel(status_tx);
    runtime.bootstrap().await.expect("bootstrap should not fail against an in-memory transport");

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let task = tokio::spawn(async move {
        let _ = runtime.run(token).await;
    });

    TestNode {
        config,
        status_rx,
        shutdown,
        task,
    }
}

/// Polls `status_rx` until `predicate` holds or `timeout` elapses.
pub async fn wait_for<F>(
    status_rx: &mut watch::Receiver<StatusSnapshot>,
    timeout: Duration,
    predicate: F,
) -> Option<StatusSnapshot>
where
    F: Fn(&StatusSnapshot) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            if predicate(&status_rx.borrow()) {
                return status_rx.borrow().clone();
            }
            if status_rx.changed().await.is_err() {
                return status_rx.borrow().clone();
            }
        }
    })
    .await
    .ok()
}
