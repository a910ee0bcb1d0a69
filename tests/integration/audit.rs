//! tests/integration/audit.rs
//!
//! The publish/audit application loop: two nodes publish VIEW_EVENTs for
//! the content catalog, and each should eventually run a weighted-majority
//! audit and record a result.

use crate::common::harness;
use overlay_node::transport::memory::Registry;
use std::time::Duration;
use test_log::test;

#[test(tokio::test)]
async fn peers_exchange_view_events_and_produce_an_audit_result() {
    let registry = Registry::new();

    let mut node_a = harness::spawn_node(&registry, harness::fast_config("a", "a", vec![])).await;
    let mut node_b = harness::spawn_node(
        &registry,
        harness::fast_config("b", "b", vec!["a".to_string()]),
    )
    .await;

    // Both sides must see each other as ALIVE before VIEW_EVENT broadcasts
    // reach anyone (publish only targets heartbeat.get_alive_peers()).
    harness::wait_for(&mut node_a.status_rx, Duration::from_secs(3), |s| s.alive_peers == 1)
        .await
        .expect("a should consider b alive");
    harness::wait_for(&mut node_b.status_rx, Duration::from_secs(3), |s| s.alive_peers == 1)
        .await
        .expect("b should consider a alive");

    let status = harness::wait_for(&mut node_a.status_rx, Duration::from_secs(5), |s| s.last_audit.is_some())
        .await
        .expect("node a should eventually run an audit");

    let audit = status.last_audit.unwrap();
    assert!(harness::fast_config("a", "a", vec![])
        .content_catalog
        .contains(&audit.content_id));
    assert!(audit.confidence >= 0.0 && audit.confidence <= 1.0);

    node_a.shutdown();
    node_b.shutdown();
}
