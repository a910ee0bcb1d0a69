//! tests/integration/network.rs
//!
//! Multi-node gossip convergence: peers discovered via HELLO/PEER_LIST
//! should propagate through a chain of nodes without any node learning
//! about a peer it was never told about through gossip.

use crate::common::harness;
use overlay_node::transport::memory::Registry;
use std::time::Duration;
use test_log::test;

#[test(tokio::test)]
async fn two_nodes_learn_about_each_other_via_hello() {
    let registry = Registry::new();

    let mut node_a = harness::spawn_node(&registry, harness::fast_config("a", "a", vec![])).await;
    let mut node_b = harness::spawn_node(
        &registry,
        harness::fast_config("b", "b", vec!["a".to_string()]),
    )
    .await;

    harness::wait_for(&mut node_a.status_rx, Duration::from_secs(3), |s| s.known_peers == 1)
        .await
        .expect("node a should learn about b");
    harness::wait_for(&mut node_b.status_rx, Duration::from_secs(3), |s| s.known_peers == 1)
        .await
        .expect("node b should learn about a");

    node_a.shutdown();
    node_b.shutdown();
}

#[test(tokio::test)]
async fn gossip_propagates_peer_knowledge_through_a_chain() {
    // A <- B <- C: C only bootstraps to B, but gossip should eventually
    // teach it about A too.
    let registry = Registry::new();

    let mut node_a = harness::spawn_node(&registry, harness::fast_config("a", "a", vec![])).await;
    let mut node_b = harness::spawn_node(
        &registry,
        harness::fast_config("b", "b", vec!["a".to_string()]),
    )
    .await;
    let mut node_c = harness::spawn_node(
        &registry,
        harness::fast_config("c", "c", vec!["b".to_string()]),
    )
    .await;

    harness::wait_for(&mut node_c.status_rx, Duration::from_secs(5), |s| s.known_peers == 2)
        .await
        .expect("node c should eventually learn about both a and b");

    node_a.shutdown();
    node_b.shutdown();
    node_c.shutdown();
}
