//! tests/component/runtime.rs
//!
//! Single-node component tests: the handshake and liveness behavior of one
//! `NodeRuntime` against an in-memory transport, without a second runtime
//! on the other end.

use crate::common::harness;
use overlay_node::domain::{Envelope, NodeId};
use overlay_node::transport::memory::Registry;
use overlay_node::transport::Transport;
use std::time::Duration;
use test_log::test;

#[test(tokio::test)]
async fn hello_from_unknown_peer_triggers_a_peer_list_reply() {
    let registry = Registry::new();
    let peer = registry.join("peer".into());
    let mut node = harness::spawn_node(&registry, harness::fast_config("hugo", "hugo", vec![])).await;

    let hello = Envelope::hello(NodeId::new("peer"), "peer".into());
    peer.send(&"hugo".to_string(), hello.encode().unwrap()).await.unwrap();

    let received = peer.receive(Duration::from_secs(2)).await.unwrap();
    assert_eq!(received.len(), 1);
    let reply = Envelope::decode(&received[0].body).unwrap();
    assert_eq!(reply.kind.tag(), "PEER_LIST");

    harness::wait_for(&mut node.status_rx, Duration::from_secs(2), |s| s.known_peers == 1)
        .await
        .expect("node should have registered the peer");

    node.shutdown();
}

#[test(tokio::test)]
async fn a_silent_peer_eventually_becomes_dead() {
    let registry = Registry::new();
    let mut config = harness::fast_config("hugo", "hugo", vec![]);
    config.miss_threshold = 2;
    config.grace_period = 1;
    config.heartbeat_interval_ms = 30;

    let mut node = harness::spawn_node(&registry, config).await;
    let ghost = registry.join("ghost".into());

    let hello = Envelope::hello(NodeId::new("ghost"), "ghost".into());
    ghost.send(&"hugo".to_string(), hello.encode().unwrap()).await.unwrap();
    // Drain (and ignore) the PEER_LIST reply, then never answer a PING again.
    let _ = ghost.receive(Duration::from_secs(1)).await.unwrap();

    let status = harness::wait_for(&mut node.status_rx, Duration::from_secs(3), |s| s.dead_peers == 1)
        .await
        .expect("ghost peer should be marked dead after missed pings");
    assert_eq!(status.alive_peers, 0);

    node.shutdown();
}
