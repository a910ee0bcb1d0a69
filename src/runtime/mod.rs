//! src/runtime/mod.rs
//!
//! The node runtime: a single-threaded cooperative loop that polls the
//! transport, dispatches each inbound message, then runs whichever
//! periodic tasks (gossip, heartbeat, choking, reputation, publish, audit)
//! are due, in that fixed order. Modeled directly on the original
//! `P2PNode.run()` poll loop rather than the multi-actor `tokio::select!`
//! style used elsewhere in this crate — there is exactly one blocking
//! point (`transport.receive`), and everything else is a wall-clock
//! elapsed-time check.

mod status;

pub use status::StatusSnapshot;

use crate::choking::{ChokeEvent, ChokingNode};
use crate::config::Config;
use crate::domain::{Envelope, MessageKind, NodeId, PeerAddr};
use crate::error::Result;
use crate::gossip::GossipNode;
use crate::heartbeat::HeartbeatNode;
use crate::reputation::ReputationNode;
use crate::transport::Transport;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const RECEIVE_POLL: Duration = Duration::from_millis(500);

#[derive(Debug, Default, Clone, Copy)]
pub struct Stats {
    pub messages_received: u64,
    pub messages_sent: u64,
    pub rounds: u64,
}

/// The node's complete runtime state: the four algorithm subsystems, the
/// endpoint cache that lets the runtime turn a `NodeId` into something the
/// transport can address, and the application-layer publish/audit engine.
pub struct NodeRuntime {
    node_id: NodeId,
    transport: Arc<dyn Transport>,
    config: Config,

    gossip: GossipNode,
    heartbeat: HeartbeatNode,
    choking: ChokingNode,
    reputation: ReputationNode,

    endpoints: HashMap<NodeId, String>,
    awaiting_pong: HashSet<NodeId>,
    ping_seq: u64,
    stats: Stats,

    last_gossip: Instant,
    last_heartbeat: Instant,
    last_choking: Instant,
    last_reputation: Instant,
    last_publish: Instant,
    last_audit: Instant,

    catalog_index: usize,
    local_view_counts: HashMap<String, u64>,
    observed_reports: HashMap<String, HashMap<NodeId, u64>>,
    last_audit_result: Option<(String, u64, f64)>,

    status_tx: Option<watch::Sender<StatusSnapshot>>,
}

impl NodeRuntime {
    /// Fails if `config`'s heartbeat thresholds violate
    /// `miss_threshold > grace_period` (see `HeartbeatNode::new`).
    pub fn new(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let node_id = NodeId::new(config.node_id.clone());
        let now = Instant::now();
        Ok(Self {
            gossip: GossipNode::new(node_id.clone(), transport.own_endpoint()),
            heartbeat: HeartbeatNode::new(node_id.clone(), config.miss_threshold, config.grace_period)?,
            choking: ChokingNode::new(node_id.clone(), config.max_unchoked, config.optimistic_interval),
            reputation: ReputationNode::new(node_id.clone()),
            endpoints: HashMap::new(),
            awaiting_pong: HashSet::new(),
            ping_seq: 0,
            stats: Stats::default(),
            last_gossip: now,
            last_heartbeat: now,
            last_choking: now,
            last_reputation: now,
            last_publish: now,
            last_audit: now,
            catalog_index: 0,
            local_view_counts: HashMap::new(),
            observed_reports: HashMap::new(),
            last_audit_result: None,
            status_tx: None,
            node_id,
            transport,
            config,
        })
    }

    pub fn with_status_channel(mut self, status_tx: watch::Sender<StatusSnapshot>) -> Self {
        self.status_tx = Some(status_tx);
        self
    }

    /// Announce ourselves to every bootstrap peer configured at startup.
    pub async fn bootstrap(&mut self) -> Result<()> {
        let bootstrap_peers = self.config.bootstrap_peers.clone();
        for endpoint in bootstrap_peers {
            let hello = Envelope::hello(self.node_id.clone(), self.transport.own_endpoint());
            self.send_raw(&endpoint, &hello).await;
        }
        Ok(())
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<()> {
        tracing::info!(node_id = %self.node_id, "node runtime starting");
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            self.stats.rounds += 1;

            let received = self.transport.receive(RECEIVE_POLL).await?;
            for msg in received {
                if let Ok(envelope) = Envelope::decode(&msg.body) {
                    self.handle_message(envelope).await;
                } else {
                    tracing::warn!(body = %msg.body, "failed to decode message");
                }
                self.transport.delete(&msg.receipt).await?;
            }

            self.run_periodic_tasks().await;
            self.gossip.age_entries();
            self.publish_status();
        }
        tracing::info!(node_id = %self.node_id, "node runtime stopped");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Message dispatcher
    // ------------------------------------------------------------------

    async fn handle_message(&mut self, msg: Envelope) {
        if msg.sender == self.node_id {
            return; // ignore echoes of our own traffic
        }
        self.stats.messages_received += 1;

        match msg.kind.clone() {
            MessageKind::Hello { endpoint } => self.handle_hello(msg.sender, endpoint).await,
            MessageKind::PeerList { peers } => self.handle_peer_list(msg.sender, peers).await,
            MessageKind::Ping { seq } => self.handle_ping(msg.sender, seq).await,
            MessageKind::Pong { seq } => self.handle_pong(msg.sender, seq),
            MessageKind::ViewEvent {
                content_id, count, ..
            } => self.handle_view_event(msg.sender, content_id, count),
            MessageKind::AuditResult { .. } => self.handle_audit_result(msg.sender),
            MessageKind::Choke => self.handle_choke(msg.sender),
            MessageKind::Unchoke => self.handle_unchoke(msg.sender),
        }
    }

    async fn handle_hello(&mut self, sender: NodeId, endpoint: String) {
        self.register_peer(sender.clone(), endpoint.clone());
        let peer_list = self.gossip.get_peer_list();
        let reply = Envelope::peer_list(self.node_id.clone(), peer_list);
        self.send_raw(&endpoint, &reply).await;
    }

    async fn handle_peer_list(&mut self, sender: NodeId, peers: Vec<PeerAddr>) {
        self.gossip.receive_peer_list(&peers, &sender);
        for peer in peers {
            if peer.node_id != self.node_id {
                self.register_peer(peer.node_id, peer.endpoint);
            }
        }
    }

    async fn handle_ping(&mut self, sender: NodeId, seq: u64) {
        self.choking.record_contribution(&sender, 1);
        self.reputation.record_contribution(&sender, 1);
        if let Some(endpoint) = self.endpoints.get(&sender).cloned() {
            let reply = Envelope::pong(self.node_id.clone(), seq);
            self.send_raw(&endpoint, &reply).await;
        }
    }

    fn handle_pong(&mut self, sender: NodeId, _seq: u64) {
        self.awaiting_pong.remove(&sender);
        self.heartbeat.receive_pong(&sender, self.stats.rounds);
        self.reputation.record_heartbeat(&sender, true);
    }

    fn handle_view_event(&mut self, sender: NodeId, content_id: String, count: u64) {
        self.observed_reports
            .entry(content_id)
            .or_default()
            .insert(sender.clone(), count);
        self.choking.record_contribution(&sender, 1);
        self.reputation.record_contribution(&sender, 1);
    }

    fn handle_audit_result(&mut self, sender: NodeId) {
        self.reputation.record_contribution(&sender, 1);
    }

    fn handle_choke(&mut self, sender: NodeId) {
        tracing::debug!(peer = %sender, "peer choked us");
    }

    fn handle_unchoke(&mut self, sender: NodeId) {
        tracing::debug!(peer = %sender, "peer unchoked us");
    }

    fn register_peer(&mut self, node_id: NodeId, endpoint: String) {
        self.gossip.add_peer(node_id.clone(), endpoint.clone());
        self.heartbeat.add_peer(node_id.clone());
        self.choking.add_peer(node_id.clone(), true);
        self.reputation.add_peer(node_id.clone());
        self.endpoints.insert(node_id, endpoint);
    }

    // ------------------------------------------------------------------
    // Periodic tasks
    // ------------------------------------------------------------------

    async fn run_periodic_tasks(&mut self) {
        let now = Instant::now();

        if now.duration_since(self.last_gossip) >= Duration::from_millis(self.config.gossip_interval_ms) {
            self.do_gossip().await;
            self.last_gossip = now;
        }
        if now.duration_since(self.last_heartbeat) >= Duration::from_millis(self.config.heartbeat_interval_ms) {
            self.do_heartbeat().await;
            self.last_heartbeat = now;
        }
        if now.duration_since(self.last_choking) >= Duration::from_millis(self.config.choking_interval_ms) {
            self.do_choking().await;
            self.last_choking = now;
        }
        if now.duration_since(self.last_reputation) >= Duration::from_millis(self.config.reputation_interval_ms) {
            self.do_reputation();
            self.last_reputation = now;
        }
        if now.duration_since(self.last_publish) >= Duration::from_millis(self.config.publish_interval_ms) {
            self.do_publish().await;
            self.last_publish = now;
        }
        if now.duration_since(self.last_audit) >= Duration::from_millis(self.config.audit_interval_ms) {
            self.do_audit().await;
            self.last_audit = now;
        }
    }

    async fn do_gossip(&mut self) {
        let Some(target) = self.gossip.pick_gossip_target() else {
            return;
        };
        let Some(endpoint) = self.endpoints.get(&target).cloned() else {
            return;
        };
        let peers = self.gossip.get_peer_list();
        let msg = Envelope::peer_list(self.node_id.clone(), peers);
        self.send_raw(&endpoint, &msg).await;
    }

    async fn do_heartbeat(&mut self) {
        for stale in self.awaiting_pong.drain().collect::<Vec<_>>() {
            self.heartbeat.record_miss(&stale, self.stats.rounds);
            self.reputation.record_heartbeat(&stale, false);
        }

        self.ping_seq += 1;
        let targets = self.heartbeat.send_pings(self.stats.rounds);
        for target in targets {
            if let Some(endpoint) = self.endpoints.get(&target).cloned() {
                let msg = Envelope::ping(self.node_id.clone(), self.ping_seq);
                self.send_raw(&endpoint, &msg).await;
                self.awaiting_pong.insert(target);
            }
        }
    }

    async fn do_choking(&mut self) {
        let events = self.choking.run_choking_round();
        for event in events {
            let (node_id, msg) = match event {
                ChokeEvent::Unchoked(id) => (id.clone(), Envelope::unchoke(self.node_id.clone())),
                ChokeEvent::Choked(id) => (id.clone(), Envelope::choke(self.node_id.clone())),
            };
            if let Some(endpoint) = self.endpoints.get(&node_id).cloned() {
                self.send_raw(&endpoint, &msg).await;
            }
        }
        for line in self.choking.flush_log() {
            tracing::debug!(%line, "choking");
        }
    }

    fn do_reputation(&mut self) {
        self.reputation.update_all_scores();
        for line in self.reputation.flush_log() {
            tracing::debug!(%line, "reputation");
        }
    }

    /// Round-robins the content catalog, records our own observation, and
    /// broadcasts a VIEW_EVENT to every currently alive peer.
    async fn do_publish(&mut self) {
        if self.config.content_catalog.is_empty() {
            return;
        }
        let content_id =
            self.config.content_catalog[self.catalog_index % self.config.content_catalog.len()].clone();
        self.catalog_index = self.catalog_index.wrapping_add(1);

        let count = self.local_view_counts.entry(content_id.clone()).or_insert(0);
        *count += 1 + (self.stats.rounds % 7);
        let count = *count;

        self.observed_reports
            .entry(content_id.clone())
            .or_default()
            .insert(self.node_id.clone(), count);

        let event_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        let msg = Envelope::view_event(self.node_id.clone(), event_id, content_id, count, String::new());

        let alive: Vec<NodeId> = self.heartbeat.get_alive_peers();
        for peer in alive {
            if let Some(endpoint) = self.endpoints.get(&peer).cloned() {
                self.send_raw(&endpoint, &msg).await;
            }
        }
    }

    /// For every content_id with at least one observed report, runs the
    /// reputation-weighted vote, feeds accuracy back into reputation,
    /// broadcasts the result, and clears the window.
    async fn do_audit(&mut self) {
        let content_ids: Vec<String> = self.observed_reports.keys().cloned().collect();
        for content_id in content_ids {
            let votes = match self.observed_reports.get(&content_id) {
                Some(v) if !v.is_empty() => v.clone(),
                _ => continue,
            };

            let (agreed_count, confidence) = self.reputation.weighted_majority_vote(&votes);

            let mut voters = Vec::new();
            for (voter, reported) in &votes {
                let accurate = within_five_percent(agreed_count, *reported);
                if *voter != self.node_id {
                    self.reputation.record_report(voter, accurate);
                }
                voters.push(voter.clone());
            }

            self.last_audit_result = Some((content_id.clone(), agreed_count, confidence));

            let msg = Envelope::audit_result(
                self.node_id.clone(),
                content_id.clone(),
                agreed_count,
                confidence,
                voters,
            );
            let alive: Vec<NodeId> = self.heartbeat.get_alive_peers();
            for peer in alive {
                if let Some(endpoint) = self.endpoints.get(&peer).cloned() {
                    self.send_raw(&endpoint, &msg).await;
                }
            }

            self.observed_reports.remove(&content_id);
        }
    }

    async fn send_raw(&mut self, endpoint: &str, msg: &Envelope) {
        match msg.encode() {
            Ok(body) => {
                if let Err(e) = self.transport.send(&endpoint.to_string(), body).await {
                    tracing::warn!(%endpoint, error = %e, "send failed");
                } else {
                    self.stats.messages_sent += 1;
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to encode outgoing message"),
        }
    }

    fn publish_status(&self) {
        if let Some(tx) = &self.status_tx {
            let snapshot = StatusSnapshot::capture(self);
            let _ = tx.send(snapshot);
        }
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn ranked_peers(&self) -> Vec<(NodeId, f64)> {
        self.reputation
            .get_ranked_peers()
            .into_iter()
            .map(|r| (r.node_id.clone(), r.trust_score()))
            .collect()
    }

    pub fn unchoked_peers(&self) -> Vec<NodeId> {
        self.choking.get_unchoked_peers()
    }

    pub fn alive_peer_count(&self) -> usize {
        self.heartbeat.get_alive_peers().len()
    }

    pub fn suspect_peer_count(&self) -> usize {
        self.heartbeat.get_suspect_peers().len()
    }

    pub fn dead_peer_count(&self) -> usize {
        self.heartbeat.get_dead_peers().len()
    }

    pub fn known_peer_count(&self) -> usize {
        self.gossip.known_peer_count()
    }

    pub fn last_audit_result(&self) -> Option<(String, u64, f64)> {
        self.last_audit_result.clone()
    }
}

fn within_five_percent(base: u64, candidate: u64) -> bool {
    if base == 0 {
        return candidate == 0;
    }
    let diff = (candidate as f64 - base as f64).abs();
    diff / (base as f64) <= 0.05
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::Registry;

    fn config(node_id: &str) -> Config {
        Config {
            node_id: node_id.into(),
            gossip_interval_ms: 10,
            heartbeat_interval_ms: 10,
            choking_interval_ms: 10,
            reputation_interval_ms: 10,
            publish_interval_ms: 10,
            audit_interval_ms: 20,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn construction_rejects_invalid_heartbeat_thresholds() {
        let registry = Registry::new();
        let a = registry.join("a".into());
        let bad_config = Config {
            miss_threshold: 2,
            grace_period: 2,
            ..config("a")
        };
        assert!(NodeRuntime::new(bad_config, Arc::new(a)).is_err());
    }

    #[tokio::test]
    async fn hello_registers_peer_and_replies_with_peer_list() {
        let registry = Registry::new();
        let a = registry.join("a".into());
        let b = registry.join("b".into());

        let mut runtime_a = NodeRuntime::new(config("a"), Arc::new(a)).unwrap();
        let hello = Envelope::hello(NodeId::new("b"), "b".into());
        runtime_a.handle_message(hello).await;

        assert_eq!(runtime_a.known_peer_count(), 1);

        let received = b.receive(Duration::from_millis(100)).await.unwrap();
        assert_eq!(received.len(), 1);
        let reply = Envelope::decode(&received[0].body).unwrap();
        assert_eq!(reply.kind.tag(), "PEER_LIST");
    }

    #[tokio::test]
    async fn view_events_feed_the_audit_vote() {
        let registry = Registry::new();
        let a = registry.join("a".into());
        let _b = registry.join("b".into());
        let mut runtime = NodeRuntime::new(config("a"), Arc::new(a)).unwrap();

        runtime.register_peer(NodeId::new("b"), "b".into());
        runtime.handle_view_event(NodeId::new("b"), "show:midnight-run".into(), 100);

        assert_eq!(
            runtime.observed_reports["show:midnight-run"][&NodeId::new("b")],
            100
        );
    }
}
