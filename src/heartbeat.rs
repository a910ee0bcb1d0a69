//! src/heartbeat.rs
//!
//! PING/PONG liveness detection. Every round we ping everyone not already
//! DEAD; a peer that keeps missing slides ALIVE -> SUSPECT -> DEAD, and a
//! single PONG brings it straight back to ALIVE.

use crate::domain::NodeId;
use crate::error::{Error, Result};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerStatus {
    Alive,
    Suspect,
    Dead,
}

#[derive(Clone, Debug)]
pub struct PeerState {
    pub node_id: NodeId,
    pub status: PeerStatus,
    pub consecutive_misses: u32,
    pub last_pong_round: u64,
    pub total_pings_sent: u64,
    pub total_pongs_received: u64,
}

impl PeerState {
    fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            status: PeerStatus::Alive,
            consecutive_misses: 0,
            last_pong_round: 0,
            total_pings_sent: 0,
            total_pongs_received: 0,
        }
    }

    pub fn response_rate(&self) -> f64 {
        if self.total_pings_sent == 0 {
            1.0
        } else {
            self.total_pongs_received as f64 / self.total_pings_sent as f64
        }
    }
}

/// Tracks liveness of every known peer for a single node.
pub struct HeartbeatNode {
    #[allow(dead_code)]
    node_id: NodeId,
    miss_threshold: u32,
    grace_period: u32,
    peers: HashMap<NodeId, PeerState>,
}

impl HeartbeatNode {
    /// Fails fast if `miss_threshold <= grace_period`: with that ordering a
    /// peer could never linger in SUSPECT before going DEAD, which breaks
    /// the escalation the rest of this module assumes.
    pub fn new(node_id: NodeId, miss_threshold: u32, grace_period: u32) -> Result<Self> {
        if miss_threshold <= grace_period {
            return Err(Error::InvalidParameters(format!(
                "miss_threshold ({miss_threshold}) must be greater than grace_period ({grace_period})"
            )));
        }
        Ok(Self {
            node_id,
            miss_threshold,
            grace_period,
            peers: HashMap::new(),
        })
    }

    /// Register a new peer to monitor, starting in ALIVE state. Idempotent.
    pub fn add_peer(&mut self, node_id: NodeId) {
        self.peers
            .entry(node_id.clone())
            .or_insert_with(|| PeerState::new(node_id));
    }

    /// Every ALIVE or SUSPECT peer gets pinged this round; DEAD peers are
    /// skipped. Returns the ids that should receive a PING.
    pub fn send_pings(&mut self, _current_round: u64) -> Vec<NodeId> {
        let mut targets = Vec::new();
        for peer in self.peers.values_mut() {
            if peer.status != PeerStatus::Dead {
                peer.total_pings_sent += 1;
                targets.push(peer.node_id.clone());
            }
        }
        targets
    }

    /// A PONG always resets misses and restores ALIVE, regardless of how
    /// far along the state machine the peer had slid.
    pub fn receive_pong(&mut self, from_node: &NodeId, current_round: u64) {
        if let Some(peer) = self.peers.get_mut(from_node) {
            peer.consecutive_misses = 0;
            peer.status = PeerStatus::Alive;
            peer.last_pong_round = current_round;
            peer.total_pongs_received += 1;
        }
    }

    /// No PONG arrived this round for `peer_id`. `miss_threshold` is tested
    /// before `grace_period`, so a peer can jump straight ALIVE -> DEAD if
    /// thresholds are configured close together.
    pub fn record_miss(&mut self, peer_id: &NodeId, _current_round: u64) {
        if let Some(peer) = self.peers.get_mut(peer_id) {
            peer.consecutive_misses += 1;
            if peer.consecutive_misses >= self.miss_threshold {
                peer.status = PeerStatus::Dead;
            } else if peer.consecutive_misses >= self.grace_period {
                peer.status = PeerStatus::Suspect;
            }
        }
    }

    pub fn get_alive_peers(&self) -> Vec<NodeId> {
        self.peers_with_status(PeerStatus::Alive)
    }

    pub fn get_suspect_peers(&self) -> Vec<NodeId> {
        self.peers_with_status(PeerStatus::Suspect)
    }

    pub fn get_dead_peers(&self) -> Vec<NodeId> {
        self.peers_with_status(PeerStatus::Dead)
    }

    fn peers_with_status(&self, status: PeerStatus) -> Vec<NodeId> {
        self.peers
            .values()
            .filter(|p| p.status == status)
            .map(|p| p.node_id.clone())
            .collect()
    }

    /// Remove DEAD peers from the tracking table entirely.
    pub fn prune_dead(&mut self) {
        self.peers.retain(|_, p| p.status != PeerStatus::Dead);
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}
