//! src/gossip.rs
//!
//! Peer-list gossip: each node maintains a table of known peers, ages it
//! down every round, and periodically shares it with a random target so
//! the network converges on a common view without a central directory.

use crate::domain::{Endpoint, NodeId, PeerAddr};
use rand::seq::IteratorRandom;
use std::collections::HashMap;

const DEFAULT_TTL: u32 = 5;

/// A single known peer in the gossip table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerEntry {
    pub node_id: NodeId,
    pub endpoint: Endpoint,
    pub ttl: u32,
}

impl PeerEntry {
    pub fn is_expired(&self) -> bool {
        self.ttl == 0
    }
}

/// Gossip-based peer discovery for a single node.
pub struct GossipNode {
    node_id: NodeId,
    endpoint: Endpoint,
    peers: HashMap<NodeId, PeerEntry>,
}

impl GossipNode {
    pub fn new(node_id: NodeId, endpoint: Endpoint) -> Self {
        Self {
            node_id,
            endpoint,
            peers: HashMap::new(),
        }
    }

    /// Manually add or refresh a peer. Called on HELLO or PEER_LIST receipt.
    /// Never registers ourselves.
    pub fn add_peer(&mut self, node_id: NodeId, endpoint: Endpoint) {
        if node_id == self.node_id {
            return;
        }
        self.peers
            .entry(node_id.clone())
            .and_modify(|e| {
                e.endpoint = endpoint.clone();
                e.ttl = DEFAULT_TTL;
            })
            .or_insert(PeerEntry {
                node_id,
                endpoint,
                ttl: DEFAULT_TTL,
            });
    }

    /// Build a `PEER_LIST` payload listing every known non-expired peer,
    /// plus ourselves so the recipient learns our endpoint.
    pub fn get_peer_list(&self) -> Vec<PeerAddr> {
        let mut out: Vec<PeerAddr> = self
            .peers
            .values()
            .filter(|e| !e.is_expired())
            .map(|e| PeerAddr {
                node_id: e.node_id.clone(),
                endpoint: e.endpoint.clone(),
            })
            .collect();
        out.push(PeerAddr {
            node_id: self.node_id.clone(),
            endpoint: self.endpoint.clone(),
        });
        out
    }

    /// Merge an incoming peer list into our own table. New peers start at
    /// full TTL; already-known peers get their TTL refreshed. Returns the
    /// number of genuinely new peers discovered.
    pub fn receive_peer_list(&mut self, incoming: &[PeerAddr], _sender_id: &NodeId) -> usize {
        let mut discovered = 0;
        for entry in incoming {
            if entry.node_id == self.node_id {
                continue;
            }
            if self.peers.contains_key(&entry.node_id) {
                self.add_peer(entry.node_id.clone(), entry.endpoint.clone());
            } else {
                self.add_peer(entry.node_id.clone(), entry.endpoint.clone());
                discovered += 1;
            }
        }
        discovered
    }

    /// Decrement TTL on every entry and drop whichever hit zero. Called once
    /// per poll round.
    pub fn age_entries(&mut self) {
        for entry in self.peers.values_mut() {
            entry.ttl = entry.ttl.saturating_sub(1);
        }
        self.peers.retain(|_, e| !e.is_expired());
    }

    /// Pick a random known peer to gossip to. `None` if the table is empty.
    pub fn pick_gossip_target(&self) -> Option<NodeId> {
        self.peers.keys().choose(&mut rand::thread_rng()).cloned()
    }

    pub fn known_peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn endpoint_of(&self, node_id: &NodeId) -> Option<&Endpoint> {
        self.peers.get(node_id).map(|e| &e.endpoint)
    }

    pub fn peer_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.peers.keys()
    }
}
