//! src/choking.rs
//!
//! BitTorrent-style tit-for-tat choking: serve the peers who contribute the
//! most back to us, and choke everyone else. A rotating optimistic slot
//! gives new or silent peers a periodic chance to prove themselves.

use crate::domain::NodeId;
use rand::seq::IteratorRandom;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct PeerTracker {
    pub node_id: NodeId,
    pub contributed: u64,
    pub received: u64,
    pub is_choked: bool,
    pub is_interested: bool,
    pub rounds_choked: u32,
}

impl PeerTracker {
    fn new(node_id: NodeId, is_interested: bool) -> Self {
        Self {
            node_id,
            contributed: 0,
            received: 0,
            is_choked: true,
            is_interested,
            rounds_choked: 0,
        }
    }

    /// How much a peer gives relative to what it takes. Higher is better.
    /// A peer that has taken nothing from us yet is scored purely on what
    /// it has contributed.
    pub fn reciprocity_ratio(&self) -> f64 {
        if self.received == 0 {
            self.contributed as f64
        } else {
            self.contributed as f64 / self.received as f64
        }
    }
}

/// A state transition worth telling peers (and the log) about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChokeEvent {
    Unchoked(NodeId),
    Choked(NodeId),
}

pub struct ChokingNode {
    #[allow(dead_code)]
    node_id: NodeId,
    max_unchoked: usize,
    optimistic_interval: u32,
    peers: HashMap<NodeId, PeerTracker>,
    round: u32,
    optimistic_peer: Option<NodeId>,
    log: Vec<String>,
}

impl ChokingNode {
    pub fn new(node_id: NodeId, max_unchoked: usize, optimistic_interval: u32) -> Self {
        Self {
            node_id,
            max_unchoked,
            optimistic_interval,
            peers: HashMap::new(),
            round: 0,
            optimistic_peer: None,
            log: Vec::new(),
        }
    }

    /// Register a new peer. New peers start choked. Idempotent.
    pub fn add_peer(&mut self, node_id: NodeId, is_interested: bool) {
        self.peers
            .entry(node_id.clone())
            .or_insert_with(|| PeerTracker::new(node_id, is_interested));
    }

    pub fn record_contribution(&mut self, from_peer: &NodeId, units: u64) {
        if let Some(p) = self.peers.get_mut(from_peer) {
            p.contributed += units;
        }
    }

    pub fn record_serving(&mut self, to_peer: &NodeId, units: u64) {
        if let Some(p) = self.peers.get_mut(to_peer) {
            p.received += units;
        }
    }

    /// Recalculate choke/unchoke decisions for this round.
    ///
    /// The rotating optimistic unchoke is refreshed every
    /// `optimistic_interval` rounds. A slot is reserved for it only on
    /// rounds where one is actually (re)chosen; otherwise merit fills every
    /// slot, so `max_unchoked == 1` still goes to the top contributor
    /// instead of being handed to whichever peer the optimistic pick
    /// happens to land on.
    pub fn run_choking_round(&mut self) -> Vec<ChokeEvent> {
        self.round += 1;

        let mut interested: Vec<NodeId> = self
            .peers
            .values()
            .filter(|p| p.is_interested)
            .map(|p| p.node_id.clone())
            .collect();
        interested.sort_by(|a, b| {
            let ra = self.peers[a].reciprocity_ratio();
            let rb = self.peers[b].reciprocity_ratio();
            rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
        });

        if self.round % self.optimistic_interval == 0 {
            let reserved = self.max_unchoked.saturating_sub(1);
            let tentative_winners: Vec<NodeId> = interested.iter().take(reserved).cloned().collect();
            let candidates: Vec<NodeId> = interested
                .iter()
                .filter(|id| !tentative_winners.contains(id))
                .cloned()
                .collect();
            self.optimistic_peer = candidates.into_iter().choose(&mut rand::thread_rng());
        }

        let merit_slots = if self.optimistic_peer.is_some() {
            self.max_unchoked.saturating_sub(1)
        } else {
            self.max_unchoked
        };
        let merit_winners: Vec<NodeId> = interested.iter().take(merit_slots).cloned().collect();

        let mut unchoked: Vec<NodeId> = merit_winners;
        if let Some(optimistic) = &self.optimistic_peer {
            if !unchoked.contains(optimistic) && interested.contains(optimistic) {
                unchoked.push(optimistic.clone());
            }
        }
        unchoked.truncate(self.max_unchoked);

        let mut events = Vec::new();
        for (node_id, peer) in self.peers.iter_mut() {
            let should_unchoke = peer.is_interested && unchoked.contains(node_id);
            if should_unchoke && peer.is_choked {
                peer.is_choked = false;
                peer.rounds_choked = 0;
                events.push(ChokeEvent::Unchoked(node_id.clone()));
            } else if !should_unchoke && !peer.is_choked {
                peer.is_choked = true;
                events.push(ChokeEvent::Choked(node_id.clone()));
            } else if peer.is_choked {
                peer.rounds_choked += 1;
            }
        }

        for event in &events {
            match event {
                ChokeEvent::Unchoked(id) => self.log.push(format!("unchoked {id}")),
                ChokeEvent::Choked(id) => self.log.push(format!("choked {id}")),
            }
        }

        events
    }

    pub fn get_unchoked_peers(&self) -> Vec<NodeId> {
        self.peers
            .values()
            .filter(|p| !p.is_choked)
            .map(|p| p.node_id.clone())
            .collect()
    }

    pub fn get_choked_peers(&self) -> Vec<NodeId> {
        self.peers
            .values()
            .filter(|p| p.is_choked)
            .map(|p| p.node_id.clone())
            .collect()
    }

    pub fn flush_log(&mut self) -> Vec<String> {
        std::mem::take(&mut self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(max_unchoked: usize, optimistic_interval: u32) -> ChokingNode {
        ChokingNode::new(NodeId::new("hugo"), max_unchoked, optimistic_interval)
    }

    #[test]
    fn new_peers_start_choked() {
        let mut n = node(4, 3);
        n.add_peer(NodeId::new("sam"), true);
        assert!(n.get_choked_peers().contains(&NodeId::new("sam")));
    }

    #[test]
    fn top_contributors_get_merit_unchoke() {
        let mut n = node(3, 100);
        for name in ["a", "b", "c", "d"] {
            n.add_peer(NodeId::new(name), true);
        }
        n.record_contribution(&NodeId::new("a"), 100);
        n.record_contribution(&NodeId::new("b"), 50);
        n.record_contribution(&NodeId::new("c"), 10);
        n.record_contribution(&NodeId::new("d"), 0);

        n.run_choking_round();
        let unchoked = n.get_unchoked_peers();
        assert!(unchoked.contains(&NodeId::new("a")));
        assert!(unchoked.contains(&NodeId::new("b")));
    }

    #[test]
    fn uninterested_peers_never_unchoked() {
        let mut n = node(4, 100);
        n.add_peer(NodeId::new("sam"), false);
        n.record_contribution(&NodeId::new("sam"), 1000);
        n.run_choking_round();
        assert!(n.get_choked_peers().contains(&NodeId::new("sam")));
    }

    #[test]
    fn sole_contributor_wins_the_only_slot_even_with_a_rival_present() {
        // max_unchoked=1 must not let a free rider win the single slot just
        // because the optimistic interval hasn't come due yet.
        let mut n = node(1, 999);
        n.add_peer(NodeId::new("node-b"), true);
        n.add_peer(NodeId::new("node-c"), true);
        n.record_contribution(&NodeId::new("node-b"), 50);
        n.record_contribution(&NodeId::new("node-c"), 0);

        n.run_choking_round();
        let unchoked = n.get_unchoked_peers();
        assert!(unchoked.contains(&NodeId::new("node-b")));
        assert!(!unchoked.contains(&NodeId::new("node-c")));
    }

    #[test]
    fn optimistic_unchoke_occurs_with_short_interval() {
        let mut n = node(1, 1);
        for name in ["a", "b", "c"] {
            n.add_peer(NodeId::new(name), true);
        }
        n.run_choking_round();
        assert!(!n.get_unchoked_peers().is_empty());
    }

    #[test]
    fn unchoked_count_never_exceeds_max_unchoked() {
        let mut n = node(2, 1);
        for name in ["a", "b", "c", "d", "e"] {
            n.add_peer(NodeId::new(name), true);
        }
        for _ in 0..5 {
            n.run_choking_round();
            assert!(n.get_unchoked_peers().len() <= 2);
        }
    }

    #[test]
    fn flush_log_drains_and_clears() {
        let mut n = node(4, 100);
        n.add_peer(NodeId::new("sam"), true);
        n.record_contribution(&NodeId::new("sam"), 10);
        n.run_choking_round();
        let log = n.flush_log();
        assert!(!log.is_empty());
        assert!(n.flush_log().is_empty());
    }
}
