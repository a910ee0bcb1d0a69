//! src/reputation.rs
//!
//! Per-peer trust scoring and reputation-weighted majority voting. Trust is
//! built from three signals — report accuracy, heartbeat uptime, and
//! reciprocity — blended with decay toward a neutral 0.5 so no peer's score
//! ever fully locks in.

use crate::domain::NodeId;
use std::collections::HashMap;

const VOTE_TOLERANCE: f64 = 0.05;

#[derive(Clone, Debug)]
pub struct ReputationRecord {
    pub node_id: NodeId,
    pub reports_total: u64,
    pub reports_accurate: u64,
    pub heartbeats_total: u64,
    pub heartbeats_responded: u64,
    pub contributions: u64,
    pub consumptions: u64,
    pub decay_factor: f64,
    trust_score: f64,
}

impl ReputationRecord {
    fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            reports_total: 0,
            reports_accurate: 0,
            heartbeats_total: 0,
            heartbeats_responded: 0,
            contributions: 0,
            consumptions: 0,
            decay_factor: 0.95,
            trust_score: 0.5,
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.reports_total == 0 {
            0.5
        } else {
            self.reports_accurate as f64 / self.reports_total as f64
        }
    }

    pub fn uptime(&self) -> f64 {
        if self.heartbeats_total == 0 {
            0.5
        } else {
            self.heartbeats_responded as f64 / self.heartbeats_total as f64
        }
    }

    pub fn reciprocity(&self) -> f64 {
        let total = self.contributions + self.consumptions;
        if total == 0 {
            0.5
        } else {
            self.contributions as f64 / total as f64
        }
    }

    pub fn trust_score(&self) -> f64 {
        self.trust_score
    }

    /// Blend the three signals, then decay toward neutral so scores never
    /// permanently entrench (good or bad).
    fn recalculate_trust(&mut self) {
        let raw = 0.6 * self.accuracy() + 0.3 * self.uptime() + 0.1 * self.reciprocity();
        self.trust_score = self.decay_factor * raw + (1.0 - self.decay_factor) * 0.5;
    }
}

/// Tracks reputation for every known peer and computes weighted votes.
pub struct ReputationNode {
    #[allow(dead_code)]
    node_id: NodeId,
    peers: HashMap<NodeId, ReputationRecord>,
    log: Vec<String>,
}

impl ReputationNode {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            peers: HashMap::new(),
            log: Vec::new(),
        }
    }

    /// Register a new peer with a neutral trust score. Idempotent.
    pub fn add_peer(&mut self, node_id: NodeId) {
        self.peers
            .entry(node_id.clone())
            .or_insert_with(|| ReputationRecord::new(node_id));
    }

    pub fn record_report(&mut self, peer_id: &NodeId, was_accurate: bool) {
        if let Some(p) = self.peers.get_mut(peer_id) {
            p.reports_total += 1;
            if was_accurate {
                p.reports_accurate += 1;
            }
        }
    }

    pub fn record_heartbeat(&mut self, peer_id: &NodeId, responded: bool) {
        if let Some(p) = self.peers.get_mut(peer_id) {
            p.heartbeats_total += 1;
            if responded {
                p.heartbeats_responded += 1;
            }
        }
    }

    pub fn record_contribution(&mut self, peer_id: &NodeId, units: u64) {
        if let Some(p) = self.peers.get_mut(peer_id) {
            p.contributions += units;
        }
    }

    pub fn record_consumption(&mut self, peer_id: &NodeId, units: u64) {
        if let Some(p) = self.peers.get_mut(peer_id) {
            p.consumptions += units;
        }
    }

    pub fn update_all_scores(&mut self) {
        for peer in self.peers.values_mut() {
            peer.recalculate_trust();
        }
    }

    /// A reputation-weighted majority vote over reported counts. Counts
    /// within `VOTE_TOLERANCE` of each other are grouped as the same
    /// answer; the group with the most total trust weight wins. If nobody
    /// casting a vote is known to us (total weight 0), confidence is 0 and
    /// the winner is simply the highest-voted count.
    pub fn weighted_majority_vote(&mut self, votes: &HashMap<NodeId, u64>) -> (u64, f64) {
        if votes.is_empty() {
            return (0, 0.0);
        }

        let mut sorted: Vec<(&NodeId, u64)> = votes.iter().map(|(k, v)| (k, *v)).collect();
        sorted.sort_by_key(|(_, count)| *count);

        // Greedily cluster adjacent counts that fall within tolerance of the
        // group's first (lowest) member.
        let mut groups: Vec<Vec<(&NodeId, u64)>> = Vec::new();
        for entry in sorted {
            match groups.last_mut() {
                Some(group) if within_tolerance(group[0].1, entry.1) => group.push(entry),
                _ => groups.push(vec![entry]),
            }
        }

        let total_weight: f64 = votes.keys().map(|id| self.trust_of(id)).sum();

        if total_weight == 0.0 {
            let winner = groups
                .iter()
                .max_by_key(|g| g.len())
                .map(|g| g[0].1)
                .unwrap_or(0);
            self.log.push(format!("vote resolved with no weight, winner={winner}"));
            return (winner, 0.0);
        }

        let mut best_weight = -1.0;
        let mut best_count = 0u64;
        for group in &groups {
            let weight: f64 = group.iter().map(|(id, _)| self.trust_of(id)).sum();
            if weight > best_weight {
                best_weight = weight;
                // Weighted mean within the winning group, rounded to the
                // nearest integer count.
                let weighted_sum: f64 = group
                    .iter()
                    .map(|(id, count)| self.trust_of(id) * (*count as f64))
                    .sum();
                best_count = (weighted_sum / weight).round() as u64;
            }
        }

        let confidence = best_weight / total_weight;
        self.log
            .push(format!("vote resolved winner={best_count} confidence={confidence:.3}"));
        (best_count, confidence)
    }

    fn trust_of(&self, node_id: &NodeId) -> f64 {
        self.peers.get(node_id).map(|p| p.trust_score).unwrap_or(0.0)
    }

    /// All peers sorted by trust score, highest first.
    pub fn get_ranked_peers(&self) -> Vec<&ReputationRecord> {
        let mut ranked: Vec<&ReputationRecord> = self.peers.values().collect();
        ranked.sort_by(|a, b| {
            b.trust_score
                .partial_cmp(&a.trust_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }

    pub fn flush_log(&mut self) -> Vec<String> {
        std::mem::take(&mut self.log)
    }
}

fn within_tolerance(base: u64, candidate: u64) -> bool {
    if base == 0 {
        return candidate == 0;
    }
    let diff = (candidate as f64 - base as f64).abs();
    diff / (base as f64) <= VOTE_TOLERANCE
}
