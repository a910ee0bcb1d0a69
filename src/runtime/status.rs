//! src/runtime/status.rs
//!
//! The read-only health snapshot served by the status API. Captured once
//! per poll round; carries no protocol semantics of its own.

use super::NodeRuntime;
use serde::Serialize;

#[derive(Clone, Debug, Default, Serialize)]
pub struct StatusSnapshot {
    pub node_id: String,
    pub rounds: u64,
    pub messages_received: u64,
    pub messages_sent: u64,
    pub known_peers: usize,
    pub alive_peers: usize,
    pub suspect_peers: usize,
    pub dead_peers: usize,
    pub unchoked_peers: Vec<String>,
    pub ranked_reputation: Vec<(String, f64)>,
    pub last_audit: Option<LastAudit>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LastAudit {
    pub content_id: String,
    pub agreed_count: u64,
    pub confidence: f64,
}

impl StatusSnapshot {
    pub fn capture(runtime: &NodeRuntime) -> Self {
        Self {
            node_id: runtime.node_id().to_string(),
            rounds: runtime.stats().rounds,
            messages_received: runtime.stats().messages_received,
            messages_sent: runtime.stats().messages_sent,
            known_peers: runtime.known_peer_count(),
            alive_peers: runtime.alive_peer_count(),
            suspect_peers: runtime.suspect_peer_count(),
            dead_peers: runtime.dead_peer_count(),
            unchoked_peers: runtime.unchoked_peers().into_iter().map(|n| n.to_string()).collect(),
            ranked_reputation: runtime
                .ranked_peers()
                .into_iter()
                .map(|(n, t)| (n.to_string(), t))
                .collect(),
            last_audit: runtime
                .last_audit_result()
                .map(|(content_id, agreed_count, confidence)| LastAudit {
                    content_id,
                    agreed_count,
                    confidence,
                }),
        }
    }
}
