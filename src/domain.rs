//! src/domain.rs
//!
//! The Lingua Franca of our system.
//!
//! Defines the wire-level message types shared across every component: the
//! eight P2P message kinds (HELLO, PEER_LIST, PING, PONG, VIEW_EVENT,
//! AUDIT_RESULT, CHOKE, UNCHOKE), their common envelope fields, and the
//! `NodeId`/`Endpoint` identifiers threaded through the four algorithm
//! modules. Centralizing them here avoids circular dependencies between
//! `gossip`, `heartbeat`, `choking`, `reputation`, and `runtime`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A node's identifier. The protocol treats this as an opaque string (a
/// student name, a bot name, whatever the deployment's registry assigns) —
/// there is no cryptographic binding between a `NodeId` and its traffic.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A peer's reachability address, as understood by the transport (an SQS
/// queue URL, a `host:port` pair — the core treats it as an opaque string
/// handed back to `Transport::send`).
pub type Endpoint = String;

/// One entry in a `PEER_LIST` payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddr {
    pub node_id: NodeId,
    pub endpoint: Endpoint,
}

/// The type-specific payload of a message. Flattened alongside the shared
/// envelope fields on the wire, so a `HELLO` serializes as
/// `{"type":"HELLO","sender":...,"timestamp":...,"msg_id":...,"endpoint":...}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageKind {
    #[serde(rename = "HELLO")]
    Hello { endpoint: Endpoint },
    #[serde(rename = "PEER_LIST")]
    PeerList { peers: Vec<PeerAddr> },
    #[serde(rename = "PING")]
    Ping { seq: u64 },
    #[serde(rename = "PONG")]
    Pong { seq: u64 },
    #[serde(rename = "VIEW_EVENT")]
    ViewEvent {
        event_id: String,
        content_id: String,
        count: u64,
        ad_id: String,
    },
    #[serde(rename = "AUDIT_RESULT")]
    AuditResult {
        content_id: String,
        agreed_count: u64,
        confidence: f64,
        voters: Vec<NodeId>,
    },
    #[serde(rename = "CHOKE")]
    Choke,
    #[serde(rename = "UNCHOKE")]
    Unchoke,
}

impl MessageKind {
    /// The short type tag used in logs, matching the wire `type` field.
    pub fn tag(&self) -> &'static str {
        match self {
            MessageKind::Hello { .. } => "HELLO",
            MessageKind::PeerList { .. } => "PEER_LIST",
            MessageKind::Ping { .. } => "PING",
            MessageKind::Pong { .. } => "PONG",
            MessageKind::ViewEvent { .. } => "VIEW_EVENT",
            MessageKind::AuditResult { .. } => "AUDIT_RESULT",
            MessageKind::Choke => "CHOKE",
            MessageKind::Unchoke => "UNCHOKE",
        }
    }
}

/// A complete wire message: the shared envelope fields plus one payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub kind: MessageKind,
    pub sender: NodeId,
    pub timestamp: String,
    pub msg_id: String,
}

impl Envelope {
    fn new(sender: NodeId, kind: MessageKind) -> Self {
        Self {
            kind,
            sender,
            timestamp: Utc::now().to_rfc3339(),
            msg_id: uuid::Uuid::new_v4().simple().to_string()[..8].to_string(),
        }
    }

    pub fn hello(sender: NodeId, endpoint: Endpoint) -> Self {
        Self::new(sender, MessageKind::Hello { endpoint })
    }

    pub fn peer_list(sender: NodeId, peers: Vec<PeerAddr>) -> Self {
        Self::new(sender, MessageKind::PeerList { peers })
    }

    pub fn ping(sender: NodeId, seq: u64) -> Self {
        Self::new(sender, MessageKind::Ping { seq })
    }

    pub fn pong(sender: NodeId, seq: u64) -> Self {
        Self::new(sender, MessageKind::Pong { seq })
    }

    pub fn view_event(
        sender: NodeId,
        event_id: String,
        content_id: String,
        count: u64,
        ad_id: String,
    ) -> Self {
        Self::new(
            sender,
            MessageKind::ViewEvent {
                event_id,
                content_id,
                count,
                ad_id,
            },
        )
    }

    pub fn audit_result(
        sender: NodeId,
        content_id: String,
        agreed_count: u64,
        confidence: f64,
        voters: Vec<NodeId>,
    ) -> Self {
        Self::new(
            sender,
            MessageKind::AuditResult {
                content_id,
                agreed_count,
                confidence: (confidence * 10_000.0).round() / 10_000.0,
                voters,
            },
        )
    }

    pub fn choke(sender: NodeId) -> Self {
        Self::new(sender, MessageKind::Choke)
    }

    pub fn unchoke(sender: NodeId) -> Self {
        Self::new(sender, MessageKind::Unchoke)
    }

    /// Serialize to the JSON body that crosses the transport.
    pub fn encode(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a transport body back into an `Envelope`.
    pub fn decode(body: &str) -> crate::error::Result<Self> {
        Ok(serde_json::from_str(body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_round_trips() {
        let original = Envelope::hello(NodeId::new("hugo"), "sqs://fake/hugo".into());
        let encoded = original.encode().unwrap();
        let decoded = Envelope::decode(&encoded).unwrap();
        assert_eq!(original, decoded);
        assert_eq!(decoded.kind.tag(), "HELLO");
    }

    #[test]
    fn every_message_kind_round_trips() {
        let sender = NodeId::new("hugo");
        let messages = vec![
            Envelope::hello(sender.clone(), "sqs://fake/hugo".into()),
            Envelope::peer_list(
                sender.clone(),
                vec![PeerAddr {
                    node_id: NodeId::new("sam"),
                    endpoint: "sqs://fake/sam".into(),
                }],
            ),
            Envelope::ping(sender.clone(), 1),
            Envelope::pong(sender.clone(), 1),
            Envelope::view_event(
                sender.clone(),
                "evt-001".into(),
                "video-42".into(),
                150,
                "ad-7".into(),
            ),
            Envelope::audit_result(
                sender.clone(),
                "video-42".into(),
                150,
                0.92,
                vec![NodeId::new("sam")],
            ),
            Envelope::choke(sender.clone()),
            Envelope::unchoke(sender),
        ];

        for msg in messages {
            let decoded = Envelope::decode(&msg.encode().unwrap()).unwrap();
            assert_eq!(msg, decoded, "round-trip failed for {}", msg.kind.tag());
        }
    }

    #[test]
    fn msg_id_is_eight_chars() {
        let msg = Envelope::hello(NodeId::new("hugo"), "sqs://fake/hugo".into());
        assert_eq!(msg.msg_id.len(), 8);
    }

    #[test]
    fn audit_result_confidence_rounds_to_four_places() {
        let msg = Envelope::audit_result(
            NodeId::new("hugo"),
            "video-42".into(),
            1,
            1.0 / 3.0,
            vec![],
        );
        if let MessageKind::AuditResult { confidence, .. } = msg.kind {
            assert_eq!(confidence, 0.3333);
        } else {
            panic!("wrong kind");
        }
    }

    #[test]
    fn wire_json_has_flat_type_tag() {
        let msg = Envelope::ping(NodeId::new("hugo"), 7);
        let json: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(json["type"], "PING");
        assert_eq!(json["sender"], "hugo");
        assert_eq!(json["seq"], 7);
    }
}
