//! src/transport/mod.rs
//!
//! Defines the `Transport` abstraction: a thin send/receive/delete
//! interface over whatever actually moves bytes between nodes. The node
//! runtime only ever talks to this trait — it has no idea whether it is
//! addressing an in-process channel or a UDP socket.

use crate::{domain::Endpoint, error::Result};
use async_trait::async_trait;
use std::time::Duration;

pub mod memory;
pub mod udp;

pub use memory::InMemoryTransport;
pub use udp::UdpTransport;

/// A message pulled off the transport, paired with a receipt the caller
/// hands back to `delete` once it has been durably processed.
#[derive(Clone, Debug)]
pub struct Received {
    pub body: String,
    pub receipt: String,
}

/// The contract every wire backend implements. Mirrors the boto3 SQS
/// `send_message` / `receive_message` / `delete_message` trio this protocol
/// was originally built against, generalized so any queue-like or
/// datagram-like backend can stand in.
#[async_trait]
pub trait Transport: Send + Sync {
    /// This node's own address, as handed out in HELLO/PEER_LIST messages.
    fn own_endpoint(&self) -> Endpoint;

    /// Deliver `body` to `destination`. Fire-and-forget: the protocol layer
    /// is tolerant of loss (see runtime retry-free design), so failures are
    /// logged by the caller, not retried here.
    async fn send(&self, destination: &Endpoint, body: String) -> Result<()>;

    /// Poll for inbound messages, waiting up to `timeout` if none are
    /// immediately available. An empty vec means the poll window elapsed
    /// with nothing to deliver.
    async fn receive(&self, timeout: Duration) -> Result<Vec<Received>>;

    /// Acknowledge a message as processed. A no-op for transports with no
    /// redelivery concept (e.g. plain UDP datagrams).
    async fn delete(&self, receipt: &str) -> Result<()>;
}
