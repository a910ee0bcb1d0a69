//! src/transport/memory.rs
//!
//! An in-process `Transport` backed by `tokio::mpsc` channels. Used by the
//! test suite and by the crate's own multi-node harness to exercise the
//! full runtime without touching a real network.

use super::{Received, Transport};
use crate::{domain::Endpoint, error::Error, error::Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Shared directory of in-memory mailboxes, keyed by endpoint. Every
/// `InMemoryTransport` created from the same `Registry` can address every
/// other one created from it.
#[derive(Clone, Default)]
pub struct Registry {
    mailboxes: Arc<Mutex<HashMap<Endpoint, mpsc::UnboundedSender<String>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a new transport under `endpoint`.
    pub fn join(&self, endpoint: Endpoint) -> InMemoryTransport {
        let (tx, rx) = mpsc::unbounded_channel();
        self.mailboxes.lock().unwrap().insert(endpoint.clone(), tx);
        InMemoryTransport {
            endpoint,
            registry: self.clone(),
            inbox: Arc::new(tokio::sync::Mutex::new(rx)),
        }
    }
}

pub struct InMemoryTransport {
    endpoint: Endpoint,
    registry: Registry,
    inbox: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl InMemoryTransport {
    /// Convenience for two-node tests: builds a fresh registry with exactly
    /// `a` and `b` already joined, mutually addressable.
    pub fn pair(a: Endpoint, b: Endpoint) -> (InMemoryTransport, InMemoryTransport) {
        let registry = Registry::new();
        (registry.join(a), registry.join(b))
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    fn own_endpoint(&self) -> Endpoint {
        self.endpoint.clone()
    }

    async fn send(&self, destination: &Endpoint, body: String) -> Result<()> {
        let sender = {
            let mailboxes = self.registry.mailboxes.lock().unwrap();
            mailboxes.get(destination).cloned()
        };
        match sender {
            Some(tx) => tx
                .send(body)
                .map_err(|_| Error::UnknownPeer(destination.clone())),
            None => Err(Error::UnknownPeer(destination.clone())),
        }
    }

    async fn receive(&self, timeout: Duration) -> Result<Vec<Received>> {
        let mut inbox = self.inbox.lock().await;
        match tokio::time::timeout(timeout, inbox.recv()).await {
            Ok(Some(body)) => Ok(vec![Received {
                body,
                receipt: uuid::Uuid::new_v4().to_string(),
            }]),
            Ok(None) => Ok(Vec::new()),
            Err(_elapsed) => Ok(Vec::new()),
        }
    }

    async fn delete(&self, _receipt: &str) -> Result<()> {
        // No redelivery concept for an in-memory mailbox.
        Ok(())
    }
}
