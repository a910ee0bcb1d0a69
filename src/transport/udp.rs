//! src/transport/udp.rs
//!
//! A minimal real `Transport` backend: JSON bodies carried over plain UDP
//! datagrams. No retry, no ordering, no redelivery — the node runtime
//! already tolerates loss, and the hosted queue service this interface is
//! modeled on is explicitly out of scope for this crate.

use super::{Received, Transport};
use crate::{domain::Endpoint, error::Result};
use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;

const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

pub struct UdpTransport {
    socket: UdpSocket,
    own_endpoint: Endpoint,
}

impl UdpTransport {
    pub fn bind(bind_addr: SocketAddr) -> Result<Self> {
        let socket = Socket::new(Domain::for_address(bind_addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&bind_addr.into())?;
        let std_socket: std::net::UdpSocket = socket.into();
        std_socket.set_nonblocking(true)?;

        let local_addr = std_socket.local_addr()?;
        Ok(Self {
            socket: UdpSocket::from_std(std_socket)?,
            own_endpoint: local_addr.to_string(),
        })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn own_endpoint(&self) -> Endpoint {
        self.own_endpoint.clone()
    }

    async fn send(&self, destination: &Endpoint, body: String) -> Result<()> {
        let addr: SocketAddr = match destination.parse() {
            Ok(addr) => addr,
            Err(_) => {
                tracing::warn!(destination, "not a valid socket address, dropping send");
                return Ok(());
            }
        };
        self.socket.send_to(body.as_bytes(), addr).await?;
        Ok(())
    }

    async fn receive(&self, timeout: Duration) -> Result<Vec<Received>> {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        match tokio::time::timeout(timeout, self.socket.recv_from(&mut buf)).await {
            Ok(Ok((len, from))) => {
                let body = String::from_utf8_lossy(&buf[..len]).into_owned();
                Ok(vec![Received {
                    body,
                    receipt: from.to_string(),
                }])
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_elapsed) => Ok(Vec::new()),
        }
    }

    async fn delete(&self, _receipt: &str) -> Result<()> {
        // No receipt concept for a connectionless datagram.
        Ok(())
    }
}
