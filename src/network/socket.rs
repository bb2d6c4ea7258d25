//! TCP connect probing

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;

/// Outcome of a single connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Open,
    Closed,
    Filtered,
}

/// TCP connect scanner used for the per-host port probe
#[derive(Debug, Clone)]
pub struct TcpConnectScanner {
    timeout: Duration,
}

impl TcpConnectScanner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Classify a port. Only a completed handshake counts as open; a refusal is
    /// closed and anything that does not settle within the timeout is filtered.
    pub async fn probe(&self, target: Ipv4Addr, port: u16) -> PortState {
        let addr = SocketAddr::new(IpAddr::V4(target), port);
        match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                PortState::Open
            }
            Ok(Err(_)) => PortState::Closed,
            Err(_) => PortState::Filtered,
        }
    }

    pub async fn scan_port(&self, target: Ipv4Addr, port: u16) -> bool {
        self.probe(target, port).await == PortState::Open
    }
}
