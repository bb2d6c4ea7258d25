//! Network layer: address arithmetic and the per-host transports
//!
//! The discovery pipeline never touches sockets directly. It talks to a
//! [`NetworkBackend`], which the engine receives at construction time. The
//! production implementation is [`SystemBackend`]; tests inject stubs.

pub mod address;
pub mod icmp;
pub mod interface;
pub mod resolver;
pub mod socket;

use crate::{Result, ScanError};
use async_trait::async_trait;
use icmp::IcmpPinger;
use resolver::ArpTable;
use socket::TcpConnectScanner;
use std::net::Ipv4Addr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

pub use address::{Address, AddressRange, Subnet};
pub use interface::{InterfaceLookup, SubnetLookup};

/// Transports used by the host identification pipeline.
///
/// Every probe is bounded by its own timeout and reports failure as
/// `false` / `None`; none of them may panic or return a scan-level error.
#[async_trait]
pub trait NetworkBackend: Send + Sync {
    /// Bring the probing subsystem up. Called once by `ScanEngine::start`;
    /// an error aborts the start.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Release whatever `initialize` acquired.
    async fn shutdown(&self) {}

    /// One echo request, no retry.
    async fn ping(&self, target: Ipv4Addr, timeout: Duration) -> bool;

    async fn reverse_lookup(&self, target: Ipv4Addr) -> Option<String>;

    async fn mac_address(&self, target: Ipv4Addr) -> Option<String>;

    /// True only when a TCP handshake completes within `timeout`.
    async fn probe_port(&self, target: Ipv4Addr, port: u16, timeout: Duration) -> bool;
}

/// Backend built on the host's own network stack
pub struct SystemBackend {
    pinger: RwLock<Option<Arc<IcmpPinger>>>,
    arp: ArpTable,
    lookup_timeout: Duration,
}

impl Default for SystemBackend {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000))
    }
}

impl SystemBackend {
    /// `lookup_timeout` bounds both the reverse DNS and the neighbor lookup.
    pub fn new(lookup_timeout: Duration) -> Self {
        Self {
            pinger: RwLock::new(None),
            arp: ArpTable::new(lookup_timeout),
            lookup_timeout,
        }
    }

    fn pinger(&self) -> Option<Arc<IcmpPinger>> {
        self.pinger
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl NetworkBackend for SystemBackend {
    async fn initialize(&self) -> Result<()> {
        let pinger = IcmpPinger::new()?;
        log::info!("Network initialized ({:?} ICMP transport)", pinger.transport());
        *self.pinger.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(pinger));
        Ok(())
    }

    async fn shutdown(&self) {
        self.pinger
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    async fn ping(&self, target: Ipv4Addr, timeout: Duration) -> bool {
        let Some(pinger) = self.pinger() else {
            log::warn!("{}", ScanError::Network("ping before network initialization".into()));
            return false;
        };

        let result = pinger.ping(target, timeout).await;
        if let Some(error) = &result.error {
            log::trace!("ping {} failed: {}", target, error);
        }
        result.success
    }

    async fn reverse_lookup(&self, target: Ipv4Addr) -> Option<String> {
        resolver::reverse_lookup(target, self.lookup_timeout).await
    }

    async fn mac_address(&self, target: Ipv4Addr) -> Option<String> {
        self.arp.lookup(target).await
    }

    async fn probe_port(&self, target: Ipv4Addr, port: u16, timeout: Duration) -> bool {
        TcpConnectScanner::new(timeout).scan_port(target, port).await
    }
}
