//! Per-host identification pipeline
//!
//! ping -> reverse DNS -> neighbor lookup -> TCP connect probe, strictly in
//! that order. An unreachable host stops after the ping. Nothing is retried and
//! no step can fail the record: an unresolved name or MAC stays empty and a
//! port that does not complete its handshake is simply not listed.

use super::{emit, DeviceRecord, EventSender, ScanEvent};
use crate::config::ScanConfig;
use crate::network::address::{self, Address, AddressRange};
use crate::network::NetworkBackend;
use crate::Result;
use futures::stream::{self, StreamExt};
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Identification pipeline bound to one backend and one configuration
#[derive(Clone)]
pub struct HostProbe {
    backend: Arc<dyn NetworkBackend>,
    config: Arc<ScanConfig>,
}

impl HostProbe {
    pub fn new(backend: Arc<dyn NetworkBackend>, config: ScanConfig) -> Self {
        Self {
            backend,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run the full pipeline for one address.
    pub async fn identify(&self, addr: Address, events: Option<&EventSender>) -> DeviceRecord {
        let target = Ipv4Addr::from(addr);
        let mut record = DeviceRecord::new(addr);

        emit(events, ScanEvent::Ping(record.address.clone()));
        record.reachable = self.backend.ping(target, self.config.ping_timeout()).await;
        if !record.reachable {
            emit(events, ScanEvent::PingFailed(record.address.clone()));
            return record;
        }

        if self.config.resolve_hostnames {
            emit(events, ScanEvent::Dns(record.address.clone()));
            record.hostname = self.backend.reverse_lookup(target).await.unwrap_or_default();
        }

        if self.config.resolve_mac {
            emit(events, ScanEvent::Mac(record.address.clone()));
            record.mac = self.backend.mac_address(target).await.unwrap_or_default();
        }

        emit(events, ScanEvent::Ports(record.address.clone()));
        record.open_ports = self.open_ports(target).await;

        log::debug!(
            "{} is up: name={:?} mac={:?} ports={:?}",
            record.address,
            record.hostname,
            record.mac,
            record.open_ports
        );
        emit(
            events,
            ScanEvent::Done {
                address: record.address.clone(),
                hostname: record.hostname.clone(),
                mac: record.mac.clone(),
                open_ports: record.open_ports.len(),
            },
        );
        record
    }

    /// Connect to every configured port. `buffered` keeps results in
    /// configured order whatever order the handshakes finish in.
    async fn open_ports(&self, target: Ipv4Addr) -> Vec<u16> {
        let timeout = self.config.port_timeout();
        let backend = &self.backend;

        stream::iter(self.config.ports.iter().copied())
            .map(|port| async move { (port, backend.probe_port(target, port, timeout).await) })
            .buffered(self.config.port_concurrency.max(1))
            .filter_map(|(port, open)| async move { open.then_some(port) })
            .collect()
            .await
    }

    /// Probe a range one address at a time on the calling task.
    ///
    /// Records come back in address order. The backend is initialized before
    /// the first probe and shut down after the last one.
    pub async fn scan_sequential(
        &self,
        range: AddressRange,
        events: Option<&EventSender>,
    ) -> Result<Vec<DeviceRecord>> {
        self.backend.initialize().await?;

        let mut records = Vec::with_capacity(range.len().min(4096) as usize);
        for addr in range.iter() {
            emit(events, ScanEvent::Scanning(address::format(addr)));
            records.push(self.identify(addr, events).await);
        }

        self.backend.shutdown().await;
        Ok(records)
    }
}
