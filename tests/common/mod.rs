//! Scripted network backend shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use hostsweep::{network::NetworkBackend, Result, ScanError};
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct CallCounts {
    pub initialize: AtomicUsize,
    pub shutdown: AtomicUsize,
    pub ping: AtomicUsize,
    pub reverse_lookup: AtomicUsize,
    pub mac_address: AtomicUsize,
    pub probe_port: AtomicUsize,
}

impl CallCounts {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Answers every probe from tables instead of the network.
#[derive(Debug, Default)]
pub struct StubBackend {
    all_reachable: bool,
    reachable: HashSet<Ipv4Addr>,
    hostnames: HashMap<Ipv4Addr, String>,
    macs: HashMap<Ipv4Addr, String>,
    open_ports: HashSet<u16>,
    ping_delay: Duration,
    fail_init: bool,
    pub calls: CallCounts,
}

impl StubBackend {
    /// Every address answers, nothing else resolves.
    pub fn all_up() -> Self {
        Self {
            all_reachable: true,
            ..Default::default()
        }
    }

    /// Nothing answers.
    pub fn all_down() -> Self {
        Self::default()
    }

    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Default::default()
        }
    }

    pub fn with_reachable(mut self, ip: Ipv4Addr) -> Self {
        self.reachable.insert(ip);
        self
    }

    pub fn with_hostname(mut self, ip: Ipv4Addr, name: &str) -> Self {
        self.hostnames.insert(ip, name.to_string());
        self
    }

    pub fn with_mac(mut self, ip: Ipv4Addr, mac: &str) -> Self {
        self.macs.insert(ip, mac.to_string());
        self
    }

    pub fn with_open_ports(mut self, ports: &[u16]) -> Self {
        self.open_ports.extend(ports.iter().copied());
        self
    }

    /// Simulated round trip for every ping.
    pub fn with_ping_delay(mut self, delay: Duration) -> Self {
        self.ping_delay = delay;
        self
    }

    fn hit(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl NetworkBackend for StubBackend {
    async fn initialize(&self) -> Result<()> {
        Self::hit(&self.calls.initialize);
        if self.fail_init {
            return Err(ScanError::NetworkInit("no ICMP transport available".into()));
        }
        Ok(())
    }

    async fn shutdown(&self) {
        Self::hit(&self.calls.shutdown);
    }

    async fn ping(&self, target: Ipv4Addr, _timeout: Duration) -> bool {
        Self::hit(&self.calls.ping);
        if !self.ping_delay.is_zero() {
            tokio::time::sleep(self.ping_delay).await;
        }
        self.all_reachable || self.reachable.contains(&target)
    }

    async fn reverse_lookup(&self, target: Ipv4Addr) -> Option<String> {
        Self::hit(&self.calls.reverse_lookup);
        self.hostnames.get(&target).cloned()
    }

    async fn mac_address(&self, target: Ipv4Addr) -> Option<String> {
        Self::hit(&self.calls.mac_address);
        self.macs.get(&target).cloned()
    }

    async fn probe_port(&self, _target: Ipv4Addr, port: u16, _timeout: Duration) -> bool {
        Self::hit(&self.calls.probe_port);
        self.open_ports.contains(&port)
    }
}
