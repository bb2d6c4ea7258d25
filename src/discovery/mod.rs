//! Host discovery - per-host records, progress events and the identification pipeline

pub mod probe;

use crate::network::address::{self, Address};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

pub use probe::HostProbe;

/// Everything learned about one probed address.
///
/// A record is built by exactly one worker and is never modified once it has
/// been handed to the result store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Dotted-decimal address
    pub address: String,
    /// Answered the echo request
    pub reachable: bool,
    /// Reverse DNS name, empty when unresolved
    pub hostname: String,
    /// Hardware address as `AA-BB-CC-DD-EE-FF`, empty when unresolved
    pub mac: String,
    /// Open TCP ports in probe order
    pub open_ports: Vec<u16>,
}

impl DeviceRecord {
    pub fn new(addr: Address) -> Self {
        Self {
            address: address::format(addr),
            ..Default::default()
        }
    }

    /// Address as an ordinal.
    pub fn ordinal(&self) -> Option<Address> {
        address::parse(&self.address).ok()
    }

    pub fn has_hostname(&self) -> bool {
        !self.hostname.is_empty()
    }

    pub fn has_mac(&self) -> bool {
        !self.mac.is_empty()
    }
}

/// Human-readable progress emitted while a scan runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    WorkersStarted(usize),
    NetworkInitFailed(String),
    Scanning(String),
    Ping(String),
    PingFailed(String),
    Dns(String),
    Mac(String),
    Ports(String),
    Done {
        address: String,
        hostname: String,
        mac: String,
        open_ports: usize,
    },
    Completed {
        hosts: usize,
    },
    StopTimedOut {
        aborted: usize,
    },
}

impl fmt::Display for ScanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanEvent::WorkersStarted(n) => write!(f, "Workers started: {}", n),
            ScanEvent::NetworkInitFailed(reason) => write!(f, "Network init failed: {}", reason),
            ScanEvent::Scanning(ip) => write!(f, "Scanning {}", ip),
            ScanEvent::Ping(ip) => write!(f, "Ping {}...", ip),
            ScanEvent::PingFailed(ip) => write!(f, "Ping failed {}", ip),
            ScanEvent::Dns(ip) => write!(f, "DNS {}...", ip),
            ScanEvent::Mac(ip) => write!(f, "MAC {}...", ip),
            ScanEvent::Ports(ip) => write!(f, "Ports {}...", ip),
            ScanEvent::Done {
                address,
                hostname,
                mac,
                open_ports,
            } => write!(
                f,
                "Done {}: {}, {}, {} ports",
                address,
                if hostname.is_empty() { "(no name)" } else { hostname },
                if mac.is_empty() { "MAC --" } else { mac },
                open_ports
            ),
            ScanEvent::Completed { hosts } => write!(f, "Scan complete: {} hosts", hosts),
            ScanEvent::StopTimedOut { aborted } => {
                write!(f, "Stop timed out, aborted {} workers", aborted)
            }
        }
    }
}

/// Sending half of the progress channel. Sending never blocks.
pub type EventSender = mpsc::UnboundedSender<ScanEvent>;

/// Receiving half, owned and drained by the caller.
pub type EventReceiver = mpsc::UnboundedReceiver<ScanEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Send an event if anyone is listening. A closed channel is not an error.
pub(crate) fn emit(events: Option<&EventSender>, event: ScanEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
