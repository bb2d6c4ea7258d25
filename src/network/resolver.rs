//! Name and link-layer resolution
//!
//! Both lookups are best effort. Every failure mode collapses to `None`.

use pnet::util::MacAddr;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const PROC_ARP_TABLE: &str = "/proc/net/arp";

/// Reverse DNS lookup through the system resolver, bounded by `timeout`.
///
/// The resolver call itself blocks, so it runs on the blocking pool. On
/// timeout the lookup keeps running there and its answer is discarded.
pub async fn reverse_lookup(target: Ipv4Addr, timeout: Duration) -> Option<String> {
    let ip = IpAddr::V4(target);
    let lookup = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip));

    match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(Ok(name))) => usable_hostname(&name, target),
        Ok(Ok(Err(e))) => {
            log::trace!("reverse lookup for {} failed: {}", target, e);
            None
        }
        Ok(Err(e)) => {
            log::debug!("reverse lookup task for {} panicked: {}", target, e);
            None
        }
        Err(_) => None,
    }
}

/// getnameinfo hands back the numeric address when no PTR record exists.
fn usable_hostname(name: &str, target: Ipv4Addr) -> Option<String> {
    let name = name.trim_end_matches('.');
    if name.is_empty() || name.parse::<Ipv4Addr>().map_or(false, |ip| ip == target) {
        None
    } else {
        Some(name.to_string())
    }
}

/// Render a hardware address as `AA-BB-CC-DD-EE-FF`.
pub fn format_mac(mac: MacAddr) -> String {
    format!(
        "{:02X}-{:02X}-{:02X}-{:02X}-{:02X}-{:02X}",
        mac.0, mac.1, mac.2, mac.3, mac.4, mac.5
    )
}

fn parse_mac(text: &str) -> Option<MacAddr> {
    let mac = MacAddr::from_str(&text.replace('-', ":")).ok()?;
    (mac != MacAddr::zero()).then_some(mac)
}

/// Find the hardware address for `target` in `/proc/net/arp` content.
///
/// Incomplete entries (all-zero hardware address) are skipped.
pub fn parse_proc_arp(content: &str, target: Ipv4Addr) -> Option<MacAddr> {
    let target = target.to_string();
    content.lines().skip(1).find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [ip, _hw_type, _flags, mac, ..] if *ip == target => parse_mac(mac),
            _ => None,
        }
    })
}

/// Find the hardware address in `arp -n <ip>` output (BSD and Linux net-tools).
pub fn parse_arp_command(output: &str, target: Ipv4Addr) -> Option<MacAddr> {
    let target = target.to_string();
    let bracketed = format!("({})", target);
    output
        .lines()
        .filter(|line| line.split_whitespace().any(|f| f == target || f == bracketed))
        .flat_map(|line| line.split_whitespace())
        .find_map(|field| {
            if field.matches(':').count() == 5 || field.matches('-').count() == 5 {
                parse_mac(field)
            } else {
                None
            }
        })
}

/// Neighbor-table lookup
#[derive(Debug, Clone)]
pub struct ArpTable {
    proc_path: Option<PathBuf>,
    timeout: Duration,
}

impl Default for ArpTable {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

impl ArpTable {
    pub fn new(timeout: Duration) -> Self {
        let proc_path = PathBuf::from(PROC_ARP_TABLE);
        Self {
            proc_path: proc_path.exists().then_some(proc_path),
            timeout,
        }
    }

    /// Read neighbors from a specific file in `/proc/net/arp` format.
    pub fn from_file(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            proc_path: Some(path.into()),
            timeout,
        }
    }

    /// Resolved hardware address text, or `None` when the neighbor is unknown.
    pub async fn lookup(&self, target: Ipv4Addr) -> Option<String> {
        let mac = match &self.proc_path {
            Some(path) => match tokio::fs::read_to_string(path).await {
                Ok(content) => parse_proc_arp(&content, target),
                Err(e) => {
                    log::debug!("reading {} failed: {}", path.display(), e);
                    None
                }
            },
            None => self.lookup_command(target).await,
        };
        mac.map(format_mac)
    }

    async fn lookup_command(&self, target: Ipv4Addr) -> Option<MacAddr> {
        let output = tokio::process::Command::new("arp")
            .arg("-n")
            .arg(target.to_string())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, output).await {
            Ok(Ok(output)) => parse_arp_command(&String::from_utf8_lossy(&output.stdout), target),
            Ok(Err(e)) => {
                log::debug!("arp command failed: {}", e);
                None
            }
            Err(_) => None,
        }
    }
}
