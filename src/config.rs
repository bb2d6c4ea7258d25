//! Configuration module for hostsweep

use crate::{Result, ScanError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Upper bound on the number of ports probed per host.
pub const MAX_PORTS: usize = 16;

/// Upper bound on worker tasks per scan.
pub const MAX_WORKERS: usize = 64;

/// Ports probed when none are configured: SSH, HTTP, HTTPS, NetBIOS, SMB, RDP.
pub const DEFAULT_PORTS: [u16; 6] = [22, 80, 443, 139, 445, 3389];

/// Settings for one scan. The engine takes its own copy at start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// TCP ports probed on every reachable host, in probe order
    pub ports: Vec<u16>,

    /// Connect timeout per port in milliseconds
    pub port_timeout_ms: u64,

    /// Echo reply wait in milliseconds
    pub ping_timeout_ms: u64,

    /// Host probes started per second (0 = unlimited)
    pub rate_limit: u32,

    /// Worker tasks; `None` sizes the pool from the core count
    pub workers: Option<usize>,

    /// Connect attempts in flight per host
    pub port_concurrency: usize,

    /// Resolve PTR names for reachable hosts
    pub resolve_hostnames: bool,

    /// Look up hardware addresses for reachable hosts
    pub resolve_mac: bool,

    /// How long `stop` waits for workers before aborting them
    pub stop_timeout_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ports: DEFAULT_PORTS.to_vec(),
            port_timeout_ms: 500,
            ping_timeout_ms: 1000,
            rate_limit: 200,
            workers: None,
            port_concurrency: 1,
            resolve_hostnames: true,
            resolve_mac: true,
            stop_timeout_ms: 5000,
        }
    }
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_port_timeout(mut self, timeout_ms: u64) -> Self {
        self.port_timeout_ms = timeout_ms;
        self
    }

    pub fn with_ping_timeout(mut self, timeout_ms: u64) -> Self {
        self.ping_timeout_ms = timeout_ms;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: u32) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_port_concurrency(mut self, concurrency: usize) -> Self {
        self.port_concurrency = concurrency;
        self
    }

    pub fn with_stop_timeout(mut self, timeout_ms: u64) -> Self {
        self.stop_timeout_ms = timeout_ms;
        self
    }

    pub fn port_timeout(&self) -> Duration {
        Duration::from_millis(self.port_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Worker pool size: explicit setting, else twice the logical core count,
    /// clamped to [`MAX_WORKERS`]. `num_cpus` reports at least one core, so the
    /// automatic size is never below 2.
    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(workers) => workers.clamp(1, MAX_WORKERS),
            None => (num_cpus::get() * 2).min(MAX_WORKERS),
        }
    }

    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ScanError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: ScanConfig = toml::from_str(&content)
            .map_err(|e| ScanError::Config(format!("Failed to parse TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load `~/.hostsweep.toml` when present, defaults otherwise.
    pub fn load_default_config() -> Self {
        let Some(home_dir) = dirs::home_dir() else {
            return Self::default();
        };

        let path = home_dir.join(".hostsweep.toml");
        if !path.exists() {
            return Self::default();
        }

        match Self::from_toml_file(&path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.ports.len() > MAX_PORTS {
            return Err(ScanError::Config(format!(
                "At most {} ports can be probed per host, got {}",
                MAX_PORTS,
                self.ports.len()
            )));
        }

        if self.ports.contains(&0) {
            return Err(ScanError::Config("Port 0 cannot be probed".to_string()));
        }

        let mut seen = HashSet::with_capacity(self.ports.len());
        if let Some(dup) = self.ports.iter().find(|port| !seen.insert(**port)) {
            return Err(ScanError::Config(format!("Port {} is listed twice", dup)));
        }

        if self.port_timeout_ms == 0 || self.ping_timeout_ms == 0 {
            return Err(ScanError::Config("Timeouts must be greater than 0".to_string()));
        }

        if self.workers == Some(0) {
            return Err(ScanError::Config("Worker count must be greater than 0".to_string()));
        }

        if self.port_concurrency == 0 {
            return Err(ScanError::Config("Port concurrency must be greater than 0".to_string()));
        }

        Ok(())
    }
}
