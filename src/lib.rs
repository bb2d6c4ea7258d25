//! hostsweep - parallel IPv4 host discovery
//!
//! Sweeps an address range with a pool of workers. Every reachable host is
//! enriched with its reverse DNS name, its link-layer address and the set of
//! open TCP ports from a short list.

pub mod config;
pub mod discovery;
pub mod error;
pub mod network;
pub mod scanner;

// Re-export commonly used types
pub use config::ScanConfig;
pub use discovery::{event_channel, DeviceRecord, EventReceiver, EventSender, HostProbe, ScanEvent};
pub use error::ScanError;
pub use network::{AddressRange, NetworkBackend, Subnet, SystemBackend};
pub use scanner::{ScanEngine, ScanProgress};

pub type Result<T> = std::result::Result<T, ScanError>;
