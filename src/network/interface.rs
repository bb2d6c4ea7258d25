//! Local network auto-configuration

use crate::network::address::Subnet;
use pnet::datalink::{self, NetworkInterface};
use pnet::ipnetwork::IpNetwork;

/// Source of the "scan my own network" default.
pub trait SubnetLookup: Send + Sync {
    /// Subnet of the primary interface, or `None` when none is usable.
    fn primary_subnet(&self) -> Option<Subnet>;
}

/// Primary subnet lookup over the host's interface list
#[derive(Debug, Clone, Copy, Default)]
pub struct InterfaceLookup;

impl SubnetLookup for InterfaceLookup {
    fn primary_subnet(&self) -> Option<Subnet> {
        let interfaces = datalink::interfaces();
        let subnet = select_primary_subnet(&interfaces);
        match &subnet {
            Some(subnet) => log::debug!("Primary subnet: {}", subnet),
            None => log::warn!("No interface with an IPv4 address is up"),
        }
        subnet
    }
}

/// First up, non-loopback interface carrying an IPv4 network.
pub fn select_primary_subnet(interfaces: &[NetworkInterface]) -> Option<Subnet> {
    interfaces
        .iter()
        .filter(|iface| iface.is_up() && !iface.is_loopback())
        .flat_map(|iface| iface.ips.iter())
        .find_map(|network| match network {
            IpNetwork::V4(v4) => Subnet::from_prefix(u32::from(v4.ip()), v4.prefix()).ok(),
            IpNetwork::V6(_) => None,
        })
}
