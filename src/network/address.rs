//! IPv4 address arithmetic
//!
//! Addresses are handled as 32-bit ordinals in host order so that ranges can be
//! claimed with plain integer increments. Text conversion is strict: exactly four
//! dot-separated decimal octets. Leading zeros are read as decimal (never octal)
//! and disappear again on formatting. `255.255.255.255` is an ordinary address
//! here and never doubles as a "no address" sentinel.

use crate::{Result, ScanError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// IPv4 address as an ordinal in host byte order.
pub type Address = u32;

/// Parse dotted-decimal text into an ordinal.
pub fn parse(text: &str) -> Result<Address> {
    let invalid = || ScanError::InvalidAddress(text.to_string());

    let mut octets = [0u8; 4];
    let mut parts = text.split('.');
    for octet in octets.iter_mut() {
        let part = parts.next().ok_or_else(invalid)?;
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let value: u16 = part.parse().map_err(|_| invalid())?;
        *octet = u8::try_from(value).map_err(|_| invalid())?;
    }
    if parts.next().is_some() {
        return Err(invalid());
    }

    Ok(u32::from_be_bytes(octets))
}

/// Canonical dotted-decimal form of an ordinal.
pub fn format(addr: Address) -> String {
    Ipv4Addr::from(addr).to_string()
}

/// Parse and re-format, dropping redundant leading zeros.
pub fn normalize(text: &str) -> Result<String> {
    parse(text).map(format)
}

fn mask_for(prefix_len: u8) -> Address {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix_len))
    }
}

/// An IPv4 subnet derived from a base address and a prefix length.
///
/// `first_usable` is `network + 1` and `last_usable` is `broadcast - 1` for every
/// prefix, computed with wrapping arithmetic. For /31 and /32 those values do not
/// describe a usable host range; [`Subnet::usable_range`] returns `None` there and
/// callers decide what to scan instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subnet {
    pub network: Address,
    pub prefix_len: u8,
    pub mask: Address,
    pub broadcast: Address,
    pub first_usable: Address,
    pub last_usable: Address,
}

impl Subnet {
    pub fn from_prefix(base: Address, prefix_len: u8) -> Result<Self> {
        if prefix_len > 32 {
            return Err(ScanError::InvalidPrefix(prefix_len));
        }

        let mask = mask_for(prefix_len);
        let network = base & mask;
        let broadcast = network | !mask;

        Ok(Self {
            network,
            prefix_len,
            mask,
            broadcast,
            first_usable: network.wrapping_add(1),
            last_usable: broadcast.wrapping_sub(1),
        })
    }

    /// Usable host range, or `None` for the degenerate /31 and /32 prefixes.
    pub fn usable_range(&self) -> Option<AddressRange> {
        if self.prefix_len >= 31 {
            return None;
        }
        AddressRange::new(self.first_usable, self.last_usable).ok()
    }

    /// Every address from network to broadcast, inclusive.
    pub fn full_range(&self) -> AddressRange {
        AddressRange {
            start: self.network,
            end: self.broadcast,
        }
    }

    pub fn contains(&self, addr: Address) -> bool {
        addr & self.mask == self.network
    }
}

impl FromStr for Subnet {
    type Err = ScanError;

    /// Parses CIDR notation such as `192.168.1.0/24`.
    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| ScanError::Parse(format!("expected address/prefix, got '{}'", s)))?;
        let prefix_len: u8 = prefix
            .parse()
            .map_err(|_| ScanError::Parse(format!("invalid prefix in '{}'", s)))?;
        Subnet::from_prefix(parse(addr)?, prefix_len)
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", format(self.network), self.prefix_len)
    }
}

/// Inclusive ordinal range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRange {
    start: Address,
    end: Address,
}

impl AddressRange {
    pub fn new(start: Address, end: Address) -> Result<Self> {
        if end < start {
            return Err(ScanError::InvalidRange(format!(
                "end {} is before start {}",
                format(end),
                format(start)
            )));
        }
        Ok(Self { start, end })
    }

    /// Build a range from two dotted-decimal endpoints.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let start = parse(start).map_err(|e| ScanError::InvalidRange(e.to_string()))?;
        let end = parse(end).map_err(|e| ScanError::InvalidRange(e.to_string()))?;
        Self::new(start, end)
    }

    pub fn single(addr: Address) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn end(&self) -> Address {
        self.end
    }

    /// Number of addresses; a full /0 holds 2^32 so this is a u64.
    pub fn len(&self) -> u64 {
        u64::from(self.end) - u64::from(self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, addr: Address) -> bool {
        (self.start..=self.end).contains(&addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = Address> {
        self.start..=self.end
    }
}

impl FromStr for AddressRange {
    type Err = ScanError;

    /// Parses `start-end` with two full addresses, or a single address.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('-') {
            Some((start, end)) => AddressRange::parse(start.trim(), end.trim()),
            None => parse(s.trim()).map(AddressRange::single),
        }
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format(self.start), format(self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_malformed_text() {
        for bad in [
            "", "1.2.3", "1.2.3.4.5", "256.0.0.1", "1.2.3.-4", "1..2.3", "a.b.c.d",
            " 1.2.3.4", "1.2.3.4 ", "1.2.3.0004", "0x1.2.3.4", "1.2.3.4/24",
        ] {
            assert!(parse(bad).is_err(), "accepted '{}'", bad);
        }
    }

    #[test]
    fn test_broadcast_is_not_a_parse_failure() {
        assert_eq!(parse("255.255.255.255").unwrap(), u32::MAX);
        assert_eq!(format(u32::MAX), "255.255.255.255");
    }

    #[test]
    fn test_leading_zeros_are_decimal() {
        assert_eq!(parse("010.000.001.009").unwrap(), 0x0A00_0109);
        assert_eq!(normalize("010.000.001.009").unwrap(), "10.0.1.9");
    }

    #[test]
    fn test_ordinal_is_host_order() {
        assert_eq!(parse("192.168.1.10").unwrap(), 0xC0A8_010A);
        assert_eq!(format(0xC0A8_010A), "192.168.1.10");
    }

    #[test]
    fn test_subnet_from_prefix() {
        let subnet = Subnet::from_prefix(parse("192.168.1.77").unwrap(), 24).unwrap();
        assert_eq!(format(subnet.network), "192.168.1.0");
        assert_eq!(format(subnet.mask), "255.255.255.0");
        assert_eq!(format(subnet.broadcast), "192.168.1.255");
        assert_eq!(format(subnet.first_usable), "192.168.1.1");
        assert_eq!(format(subnet.last_usable), "192.168.1.254");
        assert_eq!(subnet.usable_range().unwrap().len(), 254);
        assert!(subnet.contains(parse("192.168.1.200").unwrap()));
        assert!(!subnet.contains(parse("192.168.2.1").unwrap()));
    }

    #[test]
    fn test_subnet_zero_prefix() {
        let subnet = Subnet::from_prefix(parse("10.1.2.3").unwrap(), 0).unwrap();
        assert_eq!(subnet.mask, 0);
        assert_eq!(subnet.network, 0);
        assert_eq!(subnet.broadcast, u32::MAX);
        assert_eq!(subnet.first_usable, 1);
        assert_eq!(subnet.last_usable, u32::MAX - 1);
        assert_eq!(subnet.full_range().len(), 1u64 << 32);
    }

    #[test]
    fn test_degenerate_prefixes_have_no_usable_range() {
        let p31 = Subnet::from_prefix(parse("10.0.0.4").unwrap(), 31).unwrap();
        assert!(p31.first_usable > p31.last_usable);
        assert!(p31.usable_range().is_none());

        let p32 = Subnet::from_prefix(parse("10.0.0.4").unwrap(), 32).unwrap();
        assert_eq!(p32.network, p32.broadcast);
        assert!(p32.usable_range().is_none());
        assert_eq!(p32.full_range().len(), 1);

        // wrapping instead of overflow at the top of the space
        let top = Subnet::from_prefix(u32::MAX, 32).unwrap();
        assert_eq!(top.first_usable, 0);
    }

    #[test]
    fn test_prefix_out_of_bounds() {
        assert!(matches!(
            Subnet::from_prefix(0, 33),
            Err(ScanError::InvalidPrefix(33))
        ));
    }

    #[test]
    fn test_subnet_from_str() {
        let subnet: Subnet = "172.16.5.9/20".parse().unwrap();
        assert_eq!(subnet.to_string(), "172.16.0.0/20");
        assert!("172.16.5.9".parse::<Subnet>().is_err());
        assert!("172.16.5.9/40".parse::<Subnet>().is_err());
    }

    #[test]
    fn test_range_validation() {
        let range = AddressRange::parse("10.0.0.1", "10.0.0.10").unwrap();
        assert_eq!(range.len(), 10);
        assert_eq!(range.iter().count(), 10);
        assert!(range.contains(parse("10.0.0.5").unwrap()));

        assert!(matches!(
            AddressRange::parse("10.0.0.10", "10.0.0.1"),
            Err(ScanError::InvalidRange(_))
        ));
        assert!(matches!(
            AddressRange::parse("10.0.0.300", "10.0.0.1"),
            Err(ScanError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_range_from_str() {
        let range: AddressRange = "192.0.2.1 - 192.0.2.20".parse().unwrap();
        assert_eq!(range.to_string(), "192.0.2.1-192.0.2.20");
        let single: AddressRange = "192.0.2.7".parse().unwrap();
        assert_eq!(single.len(), 1);
    }
}
