//! ICMP echo reachability probe
//!
//! Each ping opens its own socket so that concurrent workers never read each
//! other's replies. Three transports are tried in order when the pinger is
//! created:
//!
//! 1. an unprivileged datagram ICMP socket (Linux `ping_group_range`, macOS),
//! 2. a raw ICMP socket (root / `CAP_NET_RAW`),
//! 3. the system `ping` binary.
//!
//! Whatever the transport, a ping is one echo request with a bounded wait and
//! no retry. A send failure or a timeout both mean "down".

use crate::{Result, ScanError};
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{self, IcmpCode, IcmpPacket, IcmpTypes};
use pnet::packet::Packet;
use rand::Rng;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Echo payload carried by every request.
pub const PING_PAYLOAD: &[u8] = b"ping";

const ICMP_HEADER_LEN: usize = 8;
const RECV_BUFFER_LEN: usize = 1500;

/// ICMP ping result
#[derive(Debug, Clone)]
pub struct PingResult {
    pub target: Ipv4Addr,
    pub success: bool,
    pub rtt: Option<Duration>,
    pub error: Option<String>,
}

impl PingResult {
    fn reply(target: Ipv4Addr, rtt: Duration) -> Self {
        Self {
            target,
            success: true,
            rtt: Some(rtt),
            error: None,
        }
    }

    fn failed(target: Ipv4Addr, error: impl Into<String>) -> Self {
        Self {
            target,
            success: false,
            rtt: None,
            error: Some(error.into()),
        }
    }
}

/// How echo requests leave the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingTransport {
    Datagram,
    Raw,
    Command,
}

impl PingTransport {
    fn socket_type(self) -> Option<Type> {
        match self {
            PingTransport::Datagram => Some(Type::DGRAM),
            PingTransport::Raw => Some(Type::RAW),
            PingTransport::Command => None,
        }
    }
}

/// ICMP pinger shared by all workers of a scan
pub struct IcmpPinger {
    transport: PingTransport,
    identifier: u16,
    sequence: AtomicU16,
}

impl IcmpPinger {
    /// Pick the best transport available to this process.
    pub fn new() -> Result<Self> {
        let transport = Self::detect_transport()?;
        log::debug!("ICMP transport selected: {:?}", transport);
        Ok(Self::with_transport(transport))
    }

    pub fn with_transport(transport: PingTransport) -> Self {
        Self {
            transport,
            identifier: rand::thread_rng().gen::<u16>(),
            sequence: AtomicU16::new(0),
        }
    }

    pub fn transport(&self) -> PingTransport {
        self.transport
    }

    fn detect_transport() -> Result<PingTransport> {
        let mut last_error = None;
        for transport in [PingTransport::Datagram, PingTransport::Raw] {
            match open_socket(transport) {
                Ok(_) => return Ok(transport),
                Err(e) => {
                    log::debug!("{:?} ICMP socket unavailable: {}", transport, e);
                    last_error = Some(e);
                }
            }
        }

        if find_ping_binary().is_some() {
            log::warn!("No ICMP socket available, falling back to the system ping binary");
            return Ok(PingTransport::Command);
        }

        Err(ScanError::NetworkInit(match last_error {
            Some(e) => format!("no ICMP socket ({}) and no ping binary in PATH", e),
            None => "no ICMP transport available".to_string(),
        }))
    }

    /// Send one echo request and wait up to `timeout_duration` for the reply.
    pub async fn ping(&self, target: Ipv4Addr, timeout_duration: Duration) -> PingResult {
        let result = match self.transport {
            PingTransport::Command => ping_command(target, timeout_duration).await,
            transport => {
                let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
                ping_socket(transport, target, self.identifier, sequence, timeout_duration).await
            }
        };

        match result {
            Ok(Some(rtt)) => PingResult::reply(target, rtt),
            Ok(None) => PingResult::failed(target, "Timeout"),
            Err(e) => PingResult::failed(target, e.to_string()),
        }
    }
}

fn open_socket(transport: PingTransport) -> Result<Socket> {
    let socket_type = transport
        .socket_type()
        .ok_or_else(|| ScanError::Network("command transport has no socket".to_string()))?;
    let socket = Socket::new(Domain::IPV4, socket_type, Some(Protocol::ICMPV4))
        .map_err(|e| ScanError::from_socket_error(e, "ICMP socket"))?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// Build an echo request with a valid checksum.
pub fn build_echo_request(identifier: u16, sequence: u16, payload: &[u8]) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; ICMP_HEADER_LEN + payload.len()];
    {
        let mut request = MutableEchoRequestPacket::new(&mut buffer)
            .ok_or_else(|| ScanError::Network("echo request buffer too small".to_string()))?;
        request.set_icmp_type(IcmpTypes::EchoRequest);
        request.set_icmp_code(IcmpCode::new(0));
        request.set_identifier(identifier);
        request.set_sequence_number(sequence);
        request.set_payload(payload);
    }

    let checksum = IcmpPacket::new(&buffer)
        .map(|packet| icmp::checksum(&packet))
        .ok_or_else(|| ScanError::Network("echo request buffer too small".to_string()))?;
    buffer[2..4].copy_from_slice(&checksum.to_be_bytes());
    Ok(buffer)
}

/// Check whether `bytes` is the echo reply we are waiting for.
///
/// Raw sockets deliver the IPv4 header in front of the ICMP message and see
/// every reply on the host, so the identifier is checked there. Datagram
/// sockets get only their own traffic and the kernel rewrites the identifier.
pub fn is_matching_reply(bytes: &[u8], identifier: Option<u16>, sequence: u16) -> bool {
    let icmp_bytes = match bytes.first() {
        Some(first) if first >> 4 == 4 => {
            let header_len = usize::from(first & 0x0f) * 4;
            match bytes.get(header_len..) {
                Some(rest) => rest,
                None => return false,
            }
        }
        Some(_) => bytes,
        None => return false,
    };

    let Some(reply) = EchoReplyPacket::new(icmp_bytes) else {
        return false;
    };

    reply.get_icmp_type() == IcmpTypes::EchoReply
        && reply.get_sequence_number() == sequence
        && identifier.map_or(true, |id| reply.get_identifier() == id)
        && reply.payload().starts_with(PING_PAYLOAD)
}

async fn ping_socket(
    transport: PingTransport,
    target: Ipv4Addr,
    identifier: u16,
    sequence: u16,
    timeout_duration: Duration,
) -> Result<Option<Duration>> {
    let socket = UdpSocket::from_std(open_socket(transport)?.into())?;
    let request = build_echo_request(identifier, sequence, PING_PAYLOAD)?;
    let destination = SocketAddr::new(IpAddr::V4(target), 0);

    let started = Instant::now();
    socket.send_to(&request, destination).await?;

    let expected_identifier = (transport == PingTransport::Raw).then_some(identifier);
    let deadline = started + timeout_duration;
    let mut buffer = [0u8; RECV_BUFFER_LEN];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }

        match timeout(remaining, socket.recv_from(&mut buffer)).await {
            Ok(Ok((len, from))) => {
                if from.ip() == IpAddr::V4(target)
                    && is_matching_reply(&buffer[..len], expected_identifier, sequence)
                {
                    return Ok(Some(started.elapsed()));
                }
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Ok(None),
        }
    }
}

async fn ping_command(target: Ipv4Addr, timeout_duration: Duration) -> Result<Option<Duration>> {
    let binary = find_ping_binary()
        .ok_or_else(|| ScanError::Network("ping binary not found".to_string()))?;
    let wait = wait_argument(timeout_duration);

    let started = Instant::now();
    let child = tokio::process::Command::new(binary)
        .args(["-c", "1", "-W", &wait])
        .arg(target.to_string())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .status();

    // iputils' -W is whole seconds, so allow for the rounding
    match timeout(timeout_duration + Duration::from_millis(250), child).await {
        Ok(Ok(status)) if status.success() => Ok(Some(started.elapsed())),
        Ok(Ok(_)) => Ok(None),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Ok(None),
    }
}

/// Value for `ping -W`: milliseconds on the BSD-derived pings, whole
/// seconds (rounded up) on iputils.
fn wait_argument(timeout: Duration) -> String {
    let millis = timeout.as_millis().max(1);
    if cfg!(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    )) {
        millis.to_string()
    } else {
        ((millis + 999) / 1000).to_string()
    }
}

fn find_ping_binary() -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join("ping"))
        .find(|candidate| candidate.is_file())
}
