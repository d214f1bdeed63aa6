//! Broadcast discovery of Broadlink devices.
//!
//! A probe binds a UDP socket to one local IPv4 address, broadcasts a 0x30-byte
//! "hello" (command 0x06) carrying the local time and the socket's own address,
//! then collects "hello reply" packets (command 0x07) until its listen time
//! runs out.
//!
//! Replies are accepted only when the checksum is valid and the IP address
//! the device reports about itself equals the datagram's source address.
//! Anything else is dropped as corrupted or spoofed.
//!
//! [`discover_all`] runs one probe per local IPv4 address concurrently and
//! merges their results.

use chrono::{DateTime, Datelike, Local, Offset, TimeZone, Timelike};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};
use zerocopy::byteorder::little_endian::{I32, U16};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::checksum::{seal, verify};
use crate::config::DiscoveryConfig;
use crate::constants::{CMD_HELLO, CMD_HELLO_REPLY, HELLO_PACKET_SIZE, RECV_BUFFER_SIZE};
use crate::device::Device;
use crate::error::{BroadlinkError, InterfaceFailure, Result};
use crate::packet::reverse_mac;
use crate::transport;

/// Layout of the 0x30-byte hello broadcast.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct HelloPacket {
    pub reserved0: [u8; 8],
    /// UTC offset in whole hours
    pub timezone: I32,
    pub year: U16,
    pub second: u8,
    pub minute: u8,
    pub hour: u8,
    /// Days since Sunday
    pub weekday: u8,
    pub day: u8,
    pub month: u8,
    pub reserved1: [u8; 4],
    pub ip_reversed: [u8; 4],
    pub port: U16,
    pub reserved2: [u8; 2],
    pub checksum: U16,
    pub reserved3: [u8; 4],
    pub command: u8,
    pub reserved4: [u8; 9],
}

/// Leading 0x40 bytes of a hello reply.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct HelloReply {
    pub reserved0: [u8; 0x20],
    pub checksum: U16,
    pub reserved1: [u8; 4],
    pub command: u8,
    pub reserved2: [u8; 0x0d],
    pub device_type: U16,
    pub ip_reversed: [u8; 4],
    pub mac_reversed: [u8; 6],
}

impl HelloReply {
    pub fn ip(&self) -> Ipv4Addr {
        let [a, b, c, d] = self.ip_reversed;
        Ipv4Addr::new(d, c, b, a)
    }
}

fn reverse_ip(ip: Ipv4Addr) -> [u8; 4] {
    let [a, b, c, d] = ip.octets();
    [d, c, b, a]
}

/// Build the hello broadcast for a socket bound to `bound`, stamped with `now`.
pub fn build_hello<Tz: TimeZone>(bound: SocketAddrV4, now: &DateTime<Tz>) -> [u8; HELLO_PACKET_SIZE] {
    let mut hello = HelloPacket::new_zeroed();
    hello.timezone = I32::new(now.offset().fix().local_minus_utc() / 3600);
    hello.year = U16::new(now.year() as u16);
    hello.second = now.second() as u8;
    hello.minute = now.minute() as u8;
    hello.hour = now.hour() as u8;
    hello.weekday = now.weekday().num_days_from_sunday() as u8;
    hello.day = now.day() as u8;
    hello.month = now.month() as u8;
    hello.ip_reversed = reverse_ip(*bound.ip());
    hello.port = U16::new(bound.port());
    hello.command = CMD_HELLO;

    let mut packet = [0u8; HELLO_PACKET_SIZE];
    packet.copy_from_slice(hello.as_bytes());
    seal(&mut packet);
    packet
}

/// Why a reply was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Checksum,
    TooShort,
    NotHelloReply(u8),
    /// The embedded address disagrees with the datagram source.
    AddressMismatch(Ipv4Addr),
}

/// Validate one reply received from `source` and turn it into a [`Device`]
/// bound to `local_addr`.
pub fn parse_hello_reply(
    packet: &[u8],
    source: SocketAddr,
    local_addr: SocketAddr,
) -> std::result::Result<Device, RejectReason> {
    if !verify(packet) {
        return Err(RejectReason::Checksum);
    }
    let (reply, _) = HelloReply::ref_from_prefix(packet).map_err(|_| RejectReason::TooShort)?;
    if reply.command != CMD_HELLO_REPLY {
        return Err(RejectReason::NotHelloReply(reply.command));
    }

    let embedded = reply.ip();
    if source.ip() != IpAddr::V4(embedded) {
        return Err(RejectReason::AddressMismatch(embedded));
    }

    Ok(Device::new(source, reverse_mac(&reply.mac_reversed), reply.device_type.get()).with_local_addr(local_addr))
}

impl DiscoveryConfig {
    fn check_listen_time(&self) -> Result<()> {
        if self.listen_time.is_zero() {
            return Err(BroadlinkError::InvalidInput(
                "a positive listen time must be given".to_string(),
            ));
        }
        Ok(())
    }

    /// Probe for devices reachable from `local_addr`.
    ///
    /// Always listens for the full listen time unless an I/O error occurs.
    /// Port 0 in `local_addr` picks an ephemeral port.
    pub async fn discover_from(&self, local_addr: SocketAddr) -> Result<Vec<Device>> {
        if !local_addr.is_ipv4() {
            return Err(BroadlinkError::InvalidInput(format!(
                "discovery needs an IPv4 address, got {local_addr}"
            )));
        }

        let deadline = Instant::now() + self.listen_time;
        let socket = transport::bind_broadcast(local_addr).await?;
        let bound = match socket.local_addr()? {
            SocketAddr::V4(bound) => bound,
            SocketAddr::V6(bound) => {
                return Err(BroadlinkError::InvalidInput(format!("bound to IPv6 address {bound}")));
            }
        };

        let hello = build_hello(bound, &Local::now());
        let target = self.broadcast_target();
        debug!(bytes = hex::encode(hello), %bound, %target, "Hello broadcast");
        timeout_at(deadline, socket.send_to(&hello, target)).await??;

        let mut devices = Vec::new();
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            let (len, source) = match timeout_at(deadline, socket.recv_from(&mut buf)).await {
                Ok(received) => received?,
                // Listen time is over
                Err(_) => break,
            };
            if len == 0 {
                continue;
            }

            match parse_hello_reply(&buf[..len], source, local_addr) {
                Ok(device) => {
                    debug!(?device, "Hello reply");
                    devices.push(device);
                }
                Err(reason) => debug!(%source, ?reason, "Discarding discovery reply"),
            }
        }

        info!(local = %local_addr, found = devices.len(), "Discovery probe finished");
        Ok(devices)
    }

    /// Probe every local IPv4 address concurrently and merge the results.
    ///
    /// Every per-address failure is reported in [`BroadlinkError::Discovery`],
    /// together with the devices the other probes found.
    pub async fn discover_all(&self) -> Result<Vec<Device>> {
        self.check_listen_time()?;
        let addrs = local_ipv4_addrs()?;
        self.discover_on(addrs).await
    }

    /// Probe from each of `addrs` concurrently, on [`DiscoveryConfig::listen_port`].
    ///
    /// Results are merged; failures are collected the same way as in
    /// [`DiscoveryConfig::discover_all`].
    pub async fn discover_on(&self, addrs: Vec<Ipv4Addr>) -> Result<Vec<Device>> {
        self.check_listen_time()?;
        info!(interfaces = addrs.len(), "Starting discovery");

        let mut probes = JoinSet::new();
        for ip in addrs {
            let config = self.clone();
            probes.spawn(async move {
                let local = SocketAddr::V4(SocketAddrV4::new(ip, config.listen_port));
                (ip, config.discover_from(local).await)
            });
        }

        let mut found = Vec::new();
        let mut failures = Vec::new();
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((_, Ok(devices))) => found.extend(devices),
                Ok((addr, Err(error))) => {
                    warn!(%addr, %error, "Discovery probe failed");
                    failures.push(InterfaceFailure { addr, error });
                }
                Err(e) => {
                    warn!(error = %e, "Discovery probe task aborted");
                    failures.push(InterfaceFailure {
                        addr: Ipv4Addr::UNSPECIFIED,
                        error: BroadlinkError::Io(std::io::Error::other(e)),
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(found)
        } else {
            Err(BroadlinkError::Discovery { found, failures })
        }
    }
}

/// Probe for devices reachable from `local_addr` for `listen_time`.
pub async fn discover_from(listen_time: Duration, local_addr: SocketAddr) -> Result<Vec<Device>> {
    DiscoveryConfig {
        listen_time,
        ..DiscoveryConfig::default()
    }
    .discover_from(local_addr)
    .await
}

/// Discover devices on every local IPv4 network. `listen_port` 0 lets each
/// probe pick its own port; otherwise make sure the port is not firewalled.
pub async fn discover_all(listen_time: Duration, listen_port: u16) -> Result<Vec<Device>> {
    DiscoveryConfig::new(listen_time, listen_port).discover_all().await
}

/// All IPv4 addresses bound to local interfaces.
pub fn local_ipv4_addrs() -> Result<Vec<Ipv4Addr>> {
    let addrs = if_addrs::get_if_addrs()?
        .into_iter()
        .filter_map(|iface| match iface.ip() {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
        .collect();
    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::checksum;
    use chrono::FixedOffset;

    fn reply(embedded: Ipv4Addr, command: u8) -> Vec<u8> {
        let mut packet = vec![0u8; 0x80];
        packet[0x26] = command;
        packet[0x34..0x36].copy_from_slice(&0x2737u16.to_le_bytes());
        packet[0x36..0x3a].copy_from_slice(&reverse_ip(embedded));
        packet[0x3a..0x40].copy_from_slice(&[0x03, 0x02, 0x01, 0x34, 0xea, 0x34]);
        seal(&mut packet);
        packet
    }

    fn source(ip: Ipv4Addr) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(ip, 80))
    }

    const LOCAL: &str = "192.168.1.5:0";

    #[test]
    fn test_layout_sizes() {
        assert_eq!(std::mem::size_of::<HelloPacket>(), HELLO_PACKET_SIZE);
        assert_eq!(std::mem::size_of::<HelloReply>(), 0x40);
    }

    #[test]
    fn test_build_hello_layout() {
        let tz = FixedOffset::east_opt(9 * 3600).unwrap();
        // Wednesday
        let now = tz.with_ymd_and_hms(2024, 3, 13, 21, 45, 30).unwrap();
        let bound = SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 5), 40001);
        let packet = build_hello(bound, &now);

        assert_eq!(&packet[0x08..0x0c], &9i32.to_le_bytes());
        assert_eq!(&packet[0x0c..0x0e], &2024u16.to_le_bytes());
        assert_eq!(&packet[0x0e..0x14], &[30, 45, 21, 3, 13, 3]);
        assert_eq!(&packet[0x18..0x1c], &[5, 1, 168, 192]);
        assert_eq!(&packet[0x1c..0x1e], &40001u16.to_le_bytes());
        assert_eq!(packet[0x26], 0x06);
        assert!(verify(&packet));

        let mut unsealed = packet;
        unsealed[0x20] = 0;
        unsealed[0x21] = 0;
        assert_eq!(&packet[0x20..0x22], &checksum(&unsealed).to_le_bytes());
    }

    #[test]
    fn test_build_hello_negative_timezone() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap();
        let packet = build_hello(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 1), &now);
        assert_eq!(&packet[0x08..0x0c], &(-5i32).to_le_bytes());
    }

    #[test]
    fn test_parse_hello_reply_accepts_matching_source() {
        let ip = Ipv4Addr::new(192, 168, 1, 20);
        let device = parse_hello_reply(&reply(ip, 0x07), source(ip), LOCAL.parse().unwrap()).unwrap();
        assert_eq!(device.device_type, 0x2737);
        assert_eq!(device.mac, Some([0x34, 0xea, 0x34, 0x01, 0x02, 0x03]));
        assert_eq!(device.remote_addr, source(ip));
        assert_eq!(device.local_addr, LOCAL.parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_parse_hello_reply_rejects_spoofed_address() {
        let packet = reply(Ipv4Addr::new(10, 0, 0, 9), 0x07);
        assert_eq!(
            parse_hello_reply(&packet, source(Ipv4Addr::new(192, 168, 1, 20)), LOCAL.parse().unwrap()).unwrap_err(),
            RejectReason::AddressMismatch(Ipv4Addr::new(10, 0, 0, 9))
        );
    }

    #[test]
    fn test_parse_hello_reply_rejects_wrong_command_and_checksum() {
        let ip = Ipv4Addr::new(192, 168, 1, 20);
        assert_eq!(
            parse_hello_reply(&reply(ip, 0x06), source(ip), LOCAL.parse().unwrap()).unwrap_err(),
            RejectReason::NotHelloReply(0x06)
        );

        let mut corrupted = reply(ip, 0x07);
        corrupted[0x50] ^= 0xff;
        assert_eq!(
            parse_hello_reply(&corrupted, source(ip), LOCAL.parse().unwrap()).unwrap_err(),
            RejectReason::Checksum
        );

        let mut short = vec![0u8; 0x30];
        seal(&mut short);
        assert_eq!(
            parse_hello_reply(&short, source(ip), LOCAL.parse().unwrap()).unwrap_err(),
            RejectReason::TooShort
        );
    }

    #[tokio::test]
    async fn test_discover_all_rejects_zero_listen_time() {
        assert!(matches!(
            discover_all(Duration::ZERO, 0).await,
            Err(BroadlinkError::InvalidInput(_))
        ));
    }
}
