//! Wi-Fi provisioning for devices in AP setup mode.
//!
//! The credentials are broadcast in clear text, once, with no reply expected.

use num_enum::IntoPrimitive;
use std::net::SocketAddr;
use strum_macros::Display;
use tracing::info;

use crate::checksum::seal;
use crate::config::DiscoveryConfig;
use crate::constants::{CMD_WIFI_SETUP, COMMAND_OFFSET, WIFI_PACKET_SIZE};
use crate::error::Result;
use crate::transport;

/// Wi-Fi security mode of the network the device should join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Default, IntoPrimitive)]
#[repr(u8)]
pub enum WifiSecurity {
    #[strum(to_string = "none")]
    None = 0,
    #[strum(to_string = "WEP")]
    Wep = 1,
    #[strum(to_string = "WPA1")]
    Wpa1 = 2,
    #[default]
    #[strum(to_string = "WPA2")]
    Wpa2 = 3,
    /// WPA1/2 CCMP
    #[strum(to_string = "WPA CCMP")]
    WpaCcmp = 4,
    #[strum(to_string = "unknown (5)")]
    Unknown5 = 5,
    /// WPA1/2 TKIP
    #[strum(to_string = "WPA TKIP")]
    WpaTkip = 6,
}

/// Longest SSID or password the packet carries
const MAX_CREDENTIAL_LEN: usize = 0x1f;

const SSID_OFFSET: usize = 0x44;
const PASSWORD_OFFSET: usize = 0x64;
const SSID_LEN_OFFSET: usize = 0x84;
const PASSWORD_LEN_OFFSET: usize = 0x85;
const SECURITY_OFFSET: usize = 0x86;

/// Build the provisioning packet. SSID and password are cut to 31 bytes.
pub fn build_wifi_packet(ssid: &str, password: &str, security: WifiSecurity) -> [u8; WIFI_PACKET_SIZE] {
    let mut packet = [0u8; WIFI_PACKET_SIZE];
    packet[COMMAND_OFFSET] = CMD_WIFI_SETUP;

    let ssid = &ssid.as_bytes()[..ssid.len().min(MAX_CREDENTIAL_LEN)];
    packet[SSID_OFFSET..SSID_OFFSET + ssid.len()].copy_from_slice(ssid);
    packet[SSID_LEN_OFFSET] = ssid.len() as u8;

    let password = &password.as_bytes()[..password.len().min(MAX_CREDENTIAL_LEN)];
    packet[PASSWORD_OFFSET..PASSWORD_OFFSET + password.len()].copy_from_slice(password);
    packet[PASSWORD_LEN_OFFSET] = password.len() as u8;

    packet[SECURITY_OFFSET] = security.into();
    seal(&mut packet);
    packet
}

/// Broadcast Wi-Fi credentials from `local_addr` to devices waiting in setup
/// mode. Only the destination of `config` is used.
pub async fn setup_wifi(
    ssid: &str,
    password: &str,
    security: WifiSecurity,
    local_addr: SocketAddr,
    config: &DiscoveryConfig,
) -> Result<()> {
    let packet = build_wifi_packet(ssid, password, security);
    let socket = transport::bind_broadcast(local_addr).await?;
    socket.send_to(&packet, config.broadcast_target()).await?;
    info!(%ssid, %security, "Wi-Fi credentials broadcast");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::verify;

    #[test]
    fn test_wifi_packet_layout() {
        let packet = build_wifi_packet("home", "secret", WifiSecurity::WpaTkip);
        assert_eq!(packet[0x26], 0x14);
        assert_eq!(&packet[0x44..0x48], b"home");
        assert_eq!(packet[0x84], 4);
        assert_eq!(&packet[0x64..0x6a], b"secret");
        assert_eq!(packet[0x85], 6);
        assert_eq!(packet[0x86], 6);
        assert!(verify(&packet));
    }

    #[test]
    fn test_wifi_credentials_truncated() {
        let long = "a".repeat(40);
        let packet = build_wifi_packet(&long, &long, WifiSecurity::None);
        assert_eq!(packet[0x84], 0x1f);
        assert_eq!(packet[0x85], 0x1f);
        // SSID must not spill into the password field
        assert_eq!(packet[0x44 + 0x1f], 0);
        assert_eq!(packet[0x86], 0);
    }

    #[tokio::test]
    async fn test_setup_wifi_reaches_target() {
        let receiver = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = DiscoveryConfig {
            broadcast_addr: std::net::Ipv4Addr::LOCALHOST,
            device_port: receiver.local_addr().unwrap().port(),
            ..DiscoveryConfig::default()
        };

        setup_wifi("net", "pw", WifiSecurity::Wpa2, "127.0.0.1:0".parse().unwrap(), &config)
            .await
            .unwrap();

        let mut buf = [0u8; 256];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(len, WIFI_PACKET_SIZE);
        assert_eq!(buf[0x26], 0x14);
        assert_eq!(buf[0x86], 3);
    }
}
