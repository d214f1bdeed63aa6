//! Discovery settings and the persisted form of an authorized device.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use crate::cipher::CipherKey;
use crate::constants::{DEFAULT_AES_IV, DEFAULT_DEVICE_PORT};
use crate::device::Device;
use crate::error::{BroadlinkError, Result};

/// Settings for a discovery run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// How long each probe listens for replies
    pub listen_time: Duration,
    /// Local UDP port to listen on, 0 picks one per interface
    pub listen_port: u16,
    /// Port devices listen on
    pub device_port: u16,
    /// Destination of the hello broadcast
    pub broadcast_addr: Ipv4Addr,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            listen_time: Duration::from_secs(1),
            listen_port: 0,
            device_port: DEFAULT_DEVICE_PORT,
            broadcast_addr: Ipv4Addr::BROADCAST,
        }
    }
}

impl DiscoveryConfig {
    pub fn new(listen_time: Duration, listen_port: u16) -> Self {
        Self {
            listen_time,
            listen_port,
            ..Self::default()
        }
    }

    pub(crate) fn broadcast_target(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.broadcast_addr, self.device_port))
    }
}

fn default_local_addr() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))
}

/// JSON-serializable snapshot of a [`Device`].
///
/// Storing the address, MAC, identity and key is enough to talk to an
/// authorized device again without repeating discovery or auth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub device_type: u16,
    /// MAC address as 12 hex digits
    pub mac: String,
    pub remote_addr: SocketAddr,
    #[serde(default = "default_local_addr")]
    pub local_addr: SocketAddr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub id: u32,
    /// Device AES key as hex, absent until authorized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// AES IV as hex, absent when the default IV is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
}

impl DeviceConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl From<&Device> for DeviceConfig {
    fn from(device: &Device) -> Self {
        let key = device.cipher_key();
        Self {
            device_type: device.device_type,
            mac: device.mac.map(hex::encode).unwrap_or_default(),
            remote_addr: device.remote_addr,
            local_addr: device.local_addr,
            timeout_ms: device.timeout.map(|t| t.as_millis() as u64),
            id: device.id,
            key: device.is_authorized().then(|| hex::encode(key.key)),
            iv: (key.iv != DEFAULT_AES_IV).then(|| hex::encode(key.iv)),
        }
    }
}

fn decode_hex16(field: &str, value: &str) -> Result<[u8; 16]> {
    let bytes = hex::decode(value).map_err(|e| BroadlinkError::InvalidInput(format!("{field}: {e}")))?;
    <[u8; 16]>::try_from(bytes.as_slice())
        .map_err(|_| BroadlinkError::InvalidInput(format!("{field} must be 16 bytes, got {}", bytes.len())))
}

impl TryFrom<DeviceConfig> for Device {
    type Error = BroadlinkError;

    fn try_from(config: DeviceConfig) -> Result<Self> {
        let mac = hex::decode(config.mac.replace(':', "")).map_err(|_| BroadlinkError::InvalidAddress)?;
        let mac: [u8; 6] = mac.as_slice().try_into().map_err(|_| BroadlinkError::InvalidAddress)?;

        let mut cipher_key = CipherKey::default();
        if let Some(key) = &config.key {
            cipher_key.key = decode_hex16("key", key)?;
        }
        if let Some(iv) = &config.iv {
            cipher_key.iv = decode_hex16("iv", iv)?;
        }

        let mut device = Device::new(config.remote_addr, mac, config.device_type)
            .with_local_addr(config.local_addr)
            .with_cipher_key(cipher_key);
        device.timeout = config.timeout_ms.map(Duration::from_millis);
        device.id = config.id;
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAC: [u8; 6] = [0x34, 0xea, 0x34, 0x01, 0x02, 0x03];

    #[test]
    fn test_discovery_defaults() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.device_port, 80);
        assert_eq!(config.broadcast_addr, Ipv4Addr::BROADCAST);
        assert_eq!(config.broadcast_target(), "255.255.255.255:80".parse().unwrap());

        let config = DiscoveryConfig::new(Duration::from_millis(100), 40001);
        assert_eq!(config.listen_port, 40001);
        assert_eq!(config.device_port, 80);
    }

    #[test]
    fn test_device_config_roundtrip_authorized() {
        let mut device = Device::at(Ipv4Addr::new(192, 168, 1, 20), MAC, 0x2737);
        device.id = 7;
        device.set_aes_key(&[0x42; 16]);

        let config = DeviceConfig::from(&device);
        assert_eq!(config.mac, "34ea34010203");
        assert_eq!(config.key.as_deref(), Some("42424242424242424242424242424242"));
        assert_eq!(config.iv, None);

        let json = config.to_json().unwrap();
        let restored = Device::try_from(DeviceConfig::from_json(&json).unwrap()).unwrap();
        assert_eq!(restored.mac, Some(MAC));
        assert_eq!(restored.id, 7);
        assert_eq!(restored.aes_key(), [0x42; 16]);
        assert_eq!(restored.remote_addr, device.remote_addr);
        assert_eq!(restored.device_type, 0x2737);
    }

    #[test]
    fn test_device_config_unauthorized_has_no_key() {
        let device = Device::at(Ipv4Addr::new(10, 0, 0, 2), MAC, 0x2712);
        let config = DeviceConfig::from(&device);
        assert!(config.key.is_none());
        let restored = Device::try_from(config).unwrap();
        assert!(!restored.is_authorized());
    }

    #[test]
    fn test_device_config_minimal_json() {
        let json = r#"{"device_type": 10039, "mac": "34:ea:34:01:02:03", "remote_addr": "192.168.1.20:80"}"#;
        let device = Device::try_from(DeviceConfig::from_json(json).unwrap()).unwrap();
        assert_eq!(device.mac, Some(MAC));
        assert_eq!(device.local_addr, default_local_addr());
        assert_eq!(device.id, 0);
    }

    #[test]
    fn test_device_config_rejects_bad_values() {
        let mut config = DeviceConfig::from(&Device::at(Ipv4Addr::LOCALHOST, MAC, 0));
        config.mac = "34ea34".to_string();
        assert!(matches!(Device::try_from(config.clone()), Err(BroadlinkError::InvalidAddress)));

        config.mac = "34ea34010203".to_string();
        config.key = Some("abcd".to_string());
        assert!(matches!(Device::try_from(config), Err(BroadlinkError::InvalidInput(_))));
    }
}
