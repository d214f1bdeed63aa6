use bytes::Bytes;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tracing::{debug, info};

use crate::cipher::CipherKey;
use crate::constants::{
    AUTH_PAYLOAD_MAX, AUTH_PAYLOAD_MIN, CMD_AUTH, DEFAULT_DEVICE_PORT, DEFAULT_TIMEOUT, LOCAL_ID_SIZE,
};
use crate::error::{BroadlinkError, Result};
use crate::packet::{self, SessionHeader};
use crate::transport;

/// A Broadlink device and the credentials negotiated with it.
///
/// Discovery fills in the type, addresses and MAC; [`Device::auth`] sets the
/// identity and the device-specific AES key. Once authorized the device can be
/// stored (see [`crate::config::DeviceConfig`]) and reused later.
///
/// Calls take `&mut self`: the request counter and key are updated in place,
/// so one `Device` serves one caller at a time.
#[derive(Clone)]
pub struct Device {
    /// Type code reported by the device
    pub device_type: u16,
    /// MAC address of the device
    pub mac: Option<[u8; 6]>,
    /// Address the device listens on
    pub remote_addr: SocketAddr,
    /// Local address calls are sent from
    pub local_addr: SocketAddr,
    /// Per-call timeout, [`DEFAULT_TIMEOUT`] when unset
    pub timeout: Option<Duration>,
    /// Identity assigned by the device on auth
    pub id: u32,
    counter: u16,
    key: CipherKey,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("device_type", &format_args!("{:#06x}", self.device_type))
            .field("mac", &self.mac.map(hex::encode))
            .field("remote_addr", &self.remote_addr)
            .field("local_addr", &self.local_addr)
            .field("id", &self.id)
            .field("counter", &self.counter)
            .field("authorized", &!self.key.is_default_key())
            .finish()
    }
}

impl Device {
    pub fn new(remote_addr: SocketAddr, mac: [u8; 6], device_type: u16) -> Self {
        Self {
            device_type,
            mac: Some(mac),
            remote_addr,
            local_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)),
            timeout: None,
            id: 0,
            counter: 0,
            key: CipherKey::default(),
        }
    }

    /// A device at `ip` on the standard device port.
    pub fn at(ip: Ipv4Addr, mac: [u8; 6], device_type: u16) -> Self {
        Self::new(SocketAddr::V4(SocketAddrV4::new(ip, DEFAULT_DEVICE_PORT)), mac, device_type)
    }

    pub fn with_local_addr(mut self, local_addr: SocketAddr) -> Self {
        self.local_addr = local_addr;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cipher_key(mut self, key: CipherKey) -> Self {
        self.key = key;
        self
    }

    /// Counter value carried by the most recent request.
    pub fn counter(&self) -> u16 {
        self.counter
    }

    pub fn cipher_key(&self) -> &CipherKey {
        &self.key
    }

    /// The AES key in effect: the device key after auth, the default key before.
    pub fn aes_key(&self) -> [u8; 16] {
        self.key.key
    }

    /// Install a device key. A key of the wrong length, or one equal to the
    /// default key, reverts to the default.
    pub fn set_aes_key(&mut self, key: &[u8]) {
        let iv = self.key.iv;
        self.key = match <[u8; 16]>::try_from(key) {
            Ok(key) => CipherKey::new(key, iv),
            Err(_) => CipherKey::new(CipherKey::default().key, iv),
        };
    }

    /// Override the IV used with the current key.
    pub fn set_aes_iv(&mut self, iv: [u8; 16]) {
        self.key.iv = iv;
    }

    pub fn is_authorized(&self) -> bool {
        !self.key.is_default_key()
    }

    pub fn encrypt(&self, data: &[u8]) -> Vec<u8> {
        self.key.encrypt(data)
    }

    pub fn decrypt(&self, data: &[u8]) -> Vec<u8> {
        self.key.decrypt(data)
    }

    fn timeout(&self) -> Duration {
        match self.timeout {
            Some(t) if !t.is_zero() => t,
            _ => DEFAULT_TIMEOUT,
        }
    }

    /// Bump the counter and build the next request packet.
    fn next_packet(&mut self, command: u8, payload: &[u8]) -> Result<(SessionHeader, Bytes)> {
        let mac = self.mac.ok_or(BroadlinkError::InvalidAddress)?;
        self.counter = self.counter.wrapping_add(1);

        let session = SessionHeader {
            counter: self.counter,
            mac,
            id: self.id,
        };
        let packet = packet::build_command(&session, &self.key, command, payload);
        Ok((session, packet))
    }

    /// Send a command and wait for the matching response.
    ///
    /// The raw response is returned once its checksum, counter and MAC have
    /// been validated; use [`Device::payload`] to decrypt its body.
    pub async fn call(&mut self, command: u8, payload: &[u8]) -> Result<Bytes> {
        let (session, request) = self.next_packet(command, payload)?;
        debug!(command = format_args!("{:#04x}", command), counter = session.counter, "Device call");

        let response = transport::exchange(self.local_addr, self.remote_addr, &request, self.timeout()).await?;
        packet::parse_response(&session, &response)?;
        Ok(response)
    }

    /// Send a command without waiting for a response.
    pub async fn cmd(&mut self, command: u8, payload: &[u8]) -> Result<()> {
        let (session, request) = self.next_packet(command, payload)?;
        debug!(command = format_args!("{:#04x}", command), counter = session.counter, "Device cmd");
        transport::send(self.local_addr, self.remote_addr, &request, self.timeout()).await
    }

    /// Decrypt the body of a response packet.
    pub fn payload(&self, response: &[u8]) -> Result<Vec<u8>> {
        packet::extract_payload(&self.key, response)
    }

    /// Authorize the local machine with the device.
    ///
    /// `local_id` (15 bytes) identifies this machine; the device may remember
    /// it and hand back the same identity and key on later calls. On success
    /// [`Device::id`] and the AES key are replaced with the device's values.
    pub async fn auth(&mut self, local_id: &[u8], local_name: &str) -> Result<()> {
        if local_id.len() != LOCAL_ID_SIZE {
            return Err(BroadlinkError::InvalidInput(format!(
                "local id must be {} bytes long, got {}",
                LOCAL_ID_SIZE,
                local_id.len()
            )));
        }

        let payload = auth_payload(local_id, local_name);
        let response = self.call(CMD_AUTH, &payload).await?;
        let data = self.payload(&response)?;
        if data.len() < 0x14 {
            return Err(BroadlinkError::InsufficientData {
                expected: 0x14,
                actual: data.len(),
            });
        }

        self.set_aes_key(&data[0x04..0x14]);
        self.id = u32::from_le_bytes(data[0x00..0x04].try_into()?);

        info!(id = self.id, remote = %self.remote_addr, "Device authorized");
        Ok(())
    }
}

/// Auth payload size for a local name, clamped to `0x50..=0x80`.
pub(crate) fn auth_payload_size(local_name: &str) -> usize {
    let name_len = local_name.len().saturating_sub(1) / 16 * 16;
    (0x30 + name_len).clamp(AUTH_PAYLOAD_MIN, AUTH_PAYLOAD_MAX)
}

pub(crate) fn auth_payload(local_id: &[u8], local_name: &str) -> Vec<u8> {
    let mut payload = vec![0u8; auth_payload_size(local_name)];
    payload[0x04..0x04 + LOCAL_ID_SIZE].copy_from_slice(local_id);
    payload[0x2d] = 0x01;

    let name = local_name.as_bytes();
    let room = payload.len() - 0x30;
    let n = name.len().min(room);
    payload[0x30..0x30 + n].copy_from_slice(&name[..n]);
    payload
}
