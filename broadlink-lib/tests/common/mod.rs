//! Common test utilities: a loopback stand-in for a Broadlink device.

// Allow unused imports and dead code since this is a shared module
// used across multiple test files - not all items are used in every test file
#[allow(unused_imports)]
pub use broadlink_lib::checksum::{checksum, verify};
#[allow(unused_imports)]
pub use broadlink_lib::cipher::CipherKey;
#[allow(unused_imports)]
pub use broadlink_lib::config::DiscoveryConfig;
#[allow(unused_imports)]
pub use broadlink_lib::constants::HEADER_SIZE;
#[allow(unused_imports)]
pub use broadlink_lib::device::Device;
#[allow(unused_imports)]
pub use broadlink_lib::error::BroadlinkError;
#[allow(unused_imports)]
pub use broadlink_lib::remote::RemoteType;
#[allow(unused_imports)]
pub use std::net::{Ipv4Addr, SocketAddr};
#[allow(unused_imports)]
pub use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

#[allow(dead_code)]
pub const MAC: [u8; 6] = [0x34, 0xea, 0x34, 0xb4, 0x5c, 0x21];

#[allow(dead_code)]
pub const DEVICE_TYPE: u16 = 0x2737;

/// A UDP socket on 127.0.0.1 playing the device side of the protocol.
pub struct FakeDevice {
    socket: UdpSocket,
    pub addr: SocketAddr,
}

#[allow(dead_code)]
impl FakeDevice {
    pub async fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind fake device");
        let addr = socket.local_addr().expect("fake device addr");
        Self { socket, addr }
    }

    /// A client-side `Device` pointing at this fake.
    pub fn client(&self) -> Device {
        Device::new(self.addr, MAC, DEVICE_TYPE)
            .with_local_addr("127.0.0.1:0".parse().unwrap())
            .with_timeout(Duration::from_secs(2))
    }

    pub async fn recv(&self) -> (Vec<u8>, SocketAddr) {
        let mut buf = vec![0u8; 2048];
        let (len, from) = self.socket.recv_from(&mut buf).await.expect("fake device recv");
        buf.truncate(len);
        (buf, from)
    }

    pub async fn send_to(&self, packet: &[u8], to: SocketAddr) {
        self.socket.send_to(packet, to).await.expect("fake device send");
    }

    /// Handle `count` requests on a background task. `respond` maps each
    /// request to the raw reply, or `None` to stay silent. The task yields
    /// every request it saw.
    pub fn serve<F>(self, count: usize, mut respond: F) -> JoinHandle<Vec<Vec<u8>>>
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut requests = Vec::with_capacity(count);
            for _ in 0..count {
                let (request, from) = self.recv().await;
                if let Some(reply) = respond(&request) {
                    self.socket.send_to(&reply, from).await.expect("fake device send");
                }
                requests.push(request);
            }
            requests
        })
    }
}

/// Counter carried by a request packet.
#[allow(dead_code)]
pub fn request_counter(request: &[u8]) -> u16 {
    u16::from_le_bytes([request[0x28], request[0x29]])
}

/// Build a device response echoing the counter of `request`.
#[allow(dead_code)]
pub fn response_packet(request: &[u8], mac: [u8; 6], result_code: u16, payload: &[u8], key: &CipherKey) -> Vec<u8> {
    let mut packet = vec![0u8; HEADER_SIZE];
    packet[0..8].copy_from_slice(&[0x5a, 0xa5, 0xaa, 0x55, 0x5a, 0xa5, 0xaa, 0x55]);
    packet[0x22..0x24].copy_from_slice(&result_code.to_le_bytes());
    packet[0x24] = 0x2a;
    packet[0x25] = 0x27;
    packet[0x26] = request[0x26];
    packet[0x28..0x2a].copy_from_slice(&request[0x28..0x2a]);
    for i in 0..6 {
        packet[0x2a + i] = mac[5 - i];
    }
    packet[0x30..0x34].copy_from_slice(&request[0x30..0x34]);
    packet[0x34..0x36].copy_from_slice(&checksum(payload).to_le_bytes());
    packet.extend_from_slice(&key.encrypt(payload));

    let sum = checksum(&packet);
    packet[0x20..0x22].copy_from_slice(&sum.to_le_bytes());
    packet
}

/// A successful response with no body beyond the header fields.
#[allow(dead_code)]
pub fn ok_response(request: &[u8]) -> Vec<u8> {
    response_packet(request, MAC, 0, &[0u8; 16], &CipherKey::default())
}

/// Decrypt the payload of a request sent with `key`.
#[allow(dead_code)]
pub fn request_payload(request: &[u8], key: &CipherKey) -> Vec<u8> {
    key.decrypt(&request[HEADER_SIZE..])
}

/// A hello reply as a device would send it.
#[allow(dead_code)]
pub fn hello_reply(embedded_ip: Ipv4Addr, mac: [u8; 6], device_type: u16) -> Vec<u8> {
    let mut packet = vec![0u8; 0x80];
    packet[0x26] = 0x07;
    packet[0x34..0x36].copy_from_slice(&device_type.to_le_bytes());
    let ip = embedded_ip.octets();
    for i in 0..4 {
        packet[0x36 + i] = ip[3 - i];
    }
    for i in 0..6 {
        packet[0x3a + i] = mac[5 - i];
    }
    packet[0x40..0x48].copy_from_slice(b"RM mini3");
    let sum = checksum(&packet);
    packet[0x20..0x22].copy_from_slice(&sum.to_le_bytes());
    packet
}
