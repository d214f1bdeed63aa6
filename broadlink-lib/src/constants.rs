// Protocol constants for the Broadlink UDP protocol

use std::time::Duration;

/// Size of the command packet header (56 bytes)
pub const HEADER_SIZE: usize = 0x38;

/// Size of the discovery hello packet (48 bytes)
pub const HELLO_PACKET_SIZE: usize = 0x30;

/// Size of the Wi-Fi provisioning packet (136 bytes)
pub const WIFI_PACKET_SIZE: usize = 0x88;

/// Minimum packet length that still holds the checksum field
pub const MIN_CHECKSUM_PACKET_SIZE: usize = 0x22;

/// Magic preamble at the start of every command packet
pub const PACKET_MAGIC: [u8; 8] = [0x5a, 0xa5, 0xaa, 0x55, 0x5a, 0xa5, 0xaa, 0x55];

/// Fixed marker at 0x24 of command packets
pub const PACKET_MARKER: u16 = 0x272a;

/// Offset of the whole-packet checksum (little-endian u16)
pub const CHECKSUM_OFFSET: usize = 0x20;

/// Offset of the device result code in responses (little-endian u16)
pub const RESULT_CODE_OFFSET: usize = 0x22;

/// Offset of the command byte
pub const COMMAND_OFFSET: usize = 0x26;

/// Offset of the request counter (little-endian u16)
pub const COUNTER_OFFSET: usize = 0x28;

/// Offset of the reversed MAC address
pub const MAC_OFFSET: usize = 0x2a;

/// Seed of the 16-bit additive checksum
pub const CHECKSUM_SEED: u16 = 0xbeaf;

/// AES block size
pub const BLOCK_SIZE: usize = 16;

/// Default AES key shared by every device until authorization
pub const DEFAULT_AES_KEY: [u8; 16] = [
    0x09, 0x76, 0x28, 0x34, 0x3f, 0xe9, 0x9e, 0x23, 0x76, 0x5c, 0x15, 0x13, 0xac, 0xcf, 0x8b, 0x02,
];

/// Default AES IV shared by every device
pub const DEFAULT_AES_IV: [u8; 16] = [
    0x56, 0x2e, 0x17, 0x99, 0x6d, 0x09, 0x3d, 0x28, 0xdd, 0xb3, 0xba, 0x69, 0x5a, 0x2e, 0x6f, 0x58,
];

/// UDP port devices listen on
pub const DEFAULT_DEVICE_PORT: u16 = 80;

/// Timeout for a command call when the device has none configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Receive buffer size for device responses
pub const RECV_BUFFER_SIZE: usize = 2048;

/// Command: authorize the local machine
pub const CMD_AUTH: u8 = 0x65;

/// Command: remote control sub-command carrier
pub const CMD_REMOTE: u8 = 0x6a;

/// Command: discovery hello
pub const CMD_HELLO: u8 = 0x06;

/// Command: discovery hello reply
pub const CMD_HELLO_REPLY: u8 = 0x07;

/// Command: Wi-Fi provisioning
pub const CMD_WIFI_SETUP: u8 = 0x14;

/// Remote sub-command: send a code
pub const REMOTE_SEND: u8 = 0x02;

/// Remote sub-command: enter capture mode
pub const REMOTE_START_CAPTURE: u8 = 0x03;

/// Remote sub-command: read the captured code
pub const REMOTE_READ_CAPTURED: u8 = 0x04;

/// Result code reported while nothing has been captured yet
pub const RESULT_NOT_CAPTURED: u16 = 0xfff6;

/// Length of the local identity sent with the auth command
pub const LOCAL_ID_SIZE: usize = 15;

/// Smallest auth payload
pub const AUTH_PAYLOAD_MIN: usize = 0x50;

/// Largest auth payload
pub const AUTH_PAYLOAD_MAX: usize = 0x80;
