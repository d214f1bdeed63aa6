//! Command packet codec.
//!
//! Every command packet is a 0x38-byte header followed by the AES-CBC
//! encrypted payload:
//!
//! | Offset      | Field                                   |
//! |-------------|-----------------------------------------|
//! | 0x00..0x08  | magic `5a a5 aa 55 5a a5 aa 55`         |
//! | 0x20..0x22  | whole-packet checksum (LE, written last)|
//! | 0x22..0x24  | device result code (responses only)     |
//! | 0x24..0x26  | marker `2a 27`                          |
//! | 0x26        | command                                 |
//! | 0x28..0x2a  | request counter (LE)                    |
//! | 0x2a..0x30  | MAC address, reversed                   |
//! | 0x30..0x34  | session identity (LE)                   |
//! | 0x34..0x36  | plaintext payload checksum (LE)         |
//! | 0x38..      | encrypted payload                       |

use bytes::{Bytes, BytesMut};
use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::checksum::{checksum, seal, verify};
use crate::cipher::CipherKey;
use crate::constants::{HEADER_SIZE, PACKET_MAGIC, PACKET_MARKER};
use crate::error::{BroadlinkError, Result};

/// Raw layout of the 0x38-byte command header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct CommandHeader {
    pub magic: [u8; 8],
    pub reserved0: [u8; 0x18],
    pub checksum: U16,
    pub result_code: U16,
    pub marker: U16,
    pub command: u8,
    pub reserved1: u8,
    pub counter: U16,
    pub mac_reversed: [u8; 6],
    pub id: U32,
    pub payload_checksum: U16,
    pub reserved2: [u8; 2],
}

impl CommandHeader {
    /// The device MAC in natural byte order.
    pub fn mac(&self) -> [u8; 6] {
        reverse_mac(&self.mac_reversed)
    }

    pub fn counter(&self) -> u16 {
        self.counter.get()
    }

    pub fn result_code(&self) -> u16 {
        self.result_code.get()
    }
}

/// Values stamped into an outbound header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHeader {
    pub counter: u16,
    pub mac: [u8; 6],
    pub id: u32,
}

pub(crate) fn reverse_mac(mac: &[u8; 6]) -> [u8; 6] {
    let mut reversed = *mac;
    reversed.reverse();
    reversed
}

/// Build a command packet: header, encrypted payload, then the whole-packet
/// checksum.
pub fn build_command(session: &SessionHeader, key: &CipherKey, command: u8, payload: &[u8]) -> Bytes {
    let mut header = CommandHeader::new_zeroed();
    header.magic = PACKET_MAGIC;
    header.marker = U16::new(PACKET_MARKER);
    header.command = command;
    header.counter = U16::new(session.counter);
    header.mac_reversed = reverse_mac(&session.mac);
    header.id = U32::new(session.id);
    header.payload_checksum = U16::new(checksum(payload));

    let encrypted = key.encrypt(payload);

    let mut packet = BytesMut::with_capacity(HEADER_SIZE + encrypted.len());
    packet.extend_from_slice(header.as_bytes());
    packet.extend_from_slice(&encrypted);
    seal(&mut packet);

    packet.freeze()
}

/// Validate a device response against the request that produced it.
///
/// Checks, in order: whole-packet checksum, echoed counter, and the MAC the
/// reply claims to come from.
pub fn parse_response<'a>(session: &SessionHeader, raw: &'a [u8]) -> Result<&'a CommandHeader> {
    if !verify(raw) {
        return Err(BroadlinkError::ChecksumMismatch);
    }

    // A checksum-valid reply shorter than the header carries nothing usable
    let (header, _) = CommandHeader::ref_from_prefix(raw).map_err(|_| BroadlinkError::BlankResponse)?;

    if header.counter() != session.counter {
        return Err(BroadlinkError::CounterMismatch {
            expected: session.counter,
            actual: header.counter(),
        });
    }

    if header.mac() != session.mac {
        return Err(BroadlinkError::IdentityMismatch);
    }

    Ok(header)
}

/// Decrypt everything after the header. The result keeps its zero padding.
pub fn extract_payload(key: &CipherKey, raw: &[u8]) -> Result<Vec<u8>> {
    if raw.len() <= HEADER_SIZE {
        return Err(BroadlinkError::BlankResponse);
    }
    Ok(key.decrypt(&raw[HEADER_SIZE..]))
}
