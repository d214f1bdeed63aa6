//! The 16-bit additive checksum used by every Broadlink packet.

use crate::constants::{CHECKSUM_OFFSET, CHECKSUM_SEED, MIN_CHECKSUM_PACKET_SIZE};

/// Sum every byte onto the 0xBEAF seed, wrapping at 16 bits.
pub fn checksum(data: &[u8]) -> u16 {
    data.iter()
        .fold(CHECKSUM_SEED, |sum, &b| sum.wrapping_add(u16::from(b)))
}

/// Verify the whole-packet checksum stored at 0x20.
///
/// The stored field is part of the scanned bytes, so its own two bytes are
/// subtracted from the recomputed sum before comparing.
pub fn verify(packet: &[u8]) -> bool {
    if packet.len() < MIN_CHECKSUM_PACKET_SIZE {
        return false;
    }

    let lo = packet[CHECKSUM_OFFSET];
    let hi = packet[CHECKSUM_OFFSET + 1];
    let stored = u16::from_le_bytes([lo, hi]);

    let sum = checksum(packet)
        .wrapping_sub(u16::from(lo))
        .wrapping_sub(u16::from(hi));

    sum == stored
}

/// Compute the checksum of `packet` and store it at 0x20.
pub(crate) fn seal(packet: &mut [u8]) {
    packet[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].fill(0);
    let sum = checksum(packet);
    packet[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 2].copy_from_slice(&sum.to_le_bytes());
}
