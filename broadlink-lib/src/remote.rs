//! IR/RF remote control operations for RM-series devices.
//!
//! All operations travel as command 0x6a with a sub-command in the first
//! payload byte. The device answers with a 16-bit result code at 0x22 of the
//! response header.

use num_enum::{FromPrimitive, IntoPrimitive};
use strum_macros::Display;
use tracing::{debug, info};

use crate::constants::{
    CMD_REMOTE, REMOTE_READ_CAPTURED, REMOTE_SEND, REMOTE_START_CAPTURE, RESULT_CODE_OFFSET, RESULT_NOT_CAPTURED,
};
use crate::device::Device;
use crate::error::{BroadlinkError, Result};

/// Remote controller signal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum RemoteType {
    #[strum(to_string = "IR")]
    Ir = 0x26,
    #[strum(to_string = "RF 433MHz")]
    Rf433 = 0xb2,
    #[strum(to_string = "RF 315MHz")]
    Rf315 = 0xd7,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Size of the capture start/read request payload
const CAPTURE_REQUEST_SIZE: usize = 0x10;

/// Header preceding the code bytes in send and read payloads
const CODE_HEADER_SIZE: usize = 0x08;

fn result_code(response: &[u8]) -> Result<u16> {
    let bytes = response
        .get(RESULT_CODE_OFFSET..RESULT_CODE_OFFSET + 2)
        .ok_or(BroadlinkError::InsufficientData {
            expected: RESULT_CODE_OFFSET + 2,
            actual: response.len(),
        })?;
    Ok(u16::from_le_bytes(bytes.try_into()?))
}

/// Build the payload for a send-code request. `count` is the number of times
/// the device emits the signal and must be at least 1.
pub fn send_code_payload(rtype: RemoteType, code: &[u8], count: u32) -> Result<Vec<u8>> {
    if count < 1 {
        return Err(BroadlinkError::InvalidInput(
            "count must be a positive integer".to_string(),
        ));
    }
    let code_len = u16::try_from(code.len())
        .map_err(|_| BroadlinkError::InvalidInput(format!("code too long: {} bytes", code.len())))?;

    let mut payload = vec![0u8; CODE_HEADER_SIZE + code.len()];
    payload[0] = REMOTE_SEND;
    payload[4] = rtype.into();
    // Repeat count on the wire is zero-based.
    payload[5] = (count - 1).min(u32::from(u8::MAX)) as u8;
    payload[6..8].copy_from_slice(&code_len.to_le_bytes());
    payload[CODE_HEADER_SIZE..].copy_from_slice(code);
    Ok(payload)
}

/// Parse the decrypted payload of a read-captured response.
pub fn parse_captured_code(data: &[u8]) -> Result<(RemoteType, Vec<u8>)> {
    if data.len() < CODE_HEADER_SIZE {
        return Err(BroadlinkError::InsufficientData {
            expected: CODE_HEADER_SIZE,
            actual: data.len(),
        });
    }

    // Only the low 16 bits of the echoed sub-command are significant
    let sub_command = u16::from_le_bytes([data[0], data[1]]);
    if sub_command != u16::from(REMOTE_READ_CAPTURED) {
        return Err(BroadlinkError::Protocol {
            operation: "read captured code",
            code: sub_command,
        });
    }

    let rtype = RemoteType::from_primitive(data[4]);
    let len = usize::from(u16::from_le_bytes([data[6], data[7]]));
    let code = data
        .get(CODE_HEADER_SIZE..CODE_HEADER_SIZE + len)
        .ok_or(BroadlinkError::InsufficientData {
            expected: CODE_HEADER_SIZE + len,
            actual: data.len(),
        })?;

    Ok((rtype, code.to_vec()))
}

impl Device {
    /// Put the device into signal capture mode.
    pub async fn start_capture(&mut self) -> Result<()> {
        let mut payload = [0u8; CAPTURE_REQUEST_SIZE];
        payload[0] = REMOTE_START_CAPTURE;

        let response = self.call(CMD_REMOTE, &payload).await?;
        match result_code(&response)? {
            0 => {
                info!(remote = %self.remote_addr, "Capture mode started");
                Ok(())
            }
            code => Err(BroadlinkError::Protocol {
                operation: "start capture",
                code,
            }),
        }
    }

    /// Read the signal captured since [`Device::start_capture`].
    ///
    /// Returns [`BroadlinkError::NotCaptured`] while nothing has been captured;
    /// callers poll on that error.
    pub async fn read_captured(&mut self) -> Result<(RemoteType, Vec<u8>)> {
        let mut payload = [0u8; CAPTURE_REQUEST_SIZE];
        payload[0] = REMOTE_READ_CAPTURED;

        let response = self.call(CMD_REMOTE, &payload).await?;
        match result_code(&response)? {
            0 => {}
            RESULT_NOT_CAPTURED => {
                debug!("No signal captured yet");
                return Err(BroadlinkError::NotCaptured);
            }
            code => {
                return Err(BroadlinkError::Protocol {
                    operation: "read captured code",
                    code,
                });
            }
        }

        let data = self.payload(&response)?;
        let (rtype, code) = parse_captured_code(&data)?;
        info!(%rtype, len = code.len(), "Captured remote code");
        Ok((rtype, code))
    }

    /// Emit a remote control code `count` times (1 = once).
    pub async fn send_code(&mut self, rtype: RemoteType, code: &[u8], count: u32) -> Result<()> {
        let payload = send_code_payload(rtype, code, count)?;

        let response = self.call(CMD_REMOTE, &payload).await?;
        match result_code(&response)? {
            0 => Ok(()),
            code => Err(BroadlinkError::Protocol {
                operation: "send code",
                code,
            }),
        }
    }

    /// Emit an IR code, same as [`Device::send_code`] with [`RemoteType::Ir`].
    pub async fn send_ir_code(&mut self, code: &[u8], count: u32) -> Result<()> {
        self.send_code(RemoteType::Ir, code, count).await
    }
}
