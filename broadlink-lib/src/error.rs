use std::array::TryFromSliceError;
use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use thiserror::Error;

use crate::device::Device;

/// The primary error type for the `broadlink-lib` library.
#[derive(Error, Debug)]
pub enum BroadlinkError {
    #[error("Invalid or missing device MAC address")]
    InvalidAddress,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Timeout waiting for device: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid packet checksum")]
    ChecksumMismatch,

    #[error("Packet counter mismatch: expected {expected}, got {actual}")]
    CounterMismatch { expected: u16, actual: u16 },

    /// The reply carries another device's MAC address, possibly spoofed.
    #[error("Response MAC address does not match the device")]
    IdentityMismatch,

    #[error("Blank response: no payload after the packet header")]
    BlankResponse,

    #[error("Insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Device rejected {operation} (result code {code:#06x})")]
    Protocol { operation: &'static str, code: u16 },

    /// No remote control signal has been captured yet. Expected while polling.
    #[error("Signal not captured")]
    NotCaptured,

    #[error("Discovery failed on {} interface(s)", failures.len())]
    Discovery {
        found: Vec<Device>,
        failures: Vec<InterfaceFailure>,
    },
}

impl BroadlinkError {
    pub fn is_not_captured(&self) -> bool {
        matches!(self, BroadlinkError::NotCaptured)
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            BroadlinkError::Timeout(_) => true,
            BroadlinkError::Io(e) => matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock),
            _ => false,
        }
    }
}

impl From<TryFromSliceError> for BroadlinkError {
    fn from(_: TryFromSliceError) -> Self {
        BroadlinkError::InvalidInput("Failed to convert slice to array".to_string())
    }
}

/// A discovery probe that failed on one local address.
#[derive(Debug)]
pub struct InterfaceFailure {
    pub addr: Ipv4Addr,
    pub error: BroadlinkError,
}

impl fmt::Display for InterfaceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.addr, self.error)
    }
}

pub type Result<T> = std::result::Result<T, BroadlinkError>;
