//! Error types for st25dv-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

use crate::area::AreaId;
use crate::bus::BusError;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Caller contract violations, rejected before any bus activity
    /// Requested range does not fit inside the area
    AddressOutOfBounds {
        /// Area the request was aimed at
        area: AreaId,
        /// Area-relative start offset
        offset: u16,
        /// Requested length in bytes
        len: usize,
    },
    /// Password input was not exactly 8 bytes long
    InvalidPasswordLength(usize),

    // Bus errors
    /// A single register transaction exceeded the retry ceiling
    TransactionFailed {
        /// Absolute register address of the failed transaction
        addr: u16,
        /// Error reported by the last attempt
        cause: BusError,
    },
}

impl Error {
    /// Returns true for errors caused by the request itself rather than the bus
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::AddressOutOfBounds { .. } | Self::InvalidPasswordLength(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddressOutOfBounds { area, offset, len } => write!(
                f,
                "range 0x{:04X}+{} is outside the {} area",
                offset,
                len,
                area.name()
            ),
            Self::InvalidPasswordLength(len) => {
                write!(f, "password must be exactly 8 bytes, got {}", len)
            }
            Self::TransactionFailed { addr, cause } => {
                write!(f, "transaction at 0x{:04X} failed: {}", addr, cause)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
