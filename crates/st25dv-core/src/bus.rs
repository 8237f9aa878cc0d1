//! Bus endpoint trait definitions
//!
//! An ST25DV answers on two I2C addresses. Each address is driven through
//! its own [`I2cEndpoint`]; the core never talks to the wire directly.

use bitflags::bitflags;
use core::fmt;

/// 7-bit bus address of user memory, dynamic registers and mailbox
pub const USER_ADDR: u8 = 0x53;

/// 7-bit bus address of system configuration and the password register
pub const SYS_ADDR: u8 = 0x57;

bitflags! {
    /// Bus endpoint feature flags
    ///
    /// These flags indicate which transfer kinds an endpoint can issue.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BusFeatures: u32 {
        /// Register pointer write followed by a single byte receive
        const BYTE_READ   = 1 << 0;
        /// SMBus write-word style single byte write
        const WORD_WRITE  = 1 << 1;
        /// Plain I2C write of an address-prefixed block
        const BLOCK_WRITE = 1 << 2;

        /// Everything the byte-by-byte path needs
        const BYTE_IO = Self::BYTE_READ.bits() | Self::WORD_WRITE.bits();
    }
}

impl Default for BusFeatures {
    fn default() -> Self {
        BusFeatures::BYTE_IO
    }
}

/// Which of the two bus identities of the chip an area is reached through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// User-facing address (E2 = 0)
    Primary,
    /// System configuration address (E2 = 1)
    System,
}

impl Endpoint {
    /// Default 7-bit address of this endpoint
    pub const fn default_addr(self) -> u8 {
        match self {
            Self::Primary => USER_ADDR,
            Self::System => SYS_ADDR,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary (0x{:02X})", USER_ADDR),
            Self::System => write!(f, "system (0x{:02X})", SYS_ADDR),
        }
    }
}

/// Failure of a single bus attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// Device did not acknowledge (busy in a write cycle, or absent)
    Nack,
    /// Another master won arbitration
    ArbitrationLost,
    /// Transfer timed out
    Timeout,
    /// Any other adapter failure
    Other,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nack => write!(f, "no acknowledge"),
            Self::ArbitrationLost => write!(f, "arbitration lost"),
            Self::Timeout => write!(f, "bus timeout"),
            Self::Other => write!(f, "bus error"),
        }
    }
}

/// A single bus address of the chip
///
/// Implementations issue exactly one wire-level transfer per call and never
/// retry; retry and backoff belong to the transaction layer.
pub trait I2cEndpoint {
    /// Get the transfer kinds supported by this endpoint
    fn features(&self) -> BusFeatures;

    /// Get the maximum length of one block transfer, address prefix included
    fn max_block_len(&self) -> usize;

    /// Load the chip's 16-bit register pointer
    fn write_reg(&mut self, addr_hi: u8, addr_lo: u8) -> Result<(), BusError>;

    /// Receive the byte at the register pointer (the pointer auto-increments)
    fn read_byte(&mut self) -> Result<u8, BusError>;

    /// SMBus write-word: command is the high address byte, `word` carries the
    /// low address byte in bits 0..8 and the value in bits 8..16
    fn write_word(&mut self, addr_hi: u8, word: u16) -> Result<(), BusError>;

    /// Send `bytes` verbatim as one write transfer
    fn send_block(&mut self, bytes: &[u8]) -> Result<(), BusError>;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}

// Blanket impl for boxed endpoints to allow runtime backend selection
impl I2cEndpoint for alloc::boxed::Box<dyn I2cEndpoint + Send> {
    fn features(&self) -> BusFeatures {
        (**self).features()
    }

    fn max_block_len(&self) -> usize {
        (**self).max_block_len()
    }

    fn write_reg(&mut self, addr_hi: u8, addr_lo: u8) -> Result<(), BusError> {
        (**self).write_reg(addr_hi, addr_lo)
    }

    fn read_byte(&mut self) -> Result<u8, BusError> {
        (**self).read_byte()
    }

    fn write_word(&mut self, addr_hi: u8, word: u16) -> Result<(), BusError> {
        (**self).write_word(addr_hi, word)
    }

    fn send_block(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        (**self).send_block(bytes)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }
}

/// Information about a bus backend
#[derive(Debug, Clone)]
pub struct BackendInfo {
    /// Name of the backend
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Description
    pub description: &'static str,
    /// Whether this backend requires elevated privileges
    pub requires_root: bool,
}
