//! Single-register transactions with bounded retry
//!
//! Every operation here wraps one bus transfer. A failed attempt sleeps for
//! a fixed backoff and is tried again; after [`MAX_RETRIES`] retries the
//! transaction is reported as failed. The timings are tuned to the chip's
//! NACK behaviour while an EEPROM write cycle is in progress and are not
//! adaptive.

use heapless::Vec;

use crate::bus::{BusError, I2cEndpoint};
use crate::error::{Error, Result};

/// Retries allowed after the first attempt
pub const MAX_RETRIES: u32 = 10;

/// Backoff between byte read attempts
pub const READ_RETRY_DELAY_US: u32 = 150;

/// Backoff between byte write attempts
pub const WRITE_RETRY_DELAY_US: u32 = 1_000;

/// Backoff between block write attempts
pub const BLOCK_RETRY_DELAY_US: u32 = 500;

/// Page-write completion time waited after every block
pub const BLOCK_WRITE_DELAY_US: u32 = 5_000;

/// Length of the big-endian address prefix of a block
pub const BLOCK_ADDR_LEN: usize = 2;

/// Upper bound on any block transfer, address prefix included
pub const MAX_BLOCK_LEN: usize = 32;

/// Run `op` until it succeeds or the retry ceiling is reached
fn with_retry<E, T, F>(endpoint: &mut E, addr: u16, backoff_us: u32, mut op: F) -> Result<T>
where
    E: I2cEndpoint + ?Sized,
    F: FnMut(&mut E) -> core::result::Result<T, BusError>,
{
    let mut retries = 0;
    loop {
        match op(endpoint) {
            Ok(value) => return Ok(value),
            Err(cause) if retries < MAX_RETRIES => {
                retries += 1;
                log::trace!(
                    "st25dv: {} at 0x{:04X}, retry {}/{}",
                    cause,
                    addr,
                    retries,
                    MAX_RETRIES
                );
                endpoint.delay_us(backoff_us);
            }
            Err(cause) => {
                log::warn!(
                    "st25dv: giving up on 0x{:04X} after {} attempts: {}",
                    addr,
                    retries + 1,
                    cause
                );
                return Err(Error::TransactionFailed { addr, cause });
            }
        }
    }
}

/// Read the byte at an absolute register address
///
/// Loads the register pointer, then receives one byte. A failure of either
/// step restarts the attempt from the pointer write.
pub fn read_byte<E: I2cEndpoint + ?Sized>(endpoint: &mut E, addr: u16) -> Result<u8> {
    let [hi, lo] = addr.to_be_bytes();
    with_retry(endpoint, addr, READ_RETRY_DELAY_US, |ep| {
        ep.write_reg(hi, lo)?;
        ep.read_byte()
    })
}

/// Write one byte at an absolute register address
pub fn write_byte<E: I2cEndpoint + ?Sized>(endpoint: &mut E, addr: u16, value: u8) -> Result<()> {
    let [hi, lo] = addr.to_be_bytes();
    let word = u16::from_le_bytes([lo, value]);
    with_retry(endpoint, addr, WRITE_RETRY_DELAY_US, |ep| {
        ep.write_word(hi, word)
    })
}

/// Send a pre-built frame as one block transaction
///
/// `frame` must start with the big-endian register address it targets. On
/// success waits [`BLOCK_WRITE_DELAY_US`] for the page write to complete.
pub fn send_frame<E: I2cEndpoint + ?Sized>(endpoint: &mut E, frame: &[u8]) -> Result<()> {
    let addr = match frame {
        [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
        _ => 0,
    };
    with_retry(endpoint, addr, BLOCK_RETRY_DELAY_US, |ep| ep.send_block(frame))?;
    endpoint.delay_us(BLOCK_WRITE_DELAY_US);
    Ok(())
}

/// Write the head of `data` as one block starting at an absolute register address
///
/// At most `MAX_BLOCK_LEN - 2` bytes fit in a block. Returns how many bytes
/// of `data` were sent; larger writes are split by [`crate::block`].
pub fn write_block<E: I2cEndpoint + ?Sized>(endpoint: &mut E, addr: u16, data: &[u8]) -> Result<usize> {
    let take = data.len().min(MAX_BLOCK_LEN - BLOCK_ADDR_LEN);
    let frame: Vec<u8, MAX_BLOCK_LEN> = addr
        .to_be_bytes()
        .iter()
        .chain(&data[..take])
        .copied()
        .collect();

    send_frame(endpoint, &frame)?;
    Ok(take)
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::bus::Endpoint;
    use crate::test_support::{BusOp, MockBus};
    use alloc::vec;

    #[test]
    fn test_read_byte_sets_pointer_then_reads() {
        let bus = MockBus::new();
        bus.poke(Endpoint::Primary, 0x2003, 0x5A);
        let mut ep = bus.endpoint(Endpoint::Primary);

        assert_eq!(read_byte(&mut ep, 0x2003).unwrap(), 0x5A);
        assert_eq!(
            bus.ops(),
            vec![BusOp::WriteReg(0x2003), BusOp::ReadByte(0x2003)]
        );
    }

    #[test]
    fn test_write_byte_packs_low_address_and_value() {
        let bus = MockBus::new();
        let mut ep = bus.endpoint(Endpoint::Primary);

        write_byte(&mut ep, 0x01F9, 0xC3).unwrap();
        assert_eq!(bus.ops(), vec![BusOp::WriteWord(0x01, 0xC3F9)]);
        assert_eq!(bus.peek(Endpoint::Primary, 0x01F9), 0xC3);
    }

    #[test]
    fn test_transient_failures_are_retried_with_backoff() {
        let bus = MockBus::new();
        bus.poke(Endpoint::Primary, 0x10, 0x42);
        bus.fail_next(3);
        let mut ep = bus.endpoint(Endpoint::Primary);

        assert_eq!(read_byte(&mut ep, 0x10).unwrap(), 0x42);
        assert_eq!(bus.delays(), vec![READ_RETRY_DELAY_US; 3]);
    }

    #[test]
    fn test_retry_ceiling() {
        // One attempt plus MAX_RETRIES retries, then give up
        let bus = MockBus::new();
        bus.fail_next(MAX_RETRIES as usize + 1);
        let mut ep = bus.endpoint(Endpoint::Primary);

        assert_eq!(
            write_byte(&mut ep, 0x20, 0x01),
            Err(Error::TransactionFailed {
                addr: 0x20,
                cause: BusError::Nack
            })
        );
        assert_eq!(bus.delays(), vec![WRITE_RETRY_DELAY_US; MAX_RETRIES as usize]);

        // Exactly at the ceiling still succeeds
        let bus = MockBus::new();
        bus.fail_next(MAX_RETRIES as usize);
        let mut ep = bus.endpoint(Endpoint::Primary);
        assert!(write_byte(&mut ep, 0x20, 0x01).is_ok());
    }

    #[test]
    fn test_write_block_prefixes_address_and_waits() {
        let bus = MockBus::new();
        let mut ep = bus.endpoint(Endpoint::Primary);

        assert_eq!(write_block(&mut ep, 0x01F0, &[1, 2, 3]).unwrap(), 3);
        assert_eq!(bus.ops(), vec![BusOp::SendBlock(vec![0x01, 0xF0, 1, 2, 3])]);
        assert_eq!(bus.delays(), vec![BLOCK_WRITE_DELAY_US]);
        assert_eq!(bus.peek(Endpoint::Primary, 0x01F2), 3);
    }

    #[test]
    fn test_write_block_retry_uses_block_backoff() {
        let bus = MockBus::new();
        bus.fail_next(2);
        let mut ep = bus.endpoint(Endpoint::Primary);

        assert_eq!(write_block(&mut ep, 0x0000, &[0xAA]).unwrap(), 1);
        assert_eq!(
            bus.delays(),
            vec![BLOCK_RETRY_DELAY_US, BLOCK_RETRY_DELAY_US, BLOCK_WRITE_DELAY_US]
        );
    }

    #[test]
    fn test_write_block_reports_only_what_fits() {
        let bus = MockBus::new();
        let mut ep = bus.endpoint(Endpoint::Primary);

        let sent = write_block(&mut ep, 0x0000, &[0x5A; 64]).unwrap();
        assert_eq!(sent, MAX_BLOCK_LEN - BLOCK_ADDR_LEN);
        match bus.ops().as_slice() {
            [BusOp::SendBlock(frame)] => assert_eq!(frame.len(), MAX_BLOCK_LEN),
            ops => panic!("unexpected bus traffic: {:?}", ops),
        }
        assert_eq!(bus.peek(Endpoint::Primary, 29), 0x5A);
        assert_eq!(bus.peek(Endpoint::Primary, 30), 0x00);
    }
}
