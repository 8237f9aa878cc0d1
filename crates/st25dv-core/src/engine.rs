//! Byte-range I/O against one area
//!
//! Requests are area-relative. Every byte is translated to its absolute
//! register address and moved with one transaction. A transaction that
//! exceeds the retry ceiling ends the request early; the number of bytes
//! moved so far is returned instead of an error, so callers detect a partial
//! transfer by comparing the count with the requested length.
//!
//! Exclusive access to the area (and therefore to its shadow) is expressed
//! by the `&mut` borrows; the shared [`crate::Device`] holds its mutex for
//! the whole call.

use crate::area::Area;
use crate::bus::I2cEndpoint;
use crate::error::Result;
use crate::transaction;

/// Refresh `buf.len()` bytes of `area` from the chip and copy them out
///
/// Every byte is re-read from the chip into the shadow before it is served.
/// On a transaction failure the bytes refreshed before the stall are still
/// copied to the front of `buf` and their count is returned.
pub fn read<E: I2cEndpoint + ?Sized>(
    endpoint: &mut E,
    area: &mut Area,
    offset: u16,
    buf: &mut [u8],
) -> Result<usize> {
    let range = area.check_range(offset, buf.len())?;

    let mut done = 0;
    for rel in range.clone() {
        let addr = area.absolute(rel);
        match transaction::read_byte(endpoint, addr) {
            Ok(byte) => {
                area.shadow_mut()[rel] = byte;
                done += 1;
            }
            Err(e) => {
                log::warn!("st25dv: {} read stopped after {} bytes: {}", area.id(), done, e);
                break;
            }
        }
    }

    buf[..done].copy_from_slice(&area.shadow()[range.start..range.start + done]);
    log::debug!("st25dv: {} byte reads.", done);
    Ok(done)
}

/// Write `data` into `area` one byte per transaction
///
/// The shadow is updated with the whole of `data` before the first bus
/// transfer. It is not rolled back after a partial failure, so it may run
/// ahead of the chip until the next read of those bytes.
pub fn write<E: I2cEndpoint + ?Sized>(
    endpoint: &mut E,
    area: &mut Area,
    offset: u16,
    data: &[u8],
) -> Result<usize> {
    let range = area.check_range(offset, data.len())?;
    area.shadow_mut()[range.clone()].copy_from_slice(data);

    let mut done = 0;
    for rel in range {
        let addr = area.absolute(rel);
        let value = area.shadow()[rel];
        if let Err(e) = transaction::write_byte(endpoint, addr, value) {
            log::warn!("st25dv: {} write stopped after {} bytes: {}", area.id(), done, e);
            break;
        }
        done += 1;
    }

    log::debug!("st25dv: {} byte writes.", done);
    Ok(done)
}
