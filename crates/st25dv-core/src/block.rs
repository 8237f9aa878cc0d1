//! Block-write optimizer
//!
//! Moves a write in as few bus transactions as the endpoint's block limit
//! allows. Each block carries a two byte address prefix, so one block holds
//! at most `max_block_len - 2` data bytes.

use core::ops::Range;

use crate::area::Area;
use crate::bus::{BusFeatures, I2cEndpoint};
use crate::engine;
use crate::error::Result;
use crate::transaction::{self, BLOCK_ADDR_LEN, MAX_BLOCK_LEN};

/// Data bytes that fit in one block of `endpoint`, or `None` if it cannot do blocks
pub fn block_payload<E: I2cEndpoint + ?Sized>(endpoint: &E) -> Option<usize> {
    if !endpoint.features().contains(BusFeatures::BLOCK_WRITE) {
        return None;
    }
    let limit = endpoint.max_block_len().min(MAX_BLOCK_LEN);
    match limit.checked_sub(BLOCK_ADDR_LEN) {
        Some(0) | None => None,
        Some(payload) => Some(payload),
    }
}

/// Split `range` into consecutive chunks of at most `payload` bytes
///
/// A `payload` of zero is treated as one.
pub fn chunks(range: Range<usize>, payload: usize) -> impl Iterator<Item = Range<usize>> {
    let payload = payload.max(1);
    range
        .clone()
        .step_by(payload)
        .map(move |start| start..(start + payload).min(range.end))
}

/// Write `data` into `area` using block transactions
///
/// Returns the number of bytes in blocks that were fully sent. The shadow is
/// updated up front just like the byte path and is not rolled back when a
/// block fails.
///
/// Block size follows [`block_payload`]; an endpoint that cannot send blocks
/// gets byte writes instead.
pub fn write<E: I2cEndpoint + ?Sized>(
    endpoint: &mut E,
    area: &mut Area,
    offset: u16,
    data: &[u8],
) -> Result<usize> {
    let Some(payload) = block_payload(&*endpoint) else {
        log::debug!("st25dv: endpoint cannot send blocks, using byte writes");
        return engine::write(endpoint, area, offset, data);
    };

    let range = area.check_range(offset, data.len())?;
    area.shadow_mut()[range.clone()].copy_from_slice(data);

    let mut done = 0;
    for chunk in chunks(range, payload) {
        let addr = area.absolute(chunk.start);
        match transaction::write_block(endpoint, addr, &area.shadow()[chunk]) {
            Ok(sent) => done += sent,
            Err(e) => {
                log::warn!(
                    "st25dv: {} block write stopped after {} bytes: {}",
                    area.id(),
                    done,
                    e
                );
                break;
            }
        }
    }

    log::debug!("st25dv: {} byte writes.", done);
    Ok(done)
}
