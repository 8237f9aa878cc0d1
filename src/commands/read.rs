//! Read command implementation

use st25dv_core::bus::I2cEndpoint;
use st25dv_core::{AreaId, Device, Error as CoreError};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use super::progress_bar;

/// Bytes fetched per device call
const READ_CHUNK_SIZE: usize = 256;

/// Run the read command
///
/// Without `length` the read runs to the end of the area. Without `output`
/// the data is printed as a hex dump.
pub fn run_read<E: I2cEndpoint>(
    device: &Device<E>,
    area: AreaId,
    offset: u16,
    length: Option<usize>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let layout = device.layout(area);
    let length = length.unwrap_or_else(|| layout.size.saturating_sub(offset as usize));

    // Reject the whole request before the first chunk touches the bus
    if !layout.is_valid_range(offset, length) {
        return Err(CoreError::AddressOutOfBounds {
            area,
            offset,
            len: length,
        }
        .into());
    }

    let data = read_with_progress(device, area, offset, length)?;

    match output {
        Some(path) => {
            let mut file = File::create(path)?;
            file.write_all(&data)?;
            println!("Wrote {} bytes to {:?}", data.len(), path);
        }
        None => print!("{}", hex_dump(offset, &data)),
    }

    if data.len() < length {
        return Err(format!("Short read: got {} of {} bytes", data.len(), length).into());
    }
    Ok(())
}

/// Read `length` bytes in chunks, stopping at the first short chunk
pub fn read_with_progress<E: I2cEndpoint>(
    device: &Device<E>,
    area: AreaId,
    offset: u16,
    length: usize,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let pb = progress_bar(length, "Reading");
    let mut data = Vec::with_capacity(length);

    while data.len() < length {
        let chunk_len = std::cmp::min(READ_CHUNK_SIZE, length - data.len());
        let start = offset + data.len() as u16;
        let (count, chunk) = device.read_to_vec(area, start, chunk_len)?;
        data.extend_from_slice(&chunk);
        pb.set_position(data.len() as u64);

        if count < chunk_len {
            pb.abandon_with_message("Read stopped");
            log::warn!("Read stopped at {} offset 0x{:04X}", area, offset as usize + data.len());
            return Ok(data);
        }
    }

    pb.finish_with_message("Read complete");
    Ok(data)
}

/// Format `data` as a hex dump with area-relative offsets
pub fn hex_dump(base: u16, data: &[u8]) -> String {
    let mut out = String::new();
    for (i, line) in data.chunks(16).enumerate() {
        let hex: Vec<String> = line.iter().map(|b| format!("{:02X}", b)).collect();
        let ascii: String = line
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        out.push_str(&format!(
            "{:04X}: {:<47}  |{}|\n",
            base as usize + i * 16,
            hex.join(" "),
            ascii
        ));
    }
    out
}
