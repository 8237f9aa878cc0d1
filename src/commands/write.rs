//! Write command implementation

use st25dv_core::bus::I2cEndpoint;
use st25dv_core::{AreaId, Device, Error as CoreError};
use std::path::Path;

use super::progress_bar;

/// Bytes handed to the device per call
const WRITE_CHUNK_SIZE: usize = 256;

/// Parse bytes given as hex digits
///
/// Whitespace, `:` and `,` separators and `0x` prefixes are ignored.
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    let digits: String = s
        .split(|c: char| c.is_whitespace() || c == ':' || c == ',')
        .map(|tok| {
            tok.strip_prefix("0x")
                .or_else(|| tok.strip_prefix("0X"))
                .unwrap_or(tok)
        })
        .collect();

    if digits.is_empty() {
        return Err("No bytes given".to_string());
    }
    if !digits.is_ascii() {
        return Err(format!("Invalid hex string: {}", s));
    }
    if digits.len() % 2 != 0 {
        return Err(format!("Odd number of hex digits: {}", digits.len()));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| format!("Invalid hex byte: {}", &digits[i..i + 2]))
        })
        .collect()
}

/// Load the data to write from a file or a hex string
pub fn load_input(
    input: Option<&Path>,
    hex: Option<&str>,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    match (input, hex) {
        (Some(path), _) => Ok(std::fs::read(path)?),
        (None, Some(hex)) => Ok(parse_hex_bytes(hex)?),
        (None, None) => Err("Nothing to write. Use --input or --hex".into()),
    }
}

/// Run the write command
pub fn run_write<E: I2cEndpoint>(
    device: &Device<E>,
    area: AreaId,
    offset: u16,
    data: &[u8],
) -> Result<(), Box<dyn std::error::Error>> {
    // Reject the whole request before the first chunk touches the bus
    if !device.layout(area).is_valid_range(offset, data.len()) {
        return Err(CoreError::AddressOutOfBounds {
            area,
            offset,
            len: data.len(),
        }
        .into());
    }

    let written = write_with_progress(device, area, offset, data)?;
    if written < data.len() {
        return Err(format!("Short write: {} of {} bytes written", written, data.len()).into());
    }

    println!("Wrote {} bytes to {} at 0x{:04X}", written, area, offset);
    Ok(())
}

/// Write `data` in chunks, stopping at the first short chunk
///
/// Returns the number of bytes confirmed written.
pub fn write_with_progress<E: I2cEndpoint>(
    device: &Device<E>,
    area: AreaId,
    offset: u16,
    data: &[u8],
) -> Result<usize, Box<dyn std::error::Error>> {
    let pb = progress_bar(data.len(), "Writing");
    let mut done = 0usize;

    for chunk in data.chunks(WRITE_CHUNK_SIZE) {
        let count = device.write(area, offset + done as u16, chunk)?;
        done += count;
        pb.set_position(done as u64);

        if count < chunk.len() {
            pb.abandon_with_message("Write stopped");
            log::warn!("Write stopped at {} offset 0x{:04X}", area, offset as usize + done);
            return Ok(done);
        }
    }

    pb.finish_with_message("Write complete");
    Ok(done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use st25dv_core::{DeviceConfig, WriteMode};
    use st25dv_dummy::{DummyEndpoint, DummySt25dv};

    fn attach(chip: &DummySt25dv, write_mode: WriteMode) -> Device<DummyEndpoint> {
        let (primary, system) = chip.endpoints();
        Device::attach(
            primary,
            system,
            DeviceConfig::new().with_write_mode(write_mode),
        )
    }

    #[test]
    fn test_parse_hex_bytes() {
        assert_eq!(parse_hex_bytes("deadbeef"), Ok(vec![0xDE, 0xAD, 0xBE, 0xEF]));
        assert_eq!(parse_hex_bytes("de ad:be,ef"), Ok(vec![0xDE, 0xAD, 0xBE, 0xEF]));
        assert_eq!(parse_hex_bytes("0x01 0x02"), Ok(vec![0x01, 0x02]));
        assert!(parse_hex_bytes("abc").is_err());
        assert!(parse_hex_bytes("zz").is_err());
        assert!(parse_hex_bytes("  ").is_err());
    }

    #[test]
    fn test_write_spans_chunks() {
        for mode in [WriteMode::Byte, WriteMode::Block] {
            let chip = DummySt25dv::new_default();
            let device = attach(&chip, mode);

            let data: Vec<u8> = (0..600).map(|i| (i * 3) as u8).collect();
            run_write(&device, AreaId::User, 0, &data[..512]).unwrap();
            assert_eq!(chip.memory(AreaId::User), data[..512]);
        }
    }

    #[test]
    fn test_write_past_end_touches_nothing() {
        let chip = DummySt25dv::new_default();
        let device = attach(&chip, WriteMode::Byte);

        assert!(run_write(&device, AreaId::Mailbox, 0xF0, &[0; 17]).is_err());
        assert!(chip.trace().is_empty());
    }

    #[test]
    fn test_short_write_is_reported() {
        let chip = DummySt25dv::new_default();
        chip.fail_after(260);
        let device = attach(&chip, WriteMode::Byte);

        let data = vec![0x11; 400];
        assert_eq!(write_with_progress(&device, AreaId::User, 0, &data).unwrap(), 260);
        assert!(run_write(&device, AreaId::User, 0, &[1]).is_err());
    }

    #[test]
    fn test_system_write_without_session_fails() {
        let chip = DummySt25dv::new_default();
        let device = attach(&chip, WriteMode::Byte);

        assert!(run_write(&device, AreaId::System, 0, &[0x01]).is_err());
        assert_eq!(chip.memory(AreaId::System)[0], 0);
    }

    #[test]
    fn test_load_input_from_file() {
        let path = std::env::temp_dir().join(format!("st25dv-write-{}.bin", std::process::id()));
        std::fs::write(&path, [1, 2, 3]).unwrap();
        assert_eq!(load_input(Some(path.as_path()), None).unwrap(), vec![1, 2, 3]);
        let _ = std::fs::remove_file(&path);

        assert_eq!(load_input(None, Some("0a0b")).unwrap(), vec![0x0A, 0x0B]);
        assert!(load_input(None, None).is_err());
    }
}
