//! Linux i2c-dev endpoint implementation
//!
//! This module provides the `LinuxI2c` struct that implements the
//! `I2cEndpoint` trait on top of a `/dev/i2c-N` character device bound to
//! one slave address. A chip needs two of them, one per bus address.

use crate::error::{LinuxI2cError, Result};

use st25dv_core::bus::{BusError, BusFeatures, Endpoint, I2cEndpoint, SYS_ADDR, USER_ADDR};
use st25dv_core::transaction::MAX_BLOCK_LEN;

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;

/// Linux i2c-dev ioctl constants
mod ioctl {
    use nix::{ioctl_read_bad, ioctl_write_int_bad};

    const I2C_SLAVE: u16 = 0x0703;
    const I2C_FUNCS: u16 = 0x0705;

    /// Adapter supports plain I2C messages
    pub const I2C_FUNC_I2C: libc::c_ulong = 0x0000_0001;

    ioctl_write_int_bad!(i2c_slave, I2C_SLAVE);
    ioctl_read_bad!(i2c_funcs, I2C_FUNCS, libc::c_ulong);
}

/// Configuration for opening a chip on a Linux I2C adapter
#[derive(Debug, Clone)]
pub struct LinuxI2cConfig {
    /// Device path (e.g., "/dev/i2c-1")
    pub device: String,
    /// 7-bit address of user memory (default: 0x53)
    pub user_addr: u8,
    /// 7-bit address of system memory (default: 0x57)
    pub system_addr: u8,
    /// Largest block transfer, address prefix included (default: 32)
    pub block_len: usize,
}

impl Default for LinuxI2cConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            user_addr: USER_ADDR,
            system_addr: SYS_ADDR,
            block_len: MAX_BLOCK_LEN,
        }
    }
}

impl LinuxI2cConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Set the user memory address
    pub fn with_user_addr(mut self, addr: u8) -> Self {
        self.user_addr = addr;
        self
    }

    /// Set the system memory address
    pub fn with_system_addr(mut self, addr: u8) -> Self {
        self.system_addr = addr;
        self
    }

    /// Set the block transfer limit
    pub fn with_block_len(mut self, block_len: usize) -> Self {
        self.block_len = block_len;
        self
    }

    /// Address configured for an endpoint
    pub fn addr(&self, endpoint: Endpoint) -> u8 {
        match endpoint {
            Endpoint::Primary => self.user_addr,
            Endpoint::System => self.system_addr,
        }
    }
}

/// One ST25DV bus address on a Linux I2C adapter
pub struct LinuxI2c {
    /// File handle bound to the slave address
    file: File,
    /// 7-bit slave address
    addr: u8,
    /// Block transfer limit
    block_len: usize,
}

impl LinuxI2c {
    /// Open `device` and bind it to `addr`
    pub fn open(device: &str, addr: u8, block_len: usize) -> Result<Self> {
        if device.is_empty() {
            return Err(LinuxI2cError::NoDevice);
        }
        if addr > 0x7F {
            return Err(LinuxI2cError::InvalidParameter(format!(
                "address 0x{:02X} is not a 7-bit address",
                addr
            )));
        }

        log::debug!("linux_i2c: Opening {} for 0x{:02X}", device, addr);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(device)
            .map_err(|e| LinuxI2cError::OpenFailed {
                path: device.to_string(),
                source: e,
            })?;
        let fd = file.as_raw_fd();

        let mut funcs: libc::c_ulong = 0;
        unsafe {
            ioctl::i2c_funcs(fd, &mut funcs).map_err(|e| {
                LinuxI2cError::FuncsFailed(std::io::Error::from_raw_os_error(e as i32))
            })?;
        }
        if funcs & ioctl::I2C_FUNC_I2C == 0 {
            return Err(LinuxI2cError::Unsupported(device.to_string()));
        }

        unsafe {
            ioctl::i2c_slave(fd, addr as libc::c_int).map_err(|e| {
                LinuxI2cError::SetAddressFailed {
                    addr,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        Ok(Self {
            file,
            addr,
            block_len,
        })
    }

    /// Open both bus addresses of one chip
    pub fn open_pair(config: &LinuxI2cConfig) -> Result<(Self, Self)> {
        let primary = Self::open(&config.device, config.user_addr, config.block_len)?;
        let system = Self::open(&config.device, config.system_addr, config.block_len)?;
        log::info!(
            "linux_i2c: Opened {} (user=0x{:02X}, system=0x{:02X})",
            config.device,
            config.user_addr,
            config.system_addr
        );
        Ok((primary, system))
    }

    /// Slave address this file is bound to
    pub fn addr(&self) -> u8 {
        self.addr
    }

    fn write_all_or_fail(&mut self, bytes: &[u8]) -> std::result::Result<(), BusError> {
        match self.file.write(bytes) {
            Ok(n) if n == bytes.len() => Ok(()),
            Ok(_) => Err(BusError::Other),
            Err(e) => Err(bus_error(&e)),
        }
    }
}

/// Map an i2c-dev error to a bus error
pub fn bus_error(e: &std::io::Error) -> BusError {
    match e.raw_os_error() {
        Some(libc::ENXIO) | Some(libc::EREMOTEIO) => BusError::Nack,
        Some(libc::ETIMEDOUT) => BusError::Timeout,
        Some(libc::EAGAIN) => BusError::ArbitrationLost,
        _ => BusError::Other,
    }
}

impl I2cEndpoint for LinuxI2c {
    fn features(&self) -> BusFeatures {
        BusFeatures::BYTE_IO | BusFeatures::BLOCK_WRITE
    }

    fn max_block_len(&self) -> usize {
        self.block_len
    }

    fn write_reg(&mut self, addr_hi: u8, addr_lo: u8) -> std::result::Result<(), BusError> {
        self.write_all_or_fail(&[addr_hi, addr_lo])
    }

    fn read_byte(&mut self) -> std::result::Result<u8, BusError> {
        let mut byte = [0u8; 1];
        match self.file.read(&mut byte) {
            Ok(1) => Ok(byte[0]),
            Ok(_) => Err(BusError::Other),
            Err(e) => Err(bus_error(&e)),
        }
    }

    fn write_word(&mut self, addr_hi: u8, word: u16) -> std::result::Result<(), BusError> {
        // Command byte, then the word low byte first
        let [lo, hi] = word.to_le_bytes();
        self.write_all_or_fail(&[addr_hi, lo, hi])
    }

    fn send_block(&mut self, bytes: &[u8]) -> std::result::Result<(), BusError> {
        self.write_all_or_fail(bytes)
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(us as u64));
    }
}

fn parse_number(value: &str) -> Option<usize> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

fn parse_addr(key: &str, value: &str) -> std::result::Result<u8, String> {
    parse_number(value)
        .and_then(|a| u8::try_from(a).ok())
        .filter(|a| *a <= 0x7F)
        .ok_or_else(|| format!("Invalid {} value: {} (must be a 7-bit address)", key, value))
}

/// Parse backend options from a list of key-value pairs
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<LinuxI2cConfig, String> {
    let mut config = LinuxI2cConfig::default();

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = value.to_string();
            }
            "addr" => {
                config.user_addr = parse_addr(key, value)?;
            }
            "sysaddr" => {
                config.system_addr = parse_addr(key, value)?;
            }
            "block" => {
                config.block_len =
                    parse_number(value).ok_or_else(|| format!("Invalid block value: {}", value))?;
            }
            _ => {
                log::warn!("linux_i2c: Unknown option: {}={}", key, value);
            }
        }
    }

    if config.device.is_empty() {
        return Err("No device specified. Use dev=/dev/i2c-N".to_string());
    }

    Ok(config)
}
