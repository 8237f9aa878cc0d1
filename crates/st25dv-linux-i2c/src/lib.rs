//! st25dv-linux-i2c - Linux i2c-dev support
//!
//! This crate provides access to ST25DV chips on Linux I2C adapters via the
//! `/dev/i2c-N` device interface.
//!
//! # Overview
//!
//! The chip answers on two 7-bit addresses: 0x53 for user memory, dynamic
//! registers and mailbox, 0x57 for system configuration. The adapter is
//! opened once per address.
//!
//! # Example
//!
//! ```no_run
//! use st25dv_linux_i2c::{LinuxI2c, LinuxI2cConfig};
//! use st25dv_core::{AreaId, Device, DeviceConfig};
//!
//! let config = LinuxI2cConfig::new("/dev/i2c-1");
//! let (primary, system) = LinuxI2c::open_pair(&config)?;
//! let device = Device::attach(primary, system, DeviceConfig::new());
//!
//! let (count, data) = device.read_to_vec(AreaId::DynamicRegister, 0, 8)?;
//! println!("{} bytes: {:02X?}", count, data);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with st25dv CLI
//!
//! ```bash
//! # Dump the dynamic registers
//! st25dv -b linux_i2c:dev=/dev/i2c-1 read dyn 0
//!
//! # Chip strapped to a different address pair
//! st25dv -b linux_i2c:dev=/dev/i2c-1,addr=0x43,sysaddr=0x47 info
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with i2c-dev support enabled (`CONFIG_I2C_CHARDEV`)
//! - Read/write access to `/dev/i2c-N`
//! - No kernel driver bound to either address

pub mod device;
pub mod error;

// Re-exports
pub use device::{bus_error, parse_options, LinuxI2c, LinuxI2cConfig};
pub use error::{LinuxI2cError, Result};
