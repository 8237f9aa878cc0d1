//! st25dv-core - Core library for ST25DV dynamic NFC tags
//!
//! This crate provides area-based byte access to the EEPROM, dynamic
//! registers and mailbox of an ST25DV chip, plus the I2C password protocol.
//! It is designed to be `no_std` compatible (with `alloc`) for use in
//! embedded environments.
//!
//! # Features
//!
//! - `std` - Enable standard library support and the shared [`Device`] handle
//!
//! # Example
//!
//! ```ignore
//! use st25dv_core::{AreaId, DeviceConfig, St25dv, bus::I2cEndpoint};
//!
//! fn dump_mailbox<E: I2cEndpoint>(primary: E, system: E) {
//!     let mut chip = St25dv::new(primary, system, DeviceConfig::new());
//!     let mut buf = [0u8; 256];
//!     match chip.read(AreaId::Mailbox, 0, &mut buf) {
//!         Ok(n) => println!("Read {} bytes", n),
//!         Err(e) => println!("Read failed: {}", e),
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod area;
pub mod block;
pub mod bus;
pub mod chip;
#[cfg(feature = "std")]
pub mod device;
pub mod engine;
pub mod error;
pub mod password;
pub mod transaction;

#[cfg(all(test, feature = "std"))]
mod test_support;

pub use area::{AreaId, AreaLayout, Variant};
pub use chip::{DeviceConfig, St25dv, WriteMode};
#[cfg(feature = "std")]
pub use device::Device;
pub use error::{Error, Result};
