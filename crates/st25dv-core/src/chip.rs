//! ST25DV chip driver
//!
//! [`St25dv`] owns both bus endpoints of one chip together with its area
//! table and dispatches every request to the endpoint its area lives
//! behind. All I/O takes `&mut self`; wrap the driver in [`crate::Device`]
//! to share it between threads.

use crate::area::{Area, AreaId, AreaLayout, AreaTable, Variant};
use crate::block;
use crate::bus::{Endpoint, I2cEndpoint};
use crate::engine;
use crate::error::Result;
use crate::password::{self, PasswordCommand};

/// How writes are moved to the chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// One write-word transaction per byte
    #[default]
    Byte,
    /// Address-prefixed blocks up to the endpoint's block limit
    Block,
}

/// Configuration used when attaching to a chip
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceConfig {
    /// User memory variant
    pub variant: Variant,
    /// Write strategy
    pub write_mode: WriteMode,
}

impl DeviceConfig {
    /// Create a configuration with default settings (ST25DV04K, byte writes)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the user memory variant
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    /// Set the write strategy
    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }
}

/// One ST25DV chip reached through its primary and system endpoints
pub struct St25dv<E> {
    primary: E,
    system: E,
    areas: AreaTable,
    write_mode: WriteMode,
}

impl<E: I2cEndpoint> St25dv<E> {
    /// Attach to a chip
    ///
    /// No bus traffic happens here; every shadow starts out as all 0xFF.
    pub fn new(primary: E, system: E, config: DeviceConfig) -> Self {
        log::debug!(
            "st25dv: attached {} ({} byte user memory, {:?} writes)",
            config.variant,
            config.variant.user_size(),
            config.write_mode
        );
        Self {
            primary,
            system,
            areas: AreaTable::new(config.variant),
            write_mode: config.write_mode,
        }
    }

    /// User memory variant
    pub fn variant(&self) -> Variant {
        self.areas.variant()
    }

    /// Write strategy in use
    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    /// Static description of an area
    pub fn layout(&self, area: AreaId) -> AreaLayout {
        *self.areas.get(area).layout()
    }

    /// Last known contents of an area
    pub fn shadow(&self, area: AreaId) -> &[u8] {
        self.areas.get(area).shadow()
    }

    /// Read `buf.len()` bytes from `area` starting at `offset`
    ///
    /// Returns the number of bytes read, which is only less than requested
    /// when a transaction failed partway through.
    pub fn read(&mut self, area: AreaId, offset: u16, buf: &mut [u8]) -> Result<usize> {
        let (endpoint, area) = self.resolve(area);
        engine::read(endpoint, area, offset, buf)
    }

    /// Write `data` to `area` starting at `offset`
    ///
    /// Returns the number of bytes confirmed written, which is only less than
    /// requested when a transaction failed partway through.
    pub fn write(&mut self, area: AreaId, offset: u16, data: &[u8]) -> Result<usize> {
        let write_mode = self.write_mode;
        let (endpoint, area) = self.resolve(area);

        match write_mode {
            WriteMode::Byte => engine::write(endpoint, area, offset, data),
            WriteMode::Block => block::write(endpoint, area, offset, data),
        }
    }

    /// Open the I2C security session
    ///
    /// `secret` must be exactly 8 bytes, least significant byte first.
    pub fn present_password(&mut self, secret: &[u8]) -> Result<()> {
        password::send(&mut self.system, PasswordCommand::Present, secret)
    }

    /// Replace the I2C password (the session must be open)
    ///
    /// `secret` must be exactly 8 bytes, least significant byte first.
    pub fn change_password(&mut self, secret: &[u8]) -> Result<()> {
        password::send(&mut self.system, PasswordCommand::Change, secret)
    }

    /// Detach from the chip, handing back both endpoints
    pub fn release(self) -> (E, E) {
        (self.primary, self.system)
    }

    fn resolve(&mut self, area: AreaId) -> (&mut E, &mut Area) {
        let area = self.areas.get_mut(area);
        let endpoint = match area.layout().endpoint {
            Endpoint::Primary => &mut self.primary,
            Endpoint::System => &mut self.system,
        };
        (endpoint, area)
    }
}
