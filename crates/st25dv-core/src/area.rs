//! Area table
//!
//! The chip exposes four fixed memory areas. Each one has a size and a base
//! offset into the register address space of the bus endpoint it lives
//! behind, plus an in-memory shadow of its last known contents.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::ops::Range;

use crate::bus::Endpoint;
use crate::error::{Error, Result};

/// Size of the system configuration area
pub const SYS_MEM_SIZE: usize = 0x24;

/// Size of the dynamic register area
pub const DYN_REG_SIZE: usize = 0x8;

/// Size of the mailbox buffer
pub const MAILBOX_SIZE: usize = 0x100;

/// Register address of the first dynamic register
pub const DYN_REG_OFF: u16 = 0x2000;

/// Register address of the first mailbox byte
pub const MAILBOX_OFF: u16 = 0x2008;

/// Value every shadow byte holds before the first transfer
pub const SHADOW_FILL: u8 = 0xFF;

/// Logical memory areas of the chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AreaId {
    /// User EEPROM
    User = 0,
    /// System configuration EEPROM
    System = 1,
    /// Volatile dynamic registers
    DynamicRegister = 2,
    /// Fast transfer mode mailbox
    Mailbox = 3,
}

impl AreaId {
    /// All areas, in table order
    pub const ALL: [AreaId; 4] = [
        AreaId::User,
        AreaId::System,
        AreaId::DynamicRegister,
        AreaId::Mailbox,
    ];

    /// Canonical name of the area as exposed to callers
    pub const fn name(self) -> &'static str {
        match self {
            Self::User => "st25dv_user",
            Self::System => "st25dv_sys",
            Self::DynamicRegister => "st25dv_dyn_reg",
            Self::Mailbox => "st25dv_mailbox",
        }
    }

    /// Look an area up by canonical name or short alias (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let is = |candidate: &str| name.eq_ignore_ascii_case(candidate);

        if is("st25dv_user") || is("user") {
            Some(Self::User)
        } else if is("st25dv_sys") || is("sys") || is("system") {
            Some(Self::System)
        } else if is("st25dv_dyn_reg") || is("dyn") || is("dyn_reg") {
            Some(Self::DynamicRegister)
        } else if is("st25dv_mailbox") || is("mailbox") || is("mb") {
            Some(Self::Mailbox)
        } else {
            None
        }
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// User memory size variants of the family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Variant {
    /// 4-Kbit part
    #[default]
    St25dv04k,
    /// 16-Kbit part
    St25dv16k,
    /// 64-Kbit part
    St25dv64k,
}

impl Variant {
    /// All variants
    pub const ALL: [Variant; 3] = [Variant::St25dv04k, Variant::St25dv16k, Variant::St25dv64k];

    /// User memory size in bytes
    pub const fn user_size(self) -> usize {
        match self {
            Self::St25dv04k => 512,
            Self::St25dv16k => 2000,
            Self::St25dv64k => 8000,
        }
    }

    /// Part name
    pub const fn name(self) -> &'static str {
        match self {
            Self::St25dv04k => "ST25DV04K",
            Self::St25dv16k => "ST25DV16K",
            Self::St25dv64k => "ST25DV64K",
        }
    }

    /// Parse `04k`/`16k`/`64k` or a full part name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let short = lower.strip_prefix("st25dv").unwrap_or(&lower);
        match short {
            "04k" | "4k" => Some(Self::St25dv04k),
            "16k" => Some(Self::St25dv16k),
            "64k" => Some(Self::St25dv64k),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of one area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaLayout {
    /// Which area this is
    pub id: AreaId,
    /// Size in bytes
    pub size: usize,
    /// Register address of the first byte of the area
    pub base_offset: u16,
    /// Bus address the area is reached through
    pub endpoint: Endpoint,
}

impl AreaLayout {
    /// Layout of `id` on the given variant
    pub const fn of(id: AreaId, variant: Variant) -> Self {
        match id {
            AreaId::User => Self {
                id,
                size: variant.user_size(),
                base_offset: 0,
                endpoint: Endpoint::Primary,
            },
            AreaId::System => Self {
                id,
                size: SYS_MEM_SIZE,
                base_offset: 0,
                endpoint: Endpoint::System,
            },
            AreaId::DynamicRegister => Self {
                id,
                size: DYN_REG_SIZE,
                base_offset: DYN_REG_OFF,
                endpoint: Endpoint::Primary,
            },
            AreaId::Mailbox => Self {
                id,
                size: MAILBOX_SIZE,
                base_offset: MAILBOX_OFF,
                endpoint: Endpoint::Primary,
            },
        }
    }

    /// Check if a range is valid for this area
    pub fn is_valid_range(&self, offset: u16, len: usize) -> bool {
        (offset as usize)
            .checked_add(len)
            .is_some_and(|end| end <= self.size)
    }
}

/// One area together with its shadow buffer
#[derive(Debug, Clone)]
pub struct Area {
    layout: AreaLayout,
    shadow: Vec<u8>,
}

impl Area {
    /// Create the area with a shadow filled with [`SHADOW_FILL`]
    pub fn new(layout: AreaLayout) -> Self {
        Self {
            layout,
            shadow: vec![SHADOW_FILL; layout.size],
        }
    }

    /// Static description of the area
    pub fn layout(&self) -> &AreaLayout {
        &self.layout
    }

    /// Area identity
    pub fn id(&self) -> AreaId {
        self.layout.id
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.layout.size
    }

    /// Last known contents
    pub fn shadow(&self) -> &[u8] {
        &self.shadow
    }

    pub(crate) fn shadow_mut(&mut self) -> &mut [u8] {
        &mut self.shadow
    }

    /// Validate a request and return the shadow index range it covers
    pub fn check_range(&self, offset: u16, len: usize) -> Result<Range<usize>> {
        if !self.layout.is_valid_range(offset, len) {
            return Err(Error::AddressOutOfBounds {
                area: self.layout.id,
                offset,
                len,
            });
        }
        let start = offset as usize;
        Ok(start..start + len)
    }

    /// Register address of the area-relative index `rel`
    ///
    /// `rel` must come from a range returned by [`Self::check_range`].
    pub fn absolute(&self, rel: usize) -> u16 {
        self.layout.base_offset + rel as u16
    }
}

/// The closed set of areas of one chip
#[derive(Debug, Clone)]
pub struct AreaTable {
    variant: Variant,
    areas: [Area; 4],
}

impl AreaTable {
    /// Build all four areas for a variant
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            areas: AreaId::ALL.map(|id| Area::new(AreaLayout::of(id, variant))),
        }
    }

    /// Variant the table was built for
    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Resolve an area
    pub fn get(&self, id: AreaId) -> &Area {
        &self.areas[id as usize]
    }

    /// Resolve an area for mutation
    pub fn get_mut(&mut self, id: AreaId) -> &mut Area {
        &mut self.areas[id as usize]
    }

    /// Iterate over all areas in table order
    pub fn iter(&self) -> impl Iterator<Item = &Area> {
        self.areas.iter()
    }
}
