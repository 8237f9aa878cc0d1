//! st25dv-dummy - In-memory ST25DV emulator for testing
//!
//! This crate provides a dummy chip that answers on both bus addresses of an
//! ST25DV and keeps its memories in RAM. It's useful for testing and
//! development without real hardware.
//!
//! The emulator enforces the I2C security session: system configuration
//! writes and password changes are refused with a NACK until the correct
//! password has been presented. Session state is visible in bit 0 of the
//! `I2C_SSO_Dyn` dynamic register, as on the real part.

use std::sync::{Arc, Mutex, MutexGuard};

use st25dv_core::area::{
    AreaId, AreaLayout, Variant, DYN_REG_OFF, DYN_REG_SIZE, MAILBOX_OFF, MAILBOX_SIZE,
    SYS_MEM_SIZE,
};
use st25dv_core::bus::{BusError, BusFeatures, Endpoint, I2cEndpoint};
use st25dv_core::password::{
    PasswordCommand, CMD_POS, FRAME_LEN, I2C_SSO_DYN, I2C_SSO_OPEN, PASSWORD_LEN, PASSWORD_REG,
};
use st25dv_core::transaction::MAX_BLOCK_LEN;

/// Configuration for the dummy chip
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// User memory variant
    pub variant: Variant,
    /// Largest block transfer accepted, address prefix included
    pub block_len: usize,
    /// Current I2C password
    pub password: u64,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            block_len: MAX_BLOCK_LEN,
            password: 0,
        }
    }
}

impl DummyConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the user memory variant
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    /// Set the block transfer limit
    pub fn with_block_len(mut self, block_len: usize) -> Self {
        self.block_len = block_len;
        self
    }

    /// Set the initial I2C password
    pub fn with_password(mut self, password: u64) -> Self {
        self.password = password;
        self
    }
}

/// Bus call kinds seen by the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DummyCall {
    /// Register pointer load
    WriteReg(u16),
    /// Byte receive at the given address
    ReadByte(u16),
    /// Single byte write
    WriteWord(u16),
    /// Block write: start address and total transfer length
    SendBlock(u16, usize),
}

/// One recorded bus call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEntry {
    /// Bus address the call went to
    pub endpoint: Endpoint,
    /// What was asked
    pub call: DummyCall,
    /// How the emulator answered
    pub result: Result<(), BusError>,
}

struct ChipState {
    variant: Variant,
    block_len: usize,
    user: Vec<u8>,
    system: [u8; SYS_MEM_SIZE],
    dyn_reg: [u8; DYN_REG_SIZE],
    mailbox: [u8; MAILBOX_SIZE],
    password: u64,
    session_open: bool,
    pointer: [u16; 2],
    trace: Vec<TraceEntry>,
    fail_next: usize,
    fail_after: Option<usize>,
    completed: usize,
}

fn slot(endpoint: Endpoint) -> usize {
    match endpoint {
        Endpoint::Primary => 0,
        Endpoint::System => 1,
    }
}

impl ChipState {
    /// Map a register address on `endpoint` to an area and an index into it
    fn decode(&self, endpoint: Endpoint, addr: u16) -> Option<(AreaId, usize)> {
        let a = addr as usize;
        let dyn_start = DYN_REG_OFF as usize;
        let mb_start = MAILBOX_OFF as usize;
        match endpoint {
            Endpoint::Primary if a < self.user.len() => Some((AreaId::User, a)),
            Endpoint::Primary if (dyn_start..dyn_start + DYN_REG_SIZE).contains(&a) => {
                Some((AreaId::DynamicRegister, a - dyn_start))
            }
            Endpoint::Primary if (mb_start..mb_start + MAILBOX_SIZE).contains(&a) => {
                Some((AreaId::Mailbox, a - mb_start))
            }
            Endpoint::System if a < SYS_MEM_SIZE => Some((AreaId::System, a)),
            _ => None,
        }
    }

    fn area(&self, area: AreaId) -> &[u8] {
        match area {
            AreaId::User => &self.user,
            AreaId::System => &self.system,
            AreaId::DynamicRegister => &self.dyn_reg,
            AreaId::Mailbox => &self.mailbox,
        }
    }

    fn area_mut(&mut self, area: AreaId) -> &mut [u8] {
        match area {
            AreaId::User => &mut self.user,
            AreaId::System => &mut self.system,
            AreaId::DynamicRegister => &mut self.dyn_reg,
            AreaId::Mailbox => &mut self.mailbox,
        }
    }

    fn load(&self, area: AreaId, index: usize) -> u8 {
        let value = self.area(area)[index];
        if area == AreaId::DynamicRegister && index == I2C_SSO_DYN as usize {
            let open = if self.session_open { I2C_SSO_OPEN } else { 0 };
            (value & !I2C_SSO_OPEN) | open
        } else {
            value
        }
    }

    fn store(&mut self, area: AreaId, index: usize, value: u8) -> Result<(), BusError> {
        if area == AreaId::System && !self.session_open {
            log::debug!("dummy: system write at 0x{:04X} refused, session closed", index);
            return Err(BusError::Nack);
        }
        self.area_mut(area)[index] = value;
        Ok(())
    }

    fn should_fail(&mut self) -> bool {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return true;
        }
        matches!(self.fail_after, Some(n) if self.completed >= n)
    }

    fn write_reg(&mut self, endpoint: Endpoint, addr: u16) -> Result<(), BusError> {
        self.pointer[slot(endpoint)] = addr;
        Ok(())
    }

    fn read_byte(&mut self, endpoint: Endpoint) -> Result<u8, BusError> {
        let addr = self.pointer[slot(endpoint)];
        self.pointer[slot(endpoint)] = addr.wrapping_add(1);
        let (area, index) = self.decode(endpoint, addr).ok_or(BusError::Nack)?;
        Ok(self.load(area, index))
    }

    fn write_word(&mut self, endpoint: Endpoint, addr: u16, value: u8) -> Result<(), BusError> {
        let (area, index) = self.decode(endpoint, addr).ok_or(BusError::Nack)?;
        self.store(area, index, value)
    }

    fn send_block(&mut self, endpoint: Endpoint, bytes: &[u8]) -> Result<(), BusError> {
        let (addr, data) = match bytes {
            [hi, lo, data @ ..] => (u16::from_be_bytes([*hi, *lo]), data),
            _ => return Err(BusError::Nack),
        };
        if endpoint == Endpoint::System && addr == PASSWORD_REG {
            return self.password_command(bytes);
        }
        if bytes.len() > self.block_len {
            return Err(BusError::Other);
        }

        let (area, start) = self.decode(endpoint, addr).ok_or(BusError::Nack)?;
        let end = start + data.len();
        if end > self.area(area).len() {
            return Err(BusError::Nack);
        }
        if area == AreaId::System && !self.session_open {
            return Err(BusError::Nack);
        }
        self.area_mut(area)[start..end].copy_from_slice(data);
        Ok(())
    }

    fn password_command(&mut self, frame: &[u8]) -> Result<(), BusError> {
        if frame.len() != FRAME_LEN {
            return Err(BusError::Nack);
        }
        let first = &frame[2..2 + PASSWORD_LEN];
        let second = &frame[CMD_POS + 1..];
        if first != second {
            log::debug!("dummy: password copies disagree");
            return Err(BusError::Nack);
        }
        let mut value = [0u8; PASSWORD_LEN];
        value.copy_from_slice(first);
        let value = u64::from_be_bytes(value);

        match frame[CMD_POS] {
            c if c == PasswordCommand::Present.code() => {
                self.session_open = value == self.password;
                log::debug!(
                    "dummy: password presented, session {}",
                    if self.session_open { "open" } else { "closed" }
                );
                Ok(())
            }
            c if c == PasswordCommand::Change.code() => {
                if !self.session_open {
                    log::debug!("dummy: password change refused, session closed");
                    return Err(BusError::Nack);
                }
                self.password = value;
                log::debug!("dummy: password changed");
                Ok(())
            }
            _ => Err(BusError::Nack),
        }
    }
}

/// Dummy ST25DV chip
///
/// Cloning yields another handle to the same chip.
#[derive(Clone)]
pub struct DummySt25dv {
    state: Arc<Mutex<ChipState>>,
}

impl DummySt25dv {
    /// Create a new dummy chip with all memories cleared
    pub fn new(config: DummyConfig) -> Self {
        let user_size = AreaLayout::of(AreaId::User, config.variant).size;
        Self {
            state: Arc::new(Mutex::new(ChipState {
                variant: config.variant,
                block_len: config.block_len,
                user: vec![0; user_size],
                system: [0; SYS_MEM_SIZE],
                dyn_reg: [0; DYN_REG_SIZE],
                mailbox: [0; MAILBOX_SIZE],
                password: config.password,
                session_open: false,
                pointer: [0; 2],
                trace: Vec::new(),
                fail_next: 0,
                fail_after: None,
                completed: 0,
            })),
        }
    }

    /// Create a new dummy chip with default configuration (ST25DV04K)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    fn lock(&self) -> MutexGuard<'_, ChipState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get bus endpoints for the primary and system addresses
    pub fn endpoints(&self) -> (DummyEndpoint, DummyEndpoint) {
        (self.endpoint(Endpoint::Primary), self.endpoint(Endpoint::System))
    }

    /// Get the bus endpoint answering on one address
    pub fn endpoint(&self, endpoint: Endpoint) -> DummyEndpoint {
        DummyEndpoint {
            chip: self.clone(),
            endpoint,
        }
    }

    /// User memory variant
    pub fn variant(&self) -> Variant {
        self.lock().variant
    }

    /// Copy of the raw contents of an area
    pub fn memory(&self, area: AreaId) -> Vec<u8> {
        self.lock().area(area).to_vec()
    }

    /// Overwrite part of an area, bypassing the bus and the session check
    pub fn load(&self, area: AreaId, offset: usize, data: &[u8]) {
        let mut state = self.lock();
        let mem = state.area_mut(area);
        if offset >= mem.len() {
            return;
        }
        let len = data.len().min(mem.len() - offset);
        mem[offset..offset + len].copy_from_slice(&data[..len]);
    }

    /// Whether the I2C security session is open
    pub fn session_open(&self) -> bool {
        self.lock().session_open
    }

    /// Current I2C password
    pub fn password(&self) -> u64 {
        self.lock().password
    }

    /// Every bus call so far
    pub fn trace(&self) -> Vec<TraceEntry> {
        self.lock().trace.clone()
    }

    /// Fail the next `n` bus calls with a NACK
    pub fn fail_next(&self, n: usize) {
        self.lock().fail_next = n;
    }

    /// Fail every call once `n` transfers have completed
    pub fn fail_after(&self, n: usize) {
        self.lock().fail_after = Some(n);
    }

    /// Drop all pending fault injection
    pub fn clear_faults(&self) {
        let mut state = self.lock();
        state.fail_next = 0;
        state.fail_after = None;
    }
}

/// One bus address of a [`DummySt25dv`]
pub struct DummyEndpoint {
    chip: DummySt25dv,
    endpoint: Endpoint,
}

impl DummyEndpoint {
    /// Which bus address this is
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    fn call<T>(
        &mut self,
        call: DummyCall,
        completes: bool,
        op: impl FnOnce(&mut ChipState) -> Result<T, BusError>,
    ) -> Result<T, BusError> {
        let mut state = self.chip.lock();
        let result = if state.should_fail() {
            Err(BusError::Nack)
        } else {
            op(&mut *state)
        };
        if result.is_ok() && completes {
            state.completed += 1;
        }
        state.trace.push(TraceEntry {
            endpoint: self.endpoint,
            call,
            result: result.as_ref().map(|_| ()).map_err(|e| *e),
        });
        result
    }
}

impl I2cEndpoint for DummyEndpoint {
    fn features(&self) -> BusFeatures {
        BusFeatures::BYTE_IO | BusFeatures::BLOCK_WRITE
    }

    fn max_block_len(&self) -> usize {
        self.chip.lock().block_len
    }

    fn write_reg(&mut self, addr_hi: u8, addr_lo: u8) -> Result<(), BusError> {
        let addr = u16::from_be_bytes([addr_hi, addr_lo]);
        let endpoint = self.endpoint;
        self.call(DummyCall::WriteReg(addr), false, |state| {
            state.write_reg(endpoint, addr)
        })
    }

    fn read_byte(&mut self) -> Result<u8, BusError> {
        let endpoint = self.endpoint;
        let addr = self.chip.lock().pointer[slot(endpoint)];
        self.call(DummyCall::ReadByte(addr), true, |state| {
            state.read_byte(endpoint)
        })
    }

    fn write_word(&mut self, addr_hi: u8, word: u16) -> Result<(), BusError> {
        let [addr_lo, value] = word.to_le_bytes();
        let addr = u16::from_be_bytes([addr_hi, addr_lo]);
        let endpoint = self.endpoint;
        self.call(DummyCall::WriteWord(addr), true, |state| {
            state.write_word(endpoint, addr, value)
        })
    }

    fn send_block(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        let addr = match bytes {
            [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
            _ => 0,
        };
        let endpoint = self.endpoint;
        self.call(DummyCall::SendBlock(addr, bytes.len()), true, |state| {
            state.send_block(endpoint, bytes)
        })
    }

    fn delay_us(&mut self, _us: u32) {
        // No delay needed for in-memory operations
    }
}

fn parse_number(value: &str) -> Option<usize> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

/// Parse a 64-bit password given as up to 16 hex digits, most significant first
pub fn parse_password(value: &str) -> Option<u64> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if digits.is_empty() || digits.len() > 2 * PASSWORD_LEN {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// Parse backend options from a list of key-value pairs
pub fn parse_options(options: &[(&str, &str)]) -> Result<DummyConfig, String> {
    let mut config = DummyConfig::default();

    for (key, value) in options {
        match *key {
            "variant" => {
                config.variant = Variant::from_name(value)
                    .ok_or_else(|| format!("Invalid variant: {} (use 04k, 16k or 64k)", value))?;
            }
            "block" => {
                config.block_len = parse_number(value)
                    .ok_or_else(|| format!("Invalid block value: {}", value))?;
            }
            "password" => {
                config.password = parse_password(value)
                    .ok_or_else(|| format!("Invalid password: {} (up to 16 hex digits)", value))?;
            }
            _ => {
                log::warn!("dummy: Unknown option: {}={}", key, value);
            }
        }
    }

    Ok(config)
}
