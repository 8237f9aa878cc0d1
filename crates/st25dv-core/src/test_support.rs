//! In-memory bus used by the unit tests
//!
//! Both endpoints of a [`MockBus`] share one state so tests can look at the
//! combined transaction trace. Delays are recorded, never slept.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use std::sync::Mutex;

use crate::bus::{BusError, BusFeatures, Endpoint, I2cEndpoint};
use crate::transaction::MAX_BLOCK_LEN;

const MEM_SIZE: usize = 0x1_0000;

/// A completed bus call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOp {
    /// Register pointer load
    WriteReg(u16),
    /// Byte receive, tagged with the address it came from
    ReadByte(u16),
    /// Write-word with its command byte and data word
    WriteWord(u8, u16),
    /// Raw block transfer
    SendBlock(Vec<u8>),
}

/// Hook run at the start of every bus call, outside the bus lock
pub type Gate = Arc<dyn Fn(Endpoint) + Send + Sync>;

struct MockState {
    mem: [Vec<u8>; 2],
    pointer: [u16; 2],
    trace: Vec<(Endpoint, BusOp)>,
    delays: Vec<u32>,
    fail_next: usize,
    fail_after: Option<usize>,
    completed: usize,
}

impl MockState {
    fn should_fail(&mut self) -> bool {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return true;
        }
        matches!(self.fail_after, Some(n) if self.completed >= n)
    }
}

fn slot(endpoint: Endpoint) -> usize {
    match endpoint {
        Endpoint::Primary => 0,
        Endpoint::System => 1,
    }
}

/// Shared state behind a pair of mock endpoints
#[derive(Clone)]
pub struct MockBus {
    state: Arc<Mutex<MockState>>,
}

impl MockBus {
    /// Create a bus with both memories zeroed
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                mem: [vec![0; MEM_SIZE], vec![0; MEM_SIZE]],
                pointer: [0; 2],
                trace: Vec::new(),
                delays: Vec::new(),
                fail_next: 0,
                fail_after: None,
                completed: 0,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Endpoint with byte I/O and 32 byte blocks
    pub fn endpoint(&self, endpoint: Endpoint) -> MockEndpoint {
        self.endpoint_with_block_len(endpoint, MAX_BLOCK_LEN)
    }

    /// Endpoint with byte I/O and blocks of at most `block_len` bytes
    pub fn endpoint_with_block_len(&self, endpoint: Endpoint, block_len: usize) -> MockEndpoint {
        MockEndpoint {
            bus: self.clone(),
            endpoint,
            features: BusFeatures::BYTE_IO | BusFeatures::BLOCK_WRITE,
            block_len,
            gate: None,
        }
    }

    /// Endpoint without block support
    pub fn byte_only_endpoint(&self, endpoint: Endpoint) -> MockEndpoint {
        MockEndpoint {
            bus: self.clone(),
            endpoint,
            features: BusFeatures::BYTE_IO,
            block_len: 0,
            gate: None,
        }
    }

    /// Set one byte of chip memory without recording a transaction
    pub fn poke(&self, endpoint: Endpoint, addr: u16, value: u8) {
        self.lock().mem[slot(endpoint)][addr as usize] = value;
    }

    /// Set a run of chip memory without recording a transaction
    pub fn poke_range(&self, endpoint: Endpoint, addr: u16, data: &[u8]) {
        let start = addr as usize;
        self.lock().mem[slot(endpoint)][start..start + data.len()].copy_from_slice(data);
    }

    /// Get one byte of chip memory
    pub fn peek(&self, endpoint: Endpoint, addr: u16) -> u8 {
        self.lock().mem[slot(endpoint)][addr as usize]
    }

    /// Get a run of chip memory
    pub fn peek_range(&self, endpoint: Endpoint, addr: u16, len: usize) -> Vec<u8> {
        let start = addr as usize;
        self.lock().mem[slot(endpoint)][start..start + len].to_vec()
    }

    /// Successful calls on either endpoint, in order
    pub fn ops(&self) -> Vec<BusOp> {
        self.lock().trace.iter().map(|(_, op)| op.clone()).collect()
    }

    /// Successful calls tagged with the endpoint that issued them
    pub fn trace(&self) -> Vec<(Endpoint, BusOp)> {
        self.lock().trace.clone()
    }

    /// Every delay requested so far
    pub fn delays(&self) -> Vec<u32> {
        self.lock().delays.clone()
    }

    /// Fail the next `n` bus calls
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

impl Default for MockBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One bus address of a [`MockBus`]
pub struct MockEndpoint {
    bus: MockBus,
    endpoint: Endpoint,
    features: BusFeatures,
    block_len: usize,
    gate: Option<Gate>,
}

impl MockEndpoint {
    /// Which bus address this is
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Run `gate` at the start of every call
    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    fn call<T>(
        &mut self,
        op: impl FnOnce(&mut MockState, usize) -> (T, BusOp),
        completes: bool,
    ) -> Result<T, BusError> {
        if let Some(gate) = &self.gate {
            gate(self.endpoint);
        }
        std::thread::yield_now();

        let mut state = self.bus.lock();
        if state.should_fail() {
            return Err(BusError::Nack);
        }
        let (value, record) = op(&mut *state, slot(self.endpoint));
        state.trace.push((self.endpoint, record));
        if completes {
            state.completed += 1;
        }
        Ok(value)
    }
}

impl I2cEndpoint for MockEndpoint {
    fn features(&self) -> BusFeatures {
        self.features
    }

    fn max_block_len(&self) -> usize {
        self.block_len
    }

    fn write_reg(&mut self, addr_hi: u8, addr_lo: u8) -> Result<(), BusError> {
        let addr = u16::from_be_bytes([addr_hi, addr_lo]);
        self.call(
            |state, i| {
                state.pointer[i] = addr;
                ((), BusOp::WriteReg(addr))
            },
            false,
        )
    }

    fn read_byte(&mut self) -> Result<u8, BusError> {
        self.call(
            |state, i| {
                let addr = state.pointer[i];
                let value = state.mem[i][addr as usize];
                state.pointer[i] = addr.wrapping_add(1);
                (value, BusOp::ReadByte(addr))
            },
            true,
        )
    }

    fn write_word(&mut self, addr_hi: u8, word: u16) -> Result<(), BusError> {
        let [addr_lo, value] = word.to_le_bytes();
        let addr = u16::from_be_bytes([addr_hi, addr_lo]);
        self.call(
            |state, i| {
                state.mem[i][addr as usize] = value;
                ((), BusOp::WriteWord(addr_hi, word))
            },
            true,
        )
    }

    fn send_block(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        self.call(
            |state, i| {
                if let [hi, lo, data @ ..] = bytes {
                    let start = u16::from_be_bytes([*hi, *lo]) as usize;
                    let end = (start + data.len()).min(MEM_SIZE);
                    state.mem[i][start..end].copy_from_slice(&data[..end - start]);
                }
                ((), BusOp::SendBlock(bytes.to_vec()))
            },
            true,
        )
    }

    fn delay_us(&mut self, us: u32) {
        self.bus.lock().delays.push(us);
    }
}
