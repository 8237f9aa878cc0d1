//! Shared device handle
//!
//! One [`Device`] per physical chip. Every area of the chip is reached
//! through the same mutex, which is held for the whole of a read, write or
//! password call, so transactions to one chip never interleave on the bus.
//! Separate devices have separate locks and proceed independently.

use alloc::vec;
use alloc::vec::Vec;
use std::sync::{Mutex, MutexGuard};

use crate::area::{AreaId, AreaLayout, Variant};
use crate::bus::I2cEndpoint;
use crate::chip::{DeviceConfig, St25dv};
use crate::error::{Error, Result};

/// Thread-safe handle to one chip
pub struct Device<E> {
    inner: Mutex<St25dv<E>>,
}

impl<E: I2cEndpoint> Device<E> {
    /// Attach to a chip reached through `primary` and `system`
    pub fn attach(primary: E, system: E, config: DeviceConfig) -> Self {
        Self {
            inner: Mutex::new(St25dv::new(primary, system, config)),
        }
    }

    // A panic in another caller leaves the driver itself consistent; the
    // shadow may be ahead of the chip, which reads already tolerate.
    fn lock(&self) -> MutexGuard<'_, St25dv<E>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// User memory variant
    pub fn variant(&self) -> Variant {
        self.lock().variant()
    }

    /// Static description of an area
    pub fn layout(&self, area: AreaId) -> AreaLayout {
        self.lock().layout(area)
    }

    /// Read into `buf`, returning the number of bytes read
    pub fn read(&self, area: AreaId, offset: u16, buf: &mut [u8]) -> Result<usize> {
        self.lock().read(area, offset, buf)
    }

    /// Read `len` bytes into a new buffer
    ///
    /// Returns the byte count together with the data, truncated to that count.
    /// The range is checked before the buffer is allocated.
    pub fn read_to_vec(&self, area: AreaId, offset: u16, len: usize) -> Result<(usize, Vec<u8>)> {
        let mut chip = self.lock();
        if !chip.layout(area).is_valid_range(offset, len) {
            return Err(Error::AddressOutOfBounds { area, offset, len });
        }

        let mut data = vec![0u8; len];
        let count = chip.read(area, offset, &mut data)?;
        data.truncate(count);
        Ok((count, data))
    }

    /// Write `data`, returning the number of bytes confirmed written
    pub fn write(&self, area: AreaId, offset: u16, data: &[u8]) -> Result<usize> {
        self.lock().write(area, offset, data)
    }

    /// Open the I2C security session
    pub fn present_password(&self, secret: &[u8]) -> Result<()> {
        self.lock().present_password(secret)
    }

    /// Replace the I2C password
    pub fn change_password(&self, secret: &[u8]) -> Result<()> {
        self.lock().change_password(secret)
    }

    /// Copy of the last known contents of an area
    pub fn shadow_snapshot(&self, area: AreaId) -> Vec<u8> {
        self.lock().shadow(area).to_vec()
    }

    /// Detach from the chip, handing back both endpoints
    pub fn detach(self) -> (E, E) {
        self.inner
            .into_inner()
            .unwrap_or_else(|e| e.into_inner())
            .release()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::area::SHADOW_FILL;
    use crate::bus::Endpoint;
    use crate::test_support::{Gate, MockBus, MockEndpoint};
    use alloc::sync::Arc;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn attach(bus: &MockBus) -> Device<MockEndpoint> {
        Device::attach(
            bus.endpoint(Endpoint::Primary),
            bus.endpoint(Endpoint::System),
            DeviceConfig::new(),
        )
    }

    #[test]
    fn test_device_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device<MockEndpoint>>();
    }

    #[test]
    fn test_calls_on_one_device_never_interleave() {
        let bus = MockBus::new();
        let device = Arc::new(attach(&bus));

        let handles: Vec<_> = [AreaId::User, AreaId::System]
            .into_iter()
            .map(|area| {
                let device = Arc::clone(&device);
                thread::spawn(move || {
                    let mut buf = [0u8; 32];
                    device.read(area, 0, &mut buf).unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 32);
        }

        // One call ran to completion before the other started
        let trace = bus.trace();
        assert_eq!(trace.len(), 128);
        let switches = trace.windows(2).filter(|w| w[0].0 != w[1].0).count();
        assert_eq!(switches, 1);
    }

    #[test]
    fn test_separate_devices_do_not_block_each_other() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let release_rx = Mutex::new(release_rx);
        let gate: Gate = Arc::new(move |_| {
            let _ = entered_tx.lock().unwrap().send(());
            let _ = release_rx.lock().unwrap().recv();
        });

        let bus_a = MockBus::new();
        let device_a = Arc::new(Device::attach(
            bus_a.endpoint(Endpoint::Primary).with_gate(gate),
            bus_a.endpoint(Endpoint::System),
            DeviceConfig::new(),
        ));
        let bus_b = MockBus::new();
        bus_b.poke(Endpoint::Primary, 0, 0x42);
        let device_b = attach(&bus_b);

        let stalled = {
            let device_a = Arc::clone(&device_a);
            thread::spawn(move || {
                let mut buf = [0u8; 1];
                device_a.read(AreaId::User, 0, &mut buf).unwrap()
            })
        };
        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("device A never reached the bus");

        // Device A is parked mid-transaction holding its lock
        let (count, data) = device_b.read_to_vec(AreaId::User, 0, 1).unwrap();
        assert_eq!((count, data), (1, vec![0x42]));

        drop(release_tx);
        assert_eq!(stalled.join().unwrap(), 1);
    }

    #[test]
    fn test_password_then_system_write() {
        let bus = MockBus::new();
        let device = attach(&bus);

        device.present_password(&[0; 8]).unwrap();
        assert_eq!(device.write(AreaId::System, 0, &[0x0C]).unwrap(), 1);
        assert_eq!(bus.peek(Endpoint::System, 0), 0x0C);
        assert_eq!(device.shadow_snapshot(AreaId::System)[0], 0x0C);
    }

    #[test]
    fn test_read_to_vec_truncates_on_failure() {
        let bus = MockBus::new();
        bus.fail_after(3);
        let device = attach(&bus);

        let (count, data) = device.read_to_vec(AreaId::Mailbox, 0, 10).unwrap();
        assert_eq!(count, 3);
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn test_read_to_vec_rejects_huge_length() {
        let bus = MockBus::new();
        let device = attach(&bus);

        assert_eq!(
            device.read_to_vec(AreaId::User, 0, usize::MAX),
            Err(Error::AddressOutOfBounds {
                area: AreaId::User,
                offset: 0,
                len: usize::MAX
            })
        );
        assert!(matches!(
            device.read_to_vec(AreaId::Mailbox, 0x10, usize::MAX / 2),
            Err(Error::AddressOutOfBounds { .. })
        ));
        assert!(bus.trace().is_empty());
    }

    #[test]
    fn test_writers_on_one_device_never_interleave() {
        let bus = MockBus::new();
        let device = Arc::new(attach(&bus));

        let handles: Vec<_> = [(AreaId::User, 0x11u8), (AreaId::System, 0x22u8)]
            .into_iter()
            .map(|(area, fill)| {
                let device = Arc::clone(&device);
                thread::spawn(move || device.write(area, 0, &[fill; 32]).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 32);
        }

        // One word write per byte, one endpoint switch between the two calls
        let trace = bus.trace();
        assert_eq!(trace.len(), 64);
        let switches = trace.windows(2).filter(|w| w[0].0 != w[1].0).count();
        assert_eq!(switches, 1);
        assert_eq!(bus.peek_range(Endpoint::Primary, 0, 32), vec![0x11; 32]);
        assert_eq!(bus.peek_range(Endpoint::System, 0, 32), vec![0x22; 32]);
    }

    #[test]
    fn test_detach_hands_back_endpoints() {
        let bus = MockBus::new();
        let device = attach(&bus);
        assert!(device
            .shadow_snapshot(AreaId::DynamicRegister)
            .iter()
            .all(|&b| b == SHADOW_FILL));
        assert_eq!(device.layout(AreaId::Mailbox).base_offset, 0x2008);

        let (primary, system) = device.detach();
        assert_eq!(primary.endpoint(), Endpoint::Primary);
        assert_eq!(system.endpoint(), Endpoint::System);
        assert!(bus.ops().is_empty());
    }
}
