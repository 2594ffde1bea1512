use std::any::Any;

use crate::bus::{Bus, Capabilities, Device, DeviceId};

/// Byte array answering an inclusive address window. Addresses inside the
/// window map modulo the capacity, so a small array mirrors across a larger
/// window (2 KiB of work RAM repeated over $0000-$1FFF).
pub struct Ram {
    bytes: Vec<u8>,
    addr_min: u16,
    addr_max: u16,
    writable: bool,
}

impl Ram {
    pub fn new(size: usize, addr_min: u16, addr_max: u16) -> Self {
        Ram {
            bytes: vec![0; size],
            addr_min,
            addr_max,
            writable: true,
        }
    }

    /// Read-only image. Writes inside the window are claimed and dropped.
    pub fn rom(bytes: Vec<u8>, addr_min: u16, addr_max: u16) -> Self {
        Ram {
            bytes,
            addr_min,
            addr_max,
            writable: false,
        }
    }

    pub fn contains(&self, addr: u16) -> bool {
        !self.bytes.is_empty() && (self.addr_min..=self.addr_max).contains(&addr)
    }

    fn offset(&self, addr: u16) -> usize {
        (addr - self.addr_min) as usize % self.bytes.len()
    }

    /// Direct read that bypasses the bus. `None` outside the window.
    pub fn peek(&self, addr: u16) -> Option<u8> {
        self.contains(addr).then(|| self.bytes[self.offset(addr)])
    }

    /// Direct write that bypasses the bus and write protection.
    pub fn poke(&mut self, addr: u16, data: u8) -> bool {
        if !self.contains(addr) {
            return false;
        }
        let offset = self.offset(addr);
        self.bytes[offset] = data;
        true
    }

    /// Copy `data` in starting at `addr`, following the window's mirroring.
    pub fn load(&mut self, addr: u16, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            self.poke(addr.wrapping_add(i as u16), byte);
        }
    }

    pub fn window(&self) -> (u16, u16) {
        (self.addr_min, self.addr_max)
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn set_bytes(&mut self, bytes: &[u8]) {
        let len = bytes.len().min(self.bytes.len());
        self.bytes[..len].copy_from_slice(&bytes[..len]);
    }
}

impl Device for Ram {
    fn capabilities(&self) -> Capabilities {
        Capabilities::MEMORY
    }

    fn read(&mut self, addr: u16) -> Option<u8> {
        self.peek(addr)
    }

    fn write(&mut self, addr: u16, data: u8) -> bool {
        if !self.contains(addr) {
            return false;
        }
        if self.writable {
            let offset = self.offset(addr);
            self.bytes[offset] = data;
        }
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Work RAM as wired on the NES: 2 KiB mirrored across $0000-$1FFF.
pub fn work_ram() -> Ram {
    Ram::new(0x800, 0x0000, 0x1FFF)
}

/// Read a byte straight out of a RAM device on `bus`.
pub fn peek(bus: &Bus, id: DeviceId, addr: u16) -> Option<u8> {
    bus.device::<Ram>(id).ok().and_then(|ram| ram.peek(addr))
}
