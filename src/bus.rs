use std::any::Any;
use std::collections::VecDeque;
use std::fmt;

use bitflags::bitflags;
use thiserror::Error;

use crate::cpu_bus::CpuBus;

/// What `Bus::read` returns when no device claims an address.
pub const OPEN_BUS: Option<u8> = None;

/// Byte the CPU sees on an open-bus read (the floating data lines read high).
pub const OPEN_BUS_DATA: u8 = 0xFF;

bitflags! {
    /// Which parts of the device protocol a device answers to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u8 {
        const TICK = 0b001;
        const READ = 0b010;
        const WRITE = 0b100;
        const MEMORY = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// A component attached to the bus.
///
/// Every method of the protocol is optional: a device advertises what it
/// implements through `capabilities` and the bus never calls the rest.
/// `read` answers `None` and `write` answers `false` for addresses the device
/// does not claim, which lets the next device in priority order respond.
pub trait Device: Any {
    fn capabilities(&self) -> Capabilities;

    fn tick(&mut self, _bus: &mut Bus) {}

    fn read(&mut self, _addr: u16) -> Option<u8> {
        None
    }

    fn write(&mut self, _addr: u16, _data: u8) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Stable handle to a device slot. Handles are never reused, so a handle to
/// a disconnected device keeps failing with `BusError::NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device#{}", self.0)
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    #[error("{0} is not connected to the bus")]
    NotFound(DeviceId),
    #[error("{0} is in use by the current bus operation")]
    Busy(DeviceId),
    #[error("{0} is not of the requested device type")]
    TypeMismatch(DeviceId),
}

enum Slot {
    Vacant,
    Attached(Box<dyn Device>),
    // Checked out while it runs with mutable access to the bus.
    Busy,
}

/// Clock and interconnect. Owns the device arena and routes every tick, read
/// and write; it has no memory of its own.
///
/// Devices are kept in priority order, most recently connected first. That
/// order decides who answers a read or write when windows overlap, so the
/// order in which a machine connects its devices is part of its configuration.
pub struct Bus {
    slots: Vec<Slot>,
    order: VecDeque<DeviceId>,
}

impl Bus {
    pub fn new() -> Self {
        Bus {
            slots: Vec::new(),
            order: VecDeque::new(),
        }
    }

    /// Attach a device ahead of every device already connected.
    pub fn connect<D: Device>(&mut self, device: D) -> DeviceId {
        self.connect_boxed(Box::new(device))
    }

    pub fn connect_boxed(&mut self, device: Box<dyn Device>) -> DeviceId {
        let id = DeviceId(self.slots.len());
        log::debug!("bus: connect {} ({:?})", id, device.capabilities());
        self.slots.push(Slot::Attached(device));
        self.order.push_front(id);
        id
    }

    /// Detach a device and hand it back to the caller.
    pub fn disconnect(&mut self, id: DeviceId) -> Result<Box<dyn Device>, BusError> {
        let position = self
            .order
            .iter()
            .position(|&other| other == id)
            .ok_or(BusError::NotFound(id))?;

        match self.slots.get(id.0) {
            Some(Slot::Attached(_)) => {}
            Some(Slot::Busy) => return Err(BusError::Busy(id)),
            _ => return Err(BusError::NotFound(id)),
        }

        self.order.remove(position);
        log::debug!("bus: disconnect {}", id);
        match std::mem::replace(&mut self.slots[id.0], Slot::Vacant) {
            Slot::Attached(device) => Ok(device),
            _ => Err(BusError::NotFound(id)),
        }
    }

    pub fn is_connected(&self, id: DeviceId) -> bool {
        self.order.contains(&id)
    }

    /// Connected devices, highest priority first.
    pub fn devices(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// One clock cycle: every ticking device is ticked once, in priority order.
    /// The order is fixed when the cycle starts; a device connected during it
    /// first ticks on the next cycle, one disconnected during it is skipped.
    pub fn tick(&mut self) {
        let order: Vec<DeviceId> = self.order.iter().copied().collect();
        for id in order {
            let wants_tick = matches!(
                self.slots.get(id.0),
                Some(Slot::Attached(device)) if device.capabilities().contains(Capabilities::TICK)
            );
            if !wants_tick {
                continue;
            }

            if let Some(mut device) = self.check_out(id) {
                device.tick(self);
                self.check_in(id, device);
            }
        }
    }

    /// First device to claim `addr` answers; `OPEN_BUS` if none does.
    pub fn read(&mut self, addr: u16) -> Option<u8> {
        for &id in &self.order {
            if let Some(Slot::Attached(device)) = self.slots.get_mut(id.0) {
                if !device.capabilities().contains(Capabilities::READ) {
                    continue;
                }
                if let Some(data) = device.read(addr) {
                    return Some(data);
                }
            }
        }
        OPEN_BUS
    }

    /// First device to claim `addr` takes the write. Returns `false` on open bus.
    pub fn write(&mut self, addr: u16, data: u8) -> bool {
        for &id in &self.order {
            if let Some(Slot::Attached(device)) = self.slots.get_mut(id.0) {
                if !device.capabilities().contains(Capabilities::WRITE) {
                    continue;
                }
                if device.write(addr, data) {
                    return true;
                }
            }
        }
        false
    }

    pub fn device<D: Device>(&self, id: DeviceId) -> Result<&D, BusError> {
        match self.slots.get(id.0) {
            Some(Slot::Attached(device)) => device
                .as_any()
                .downcast_ref::<D>()
                .ok_or(BusError::TypeMismatch(id)),
            Some(Slot::Busy) => Err(BusError::Busy(id)),
            _ => Err(BusError::NotFound(id)),
        }
    }

    pub fn device_mut<D: Device>(&mut self, id: DeviceId) -> Result<&mut D, BusError> {
        match self.slots.get_mut(id.0) {
            Some(Slot::Attached(device)) => device
                .as_any_mut()
                .downcast_mut::<D>()
                .ok_or(BusError::TypeMismatch(id)),
            Some(Slot::Busy) => Err(BusError::Busy(id)),
            _ => Err(BusError::NotFound(id)),
        }
    }

    /// Run `f` with a device and the rest of the bus at the same time, e.g. to
    /// raise an interrupt on the CPU, which needs the bus to push its state.
    /// The device does not see its own reads and writes while checked out.
    pub fn with_device<D, R>(
        &mut self,
        id: DeviceId,
        f: impl FnOnce(&mut D, &mut Bus) -> R,
    ) -> Result<R, BusError>
    where
        D: Device,
    {
        self.device::<D>(id)?;
        let mut device = self.check_out(id).ok_or(BusError::NotFound(id))?;
        let result = match device.as_any_mut().downcast_mut::<D>() {
            Some(concrete) => Ok(f(concrete, self)),
            None => Err(BusError::TypeMismatch(id)),
        };
        self.check_in(id, device);
        result
    }

    fn check_out(&mut self, id: DeviceId) -> Option<Box<dyn Device>> {
        let slot = self.slots.get_mut(id.0)?;
        match std::mem::replace(slot, Slot::Busy) {
            Slot::Attached(device) => Some(device),
            other => {
                *slot = other;
                None
            }
        }
    }

    fn check_in(&mut self, id: DeviceId, device: Box<dyn Device>) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            *slot = Slot::Attached(device);
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBus for Bus {
    fn read_u8(&mut self, addr: u16) -> u8 {
        self.read(addr).unwrap_or(OPEN_BUS_DATA)
    }

    fn write_u8(&mut self, addr: u16, value: u8) {
        if !self.write(addr, value) {
            log::trace!("bus: write ${:02X} to unmapped ${:04X}", value, addr);
        }
    }
}
