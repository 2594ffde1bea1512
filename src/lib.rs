//! A cycle-counted 6502 core for NES emulation, and the device bus it runs on.

pub mod bus;
pub mod cartridge;
pub mod cpu;
pub mod cpu_bus;
pub mod debug_flags;
pub mod debugger;
pub mod emulator;
pub mod memory;
pub mod save_state;

pub use bus::{Bus, BusError, Capabilities, Device, DeviceId, OPEN_BUS};
pub use cpu::{Cpu, CpuConfig, CpuError, SbcOverflow, StatusFlags};
pub use cpu_bus::CpuBus;
pub use emulator::{Emulator, EmulatorError};
