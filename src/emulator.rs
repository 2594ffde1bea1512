use thiserror::Error;

use crate::bus::{Bus, BusError, DeviceId};
use crate::cartridge::{Cartridge, CartridgeError};
use crate::cpu::{Cpu, CpuConfig, CpuError, RESET_VECTOR};
use crate::debugger::{self, Instruction};
use crate::memory::{self, Ram};
use crate::save_state::{SaveState, SaveStateError};

/// Window a bare program is loaded into when there is no cartridge image.
pub const CART_WINDOW: (u16, u16) = (0x4020, 0xFFFF);

#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Cpu(#[from] CpuError),
    #[error(transparent)]
    Cartridge(#[from] CartridgeError),
    #[error(transparent)]
    SaveState(#[from] SaveStateError),
    #[error("save state holds {actual} bytes of RAM, expected {expected}")]
    RamSize { expected: usize, actual: usize },
}

/// CPU, 2 KiB work RAM and whatever cartridge is inserted, on one bus.
pub struct Emulator {
    bus: Bus,
    cpu: DeviceId,
    ram: DeviceId,
    cartridge: Vec<DeviceId>,
    total_cycles: u64,
}

impl Emulator {
    pub fn new() -> Self {
        Self::with_config(CpuConfig::from_env())
    }

    pub fn with_config(config: CpuConfig) -> Self {
        let mut bus = Bus::new();
        let cpu = bus.connect(Cpu::with_config(config));
        let ram = bus.connect(memory::work_ram());
        Emulator {
            bus,
            cpu,
            ram,
            cartridge: Vec::new(),
            total_cycles: 0,
        }
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    pub fn cpu(&self) -> Result<&Cpu, EmulatorError> {
        Ok(self.bus.device::<Cpu>(self.cpu)?)
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Swap in a cartridge image. Only mapper 0 boards are wired.
    pub fn load_cartridge(&mut self, cartridge: &Cartridge) -> Result<(), EmulatorError> {
        let board = cartridge.nrom_board()?;
        self.eject()?;
        if let Some(prg_ram) = board.prg_ram {
            self.cartridge.push(self.bus.connect(prg_ram));
        }
        self.cartridge.push(self.bus.connect(board.prg_rom));
        log::info!("Cartridge inserted: mapper {}", cartridge.mapper());
        Ok(())
    }

    /// Map `program` at `addr` in a RAM-backed cartridge window and point
    /// the reset vector at it. Takes effect on the next `reset`.
    pub fn load_program(&mut self, addr: u16, program: &[u8]) -> Result<(), EmulatorError> {
        self.eject()?;
        let (min, max) = CART_WINDOW;
        let mut cart = Ram::new((max - min) as usize + 1, min, max);
        cart.load(addr, program);
        cart.load(RESET_VECTOR, &addr.to_le_bytes());
        self.cartridge.push(self.bus.connect(cart));
        log::debug!("Loaded {} byte program at ${:04X}", program.len(), addr);
        Ok(())
    }

    fn eject(&mut self) -> Result<(), EmulatorError> {
        for id in self.cartridge.drain(..) {
            self.bus.disconnect(id)?;
        }
        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), EmulatorError> {
        self.bus
            .with_device::<Cpu, _>(self.cpu, |cpu, bus| cpu.reset(bus))?;
        self.total_cycles = 0;
        log::info!("Reset: PC=${:04X}", self.cpu()?.pc);
        Ok(())
    }

    /// Advance the whole machine by one clock cycle.
    pub fn tick(&mut self) -> Result<(), EmulatorError> {
        self.bus.tick();
        self.total_cycles += 1;
        match self.cpu()?.fault() {
            Some(fault) => Err(fault.into()),
            None => Ok(()),
        }
    }

    /// Run `cycles` clock cycles, stopping early if the CPU halts.
    pub fn run_cycles(&mut self, cycles: u64) -> Result<(), EmulatorError> {
        for _ in 0..cycles {
            self.tick()?;
        }
        Ok(())
    }

    /// Execute one whole instruction without waiting out the previous one.
    /// Returns the cycles it costs.
    pub fn step_instruction(&mut self) -> Result<u8, EmulatorError> {
        let cycles = self
            .bus
            .with_device::<Cpu, _>(self.cpu, |cpu, bus| cpu.step(bus))??;
        self.total_cycles += cycles as u64;
        Ok(cycles)
    }

    pub fn irq(&mut self) -> Result<(), EmulatorError> {
        self.bus
            .with_device::<Cpu, _>(self.cpu, |cpu, bus| cpu.irq(bus))?;
        Ok(())
    }

    pub fn nmi(&mut self) -> Result<(), EmulatorError> {
        self.bus
            .with_device::<Cpu, _>(self.cpu, |cpu, bus| cpu.nmi(bus))?;
        Ok(())
    }

    /// Read through the bus; `None` on open bus.
    pub fn peek(&mut self, addr: u16) -> Option<u8> {
        self.bus.read(addr)
    }

    /// Write through the bus; `false` if nothing claimed the address.
    pub fn poke(&mut self, addr: u16, data: u8) -> bool {
        self.bus.write(addr, data)
    }

    pub fn disassemble(&mut self, addr: u16, count: usize) -> Vec<Instruction> {
        debugger::disassemble(&mut self.bus, addr, count)
    }

    /// Hex and ASCII rows of `length` bytes read through the bus.
    pub fn memory_dump(&mut self, addr: u16, length: usize) -> String {
        debugger::memory_dump(&mut self.bus, addr, length)
    }

    pub fn save_state(&self) -> Result<SaveState, EmulatorError> {
        let ram = self.bus.device::<Ram>(self.ram)?;
        Ok(SaveState {
            cpu: self.cpu()?.snapshot(),
            ram: ram.bytes().to_vec(),
            total_cycles: self.total_cycles,
        })
    }

    pub fn load_state(&mut self, state: &SaveState) -> Result<(), EmulatorError> {
        let ram = self.bus.device_mut::<Ram>(self.ram)?;
        if state.ram.len() != ram.bytes().len() {
            return Err(EmulatorError::RamSize {
                expected: ram.bytes().len(),
                actual: state.ram.len(),
            });
        }
        ram.set_bytes(&state.ram);
        self.bus.device_mut::<Cpu>(self.cpu)?.restore(&state.cpu);
        self.total_cycles = state.total_cycles;
        Ok(())
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}
