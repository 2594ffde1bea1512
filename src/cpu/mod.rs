use std::any::Any;

use bitflags::bitflags;
use thiserror::Error;

use crate::bus::{Bus, Capabilities, Device};
use crate::cpu_bus::CpuBus;
use crate::debug_flags;
use crate::save_state::CpuState;

pub mod addressing;
pub mod instructions;
pub mod opcodes;

pub use addressing::AddressingMode;
pub use instructions::Mnemonic;
pub use opcodes::{Opcode, OPCODE_TABLE};

#[cfg(test)]
mod tests;

pub const STACK_BASE: u16 = 0x0100;

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Cycles the CPU waits after reset before fetching its first opcode.
pub const RESET_CYCLES: u8 = 8;
pub const IRQ_CYCLES: u8 = 7;
pub const NMI_CYCLES: u8 = 8;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        const CARRY = 0b00000001;
        const ZERO = 0b00000010;
        const INTERRUPT_DISABLE = 0b00000100;
        const DECIMAL = 0b00001000;
        const BREAK = 0b00010000;
        const UNUSED = 0b00100000;
        const OVERFLOW = 0b01000000;
        const NEGATIVE = 0b10000000;
    }
}

impl StatusFlags {
    /// Byte pushed by PHP and interrupts: bit 5 always reads as set.
    pub fn to_stack_byte(self) -> u8 {
        (self | StatusFlags::UNUSED).bits()
    }

    /// Inverse of `to_stack_byte`; bit 5 is not a flag and is dropped.
    pub fn from_stack_byte(byte: u8) -> Self {
        StatusFlags::from_bits_truncate(byte) - StatusFlags::UNUSED
    }
}

/// How the load/store primitives reach the current instruction's operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operand {
    #[default]
    Implied,
    Accumulator,
    Immediate,
    Address,
}

/// Overflow rule used by SBC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SbcOverflow {
    /// Signed overflow from bit 7, the same rule ADC uses.
    #[default]
    Architectural,
    /// Bit 0 of `(result ^ a) & (result ^ !operand)`, reproducing a core
    /// whose overflow test lost its bit-7 mask to operator precedence.
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuConfig {
    pub sbc_overflow: SbcOverflow,
}

impl CpuConfig {
    pub fn from_env() -> Self {
        let sbc_overflow = if debug_flags::sbc_literal_overflow() {
            SbcOverflow::Literal
        } else {
            SbcOverflow::Architectural
        };
        CpuConfig { sbc_overflow }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CpuError {
    #[error("unknown opcode ${opcode:02X} at ${pc:04X}")]
    UnknownOpcode { pc: u16, opcode: u8 },
}

pub struct Cpu {
    pub a: u8,      // Accumulator
    pub x: u8,      // X register
    pub y: u8,      // Y register
    pub sp: u8,     // Stack pointer (page 1)
    pub pc: u16,    // Program counter
    pub status: StatusFlags,
    address: u16,     // Effective address of the current instruction
    operand: Operand, // How load/store reach the operand
    cycles: u8,       // Cycles left before the next fetch
    latency: u8,      // Interrupt cycles not yet reported by `step`
    config: CpuConfig,
    fault: Option<CpuError>,
}

impl Cpu {
    pub fn new() -> Self {
        Self::with_config(CpuConfig::default())
    }

    pub fn with_config(config: CpuConfig) -> Self {
        Cpu {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            pc: 0,
            status: StatusFlags::empty(),
            address: 0,
            operand: Operand::Implied,
            cycles: 0,
            latency: 0,
            config,
            fault: None,
        }
    }

    pub fn config(&self) -> CpuConfig {
        self.config
    }

    pub fn set_config(&mut self, config: CpuConfig) {
        self.config = config;
    }

    /// Cycles still to burn before the next instruction is fetched.
    pub fn pending_cycles(&self) -> u8 {
        self.cycles
    }

    pub fn effective_address(&self) -> u16 {
        self.address
    }

    pub fn operand(&self) -> Operand {
        self.operand
    }

    /// The fault that halted the CPU, if any. Cleared by `reset`.
    pub fn fault(&self) -> Option<CpuError> {
        self.fault
    }

    pub fn is_halted(&self) -> bool {
        self.fault.is_some()
    }

    pub fn reset(&mut self, bus: &mut dyn CpuBus) {
        self.pc = bus.read_u16(RESET_VECTOR);
        self.sp = 0xFD;
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.status = StatusFlags::empty();
        self.address = 0;
        self.operand = Operand::Implied;
        self.fault = None;
        self.cycles = RESET_CYCLES;
        self.latency = 0;
        log::debug!("CPU reset: PC=${:04X}", self.pc);
    }

    /// One clock cycle. Burns a pending cycle, or fetches and runs the whole
    /// next instruction when none are left.
    pub fn clock(&mut self, bus: &mut dyn CpuBus) -> Result<(), CpuError> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }
        if self.cycles > 0 {
            self.cycles -= 1;
            return Ok(());
        }
        // Any interrupt cycles have been waited out by now
        self.latency = 0;
        self.dispatch(bus)
    }

    /// Skip any pending wait and run exactly one instruction. Returns the
    /// number of cycles that instruction costs, plus the cost of any IRQ or
    /// NMI taken since the previous instruction.
    pub fn step(&mut self, bus: &mut dyn CpuBus) -> Result<u8, CpuError> {
        if let Some(fault) = self.fault {
            return Err(fault);
        }
        let latency = std::mem::take(&mut self.latency);
        self.cycles = 0;
        self.dispatch(bus)?;
        Ok((self.cycles + 1).saturating_add(latency))
    }

    /// Maskable interrupt request. Ignored while interrupts are disabled.
    pub fn irq(&mut self, bus: &mut dyn CpuBus) {
        if self.status.contains(StatusFlags::INTERRUPT_DISABLE) {
            return;
        }
        self.status.remove(StatusFlags::BREAK);
        self.interrupt(bus, IRQ_VECTOR);
        self.cycles = self.cycles.saturating_add(IRQ_CYCLES);
        self.latency = self.latency.saturating_add(IRQ_CYCLES);
        log::debug!("IRQ: jumping to ${:04X}", self.pc);
    }

    pub fn nmi(&mut self, bus: &mut dyn CpuBus) {
        self.status.remove(StatusFlags::BREAK);
        self.interrupt(bus, NMI_VECTOR);
        self.cycles = self.cycles.saturating_add(NMI_CYCLES);
        self.latency = self.latency.saturating_add(NMI_CYCLES);
        log::debug!("NMI: jumping to ${:04X}", self.pc);
    }

    pub fn snapshot(&self) -> CpuState {
        CpuState {
            a: self.a,
            x: self.x,
            y: self.y,
            sp: self.sp,
            pc: self.pc,
            status: self.status.bits(),
            cycles: self.cycles,
        }
    }

    pub fn restore(&mut self, state: &CpuState) {
        self.a = state.a;
        self.x = state.x;
        self.y = state.y;
        self.sp = state.sp;
        self.pc = state.pc;
        self.status = StatusFlags::from_bits_truncate(state.status) - StatusFlags::UNUSED;
        self.cycles = state.cycles;
        self.latency = 0;
        self.address = 0;
        self.operand = Operand::Implied;
        self.fault = None;
    }

    fn dispatch(&mut self, bus: &mut dyn CpuBus) -> Result<(), CpuError> {
        let pc = self.pc;
        let opcode = bus.read_u8(pc);
        let Some(entry) = opcodes::lookup(opcode) else {
            // PC stays on the offending byte so the state can be inspected.
            let fault = CpuError::UnknownOpcode { pc, opcode };
            log::error!("Halting on unknown opcode: 0x{:02X} at PC: 0x{:04X}", opcode, pc);
            self.fault = Some(fault);
            return Err(fault);
        };

        if debug_flags::trace() {
            log::trace!(
                "{:04X}  {:02X}  {} {:?}  A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X}",
                pc,
                opcode,
                entry.mnemonic,
                entry.mode,
                self.a,
                self.x,
                self.y,
                self.status.to_stack_byte(),
                self.sp
            );
        }

        self.pc = pc.wrapping_add(1);
        self.cycles = entry.cycles;
        let page_crossed = self.resolve(bus, entry.mode);
        let takes_page_penalty = self.execute(bus, entry.mnemonic);

        // The fetch cycle is part of the base count; the penalty cycle is
        // only kept when both the mode and the instruction call for it.
        if !(page_crossed && takes_page_penalty) {
            self.cycles = self.cycles.saturating_sub(1);
        }
        Ok(())
    }

    fn fetch_byte(&mut self, bus: &mut dyn CpuBus) -> u8 {
        let byte = bus.read_u8(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    /// Operand address plus `offset`, carrying into the low byte only.
    fn page_offset(&self, offset: u8) -> u16 {
        (self.address & 0xFF00) | (self.address.wrapping_add(offset as u16) & 0x00FF)
    }

    fn load(&mut self, bus: &mut dyn CpuBus, offset: u8) -> u8 {
        match self.operand {
            Operand::Accumulator => {
                debug_assert_eq!(offset, 0, "accumulator operand has no offset");
                self.a
            }
            Operand::Immediate | Operand::Address => bus.read_u8(self.page_offset(offset)),
            Operand::Implied => {
                log::warn!("load with implied operand at PC: 0x{:04X}", self.pc);
                0
            }
        }
    }

    fn store(&mut self, bus: &mut dyn CpuBus, offset: u8, value: u8) {
        match self.operand {
            Operand::Accumulator => {
                debug_assert_eq!(offset, 0, "accumulator operand has no offset");
                self.a = value;
            }
            Operand::Address => bus.write_u8(self.page_offset(offset), value),
            Operand::Immediate | Operand::Implied => {
                log::warn!("store with {:?} operand at PC: 0x{:04X}", self.operand, self.pc);
            }
        }
    }

    fn push(&mut self, bus: &mut dyn CpuBus, value: u8) {
        bus.write_u8(STACK_BASE | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pull(&mut self, bus: &mut dyn CpuBus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read_u8(STACK_BASE | self.sp as u16)
    }

    fn push_pc(&mut self, bus: &mut dyn CpuBus, pc: u16) {
        self.push(bus, (pc >> 8) as u8);
        self.push(bus, pc as u8);
    }

    fn pull_pc(&mut self, bus: &mut dyn CpuBus) -> u16 {
        let low = self.pull(bus) as u16;
        let high = self.pull(bus) as u16;
        (high << 8) | low
    }

    fn push_status(&mut self, bus: &mut dyn CpuBus) {
        let status = self.status.to_stack_byte();
        self.push(bus, status);
    }

    fn pull_status(&mut self, bus: &mut dyn CpuBus) {
        let status = self.pull(bus);
        self.status = StatusFlags::from_stack_byte(status);
    }

    /// Shared by BRK, IRQ and NMI. The caller decides the break flag that
    /// gets pushed; it is cleared again before the handler runs.
    fn interrupt(&mut self, bus: &mut dyn CpuBus, vector: u16) {
        self.push_pc(bus, self.pc);
        self.status.insert(StatusFlags::INTERRUPT_DISABLE);
        self.push_status(bus);
        self.status.remove(StatusFlags::BREAK);
        self.pc = bus.read_u16(vector);
    }

    fn set_zero_negative_flags(&mut self, value: u8) {
        self.status.set(StatusFlags::ZERO, value == 0);
        self.status.set(StatusFlags::NEGATIVE, value & 0x80 != 0);
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for Cpu {
    fn capabilities(&self) -> Capabilities {
        Capabilities::TICK
    }

    fn tick(&mut self, bus: &mut Bus) {
        // Faults are logged where they happen and kept in `fault()`.
        let _ = self.clock(bus);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
