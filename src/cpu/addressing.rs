use super::{Cpu, Operand};
use crate::cpu_bus::CpuBus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Relative,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndirectX,
    IndirectY,
}

impl AddressingMode {
    /// Operand bytes following the opcode.
    pub const fn operand_bytes(self) -> u8 {
        match self {
            AddressingMode::Implied | AddressingMode::Accumulator => 0,
            AddressingMode::Immediate
            | AddressingMode::ZeroPage
            | AddressingMode::ZeroPageX
            | AddressingMode::ZeroPageY
            | AddressingMode::Relative
            | AddressingMode::IndirectX
            | AddressingMode::IndirectY => 1,
            AddressingMode::Absolute
            | AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::Indirect => 2,
        }
    }
}

impl Cpu {
    /// Sets the operand kind and effective address for `mode`, leaving PC on
    /// the next opcode. Returns true when indexing crossed a page.
    pub(super) fn resolve(&mut self, bus: &mut dyn CpuBus, mode: AddressingMode) -> bool {
        match mode {
            AddressingMode::Implied => {
                self.operand = Operand::Implied;
                false
            }
            AddressingMode::Accumulator => {
                self.operand = Operand::Accumulator;
                false
            }
            AddressingMode::Immediate => {
                self.operand = Operand::Immediate;
                self.address = self.pc;
                self.pc = self.pc.wrapping_add(1);
                false
            }
            AddressingMode::ZeroPage => {
                self.zero_page(bus, 0);
                false
            }
            AddressingMode::ZeroPageX => {
                self.zero_page(bus, self.x);
                false
            }
            AddressingMode::ZeroPageY => {
                self.zero_page(bus, self.y);
                false
            }
            AddressingMode::Relative => {
                self.operand = Operand::Address;
                let offset = self.fetch_byte(bus) as i8;
                self.address = self.pc.wrapping_add(offset as u16);
                false
            }
            AddressingMode::Absolute => {
                self.absolute(bus);
                false
            }
            AddressingMode::AbsoluteX => self.absolute_indexed(bus, self.x),
            AddressingMode::AbsoluteY => self.absolute_indexed(bus, self.y),
            AddressingMode::Indirect => {
                // The pointer's high byte is fetched without carrying into
                // the next page: JMP ($10FF) reads $10FF and $1000.
                self.absolute(bus);
                self.address = self.load_pointer(bus);
                false
            }
            AddressingMode::IndirectX => {
                self.zero_page(bus, self.x);
                self.address = self.load_pointer(bus);
                false
            }
            AddressingMode::IndirectY => {
                self.zero_page(bus, 0);
                let base = self.load_pointer(bus);
                self.address = base.wrapping_add(self.y as u16);
                self.address >> 8 != base >> 8
            }
        }
    }

    fn zero_page(&mut self, bus: &mut dyn CpuBus, index: u8) {
        self.operand = Operand::Address;
        self.address = self.fetch_byte(bus).wrapping_add(index) as u16;
    }

    fn absolute(&mut self, bus: &mut dyn CpuBus) {
        self.operand = Operand::Address;
        let low = self.fetch_byte(bus) as u16;
        let high = self.fetch_byte(bus) as u16;
        self.address = (high << 8) | low;
    }

    fn absolute_indexed(&mut self, bus: &mut dyn CpuBus, index: u8) -> bool {
        self.absolute(bus);
        let base = self.address;
        self.address = base.wrapping_add(index as u16);
        self.address >> 8 != base >> 8
    }

    /// Two-byte pointer at the current address, wrapping within its page.
    fn load_pointer(&mut self, bus: &mut dyn CpuBus) -> u16 {
        let low = self.load(bus, 0) as u16;
        let high = self.load(bus, 1) as u16;
        (high << 8) | low
    }
}
