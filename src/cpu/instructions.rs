use std::fmt;

use super::{Cpu, SbcOverflow, StatusFlags, IRQ_VECTOR};
use crate::cpu_bus::CpuBus;

/// The 56 documented 6502 instructions.
#[rustfmt::skip]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs, Clc,
    Cld, Cli, Clv, Cmp, Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jmp,
    Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla, Plp, Rol, Ror, Rti,
    Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay, Tsx, Txa, Txs, Tya,
}

impl Mnemonic {
    pub const fn name(self) -> &'static str {
        match self {
            Mnemonic::Adc => "ADC",
            Mnemonic::And => "AND",
            Mnemonic::Asl => "ASL",
            Mnemonic::Bcc => "BCC",
            Mnemonic::Bcs => "BCS",
            Mnemonic::Beq => "BEQ",
            Mnemonic::Bit => "BIT",
            Mnemonic::Bmi => "BMI",
            Mnemonic::Bne => "BNE",
            Mnemonic::Bpl => "BPL",
            Mnemonic::Brk => "BRK",
            Mnemonic::Bvc => "BVC",
            Mnemonic::Bvs => "BVS",
            Mnemonic::Clc => "CLC",
            Mnemonic::Cld => "CLD",
            Mnemonic::Cli => "CLI",
            Mnemonic::Clv => "CLV",
            Mnemonic::Cmp => "CMP",
            Mnemonic::Cpx => "CPX",
            Mnemonic::Cpy => "CPY",
            Mnemonic::Dec => "DEC",
            Mnemonic::Dex => "DEX",
            Mnemonic::Dey => "DEY",
            Mnemonic::Eor => "EOR",
            Mnemonic::Inc => "INC",
            Mnemonic::Inx => "INX",
            Mnemonic::Iny => "INY",
            Mnemonic::Jmp => "JMP",
            Mnemonic::Jsr => "JSR",
            Mnemonic::Lda => "LDA",
            Mnemonic::Ldx => "LDX",
            Mnemonic::Ldy => "LDY",
            Mnemonic::Lsr => "LSR",
            Mnemonic::Nop => "NOP",
            Mnemonic::Ora => "ORA",
            Mnemonic::Pha => "PHA",
            Mnemonic::Php => "PHP",
            Mnemonic::Pla => "PLA",
            Mnemonic::Plp => "PLP",
            Mnemonic::Rol => "ROL",
            Mnemonic::Ror => "ROR",
            Mnemonic::Rti => "RTI",
            Mnemonic::Rts => "RTS",
            Mnemonic::Sbc => "SBC",
            Mnemonic::Sec => "SEC",
            Mnemonic::Sed => "SED",
            Mnemonic::Sei => "SEI",
            Mnemonic::Sta => "STA",
            Mnemonic::Stx => "STX",
            Mnemonic::Sty => "STY",
            Mnemonic::Tax => "TAX",
            Mnemonic::Tay => "TAY",
            Mnemonic::Tsx => "TSX",
            Mnemonic::Txa => "TXA",
            Mnemonic::Txs => "TXS",
            Mnemonic::Tya => "TYA",
        }
    }

    pub const fn is_branch(self) -> bool {
        matches!(
            self,
            Mnemonic::Bcc
                | Mnemonic::Bcs
                | Mnemonic::Beq
                | Mnemonic::Bmi
                | Mnemonic::Bne
                | Mnemonic::Bpl
                | Mnemonic::Bvc
                | Mnemonic::Bvs
        )
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Cpu {
    /// Runs `mnemonic` against the operand resolved for this instruction.
    /// Returns true for instructions that pay the page-crossing cycle
    /// (reads that feed a register); stores and read-modify-write do not.
    pub(super) fn execute(&mut self, bus: &mut dyn CpuBus, mnemonic: Mnemonic) -> bool {
        match mnemonic {
            // Loads and stores
            Mnemonic::Lda => {
                self.a = self.load(bus, 0);
                self.set_zero_negative_flags(self.a);
                true
            }
            Mnemonic::Ldx => {
                self.x = self.load(bus, 0);
                self.set_zero_negative_flags(self.x);
                true
            }
            Mnemonic::Ldy => {
                self.y = self.load(bus, 0);
                self.set_zero_negative_flags(self.y);
                true
            }
            Mnemonic::Sta => {
                self.store(bus, 0, self.a);
                false
            }
            Mnemonic::Stx => {
                self.store(bus, 0, self.x);
                false
            }
            Mnemonic::Sty => {
                self.store(bus, 0, self.y);
                false
            }

            // Arithmetic and logic
            Mnemonic::Adc => {
                let value = self.load(bus, 0);
                self.adc(value);
                true
            }
            Mnemonic::Sbc => {
                let value = self.load(bus, 0);
                self.sbc(value);
                true
            }
            Mnemonic::And => {
                let value = self.load(bus, 0);
                self.a &= value;
                self.set_zero_negative_flags(self.a);
                true
            }
            Mnemonic::Ora => {
                let value = self.load(bus, 0);
                self.a |= value;
                self.set_zero_negative_flags(self.a);
                true
            }
            Mnemonic::Eor => {
                let value = self.load(bus, 0);
                self.a ^= value;
                self.set_zero_negative_flags(self.a);
                true
            }
            Mnemonic::Bit => {
                let value = self.load(bus, 0);
                self.status.set(StatusFlags::OVERFLOW, value & 0x40 != 0);
                self.status.set(StatusFlags::NEGATIVE, value & 0x80 != 0);
                self.status.set(StatusFlags::ZERO, value & self.a == 0);
                false
            }
            Mnemonic::Cmp => {
                self.compare(bus, self.a);
                true
            }
            Mnemonic::Cpx => {
                self.compare(bus, self.x);
                false
            }
            Mnemonic::Cpy => {
                self.compare(bus, self.y);
                false
            }

            // Shifts and rotates, in place on A or memory
            Mnemonic::Asl => {
                let value = self.load(bus, 0);
                self.status.set(StatusFlags::CARRY, value & 0x80 != 0);
                let result = value << 1;
                self.set_zero_negative_flags(result);
                self.store(bus, 0, result);
                false
            }
            Mnemonic::Lsr => {
                let value = self.load(bus, 0);
                self.status.set(StatusFlags::CARRY, value & 0x01 != 0);
                let result = value >> 1;
                self.set_zero_negative_flags(result);
                self.store(bus, 0, result);
                false
            }
            Mnemonic::Rol => {
                let value = self.load(bus, 0);
                let carry_in = self.status.contains(StatusFlags::CARRY) as u8;
                self.status.set(StatusFlags::CARRY, value & 0x80 != 0);
                let result = (value << 1) | carry_in;
                self.set_zero_negative_flags(result);
                self.store(bus, 0, result);
                false
            }
            Mnemonic::Ror => {
                let value = self.load(bus, 0);
                let carry_in = (self.status.contains(StatusFlags::CARRY) as u8) << 7;
                self.status.set(StatusFlags::CARRY, value & 0x01 != 0);
                let result = (value >> 1) | carry_in;
                self.set_zero_negative_flags(result);
                self.store(bus, 0, result);
                false
            }

            // Increments and decrements
            Mnemonic::Inc => {
                let result = self.load(bus, 0).wrapping_add(1);
                self.set_zero_negative_flags(result);
                self.store(bus, 0, result);
                false
            }
            Mnemonic::Dec => {
                let result = self.load(bus, 0).wrapping_sub(1);
                self.set_zero_negative_flags(result);
                self.store(bus, 0, result);
                false
            }
            Mnemonic::Inx => {
                self.x = self.x.wrapping_add(1);
                self.set_zero_negative_flags(self.x);
                false
            }
            Mnemonic::Iny => {
                self.y = self.y.wrapping_add(1);
                self.set_zero_negative_flags(self.y);
                false
            }
            Mnemonic::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.set_zero_negative_flags(self.x);
                false
            }
            Mnemonic::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.set_zero_negative_flags(self.y);
                false
            }

            // Branches
            Mnemonic::Bcc => self.branch(!self.status.contains(StatusFlags::CARRY)),
            Mnemonic::Bcs => self.branch(self.status.contains(StatusFlags::CARRY)),
            Mnemonic::Bne => self.branch(!self.status.contains(StatusFlags::ZERO)),
            Mnemonic::Beq => self.branch(self.status.contains(StatusFlags::ZERO)),
            Mnemonic::Bpl => self.branch(!self.status.contains(StatusFlags::NEGATIVE)),
            Mnemonic::Bmi => self.branch(self.status.contains(StatusFlags::NEGATIVE)),
            Mnemonic::Bvc => self.branch(!self.status.contains(StatusFlags::OVERFLOW)),
            Mnemonic::Bvs => self.branch(self.status.contains(StatusFlags::OVERFLOW)),

            // Jumps, calls and returns
            Mnemonic::Jmp => {
                self.pc = self.address;
                false
            }
            Mnemonic::Jsr => {
                // Return address is the last byte of the JSR; RTS adds one.
                let return_addr = self.pc.wrapping_sub(1);
                self.push_pc(bus, return_addr);
                self.pc = self.address;
                false
            }
            Mnemonic::Rts => {
                self.pc = self.pull_pc(bus).wrapping_add(1);
                false
            }
            Mnemonic::Brk => {
                self.status.insert(StatusFlags::BREAK);
                self.interrupt(bus, IRQ_VECTOR);
                false
            }
            Mnemonic::Rti => {
                self.pull_status(bus);
                self.status.remove(StatusFlags::BREAK);
                self.pc = self.pull_pc(bus);
                false
            }

            // Stack
            Mnemonic::Pha => {
                self.push(bus, self.a);
                false
            }
            Mnemonic::Php => {
                self.push_status(bus);
                false
            }
            Mnemonic::Pla => {
                self.a = self.pull(bus);
                self.set_zero_negative_flags(self.a);
                false
            }
            Mnemonic::Plp => {
                self.pull_status(bus);
                false
            }

            // Flags
            Mnemonic::Clc => self.set_flag(StatusFlags::CARRY, false),
            Mnemonic::Sec => self.set_flag(StatusFlags::CARRY, true),
            Mnemonic::Cld => self.set_flag(StatusFlags::DECIMAL, false),
            Mnemonic::Sed => self.set_flag(StatusFlags::DECIMAL, true),
            Mnemonic::Cli => self.set_flag(StatusFlags::INTERRUPT_DISABLE, false),
            Mnemonic::Sei => self.set_flag(StatusFlags::INTERRUPT_DISABLE, true),
            Mnemonic::Clv => self.set_flag(StatusFlags::OVERFLOW, false),

            // Transfers
            Mnemonic::Tax => {
                self.x = self.a;
                self.set_zero_negative_flags(self.x);
                false
            }
            Mnemonic::Tay => {
                self.y = self.a;
                self.set_zero_negative_flags(self.y);
                false
            }
            Mnemonic::Txa => {
                self.a = self.x;
                self.set_zero_negative_flags(self.a);
                false
            }
            Mnemonic::Tya => {
                self.a = self.y;
                self.set_zero_negative_flags(self.a);
                false
            }
            Mnemonic::Tsx => {
                self.x = self.sp;
                self.set_zero_negative_flags(self.x);
                false
            }
            Mnemonic::Txs => {
                self.sp = self.x;
                false
            }

            Mnemonic::Nop => false,
        }
    }

    fn adc(&mut self, input: u8) {
        let carry = self.status.contains(StatusFlags::CARRY) as u16;
        let sum = self.a as u16 + input as u16 + carry;
        let result = sum as u8;

        self.status.set(StatusFlags::CARRY, sum > 0xFF);
        self.status.set(
            StatusFlags::OVERFLOW,
            (!(self.a ^ input) & (self.a ^ result) & 0x80) != 0,
        );

        self.a = result;
        self.set_zero_negative_flags(result);
    }

    /// A - M - !C, computed as A + !M + C.
    fn sbc(&mut self, value: u8) {
        let a = self.a;
        let input = !value;
        self.adc(input);

        if self.config.sbc_overflow == SbcOverflow::Literal {
            let overflow = (self.a ^ a) & (self.a ^ input) & 0x01 != 0;
            self.status.set(StatusFlags::OVERFLOW, overflow);
        }
    }

    fn compare(&mut self, bus: &mut dyn CpuBus, register: u8) {
        let value = self.load(bus, 0);
        self.status.set(StatusFlags::CARRY, register >= value);
        self.status.set(StatusFlags::ZERO, register == value);
        let difference = register.wrapping_sub(value);
        self.status.set(StatusFlags::NEGATIVE, difference & 0x80 != 0);
    }

    /// Taken branches cost one more cycle, two when the target is on a
    /// different page from the next instruction. Costs are applied here, so
    /// branches never ask for the generic page penalty.
    fn branch(&mut self, condition: bool) -> bool {
        if condition {
            if (self.pc & 0xFF00) != (self.address & 0xFF00) {
                self.cycles += 1;
            }
            self.pc = self.address;
            self.cycles += 1;
        }
        false
    }

    fn set_flag(&mut self, flag: StatusFlags, value: bool) -> bool {
        self.status.set(flag, value);
        false
    }
}
