use std::fmt;

use crate::cpu::{AddressingMode, Cpu, Opcode, StatusFlags, OPCODE_TABLE};
use crate::cpu_bus::CpuBus;

/// One decoded instruction. `opcode` is `None` for undocumented bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub addr: u16,
    pub bytes: Vec<u8>,
    pub opcode: Option<Opcode>,
}

impl Instruction {
    pub fn len(&self) -> u16 {
        self.bytes.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Address of the instruction that follows this one.
    pub fn next_addr(&self) -> u16 {
        self.addr.wrapping_add(self.len())
    }

    pub fn mnemonic(&self) -> &'static str {
        self.opcode.map_or("???", |op| op.mnemonic.name())
    }

    /// Operand in assembler syntax. Branch offsets are shown as the target.
    pub fn operand(&self) -> String {
        let Some(op) = self.opcode else {
            return String::new();
        };
        let byte = self.bytes.get(1).copied().unwrap_or(0);
        let word = u16::from_le_bytes([byte, self.bytes.get(2).copied().unwrap_or(0)]);

        match op.mode {
            AddressingMode::Implied => String::new(),
            AddressingMode::Accumulator => "A".to_string(),
            AddressingMode::Immediate => format!("#${:02X}", byte),
            AddressingMode::ZeroPage => format!("${:02X}", byte),
            AddressingMode::ZeroPageX => format!("${:02X},X", byte),
            AddressingMode::ZeroPageY => format!("${:02X},Y", byte),
            AddressingMode::Relative => {
                let target = self.next_addr().wrapping_add(byte as i8 as u16);
                format!("${:04X}", target)
            }
            AddressingMode::Absolute => format!("${:04X}", word),
            AddressingMode::AbsoluteX => format!("${:04X},X", word),
            AddressingMode::AbsoluteY => format!("${:04X},Y", word),
            AddressingMode::Indirect => format!("(${:04X})", word),
            AddressingMode::IndirectX => format!("(${:02X},X)", byte),
            AddressingMode::IndirectY => format!("(${:02X}),Y", byte),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = format!("{} {}", self.mnemonic(), self.operand());
        let bytes: Vec<String> = self.bytes.iter().map(|b| format!("{:02X}", b)).collect();
        write!(f, "{:04X}  {:<12}  {}", self.addr, text.trim_end(), bytes.join(" "))
    }
}

/// Decode the instruction at `addr`. Reads go through the bus, so only use
/// this on devices without read side effects.
pub fn decode(bus: &mut dyn CpuBus, addr: u16) -> Instruction {
    let code = bus.read_u8(addr);
    let opcode = OPCODE_TABLE[code as usize];
    let size = opcode.map_or(1, |op| op.size());

    let bytes = (0..size as u16)
        .map(|i| bus.read_u8(addr.wrapping_add(i)))
        .collect();
    Instruction { addr, bytes, opcode }
}

/// Decode `count` consecutive instructions starting at `addr`.
pub fn disassemble(bus: &mut dyn CpuBus, addr: u16, count: usize) -> Vec<Instruction> {
    let mut out = Vec::with_capacity(count);
    let mut pc = addr;
    for _ in 0..count {
        let instruction = decode(bus, pc);
        pc = instruction.next_addr();
        out.push(instruction);
    }
    out
}

/// Hex and ASCII dump, 16 bytes per row.
pub fn memory_dump(bus: &mut dyn CpuBus, addr: u16, length: usize) -> String {
    let mut out = String::new();
    for offset in (0..length).step_by(16) {
        let row: Vec<u8> = (offset..length.min(offset + 16))
            .map(|i| bus.read_u8(addr.wrapping_add(i as u16)))
            .collect();

        out.push_str(&format!("{:04X}: ", addr.wrapping_add(offset as u16)));
        for i in 0..16 {
            match row.get(i) {
                Some(byte) => out.push_str(&format!("{:02X} ", byte)),
                None => out.push_str("   "),
            }
        }
        out.push_str(" | ");
        for &byte in &row {
            out.push(if (0x20..0x7F).contains(&byte) { byte as char } else { '.' });
        }
        out.push('\n');
    }
    out
}

fn flag_letters(status: StatusFlags) -> String {
    let p_bits = status.to_stack_byte();
    "NV-BDIZC"
        .chars()
        .enumerate()
        .map(|(i, letter)| {
            if p_bits & (0x80 >> i) != 0 && letter != '-' {
                letter
            } else {
                '-'
            }
        })
        .collect()
}

impl fmt::Display for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PC:{:04X} A:{:02X} X:{:02X} Y:{:02X} SP:{:02X} P:{:02X} [{}]",
            self.pc,
            self.a,
            self.x,
            self.y,
            self.sp,
            self.status.to_stack_byte(),
            flag_letters(self.status)
        )
    }
}
