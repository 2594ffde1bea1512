use super::*;

#[path = "addressing_tests.rs"]
mod addressing_mode_tests;

#[path = "additional_tests.rs"]
mod additional_tests;

struct TestBus {
    memory: [u8; 0x10000],
}

impl TestBus {
    fn new() -> Self {
        Self {
            memory: [0; 0x10000],
        }
    }

    fn load_program(&mut self, program: &[u8], start_addr: u16) {
        for (i, &byte) in program.iter().enumerate() {
            self.memory[start_addr as usize + i] = byte;
        }
    }
}

impl CpuBus for TestBus {
    fn read_u8(&mut self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    fn write_u8(&mut self, addr: u16, value: u8) {
        self.memory[addr as usize] = value;
    }
}

fn setup_cpu() -> (Cpu, TestBus) {
    let mut cpu = Cpu::new();
    let mut bus = TestBus::new();
    // Reset vector
    bus.write_u8(0xFFFC, 0x00);
    bus.write_u8(0xFFFD, 0x80);
    cpu.reset(&mut bus);
    (cpu, bus)
}

fn setup_with_config(config: CpuConfig) -> (Cpu, TestBus) {
    let (mut cpu, bus) = setup_cpu();
    cpu.set_config(config);
    (cpu, bus)
}

/// Load `program` at $8000 and run it one instruction per entry in
/// `steps`, returning the cycles of the last step.
fn run(cpu: &mut Cpu, bus: &mut TestBus, program: &[u8], steps: usize) -> u8 {
    bus.load_program(program, 0x8000);
    cpu.pc = 0x8000;
    let mut cycles = 0;
    for _ in 0..steps {
        cycles = cpu.step(bus).unwrap();
    }
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reset_state() {
        let mut cpu = Cpu::new();
        let mut bus = TestBus::new();
        bus.write_u8(0xFFFC, 0x34);
        bus.write_u8(0xFFFD, 0x12);

        cpu.a = 0x11;
        cpu.x = 0x22;
        cpu.y = 0x33;
        cpu.sp = 0x44;
        cpu.status = StatusFlags::all();
        cpu.reset(&mut bus);

        assert_eq!(cpu.pc, 0x1234);
        assert_eq!(cpu.sp, 0xFD);
        assert_eq!((cpu.a, cpu.x, cpu.y), (0, 0, 0));
        assert!(cpu.status.is_empty());
        assert_eq!(cpu.pending_cycles(), RESET_CYCLES);
    }

    #[test]
    fn test_lda_immediate() {
        let (mut cpu, mut bus) = setup_cpu();

        // LDA #$42
        let cycles = run(&mut cpu, &mut bus, &[0xA9, 0x42], 1);

        assert_eq!(cpu.a, 0x42);
        assert_eq!(cpu.pc, 0x8002);
        assert_eq!(cycles, 2);
        assert!(!cpu.status.contains(StatusFlags::ZERO));
        assert!(!cpu.status.contains(StatusFlags::NEGATIVE));
    }

    #[test]
    fn test_lda_zero_flag() {
        let (mut cpu, mut bus) = setup_cpu();

        // LDA #$00
        run(&mut cpu, &mut bus, &[0xA9, 0x00], 1);

        assert_eq!(cpu.a, 0x00);
        assert!(cpu.status.contains(StatusFlags::ZERO));
        assert!(!cpu.status.contains(StatusFlags::NEGATIVE));
    }

    #[test]
    fn test_lda_negative_flag() {
        let (mut cpu, mut bus) = setup_cpu();

        // LDA #$80
        run(&mut cpu, &mut bus, &[0xA9, 0x80], 1);

        assert!(!cpu.status.contains(StatusFlags::ZERO));
        assert!(cpu.status.contains(StatusFlags::NEGATIVE));
    }

    #[test]
    fn test_register_transfers() {
        let (mut cpu, mut bus) = setup_cpu();

        // LDA #$F0; TAX; TAY; LDA #$00; TXA
        run(&mut cpu, &mut bus, &[0xA9, 0xF0, 0xAA, 0xA8, 0xA9, 0x00, 0x8A], 5);
        assert_eq!((cpu.a, cpu.x, cpu.y), (0xF0, 0xF0, 0xF0));
        assert!(cpu.status.contains(StatusFlags::NEGATIVE));

        // LDX #$00; TXS; LDX #$07; TSX sets Z from the stack pointer
        run(&mut cpu, &mut bus, &[0xA2, 0x00, 0x9A, 0xA2, 0x07, 0xBA], 4);
        assert_eq!(cpu.sp, 0x00);
        assert_eq!(cpu.x, 0x00);
        assert!(cpu.status.contains(StatusFlags::ZERO));
    }

    #[test]
    fn test_txs_leaves_flags() {
        let (mut cpu, mut bus) = setup_cpu();
        cpu.x = 0x00;
        cpu.status = StatusFlags::NEGATIVE;

        // TXS
        run(&mut cpu, &mut bus, &[0x9A], 1);

        assert_eq!(cpu.sp, 0x00);
        assert_eq!(cpu.status, StatusFlags::NEGATIVE);
    }

    #[test]
    fn test_adc_signed_overflow() {
        let (mut cpu, mut bus) = setup_cpu();

        // LDA #$50; ADC #$50
        run(&mut cpu, &mut bus, &[0xA9, 0x50, 0x69, 0x50], 2);

        assert_eq!(cpu.a, 0xA0);
        assert!(cpu.status.contains(StatusFlags::OVERFLOW));
        assert!(cpu.status.contains(StatusFlags::NEGATIVE));
        assert!(!cpu.status.contains(StatusFlags::CARRY));
    }

    #[test]
    fn test_adc_carry_out_and_in() {
        let (mut cpu, mut bus) = setup_cpu();

        // LDA #$FF; ADC #$01; ADC #$00
        run(&mut cpu, &mut bus, &[0xA9, 0xFF, 0x69, 0x01], 2);
        assert_eq!(cpu.a, 0x00);
        assert!(cpu.status.contains(StatusFlags::CARRY));
        assert!(cpu.status.contains(StatusFlags::ZERO));
        assert!(!cpu.status.contains(StatusFlags::OVERFLOW));

        run(&mut cpu, &mut bus, &[0x69, 0x00], 1);
        assert_eq!(cpu.a, 0x01);
        assert!(!cpu.status.contains(StatusFlags::CARRY));
    }

    #[test]
    fn test_sbc_borrow() {
        let (mut cpu, mut bus) = setup_cpu();

        // SEC; LDA #$05; SBC #$03
        run(&mut cpu, &mut bus, &[0x38, 0xA9, 0x05, 0xE9, 0x03], 3);
        assert_eq!(cpu.a, 0x02);
        assert!(cpu.status.contains(StatusFlags::CARRY));

        // CLC; LDA #$05; SBC #$03 borrows one more
        run(&mut cpu, &mut bus, &[0x18, 0xA9, 0x05, 0xE9, 0x03], 3);
        assert_eq!(cpu.a, 0x01);

        // SEC; LDA #$00; SBC #$01
        run(&mut cpu, &mut bus, &[0x38, 0xA9, 0x00, 0xE9, 0x01], 3);
        assert_eq!(cpu.a, 0xFF);
        assert!(!cpu.status.contains(StatusFlags::CARRY));
        assert!(cpu.status.contains(StatusFlags::NEGATIVE));
    }

    // SEC; LDA #$50; SBC #$B0: 80 - (-80) overflows a signed byte.
    const SBC_SIGNED_OVERFLOW: [u8; 5] = [0x38, 0xA9, 0x50, 0xE9, 0xB0];
    // SEC; LDA #$10; SBC #$01: no signed overflow, but bit 0 of both terms set.
    const SBC_BIT0_ONLY: [u8; 5] = [0x38, 0xA9, 0x10, 0xE9, 0x01];

    #[test]
    fn test_sbc_overflow_architectural() {
        let (mut cpu, mut bus) = setup_with_config(CpuConfig {
            sbc_overflow: SbcOverflow::Architectural,
        });

        run(&mut cpu, &mut bus, &SBC_SIGNED_OVERFLOW, 3);
        assert_eq!(cpu.a, 0xA0);
        assert!(cpu.status.contains(StatusFlags::OVERFLOW));

        run(&mut cpu, &mut bus, &SBC_BIT0_ONLY, 3);
        assert_eq!(cpu.a, 0x0F);
        assert!(!cpu.status.contains(StatusFlags::OVERFLOW));
    }

    #[test]
    fn test_sbc_overflow_literal() {
        let (mut cpu, mut bus) = setup_with_config(CpuConfig {
            sbc_overflow: SbcOverflow::Literal,
        });

        run(&mut cpu, &mut bus, &SBC_SIGNED_OVERFLOW, 3);
        assert_eq!(cpu.a, 0xA0);
        assert!(!cpu.status.contains(StatusFlags::OVERFLOW));

        run(&mut cpu, &mut bus, &SBC_BIT0_ONLY, 3);
        assert_eq!(cpu.a, 0x0F);
        assert!(cpu.status.contains(StatusFlags::OVERFLOW));
    }

    #[test]
    fn test_sbc_modes_agree_on_result_and_carry() {
        for mode in [SbcOverflow::Architectural, SbcOverflow::Literal] {
            let (mut cpu, mut bus) = setup_with_config(CpuConfig { sbc_overflow: mode });
            run(&mut cpu, &mut bus, &SBC_SIGNED_OVERFLOW, 3);
            assert_eq!(cpu.a, 0xA0);
            assert!(!cpu.status.contains(StatusFlags::CARRY));
            assert!(cpu.status.contains(StatusFlags::NEGATIVE));
        }
    }

    #[test]
    fn test_logic_ops() {
        let (mut cpu, mut bus) = setup_cpu();

        // LDA #$F0; AND #$3C
        run(&mut cpu, &mut bus, &[0xA9, 0xF0, 0x29, 0x3C], 2);
        assert_eq!(cpu.a, 0x30);

        // ORA #$0F
        run(&mut cpu, &mut bus, &[0x09, 0x0F], 1);
        assert_eq!(cpu.a, 0x3F);

        // EOR #$3F
        run(&mut cpu, &mut bus, &[0x49, 0x3F], 1);
        assert_eq!(cpu.a, 0x00);
        assert!(cpu.status.contains(StatusFlags::ZERO));
    }

    #[test]
    fn test_compare() {
        let (mut cpu, mut bus) = setup_cpu();

        // LDA #$20; CMP #$20
        run(&mut cpu, &mut bus, &[0xA9, 0x20, 0xC9, 0x20], 2);
        assert!(cpu.status.contains(StatusFlags::CARRY));
        assert!(cpu.status.contains(StatusFlags::ZERO));
        assert!(!cpu.status.contains(StatusFlags::NEGATIVE));
        assert_eq!(cpu.a, 0x20);

        // CMP #$30: $20 - $30 = $F0
        run(&mut cpu, &mut bus, &[0xC9, 0x30], 1);
        assert!(!cpu.status.contains(StatusFlags::CARRY));
        assert!(!cpu.status.contains(StatusFlags::ZERO));
        assert!(cpu.status.contains(StatusFlags::NEGATIVE));

        // CMP #$10
        run(&mut cpu, &mut bus, &[0xC9, 0x10], 1);
        assert!(cpu.status.contains(StatusFlags::CARRY));
        assert!(!cpu.status.contains(StatusFlags::ZERO));
    }

    #[test]
    fn test_cpx_cpy() {
        let (mut cpu, mut bus) = setup_cpu();
        cpu.x = 0x05;
        cpu.y = 0x80;
        bus.write_u8(0x0010, 0x05);

        // CPX $10
        run(&mut cpu, &mut bus, &[0xE4, 0x10], 1);
        assert!(cpu.status.contains(StatusFlags::ZERO));
        assert!(cpu.status.contains(StatusFlags::CARRY));

        // CPY #$01: $80 - $01 = $7F
        run(&mut cpu, &mut bus, &[0xC0, 0x01], 1);
        assert!(cpu.status.contains(StatusFlags::CARRY));
        assert!(!cpu.status.contains(StatusFlags::NEGATIVE));
        assert_eq!((cpu.x, cpu.y), (0x05, 0x80));
    }

    #[test]
    fn test_bit() {
        let (mut cpu, mut bus) = setup_cpu();
        bus.write_u8(0x0040, 0xC0);
        cpu.a = 0x01;

        // BIT $40
        let cycles = run(&mut cpu, &mut bus, &[0x24, 0x40], 1);

        assert_eq!(cycles, 3);
        assert!(cpu.status.contains(StatusFlags::NEGATIVE));
        assert!(cpu.status.contains(StatusFlags::OVERFLOW));
        assert!(cpu.status.contains(StatusFlags::ZERO));
        assert_eq!(cpu.a, 0x01);
    }

    #[test]
    fn test_shifts_on_accumulator() {
        let (mut cpu, mut bus) = setup_cpu();

        // LDA #$81; ASL A
        let cycles = run(&mut cpu, &mut bus, &[0xA9, 0x81, 0x0A], 2);
        assert_eq!(cycles, 2);
        assert_eq!(cpu.a, 0x02);
        assert!(cpu.status.contains(StatusFlags::CARRY));

        // ROL A pulls the carry into bit 0
        run(&mut cpu, &mut bus, &[0x2A], 1);
        assert_eq!(cpu.a, 0x05);
        assert!(!cpu.status.contains(StatusFlags::CARRY));

        // LSR A
        run(&mut cpu, &mut bus, &[0x4A], 1);
        assert_eq!(cpu.a, 0x02);
        assert!(cpu.status.contains(StatusFlags::CARRY));

        // ROR A pushes the carry into bit 7
        run(&mut cpu, &mut bus, &[0x6A], 1);
        assert_eq!(cpu.a, 0x81);
        assert!(!cpu.status.contains(StatusFlags::CARRY));
        assert!(cpu.status.contains(StatusFlags::NEGATIVE));
    }

    #[test]
    fn test_shift_memory() {
        let (mut cpu, mut bus) = setup_cpu();
        bus.write_u8(0x0300, 0x40);
        cpu.a = 0x77;

        // ASL $0300
        let cycles = run(&mut cpu, &mut bus, &[0x0E, 0x00, 0x03], 1);

        assert_eq!(cycles, 6);
        assert_eq!(bus.memory[0x0300], 0x80);
        assert_eq!(cpu.a, 0x77);
        assert!(cpu.status.contains(StatusFlags::NEGATIVE));
        assert!(!cpu.status.contains(StatusFlags::CARRY));
    }

    #[test]
    fn test_inc_dec_memory_wraps() {
        let (mut cpu, mut bus) = setup_cpu();
        bus.write_u8(0x0010, 0xFF);

        // INC $10
        let cycles = run(&mut cpu, &mut bus, &[0xE6, 0x10], 1);
        assert_eq!(cycles, 5);
        assert_eq!(bus.memory[0x0010], 0x00);
        assert!(cpu.status.contains(StatusFlags::ZERO));

        // DEC $10
        run(&mut cpu, &mut bus, &[0xC6, 0x10], 1);
        assert_eq!(bus.memory[0x0010], 0xFF);
        assert!(cpu.status.contains(StatusFlags::NEGATIVE));
    }

    #[test]
    fn test_index_increments() {
        let (mut cpu, mut bus) = setup_cpu();
        cpu.x = 0xFF;
        cpu.y = 0x00;

        // INX; DEY
        run(&mut cpu, &mut bus, &[0xE8, 0x88], 2);

        assert_eq!(cpu.x, 0x00);
        assert_eq!(cpu.y, 0xFF);
        assert!(cpu.status.contains(StatusFlags::NEGATIVE));
        assert!(!cpu.status.contains(StatusFlags::ZERO));
    }

    #[test]
    fn test_flag_instructions() {
        let (mut cpu, mut bus) = setup_cpu();

        // SEC; SED; SEI
        run(&mut cpu, &mut bus, &[0x38, 0xF8, 0x78], 3);
        assert!(cpu
            .status
            .contains(StatusFlags::CARRY | StatusFlags::DECIMAL | StatusFlags::INTERRUPT_DISABLE));

        cpu.status.insert(StatusFlags::OVERFLOW);
        // CLC; CLD; CLI; CLV
        run(&mut cpu, &mut bus, &[0x18, 0xD8, 0x58, 0xB8], 4);
        assert!(cpu.status.is_empty());
    }

    #[test]
    fn test_pha_pla() {
        let (mut cpu, mut bus) = setup_cpu();

        // LDA #$99; PHA; LDA #$00; PLA
        bus.load_program(&[0xA9, 0x99, 0x48, 0xA9, 0x00, 0x68], 0x8000);
        cpu.pc = 0x8000;
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.step(&mut bus).unwrap(), 3);
        assert_eq!(bus.memory[0x01FD], 0x99);
        assert_eq!(cpu.sp, 0xFC);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.step(&mut bus).unwrap(), 4);

        assert_eq!(cpu.a, 0x99);
        assert_eq!(cpu.sp, 0xFD);
        assert!(cpu.status.contains(StatusFlags::NEGATIVE));
    }

    #[test]
    fn test_stack_pointer_wraps_in_page_one() {
        let (mut cpu, mut bus) = setup_cpu();
        cpu.sp = 0x00;
        cpu.a = 0x5A;

        // PHA; PLA
        run(&mut cpu, &mut bus, &[0x48], 1);
        assert_eq!(bus.memory[0x0100], 0x5A);
        assert_eq!(cpu.sp, 0xFF);

        run(&mut cpu, &mut bus, &[0x68], 1);
        assert_eq!(cpu.sp, 0x00);
        assert_eq!(cpu.a, 0x5A);
    }

    #[test]
    fn test_php_layout() {
        let (mut cpu, mut bus) = setup_cpu();

        // SEC; SED; PHP
        run(&mut cpu, &mut bus, &[0x38, 0xF8, 0x08], 3);

        // N V 1 B D I Z C
        assert_eq!(bus.memory[0x01FD], 0b0010_1001);
    }

    #[test]
    fn test_plp_restores_flags() {
        let (mut cpu, mut bus) = setup_cpu();
        bus.write_u8(0x01FE, 0b1101_0011);

        // PLP
        run(&mut cpu, &mut bus, &[0x28], 1);

        assert_eq!(
            cpu.status,
            StatusFlags::NEGATIVE
                | StatusFlags::OVERFLOW
                | StatusFlags::BREAK
                | StatusFlags::ZERO
                | StatusFlags::CARRY
        );
        assert!(!cpu.status.contains(StatusFlags::UNUSED));
    }

    #[test]
    fn test_jsr_rts() {
        let (mut cpu, mut bus) = setup_cpu();
        // RTS at $9000
        bus.write_u8(0x9000, 0x60);

        // JSR $9000
        let cycles = run(&mut cpu, &mut bus, &[0x20, 0x00, 0x90], 1);
        assert_eq!(cycles, 6);
        assert_eq!(cpu.pc, 0x9000);
        assert_eq!(cpu.sp, 0xFB);
        assert_eq!(bus.memory[0x01FD], 0x80);
        assert_eq!(bus.memory[0x01FC], 0x02);

        assert_eq!(cpu.step(&mut bus).unwrap(), 6);
        assert_eq!(cpu.pc, 0x8003);
        assert_eq!(cpu.sp, 0xFD);
    }

    #[test]
    fn test_jmp_absolute() {
        let (mut cpu, mut bus) = setup_cpu();

        // JMP $C000
        let cycles = run(&mut cpu, &mut bus, &[0x4C, 0x00, 0xC0], 1);

        assert_eq!(cycles, 3);
        assert_eq!(cpu.pc, 0xC000);
    }

    #[test]
    fn test_brk_and_rti() {
        let (mut cpu, mut bus) = setup_cpu();
        bus.write_u8(0xFFFE, 0x00);
        bus.write_u8(0xFFFF, 0x90);
        // RTI at the handler
        bus.write_u8(0x9000, 0x40);
        cpu.status = StatusFlags::CARRY;

        // BRK
        let cycles = run(&mut cpu, &mut bus, &[0x00], 1);

        assert_eq!(cycles, 7);
        assert_eq!(cpu.pc, 0x9000);
        assert_eq!(cpu.sp, 0xFA);
        assert_eq!(bus.memory[0x01FD], 0x80);
        assert_eq!(bus.memory[0x01FC], 0x01);
        // Pushed with B, bit 5 and I set
        assert_eq!(bus.memory[0x01FB], 0b0011_0101);
        assert!(cpu.status.contains(StatusFlags::INTERRUPT_DISABLE));
        assert!(!cpu.status.contains(StatusFlags::BREAK));

        assert_eq!(cpu.step(&mut bus).unwrap(), 6);
        assert_eq!(cpu.pc, 0x8001);
        assert_eq!(cpu.sp, 0xFD);
        assert!(!cpu.status.contains(StatusFlags::BREAK));
        assert!(cpu.status.contains(StatusFlags::CARRY));
    }

    #[test]
    fn test_irq_masked_is_noop() {
        let (mut cpu, mut bus) = setup_cpu();
        cpu.status.insert(StatusFlags::INTERRUPT_DISABLE);
        let before = cpu.snapshot();
        let memory_before = bus.memory;

        cpu.irq(&mut bus);

        assert_eq!(cpu.snapshot(), before);
        assert!(bus.memory == memory_before);
    }

    #[test]
    fn test_irq_enabled() {
        let (mut cpu, mut bus) = setup_cpu();
        bus.write_u8(0xFFFE, 0x00);
        bus.write_u8(0xFFFF, 0xA0);
        cpu.pc = 0x8123;
        cpu.status = StatusFlags::BREAK | StatusFlags::ZERO;
        let pending = cpu.pending_cycles();

        cpu.irq(&mut bus);

        assert_eq!(cpu.pc, 0xA000);
        assert_eq!(bus.memory[0x01FD], 0x81);
        assert_eq!(bus.memory[0x01FC], 0x23);
        // B cleared before the push, I set before it
        assert_eq!(bus.memory[0x01FB], 0b0010_0110);
        assert!(cpu.status.contains(StatusFlags::INTERRUPT_DISABLE));
        assert_eq!(cpu.pending_cycles(), pending + IRQ_CYCLES);
    }

    #[test]
    fn test_nmi_ignores_interrupt_disable() {
        let (mut cpu, mut bus) = setup_cpu();
        bus.write_u8(0xFFFA, 0x00);
        bus.write_u8(0xFFFB, 0xB0);
        cpu.status.insert(StatusFlags::INTERRUPT_DISABLE);
        let pending = cpu.pending_cycles();

        cpu.nmi(&mut bus);

        assert_eq!(cpu.pc, 0xB000);
        assert_eq!(cpu.sp, 0xFA);
        assert_eq!(cpu.pending_cycles(), pending + NMI_CYCLES);
    }

    #[test]
    fn test_step_counts_interrupt_cycles() {
        let (mut cpu, mut bus) = setup_cpu();
        bus.write_u8(0xFFFE, 0x00);
        bus.write_u8(0xFFFF, 0xA0);
        bus.write_u8(0xFFFA, 0x00);
        bus.write_u8(0xFFFB, 0xB0);
        // NOPs at both handlers
        bus.load_program(&[0xEA, 0xEA], 0xA000);
        bus.write_u8(0xB000, 0xEA);

        cpu.irq(&mut bus);
        assert_eq!(cpu.step(&mut bus).unwrap(), IRQ_CYCLES + 2);
        // Reported once only
        assert_eq!(cpu.step(&mut bus).unwrap(), 2);

        cpu.nmi(&mut bus);
        assert_eq!(cpu.step(&mut bus).unwrap(), NMI_CYCLES + 2);
    }

    #[test]
    fn test_clocked_interrupt_cycles_not_reported_by_step() {
        let (mut cpu, mut bus) = setup_cpu();
        bus.write_u8(0xFFFA, 0x00);
        bus.write_u8(0xFFFB, 0xB0);
        bus.write_u8(0xB000, 0xEA);
        bus.write_u8(0xB001, 0xEA);

        cpu.nmi(&mut bus);
        // Wait out the reset and NMI cycles, then fetch the first NOP
        for _ in 0..=(RESET_CYCLES + NMI_CYCLES) {
            cpu.clock(&mut bus).unwrap();
        }
        assert_eq!(cpu.pc, 0xB001);
        assert_eq!(cpu.step(&mut bus).unwrap(), 2);
    }

    #[test]
    fn test_nmi_then_rti_returns() {
        let (mut cpu, mut bus) = setup_cpu();
        bus.write_u8(0xFFFA, 0x00);
        bus.write_u8(0xFFFB, 0xB0);
        bus.write_u8(0xB000, 0x40);
        cpu.pc = 0x8456;
        cpu.status = StatusFlags::NEGATIVE | StatusFlags::CARRY;

        cpu.nmi(&mut bus);
        cpu.step(&mut bus).unwrap();

        assert_eq!(cpu.pc, 0x8456);
        assert_eq!(cpu.sp, 0xFD);
        assert_eq!(
            cpu.status,
            StatusFlags::NEGATIVE | StatusFlags::CARRY | StatusFlags::INTERRUPT_DISABLE
        );
    }

    #[test]
    fn test_unknown_opcode_halts() {
        let (mut cpu, mut bus) = setup_cpu();
        cpu.a = 0x12;
        cpu.x = 0x34;
        bus.load_program(&[0x02], 0x8000);
        cpu.pc = 0x8000;
        let before = cpu.snapshot();

        let err = cpu.step(&mut bus).unwrap_err();

        assert_eq!(err, CpuError::UnknownOpcode { pc: 0x8000, opcode: 0x02 });
        assert_eq!(cpu.snapshot(), CpuState { cycles: 0, ..before });
        assert!(cpu.is_halted());
        assert_eq!(cpu.clock(&mut bus), Err(err));
        assert_eq!(cpu.pc, 0x8000);

        cpu.reset(&mut bus);
        assert!(!cpu.is_halted());
        assert_eq!(cpu.fault(), None);
    }

    #[test]
    fn test_unknown_opcode_message() {
        let err = CpuError::UnknownOpcode { pc: 0xC0DE, opcode: 0xFF };
        assert_eq!(err.to_string(), "unknown opcode $FF at $C0DE");
    }

    #[test]
    fn test_status_stack_byte() {
        let flags = StatusFlags::NEGATIVE | StatusFlags::CARRY;
        assert_eq!(flags.to_stack_byte(), 0xA1);
        assert_eq!(StatusFlags::from_stack_byte(0xFF), StatusFlags::all() - StatusFlags::UNUSED);
    }

    proptest! {
        #[test]
        fn prop_load_sets_zero_negative(value in any::<u8>(), opcode in prop::sample::select(vec![0xA9u8, 0xA2, 0xA0])) {
            let (mut cpu, mut bus) = setup_cpu();
            run(&mut cpu, &mut bus, &[opcode, value], 1);
            prop_assert_eq!(cpu.status.contains(StatusFlags::ZERO), value == 0);
            prop_assert_eq!(cpu.status.contains(StatusFlags::NEGATIVE), value & 0x80 != 0);
        }

        #[test]
        fn prop_adc_matches_arithmetic(a in any::<u8>(), m in any::<u8>(), carry in any::<bool>()) {
            let (mut cpu, mut bus) = setup_cpu();
            cpu.a = a;
            cpu.status.set(StatusFlags::CARRY, carry);
            run(&mut cpu, &mut bus, &[0x69, m], 1);

            let sum = a as u16 + m as u16 + carry as u16;
            let signed = a as i8 as i16 + m as i8 as i16 + carry as i16;
            prop_assert_eq!(cpu.a, sum as u8);
            prop_assert_eq!(cpu.status.contains(StatusFlags::CARRY), sum > 0xFF);
            prop_assert_eq!(cpu.status.contains(StatusFlags::OVERFLOW), !(-128..=127).contains(&signed));
            prop_assert_eq!(cpu.status.contains(StatusFlags::ZERO), sum as u8 == 0);
            prop_assert_eq!(cpu.status.contains(StatusFlags::NEGATIVE), sum & 0x80 != 0);
        }

        #[test]
        fn prop_sbc_matches_arithmetic(a in any::<u8>(), m in any::<u8>(), carry in any::<bool>()) {
            let (mut cpu, mut bus) = setup_cpu();
            cpu.a = a;
            cpu.status.set(StatusFlags::CARRY, carry);
            run(&mut cpu, &mut bus, &[0xE9, m], 1);

            let borrow = !carry as i16;
            let difference = a as i16 - m as i16 - borrow;
            let signed = a as i8 as i16 - m as i8 as i16 - borrow;
            prop_assert_eq!(cpu.a, difference as u8);
            prop_assert_eq!(cpu.status.contains(StatusFlags::CARRY), difference >= 0);
            prop_assert_eq!(cpu.status.contains(StatusFlags::OVERFLOW), !(-128..=127).contains(&signed));
        }

        #[test]
        fn prop_status_round_trips(byte in any::<u8>()) {
            let (mut cpu, mut bus) = setup_cpu();
            let flags = StatusFlags::from_stack_byte(byte);
            cpu.status = flags;

            // PHP; CLC; CLV; PLP
            run(&mut cpu, &mut bus, &[0x08, 0x18, 0xB8, 0x28], 4);
            prop_assert_eq!(cpu.status, flags);
        }

        #[test]
        fn prop_rti_clears_break(byte in any::<u8>(), pc in any::<u16>()) {
            let (mut cpu, mut bus) = setup_cpu();
            // Frame as an interrupt leaves it: status, then PC low, PC high
            bus.write_u8(0x01FB, byte);
            bus.write_u8(0x01FC, pc as u8);
            bus.write_u8(0x01FD, (pc >> 8) as u8);
            cpu.sp = 0xFA;

            // RTI
            run(&mut cpu, &mut bus, &[0x40], 1);
            prop_assert_eq!(cpu.pc, pc);
            prop_assert_eq!(cpu.status, StatusFlags::from_stack_byte(byte) - StatusFlags::BREAK);
        }

        #[test]
        fn prop_pc_push_pull_round_trips(pc in any::<u16>(), sp in any::<u8>()) {
            let (mut cpu, mut bus) = setup_cpu();
            cpu.sp = sp;
            cpu.push_pc(&mut bus, pc);
            prop_assert_eq!(cpu.pull_pc(&mut bus), pc);
            prop_assert_eq!(cpu.sp, sp);
        }
    }
}
