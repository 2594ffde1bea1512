use std::env;
use std::path::PathBuf;
use std::process;

use nes_cpu::cartridge::Cartridge;
use nes_cpu::debug_flags;
use nes_cpu::save_state::SaveState;
use nes_cpu::{Emulator, EmulatorError};

// One NTSC frame of CPU time
const DEFAULT_CYCLES: u64 = 29_781;

struct Options {
    rom: PathBuf,
    cycles: u64,
    disasm: usize,
    dump: Option<(u16, usize)>,
    save: Option<PathBuf>,
    load: Option<PathBuf>,
}

fn usage(program: &str) {
    eprintln!(
        "Usage: {} <rom.nes> [--cycles N] [--disasm N] [--dump ADDR:LEN] [--save FILE] [--load FILE]",
        program
    );
    eprintln!("Numbers may be decimal or 0x-prefixed hex. HEADLESS_CYCLES sets the default cycle count.");
}

fn required<'a>(flag: &str, value: Option<&'a str>) -> Result<&'a str, String> {
    value.ok_or_else(|| format!("{} requires a value", flag))
}

fn number(flag: &str, value: Option<&str>) -> Result<u64, String> {
    let value = required(flag, value)?;
    debug_flags::parse_number(value).ok_or_else(|| format!("{}: invalid number '{}'", flag, value))
}

/// `ADDR:LEN`, e.g. `0x0000:0x100`.
fn dump_range(flag: &str, value: Option<&str>) -> Result<(u16, usize), String> {
    let value = required(flag, value)?;
    let invalid = || format!("{}: expected ADDR:LEN, got '{}'", flag, value);
    let (addr, len) = value.split_once(':').ok_or_else(invalid)?;
    let addr = debug_flags::parse_number(addr)
        .and_then(|a| u16::try_from(a).ok())
        .ok_or_else(invalid)?;
    let len = debug_flags::parse_number(len).ok_or_else(invalid)?;
    Ok((addr, len as usize))
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut rom = None;
    let mut cycles = None;
    let mut disasm = 0;
    let mut dump = None;
    let mut save = None;
    let mut load = None;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let value = args.get(i + 1).map(String::as_str);
        match flag {
            "--cycles" => {
                cycles = Some(number(flag, value)?);
                i += 2;
            }
            "--disasm" => {
                disasm = number(flag, value)? as usize;
                i += 2;
            }
            "--dump" => {
                dump = Some(dump_range(flag, value)?);
                i += 2;
            }
            "--save" => {
                save = Some(PathBuf::from(required(flag, value)?));
                i += 2;
            }
            "--load" => {
                load = Some(PathBuf::from(required(flag, value)?));
                i += 2;
            }
            s if s.starts_with('-') => return Err(format!("Unknown option: {}", s)),
            s => {
                if rom.replace(PathBuf::from(s)).is_some() {
                    return Err(format!("Unexpected argument: {}", s));
                }
                i += 1;
            }
        }
    }

    Ok(Options {
        rom: rom.ok_or("ROM argument missing")?,
        cycles: cycles
            .or_else(debug_flags::headless_cycles)
            .unwrap_or(DEFAULT_CYCLES),
        disasm,
        dump,
        save,
        load,
    })
}

fn run(options: &Options) -> Result<(), EmulatorError> {
    let quiet = debug_flags::quiet();

    let cartridge = Cartridge::load(&options.rom)?;
    if !quiet {
        println!("Loading ROM: {}", options.rom.display());
        println!("{}", cartridge.header());
    }

    let mut emulator = Emulator::new();
    emulator.load_cartridge(&cartridge)?;
    emulator.reset()?;
    if let Some(path) = &options.load {
        emulator.load_state(&SaveState::load_from_file(path)?)?;
    }

    if options.disasm > 0 {
        let pc = emulator.cpu()?.pc;
        for instruction in emulator.disassemble(pc, options.disasm) {
            println!("{}", instruction);
        }
    }

    let result = emulator.run_cycles(options.cycles);
    if !quiet {
        println!("{}  CYC:{}", emulator.cpu()?, emulator.total_cycles());
    }
    if let Some((addr, len)) = options.dump {
        print!("{}", emulator.memory_dump(addr, len));
    }
    result?;

    if let Some(path) = &options.save {
        emulator.save_state()?.save_to_file(path)?;
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("nes-cpu");
    if args.len() < 2 || args.iter().any(|a| a == "--help" || a == "-h") {
        usage(program);
        return;
    }

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(msg) => {
            eprintln!("{}", msg);
            usage(program);
            process::exit(2);
        }
    };

    if let Err(e) = run(&options) {
        eprintln!("{}", e);
        process::exit(1);
    }
}
