use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use bitflags::bitflags;
use thiserror::Error;

use crate::memory::Ram;

pub const MAGIC: [u8; 4] = *b"NES\x1A";
pub const HEADER_SIZE: usize = 16;
pub const TRAINER_SIZE: usize = 512;
pub const PRG_ROM_BANK_SIZE: usize = 0x4000;
pub const CHR_ROM_BANK_SIZE: usize = 0x2000;
pub const PRG_RAM_BANK_SIZE: usize = 0x2000;

/// Where a trainer is copied into PRG RAM.
pub const TRAINER_ADDR: u16 = 0x7000;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags6: u8 {
        const VERTICAL_MIRRORING = 0b0000_0001;
        const BATTERY = 0b0000_0010;
        const TRAINER = 0b0000_0100;
        const FOUR_SCREEN = 0b0000_1000;
        const MAPPER_LOW = 0b1111_0000;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags7: u8 {
        const VS_UNISYSTEM = 0b0000_0001;
        const PLAYCHOICE_10 = 0b0000_0010;
        const NES2_MARKER = 0b0000_1100;
        const MAPPER_HIGH = 0b1111_0000;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags10: u8 {
        const DUAL_TV = 0b0000_0001;
        const PAL = 0b0000_0010;
        const PRG_RAM_MISSING = 0b0001_0000;
        const BUS_CONFLICTS = 0b0010_0000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    FourScreen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TvSystem {
    Ntsc,
    Pal,
    Dual,
}

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("cannot read ROM image: {0}")]
    Io(#[from] std::io::Error),
    #[error("not an iNES image (bad magic)")]
    InvalidMagic,
    #[error("ROM image truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("mapper {0} is not supported")]
    UnsupportedMapper(u8),
}

/// The 16-byte iNES header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InesHeader {
    pub prg_rom_banks: u8,
    pub chr_rom_banks: u8,
    pub flags6: Flags6,
    pub flags7: Flags7,
    pub prg_ram_banks: u8,
    pub flags9: u8,
    pub flags10: Flags10,
}

impl InesHeader {
    pub fn parse(data: &[u8]) -> Result<Self, CartridgeError> {
        if data.len() < MAGIC.len() || data[..MAGIC.len()] != MAGIC {
            return Err(CartridgeError::InvalidMagic);
        }
        if data.len() < HEADER_SIZE {
            return Err(CartridgeError::Truncated {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        Ok(InesHeader {
            prg_rom_banks: data[4],
            chr_rom_banks: data[5],
            flags6: Flags6::from_bits_retain(data[6]),
            flags7: Flags7::from_bits_retain(data[7]),
            prg_ram_banks: data[8],
            flags9: data[9],
            flags10: Flags10::from_bits_retain(data[10]),
        })
    }

    pub fn mapper(&self) -> u8 {
        (self.flags7.bits() & 0xF0) | (self.flags6.bits() >> 4)
    }

    pub fn mirroring(&self) -> Mirroring {
        if self.flags6.contains(Flags6::FOUR_SCREEN) {
            Mirroring::FourScreen
        } else if self.flags6.contains(Flags6::VERTICAL_MIRRORING) {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        }
    }

    pub fn has_battery(&self) -> bool {
        self.flags6.contains(Flags6::BATTERY)
    }

    pub fn has_trainer(&self) -> bool {
        self.flags6.contains(Flags6::TRAINER)
    }

    pub fn is_vs_unisystem(&self) -> bool {
        self.flags7.contains(Flags7::VS_UNISYSTEM)
    }

    pub fn is_playchoice_10(&self) -> bool {
        self.flags7.contains(Flags7::PLAYCHOICE_10)
    }

    /// Bits 2-3 of flags 7 read `10` in an NES 2.0 header.
    pub fn is_nes2(&self) -> bool {
        self.flags7.bits() & Flags7::NES2_MARKER.bits() == 0b0000_1000
    }

    pub fn prg_rom_size(&self) -> usize {
        self.prg_rom_banks as usize * PRG_ROM_BANK_SIZE
    }

    /// Zero means the board has CHR RAM instead.
    pub fn chr_rom_size(&self) -> usize {
        self.chr_rom_banks as usize * CHR_ROM_BANK_SIZE
    }

    /// A bank count of 0 still means one 8 KiB bank.
    pub fn prg_ram_size(&self) -> usize {
        self.prg_ram_banks.max(1) as usize * PRG_RAM_BANK_SIZE
    }

    pub fn prg_ram_present(&self) -> bool {
        !self.flags10.contains(Flags10::PRG_RAM_MISSING)
    }

    pub fn has_bus_conflicts(&self) -> bool {
        self.flags10.contains(Flags10::BUS_CONFLICTS)
    }

    pub fn tv_system(&self) -> TvSystem {
        if self.flags10.contains(Flags10::DUAL_TV) {
            TvSystem::Dual
        } else if self.flags9 & 0x01 != 0 || self.flags10.contains(Flags10::PAL) {
            TvSystem::Pal
        } else {
            TvSystem::Ntsc
        }
    }

    /// Header plus trainer plus ROM banks.
    pub fn image_size(&self) -> usize {
        let trainer = if self.has_trainer() { TRAINER_SIZE } else { 0 };
        HEADER_SIZE + trainer + self.prg_rom_size() + self.chr_rom_size()
    }
}

impl fmt::Display for InesHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "prg rom:           {} KB", self.prg_rom_size() / 1024)?;
        writeln!(f, "chr rom:           {} KB", self.chr_rom_size() / 1024)?;
        writeln!(f, "mapper:            {}", self.mapper())?;
        writeln!(f, "mirroring:         {:?}", self.mirroring())?;
        writeln!(f, "battery:           {}", self.has_battery())?;
        writeln!(f, "trainer:           {}", self.has_trainer())?;
        writeln!(f, "vs unisystem:      {}", self.is_vs_unisystem())?;
        writeln!(f, "playchoice 10:     {}", self.is_playchoice_10())?;
        writeln!(f, "nes 2.0:           {}", self.is_nes2())?;
        writeln!(f, "prg ram:           {} KB", self.prg_ram_size() / 1024)?;
        writeln!(f, "tv system:         {:?}", self.tv_system())?;
        writeln!(
            f,
            "prg ram present:   {}",
            if self.prg_ram_present() { "present" } else { "missing" }
        )?;
        write!(f, "bus conflicts:     {}", self.has_bus_conflicts())
    }
}

/// Memory devices for an NROM board.
pub struct NromBoard {
    /// PRG ROM at $8000-$FFFF; a 16 KiB image mirrors into $C000.
    pub prg_rom: Ram,
    /// PRG RAM at $6000-$7FFF, trainer preloaded at $7000.
    pub prg_ram: Option<Ram>,
}

pub struct Cartridge {
    header: InesHeader,
    trainer: Option<Vec<u8>>,
    prg_rom: Vec<u8>,
    chr_rom: Vec<u8>,
}

impl Cartridge {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CartridgeError> {
        let mut file = File::open(path.as_ref())?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        let cartridge = Self::from_bytes(&data)?;
        log::info!("Cartridge loaded from {}", path.as_ref().display());
        Ok(cartridge)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CartridgeError> {
        let header = InesHeader::parse(data)?;
        let expected = header.image_size();
        if data.len() < expected {
            return Err(CartridgeError::Truncated {
                expected,
                actual: data.len(),
            });
        }

        let mut offset = HEADER_SIZE;
        let trainer = if header.has_trainer() {
            let bytes = data[offset..offset + TRAINER_SIZE].to_vec();
            offset += TRAINER_SIZE;
            Some(bytes)
        } else {
            None
        };

        let prg_rom = data[offset..offset + header.prg_rom_size()].to_vec();
        offset += header.prg_rom_size();
        let chr_rom = data[offset..offset + header.chr_rom_size()].to_vec();

        log::info!(
            "Cartridge - Mapper: {}, PRG ROM: {} bytes, CHR ROM: {} bytes, Mirroring: {:?}",
            header.mapper(),
            prg_rom.len(),
            chr_rom.len(),
            header.mirroring()
        );

        Ok(Cartridge {
            header,
            trainer,
            prg_rom,
            chr_rom,
        })
    }

    pub fn header(&self) -> &InesHeader {
        &self.header
    }

    pub fn mapper(&self) -> u8 {
        self.header.mapper()
    }

    pub fn mirroring(&self) -> Mirroring {
        self.header.mirroring()
    }

    pub fn prg_rom(&self) -> &[u8] {
        &self.prg_rom
    }

    pub fn chr_rom(&self) -> &[u8] {
        &self.chr_rom
    }

    pub fn trainer(&self) -> Option<&[u8]> {
        self.trainer.as_deref()
    }

    pub fn uses_chr_ram(&self) -> bool {
        self.chr_rom.is_empty()
    }

    /// Build the CPU-side devices for mapper 0.
    pub fn nrom_board(&self) -> Result<NromBoard, CartridgeError> {
        let mapper = self.mapper();
        if mapper != 0 {
            return Err(CartridgeError::UnsupportedMapper(mapper));
        }

        let prg_rom = Ram::rom(self.prg_rom.clone(), 0x8000, 0xFFFF);
        let prg_ram = self.header.prg_ram_present().then(|| {
            let mut ram = Ram::new(self.header.prg_ram_size(), 0x6000, 0x7FFF);
            if let Some(trainer) = &self.trainer {
                ram.load(TRAINER_ADDR, trainer);
            }
            ram
        });

        Ok(NromBoard { prg_rom, prg_ram })
    }
}
