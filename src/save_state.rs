use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Architectural CPU registers plus the pending cycle budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CpuState {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: u8,
    pub cycles: u8,
}

#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("save state I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("save state encoding: {0}")]
    Encoding(#[from] bincode::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveState {
    pub cpu: CpuState,
    // Work RAM contents
    pub ram: Vec<u8>,
    pub total_cycles: u64,
}

impl SaveState {
    pub fn to_bytes(&self) -> Result<Vec<u8>, SaveStateError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(data: &[u8]) -> Result<SaveState, SaveStateError> {
        Ok(bincode::deserialize(data)?)
    }

    pub fn save_to_file(&self, filename: impl AsRef<Path>) -> Result<(), SaveStateError> {
        let filename = filename.as_ref();
        std::fs::write(filename, self.to_bytes()?)?;
        log::info!("Save state written to: {}", filename.display());
        Ok(())
    }

    pub fn load_from_file(filename: impl AsRef<Path>) -> Result<SaveState, SaveStateError> {
        let filename = filename.as_ref();
        let data = std::fs::read(filename)?;
        let save_state = Self::from_bytes(&data)?;
        log::info!("Save state loaded from: {}", filename.display());
        Ok(save_state)
    }
}
