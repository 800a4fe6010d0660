use gba_core::cartridge::CartridgeError;
use gba_core::serialize::StateError;
use thiserror::Error;

/// Bridge error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("invalid BIOS image")]
    InvalidBios,
    #[error("invalid ROM image: {0}")]
    InvalidRom(#[from] CartridgeError),
    #[error("ROM image is {0} bytes, the limit is 32 MiB")]
    RomTooLarge(usize),
    #[error("save state rejected: {0}")]
    State(#[from] StateError),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
