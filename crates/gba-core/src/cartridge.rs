//! Cartridge header parsing and image validation
//!
//! This module recognizes ROM and BIOS images and holds the mounted
//! cartridge. The header layout:
//! $00-$03 - ARM branch to the entry point
//! $04-$9F - Nintendo logo
//! $A0-$AB - Game title
//! $AC-$AF - Game code
//! $B0-$B1 - Maker code
//! $B2     - Fixed value 0x96
//! $BC     - Software version
//! $BD     - Header complement checksum

use std::io::{Read, Seek, SeekFrom};

use thiserror::Error;

use crate::vfile::VFile;

/// Cartridge header size
pub const HEADER_SIZE: usize = 0xC0;

/// BIOS image size
pub const BIOS_SIZE: usize = 0x4000;

/// Largest mappable ROM
pub const ROM_MAX_SIZE: usize = 0x0200_0000;

/// Offset of the ROM signature
pub const ROM_MAGIC_OFFSET: u64 = 4;

/// First bytes of the Nintendo logo
pub const ROM_MAGIC: [u8; 4] = [0x24, 0xFF, 0xAE, 0x51];

/// Number of exception vectors checked in a BIOS image
const BIOS_VECTOR_COUNT: usize = 7;

/// Parsed cartridge header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeHeader {
    /// Entry point branch
    pub entry: u32,
    /// Title, NUL padded
    pub title: [u8; 12],
    /// Game code
    pub id: [u8; 4],
    /// Maker code
    pub maker: [u8; 2],
    /// Fixed value, 0x96 on licensed carts
    pub fixed: u8,
    /// Software version
    pub version: u8,
    /// Stored header checksum
    pub checksum: u8,
    /// Whether the stored checksum matches the header
    pub checksum_ok: bool,
}

impl CartridgeHeader {
    /// Parse a cartridge header from the start of a ROM image
    pub fn parse(bytes: &[u8]) -> Result<Self, CartridgeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(CartridgeError::TooShort(bytes.len()));
        }
        if bytes[4..8] != ROM_MAGIC {
            return Err(CartridgeError::BadSignature);
        }

        let mut title = [0u8; 12];
        title.copy_from_slice(&bytes[0xA0..0xAC]);
        let mut id = [0u8; 4];
        id.copy_from_slice(&bytes[0xAC..0xB0]);

        let checksum = bytes[0xBD];
        Ok(Self {
            entry: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            title,
            id,
            maker: [bytes[0xB0], bytes[0xB1]],
            fixed: bytes[0xB2],
            version: bytes[0xBC],
            checksum,
            checksum_ok: header_checksum(bytes) == checksum,
        })
    }

    /// Game title with padding stripped
    pub fn title(&self) -> String {
        let end = self.title.iter().position(|&b| b == 0).unwrap_or(self.title.len());
        String::from_utf8_lossy(&self.title[..end]).trim_end().to_string()
    }

    /// Game code as text
    pub fn game_code(&self) -> String {
        String::from_utf8_lossy(&self.id).to_string()
    }
}

/// Complement checksum over $A0-$BC
pub fn header_checksum(bytes: &[u8]) -> u8 {
    bytes[0xA0..0xBD]
        .iter()
        .fold(0u8, |sum, &b| sum.wrapping_sub(b))
        .wrapping_sub(0x19)
}

/// Check whether a virtual file carries a cartridge signature
pub fn is_rom(vf: &mut VFile) -> bool {
    if vf.seek(SeekFrom::Start(ROM_MAGIC_OFFSET)).is_err() {
        return false;
    }
    let mut signature = [0u8; ROM_MAGIC.len()];
    let read = matches!(vf.read(&mut signature), Ok(n) if n == signature.len());
    let valid = read && signature == ROM_MAGIC;
    let _ = vf.seek(SeekFrom::Start(0));
    valid
}

/// Check whether a virtual file looks like a BIOS image
///
/// The first seven exception vectors of a BIOS are unconditional ARM
/// branches with a short forward offset.
pub fn is_bios(vf: &mut VFile) -> bool {
    if vf.seek(SeekFrom::Start(0)).is_err() {
        return false;
    }
    let mut vectors = [0u8; BIOS_VECTOR_COUNT * 4];
    if !matches!(vf.read(&mut vectors), Ok(n) if n == vectors.len()) {
        return false;
    }
    let _ = vf.seek(SeekFrom::Start(0));
    vectors
        .chunks_exact(4)
        .all(|vector| vector[3] == 0xEA && vector[2] == 0x00)
}

/// CRC32 (IEEE) lookup table
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// CRC32 of a byte slice
pub fn crc32(bytes: &[u8]) -> u32 {
    !bytes.iter().fold(!0u32, |crc, &b| {
        CRC32_TABLE[((crc ^ u32::from(b)) & 0xFF) as usize] ^ (crc >> 8)
    })
}

/// A mounted cartridge
#[derive(Debug, Clone)]
pub struct Cartridge {
    rom: VFile,
    header: CartridgeHeader,
    crc32: u32,
    mirroring: bool,
}

impl Cartridge {
    /// Mount a validated ROM image
    pub fn mount(rom: VFile) -> Result<Self, CartridgeError> {
        if rom.size() > ROM_MAX_SIZE {
            return Err(CartridgeError::TooLarge(rom.size()));
        }
        let header = CartridgeHeader::parse(rom.map())?;
        let crc32 = crc32(rom.map());
        Ok(Self {
            rom,
            header,
            crc32,
            mirroring: false,
        })
    }

    /// Get the parsed header
    pub fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    /// CRC32 of the whole image
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// ROM bytes
    pub fn rom(&self) -> &[u8] {
        self.rom.map()
    }

    /// ROM bytes for live patching
    pub fn rom_mut(&mut self) -> &mut [u8] {
        self.rom.map_mut()
    }

    /// Mirror short images across the cartridge space
    pub fn set_mirroring(&mut self, mirroring: bool) {
        self.mirroring = mirroring;
    }

    /// Whether short images are mirrored
    pub fn mirroring(&self) -> bool {
        self.mirroring
    }

    /// Read a halfword at a cartridge-space offset
    pub fn read16(&self, offset: u32) -> u16 {
        let rom = self.rom.map();
        let mut offset = (offset & !1) as usize;
        if offset + 1 >= rom.len() && self.mirroring && rom.len() >= 2 {
            offset %= rom.len() & !1;
        }
        match rom.get(offset..offset + 2) {
            Some(bytes) => u16::from_le_bytes([bytes[0], bytes[1]]),
            // Unmapped cartridge space returns the address bus
            None => (offset >> 1) as u16,
        }
    }

    /// Unmount, handing back the ROM file
    pub fn eject(self) -> VFile {
        self.rom
    }
}

/// Cartridge error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CartridgeError {
    #[error("image too short for a cartridge header ({0} bytes)")]
    TooShort(usize),
    #[error("missing cartridge signature")]
    BadSignature,
    #[error("ROM image exceeds 32 MiB ({0} bytes)")]
    TooLarge(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x200];
        rom[0..4].copy_from_slice(&0xEA00_002Eu32.to_le_bytes());
        rom[4..8].copy_from_slice(&ROM_MAGIC);
        rom[0xA0..0xA7].copy_from_slice(b"TESTING");
        rom[0xAC..0xB0].copy_from_slice(b"ATSE");
        rom[0xB0..0xB2].copy_from_slice(b"01");
        rom[0xB2] = 0x96;
        rom[0xBD] = header_checksum(&rom);
        rom
    }

    #[test]
    fn test_header_parsing() {
        let header = CartridgeHeader::parse(&minimal_rom()).unwrap();
        assert_eq!(header.title(), "TESTING");
        assert_eq!(header.game_code(), "ATSE");
        assert_eq!(header.fixed, 0x96);
        assert!(header.checksum_ok);
    }

    #[test]
    fn test_header_rejects_garbage() {
        assert_eq!(CartridgeHeader::parse(&[0u8; 8]), Err(CartridgeError::TooShort(8)));
        assert_eq!(
            CartridgeHeader::parse(&[0u8; HEADER_SIZE]),
            Err(CartridgeError::BadSignature)
        );
    }

    #[test]
    fn test_is_rom() {
        assert!(is_rom(&mut VFile::from_memory(minimal_rom())));
        assert!(!is_rom(&mut VFile::from_memory(vec![0xFFu8; 0x200])));
        assert!(!is_rom(&mut VFile::from_memory(vec![0u8; 6])));
    }

    #[test]
    fn test_is_bios() {
        let mut bios = vec![0u8; BIOS_SIZE];
        for vector in bios.chunks_exact_mut(4).take(7) {
            vector.copy_from_slice(&0xEA00_0010u32.to_le_bytes());
        }
        assert!(is_bios(&mut VFile::from_memory(bios.clone())));
        bios[6 * 4 + 3] = 0xE5;
        assert!(!is_bios(&mut VFile::from_memory(bios)));
    }

    #[test]
    fn test_crc32_known_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_open_bus_past_end() {
        let cart = Cartridge::mount(VFile::from_memory(minimal_rom())).unwrap();
        assert_eq!(cart.read16(0x1000), 0x0800);
        assert_eq!(cart.read16(4), 0xFF24);
    }

    #[test]
    fn test_mirroring_wraps() {
        let mut cart = Cartridge::mount(VFile::from_memory(minimal_rom())).unwrap();
        cart.set_mirroring(true);
        assert_eq!(cart.read16(0x204), cart.read16(4));
    }
}
