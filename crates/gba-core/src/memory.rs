//! Memory regions and access timing
//!
//! The GBA memory map, by the top byte of the address:
//! $00 - BIOS (16 KiB)
//! $02 - On-board work RAM (256 KiB)
//! $03 - On-chip work RAM (32 KiB)
//! $04 - I/O registers
//! $05 - Palette RAM (1 KiB)
//! $06 - VRAM (96 KiB)
//! $07 - OAM (1 KiB)
//! $08-$0D - Cartridge ROM in three wait-state mirrors, EEPROM at $0D
//! $0E-$0F - Cartridge save space
//!
//! Palette RAM, VRAM and OAM belong to the video unit; this module owns the
//! rest of the on-board memory.

use crate::serialize::{StateReader, StateWriter};

pub const REGION_BIOS: u32 = 0x0;
pub const REGION_WORKING_RAM: u32 = 0x2;
pub const REGION_WORKING_IRAM: u32 = 0x3;
pub const REGION_IO: u32 = 0x4;
pub const REGION_PALETTE_RAM: u32 = 0x5;
pub const REGION_VRAM: u32 = 0x6;
pub const REGION_OAM: u32 = 0x7;
pub const REGION_CART0: u32 = 0x8;
pub const REGION_CART0_EX: u32 = 0x9;
pub const REGION_CART1: u32 = 0xA;
pub const REGION_CART1_EX: u32 = 0xB;
pub const REGION_CART2: u32 = 0xC;
pub const REGION_CART2_EX: u32 = 0xD;
pub const REGION_CART_SRAM: u32 = 0xE;
pub const REGION_CART_SRAM_MIRROR: u32 = 0xF;

pub const SIZE_BIOS: usize = 0x4000;
pub const SIZE_WORKING_RAM: usize = 0x40000;
pub const SIZE_WORKING_IRAM: usize = 0x8000;
pub const SIZE_IO: usize = 0x400;

/// Address bits below the region selector
pub const OFFSET_MASK: u32 = 0x00FF_FFFF;

/// I/O register offsets
pub mod io {
    pub const DISPCNT: u32 = 0x000;
    pub const DISPSTAT: u32 = 0x004;
    pub const VCOUNT: u32 = 0x006;
    pub const SOUND1CNT_L: u32 = 0x060;
    pub const SOUND1CNT_H: u32 = 0x062;
    pub const SOUND1CNT_X: u32 = 0x064;
    pub const SOUND2CNT_L: u32 = 0x068;
    pub const SOUND2CNT_H: u32 = 0x06C;
    pub const SOUNDCNT_L: u32 = 0x080;
    pub const SOUNDCNT_H: u32 = 0x082;
    pub const SOUNDCNT_X: u32 = 0x084;
    pub const KEYINPUT: u32 = 0x130;
    pub const KEYCNT: u32 = 0x132;
    pub const IE: u32 = 0x200;
    pub const IF: u32 = 0x202;
    pub const WAITCNT: u32 = 0x204;
    pub const IME: u32 = 0x208;
}

/// Width of a bus access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessWidth {
    Byte,
    Half,
    Word,
}

const SRAM_WAIT: [i32; 4] = [4, 3, 2, 8];
const ROM_WAIT_N: [i32; 4] = [4, 3, 2, 8];
const ROM_WAIT_S: [[i32; 2]; 3] = [[2, 1], [4, 1], [8, 1]];

/// On-board memory
#[derive(Debug, Clone)]
pub struct Memory {
    pub(crate) bios: Box<[u8]>,
    pub(crate) wram: Box<[u8]>,
    pub(crate) iwram: Box<[u8]>,
    pub(crate) io: Box<[u8]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            bios: vec![0; SIZE_BIOS].into_boxed_slice(),
            wram: vec![0; SIZE_WORKING_RAM].into_boxed_slice(),
            iwram: vec![0; SIZE_WORKING_IRAM].into_boxed_slice(),
            io: vec![0; SIZE_IO].into_boxed_slice(),
        }
    }

    /// Clear the I/O register block; RAM is kept
    pub fn reset(&mut self) {
        self.io.fill(0);
    }

    /// Copy a BIOS image into the BIOS region
    pub fn load_bios(&mut self, image: &[u8]) {
        let len = image.len().min(SIZE_BIOS);
        self.bios[..len].copy_from_slice(&image[..len]);
        self.bios[len..].fill(0);
    }

    /// Raw I/O register halfword
    pub fn io16(&self, offset: u32) -> u16 {
        let offset = (offset & !1) as usize;
        match self.io.get(offset..offset + 2) {
            Some(bytes) => u16::from_le_bytes([bytes[0], bytes[1]]),
            None => 0,
        }
    }

    /// Store a raw I/O register halfword
    pub fn set_io16(&mut self, offset: u32, value: u16) {
        let offset = (offset & !1) as usize;
        if let Some(bytes) = self.io.get_mut(offset..offset + 2) {
            bytes.copy_from_slice(&value.to_le_bytes());
        }
    }

    /// Cycles taken by one sequential access
    pub fn access_cycles(&self, address: u32, width: AccessWidth) -> i32 {
        let waitcnt = self.io16(io::WAITCNT);
        let word = width == AccessWidth::Word;
        match address >> 24 {
            REGION_WORKING_RAM => {
                if word {
                    6
                } else {
                    3
                }
            }
            REGION_PALETTE_RAM | REGION_VRAM => {
                if word {
                    2
                } else {
                    1
                }
            }
            region @ REGION_CART0..=REGION_CART2_EX => {
                let ws = ((region - REGION_CART0) / 2) as usize;
                let s_bit = [4, 7, 10][ws];
                let sequential = ROM_WAIT_S[ws][usize::from((waitcnt >> s_bit) & 1)];
                let half = 1 + sequential;
                if word {
                    half * 2
                } else {
                    half
                }
            }
            REGION_CART_SRAM | REGION_CART_SRAM_MIRROR => 1 + SRAM_WAIT[usize::from(waitcnt & 3)],
            _ => 1,
        }
    }

    /// Cycles taken by the first access of a burst
    pub fn nonsequential_cycles(&self, address: u32) -> i32 {
        let waitcnt = self.io16(io::WAITCNT);
        match address >> 24 {
            region @ REGION_CART0..=REGION_CART2_EX => {
                let ws = ((region - REGION_CART0) / 2) as usize;
                let n_shift = [2, 5, 8][ws];
                1 + ROM_WAIT_N[usize::from((waitcnt >> n_shift) & 3)]
            }
            _ => self.access_cycles(address, AccessWidth::Half),
        }
    }

    pub(crate) fn wram_offset(address: u32) -> usize {
        (address as usize) & (SIZE_WORKING_RAM - 1)
    }

    pub(crate) fn iwram_offset(address: u32) -> usize {
        (address as usize) & (SIZE_WORKING_IRAM - 1)
    }

    pub fn save_state(&self, w: &mut StateWriter<'_>) {
        use crate::serialize::offsets;
        w.seek(offsets::IO);
        w.put_bytes(&self.io);
        w.seek(offsets::IWRAM);
        w.put_bytes(&self.iwram);
        w.seek(offsets::WRAM);
        w.put_bytes(&self.wram);
    }

    pub fn load_state(&mut self, r: &mut StateReader<'_>) {
        use crate::serialize::offsets;
        r.seek(offsets::IO);
        r.get_bytes(&mut self.io);
        r.seek(offsets::IWRAM);
        r.get_bytes(&mut self.iwram);
        r.seek(offsets::WRAM);
        r.get_bytes(&mut self.wram);
    }
}

pub(crate) fn read16(bytes: &[u8], offset: usize) -> u16 {
    match bytes.get(offset..offset + 2) {
        Some(b) => u16::from_le_bytes([b[0], b[1]]),
        None => 0,
    }
}

pub(crate) fn write16(bytes: &mut [u8], offset: usize, value: u16) {
    if let Some(b) = bytes.get_mut(offset..offset + 2) {
        b.copy_from_slice(&value.to_le_bytes());
    }
}
