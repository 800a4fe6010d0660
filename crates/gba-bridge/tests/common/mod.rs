//! Synthetic images shared by the bridge tests

#![allow(dead_code)]

use gba_bridge::{Context, BIOS_SIZE};
use gba_core::cartridge::{header_checksum, ROM_MAGIC};

/// `b .`
pub const SPIN: u32 = 0xEAFF_FFFE;

/// A ROM for `code` that branches past the header and spins
pub fn rom(code: &[u8; 4]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x1000];
    rom[0..4].copy_from_slice(&0xEA00_002Eu32.to_le_bytes());
    rom[4..8].copy_from_slice(&ROM_MAGIC);
    rom[0xA0..0xA6].copy_from_slice(b"BRIDGE");
    rom[0xAC..0xB0].copy_from_slice(code);
    rom[0xB0..0xB2].copy_from_slice(b"01");
    rom[0xB2] = 0x96;
    rom[0xBD] = header_checksum(&rom);
    rom[0xC0..0xC4].copy_from_slice(&SPIN.to_le_bytes());
    rom
}

/// A BIOS whose vectors branch forward and whose reset handler spins
pub fn bios() -> Vec<u8> {
    let mut bios = vec![0u8; BIOS_SIZE];
    for vector in bios.chunks_exact_mut(4).take(8) {
        vector.copy_from_slice(&0xEA00_0006u32.to_le_bytes());
    }
    bios[0x20..0x24].copy_from_slice(&SPIN.to_le_bytes());
    bios
}

/// A context with a ROM for `code` loaded
pub fn loaded(code: &[u8; 4]) -> Context {
    let mut ctx = Context::create(None).expect("context without BIOS");
    ctx.load(&rom(code)).expect("synthetic ROM loads");
    ctx
}

/// Where [`program_rom`] places its code
pub const PROGRAM_BASE: u32 = 0x0800_0100;

/// Straight-line ARM code built one instruction at a time
#[derive(Debug, Default)]
pub struct Asm {
    words: Vec<u32>,
}

/// Encode `value` as an 8-bit immediate rotated right by an even amount
fn immediate(value: u32) -> u32 {
    (0..16)
        .find_map(|rot| {
            let imm = value.rotate_left(rot * 2);
            (imm <= 0xFF).then_some(rot << 8 | imm)
        })
        .unwrap_or_else(|| panic!("{value:#X} is not an ARM immediate"))
}

fn halfword_offset(offset: u32) -> u32 {
    (offset & 0xF0) << 4 | (offset & 0xF)
}

impl Asm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address of the next instruction
    pub fn here(&self) -> u32 {
        PROGRAM_BASE + 4 * self.words.len() as u32
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    fn emit(&mut self, word: u32) -> &mut Self {
        self.words.push(word);
        self
    }

    pub fn mov(&mut self, rd: u32, value: u32) -> &mut Self {
        self.emit(0xE3A0_0000 | rd << 12 | immediate(value))
    }

    pub fn orr(&mut self, rd: u32, rn: u32, value: u32) -> &mut Self {
        self.emit(0xE380_0000 | rn << 16 | rd << 12 | immediate(value))
    }

    /// `strb rd, [rn, #offset]`
    pub fn strb(&mut self, rd: u32, rn: u32, offset: u32) -> &mut Self {
        self.emit(0xE5C0_0000 | rn << 16 | rd << 12 | offset)
    }

    /// `ldrb rd, [rn, #offset]`
    pub fn ldrb(&mut self, rd: u32, rn: u32, offset: u32) -> &mut Self {
        self.emit(0xE5D0_0000 | rn << 16 | rd << 12 | offset)
    }

    /// `strb rd, [rn], #1`
    pub fn strb_inc(&mut self, rd: u32, rn: u32) -> &mut Self {
        self.emit(0xE4C0_0001 | rn << 16 | rd << 12)
    }

    /// `strh rd, [rn, #offset]`
    pub fn strh(&mut self, rd: u32, rn: u32, offset: u32) -> &mut Self {
        self.emit(0xE1C0_00B0 | rn << 16 | rd << 12 | halfword_offset(offset))
    }

    /// `ldrh rd, [rn, #offset]`
    pub fn ldrh(&mut self, rd: u32, rn: u32, offset: u32) -> &mut Self {
        self.emit(0xE1D0_00B0 | rn << 16 | rd << 12 | halfword_offset(offset))
    }

    /// `b target`
    pub fn branch(&mut self, target: u32) -> &mut Self {
        let offset = target.wrapping_sub(self.here() + 8) as i32 >> 2;
        self.emit(0xEA00_0000 | (offset as u32 & 0x00FF_FFFF))
    }

    /// `b .`
    pub fn spin(&mut self) -> &mut Self {
        self.emit(SPIN)
    }
}

/// A ROM for `code` that jumps from its entry point to `program`
pub fn program_rom(code: &[u8; 4], program: &Asm) -> Vec<u8> {
    let mut rom = rom(code);
    // b PROGRAM_BASE from 0xC0, clear of the GPIO registers at 0xC4
    rom[0xC0..0xC4].copy_from_slice(&0xEA00_000Eu32.to_le_bytes());
    let base = (PROGRAM_BASE & 0xFF_FFFF) as usize;
    for (i, word) in program.words().iter().enumerate() {
        rom[base + 4 * i..base + 4 * i + 4].copy_from_slice(&word.to_le_bytes());
    }
    rom
}
