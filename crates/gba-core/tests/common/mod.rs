//! Synthetic cartridges shared by the integration tests

#![allow(dead_code)]

use gba_core::cartridge::{header_checksum, ROM_MAGIC};
use gba_core::hardware::{LuminanceSource, RotationSource, RtcSource};
use gba_core::overrides;
use gba_core::savedata::SAVEDATA_CAPACITY;
use gba_core::vfile::VFile;
use gba_core::{Config, Gba};

/// `b 0x080000C0` at the entry point
pub const ENTRY_BRANCH: u32 = 0xEA00_002E;
/// `b .`
pub const SPIN: u32 = 0xEAFF_FFFE;

/// A minimal ROM that branches past the header and spins
pub fn build_rom(code: &[u8; 4], size: usize) -> Vec<u8> {
    let mut rom = vec![0u8; size.max(0x200)];
    rom[0..4].copy_from_slice(&ENTRY_BRANCH.to_le_bytes());
    rom[4..8].copy_from_slice(&ROM_MAGIC);
    rom[0xA0..0xA8].copy_from_slice(b"SYNTHROM");
    rom[0xAC..0xB0].copy_from_slice(code);
    rom[0xB0..0xB2].copy_from_slice(b"01");
    rom[0xB2] = 0x96;
    rom[0xBD] = header_checksum(&rom);
    rom[0xC0..0xC4].copy_from_slice(&SPIN.to_le_bytes());
    rom
}

/// A BIOS image whose vectors all pass validation
pub fn build_bios() -> Vec<u8> {
    let mut bios = vec![0u8; 0x4000];
    for vector in bios.chunks_exact_mut(4).take(8) {
        vector.copy_from_slice(&0xEA00_0006u32.to_le_bytes());
    }
    bios
}

/// A machine with a ROM for `code` mounted, overrides applied and reset
pub fn machine(code: &[u8; 4]) -> Gba {
    let mut gba = Gba::new(
        Config::default(),
        VFile::from_memory(vec![0u8; SAVEDATA_CAPACITY]),
    );
    gba.load_rom(VFile::from_memory(build_rom(code, 0x400)))
        .expect("synthetic ROM mounts");
    if let Some(quirks) = overrides::find(code) {
        gba.apply_override(&quirks);
    }
    gba.reset();
    gba
}

/// Fixed sensor readings
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedSensors {
    pub tilt_x: i32,
    pub tilt_y: i32,
    pub gyro_z: i32,
    pub light: u8,
    pub time: i64,
}

impl RotationSource for FixedSensors {
    fn sample(&mut self) {}

    fn read_tilt_x(&self) -> i32 {
        self.tilt_x
    }

    fn read_tilt_y(&self) -> i32 {
        self.tilt_y
    }

    fn read_gyro_z(&self) -> i32 {
        self.gyro_z
    }
}

impl LuminanceSource for FixedSensors {
    fn sample(&mut self) {}

    fn read_luminance(&self) -> u8 {
        self.light
    }
}

impl RtcSource for FixedSensors {
    fn sample(&mut self) {}

    fn unix_time(&self) -> i64 {
        self.time
    }
}
