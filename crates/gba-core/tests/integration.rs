//! Integration tests for the GBA system

mod common;

use common::{build_bios, build_rom, machine, SPIN};
use gba_core::cpu::mode;
use gba_core::hardware::{Devices, Sources};
use gba_core::overrides;
use gba_core::savedata::{SavedataType, SAVEDATA_CAPACITY};
use gba_core::serialize::{StateError, SERIALIZED_STATE_SIZE};
use gba_core::video::{VIDEO_HORIZONTAL_PIXELS, VIDEO_VERTICAL_PIXELS};
use gba_core::vfile::VFile;
use gba_core::{Config, Gba};

fn run_frame(gba: &mut Gba) {
    let start = gba.frame_counter();
    while gba.frame_counter() == start {
        gba.run_loop(&mut Sources::default());
    }
}

#[test]
fn test_system_creation() {
    let gba = Gba::new(
        Config::default(),
        VFile::from_memory(vec![0u8; SAVEDATA_CAPACITY]),
    );
    assert_eq!(gba.frame_counter(), 0);
    assert!(gba.cartridge().is_none());
    assert!(!gba.has_bios());
    assert_eq!(gba.cpu().registers().pc(), 0x0200_0000);
    assert_eq!(gba.savedata().savetype(), SavedataType::Autodetect);
    assert!(gba.savedata().data().iter().all(|&b| b == 0xFF));
}

#[test]
fn test_system_with_cartridge() {
    let gba = machine(b"AUNE");
    let cartridge = gba.cartridge().unwrap();
    assert_eq!(cartridge.header().game_code(), "AUNE");
    assert_eq!(cartridge.header().title(), "SYNTHROM");
    assert!(cartridge.header().checksum_ok);
    assert_eq!(gba.cpu().registers().pc(), 0x0800_0000);
    assert_eq!(gba.cpu().registers().mode(), mode::SYSTEM);
}

#[test]
fn test_boot_from_bios() {
    let mut bios = build_bios();
    bios[0x20..0x24].copy_from_slice(&SPIN.to_le_bytes());
    let mut gba = machine(b"AUNE");
    gba.load_bios(&VFile::from_memory(bios));
    gba.reset();
    assert!(gba.has_bios());
    assert_eq!(gba.cpu().registers().pc(), 0);
    assert_eq!(gba.cpu().registers().mode(), mode::SUPERVISOR);
    run_frame(&mut gba);
    assert_eq!(gba.cpu().registers().pc(), 0x20);
}

#[test]
fn test_frames_advance() {
    let mut gba = machine(b"AUNE");
    for expected in 1..=3 {
        run_frame(&mut gba);
        assert_eq!(gba.frame_counter(), expected);
    }
    assert_eq!(gba.cpu().registers().pc(), 0x0800_00C0);
    gba.reset();
    assert_eq!(gba.frame_counter(), 0);
}

#[test]
fn test_mode3_bitmap_reaches_framebuffer() {
    let mut gba = machine(b"AUNE");
    {
        let mut sources = Sources::default();
        let mut bus = gba.bus(&mut sources);
        bus.store16(0x0400_0000, 0x0403);
        bus.store16(0x0600_0000, 0x001F);
        let last = (VIDEO_HORIZONTAL_PIXELS * VIDEO_VERTICAL_PIXELS - 1) as u32 * 2;
        bus.store16(0x0600_0000 + last, 0x7C00);
    }
    run_frame(&mut gba);
    let frame = gba.framebuffer();
    assert_eq!(frame.len(), VIDEO_HORIZONTAL_PIXELS * VIDEO_VERTICAL_PIXELS);
    assert_eq!(frame[0], 0x0000_00F8);
    assert_eq!(frame[1], 0);
    assert_eq!(frame[frame.len() - 1], 0x00F8_0000);
}

#[test]
fn test_forced_blank_is_white() {
    let mut gba = machine(b"AUNE");
    gba.bus(&mut Sources::default()).store16(0x0400_0000, 0x0080);
    run_frame(&mut gba);
    assert!(gba.framebuffer().iter().all(|&p| p == 0x00F8_F8F8));
}

#[test]
fn test_audio_accumulates_per_frame() {
    let mut gba = machine(b"AUNE");
    run_frame(&mut gba);
    let first = gba.audio().samples_avail();
    assert!(first > 0);
    run_frame(&mut gba);
    let second = gba.audio().samples_avail();
    assert!(second > first);
    assert!(second <= gba.config().audio_buffer);
}

#[test]
fn test_vcount_tracks_scanline() {
    let mut gba = machine(b"AUNE");
    run_frame(&mut gba);
    let mut sources = Sources::default();
    let mut bus = gba.bus(&mut sources);
    assert_eq!(bus.load16(0x0400_0006), 160);
    assert_eq!(bus.load16(0x0400_0004) & 1, 1);
}

#[test]
fn test_override_lookup() {
    let emerald = overrides::find(b"BPEJ").unwrap();
    assert_eq!(&emerald.id, b"BPEJ");
    assert_eq!(emerald.savetype, SavedataType::Flash1M);
    assert_eq!(emerald.hardware, Devices::RTC);
    assert!(overrides::find(b"ZZZZ").is_none());
}

#[test]
fn test_classic_override_mirrors_rom() {
    let mut gba = machine(b"FBME");
    assert!(gba.cartridge().unwrap().mirroring());
    assert_eq!(gba.savedata().savetype(), SavedataType::Eeprom);
    let mut sources = Sources::default();
    let mut bus = gba.bus(&mut sources);
    assert_eq!(bus.load32(0x0800_0400), bus.load32(0x0800_0000));
}

#[test]
fn test_rom_swap_returns_previous() {
    let mut gba = machine(b"BPEE");
    let previous = gba
        .load_rom(VFile::from_memory(build_rom(b"AUNE", 0x800)))
        .unwrap()
        .unwrap();
    assert_eq!(&previous.map()[0xAC..0xB0], b"BPEE");
    assert!(gba.hardware().devices().is_empty());
    assert_eq!(gba.savedata().savetype(), SavedataType::Autodetect);
}

#[test]
fn test_state_restores_machine() {
    let mut gba = machine(b"AUNE");
    run_frame(&mut gba);
    gba.set_keys(0x0009);
    gba.memory_areas().wram[0x100] = 0xAB;
    let mut state = vec![0u8; SERIALIZED_STATE_SIZE];
    gba.serialize(&mut state).unwrap();

    run_frame(&mut gba);
    gba.set_keys(0);
    gba.memory_areas().wram[0x100] = 0;
    gba.deserialize(&state).unwrap();

    assert_eq!(gba.frame_counter(), 1);
    assert_eq!(gba.keys(), 0x0009);
    assert_eq!(gba.memory_areas().wram[0x100], 0xAB);
    run_frame(&mut gba);
    assert_eq!(gba.frame_counter(), 2);
}

#[test]
fn test_state_validation() {
    let mut gba = machine(b"AUNE");
    let mut short = vec![0u8; SERIALIZED_STATE_SIZE - 1];
    assert_eq!(
        gba.serialize(&mut short),
        Err(StateError::Size {
            actual: SERIALIZED_STATE_SIZE - 1,
            expected: SERIALIZED_STATE_SIZE,
        })
    );
    let blank = vec![0u8; SERIALIZED_STATE_SIZE];
    assert_eq!(gba.deserialize(&blank), Err(StateError::BadMagic));
}

#[test]
fn test_memory_areas_patch_rom() {
    let mut gba = machine(b"AUNE");
    gba.memory_areas().rom[0x100] = 0x5A;
    let mut sources = Sources::default();
    assert_eq!(gba.bus(&mut sources).load8(0x0800_0100), 0x5A);
}
