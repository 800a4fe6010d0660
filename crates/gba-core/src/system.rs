//! GBA System Integration
//!
//! This module integrates the CPU, memory, video, audio, cartridge, save
//! data and GPIO devices into a working machine.

use bitflags::bitflags;

use crate::audio::Audio;
use crate::cartridge::{Cartridge, CartridgeError};
use crate::cpu::{ArmCore, Bus};
use crate::hardware::{Devices, Hardware, Sources, GPIO_REG_CONTROL, GPIO_REG_DATA};
use crate::memory::{
    self, io, AccessWidth, Memory, OFFSET_MASK, REGION_BIOS, REGION_CART0, REGION_CART2_EX,
    REGION_CART_SRAM, REGION_CART_SRAM_MIRROR, REGION_IO, REGION_OAM, REGION_PALETTE_RAM,
    REGION_VRAM, REGION_WORKING_IRAM, REGION_WORKING_RAM, SIZE_IO,
};
use crate::overrides::Override;
use crate::savedata::{Savedata, SavedataType};
use crate::serialize::{
    offsets, StateError, StateHeader, StateReader, StateWriter, SERIALIZED_STATE_SIZE,
};
use crate::video::Video;
use crate::vfile::VFile;

bitflags! {
    /// Keypad buttons as latched by [`Gba::set_keys`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Keys: u16 {
        const A = 1 << 0;
        const B = 1 << 1;
        const SELECT = 1 << 2;
        const START = 1 << 3;
        const RIGHT = 1 << 4;
        const LEFT = 1 << 5;
        const UP = 1 << 6;
        const DOWN = 1 << 7;
        const R = 1 << 8;
        const L = 1 << 9;
    }
}

/// Cartridge-space offset mask
const CART_OFFSET_MASK: u32 = 0x01FF_FFFF;

/// ROMs up to this size see EEPROM across the whole of $0D
const EEPROM_SMALL_ROM: usize = 0x0100_0000;

/// Engine tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Host audio sample rate in Hz
    pub audio_rate: u32,
    /// Audio buffer capacity in stereo sample pairs
    pub audio_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio_rate: 44_100,
            audio_buffer: 1024,
        }
    }
}

/// Live views of the machine's memory regions
pub struct MemoryAreas<'a> {
    pub bios: &'a mut [u8],
    pub wram: &'a mut [u8],
    pub iwram: &'a mut [u8],
    pub io: &'a mut [u8],
    pub palette: &'a mut [u8],
    pub vram: &'a mut [u8],
    pub oam: &'a mut [u8],
    /// Mounted ROM, empty when none
    pub rom: &'a mut [u8],
}

/// Everything on the board except the CPU
#[derive(Debug, Clone)]
struct Board {
    memory: Memory,
    video: Video,
    audio: Audio,
    cartridge: Option<Cartridge>,
    savedata: Savedata,
    hardware: Hardware,
    keys: u16,
    bios_loaded: bool,
    config: Config,
}

impl Board {
    fn process_events(&mut self, cycles: i32) -> i32 {
        let dispcnt = self.memory.io16(io::DISPCNT);
        let dispstat = self.memory.io16(io::DISPSTAT);
        let video = self.video.process_events(cycles, dispcnt, dispstat);
        let audio = self.audio.process_events(cycles);
        video.min(audio).max(1)
    }

    fn io_read16(&self, offset: u32) -> u16 {
        match offset & !1 {
            io::DISPSTAT => (self.memory.io16(io::DISPSTAT) & !7) | self.video.status_flags(),
            io::VCOUNT => self.video.vcount(),
            io::KEYINPUT => !self.keys & 0x3FF,
            offset if (offset as usize) < SIZE_IO => self.memory.io16(offset),
            _ => 0,
        }
    }

    fn io_write16(&mut self, offset: u32, value: u16) {
        if offset as usize >= SIZE_IO {
            return;
        }
        let offset = offset & !1;
        match offset {
            io::DISPSTAT => self.memory.set_io16(offset, value & !7),
            io::VCOUNT | io::KEYINPUT => {}
            io::IF => {
                let pending = self.memory.io16(io::IF);
                self.memory.set_io16(offset, pending & !value);
            }
            io::SOUND1CNT_L..=io::SOUNDCNT_X => {
                self.memory.set_io16(offset, value);
                self.audio.write_register(offset, value);
            }
            _ => self.memory.set_io16(offset, value),
        }
    }

    fn rom_read16(&self, address: u32) -> u16 {
        let offset = address & CART_OFFSET_MASK;
        let gpio = (GPIO_REG_DATA..GPIO_REG_CONTROL + 2).contains(&offset);
        if address >> 24 == REGION_CART0 && gpio {
            if let Some(value) = self.hardware.read_register(offset) {
                return value;
            }
        }
        match &self.cartridge {
            Some(cartridge) => cartridge.read16(offset),
            None => ((offset >> 1) & 0xFFFF) as u16,
        }
    }

    /// Whether an access at `address` in $0D reaches the EEPROM
    fn eeprom_window(&mut self, address: u32) -> bool {
        let small_rom = self
            .cartridge
            .as_ref()
            .map_or(true, |cartridge| cartridge.rom().len() <= EEPROM_SMALL_ROM);
        (small_rom || address & 0x00FF_FF00 == 0x00FF_FF00) && self.savedata.claims_eeprom()
    }

    fn tilt_claims_save_space(&self) -> bool {
        self.hardware.devices().contains(Devices::TILT)
            && matches!(
                self.savedata.savetype(),
                SavedataType::Eeprom | SavedataType::ForceNone
            )
    }
}

/// The whole machine
#[derive(Debug, Clone)]
pub struct Gba {
    cpu: ArmCore,
    board: Board,
}

impl Gba {
    /// Build a machine around a save buffer
    pub fn new(config: Config, savedata: VFile) -> Self {
        let mut gba = Self {
            cpu: ArmCore::new(),
            board: Board {
                memory: Memory::new(),
                video: Video::new(),
                audio: Audio::new(config.audio_rate, config.audio_buffer),
                cartridge: None,
                savedata: Savedata::new(savedata),
                hardware: Hardware::new(),
                keys: 0,
                bios_loaded: false,
                config,
            },
        };
        gba.reset();
        gba
    }

    pub fn config(&self) -> Config {
        self.board.config
    }

    /// Copy a BIOS image into the BIOS region; execution starts there on reset
    pub fn load_bios(&mut self, bios: &VFile) {
        self.board.memory.load_bios(bios.map());
        self.board.bios_loaded = true;
        tracing::debug!(size = bios.size(), "BIOS loaded");
    }

    pub fn has_bios(&self) -> bool {
        self.board.bios_loaded
    }

    /// Mount a ROM, handing back the previously mounted one
    ///
    /// On error nothing changes. On success save type detection restarts
    /// and every GPIO device is removed until an override wires them.
    pub fn load_rom(&mut self, rom: VFile) -> Result<Option<VFile>, CartridgeError> {
        let cartridge = Cartridge::mount(rom)?;
        tracing::debug!(
            title = %cartridge.header().title(),
            code = %cartridge.header().game_code(),
            crc32 = format_args!("{:08X}", cartridge.crc32()),
            "ROM mounted"
        );
        let previous = self.board.cartridge.replace(cartridge).map(Cartridge::eject);
        self.board.savedata.reset_detection();
        self.board.hardware.clear();
        Ok(previous)
    }

    /// Apply board quirks from the override table
    pub fn apply_override(&mut self, quirks: &Override) {
        if quirks.savetype != SavedataType::Autodetect {
            self.board.savedata.force_type(quirks.savetype);
        }
        if !quirks.hardware.is_empty() {
            self.board.hardware.init_devices(quirks.hardware);
        }
        if quirks.mirroring {
            if let Some(cartridge) = self.board.cartridge.as_mut() {
                cartridge.set_mirroring(true);
            }
        }
        tracing::debug!(
            code = %String::from_utf8_lossy(&quirks.id),
            savetype = ?quirks.savetype,
            hardware = ?quirks.hardware,
            mirroring = quirks.mirroring,
            "override applied"
        );
    }

    /// Reinitialize CPU and register state; RAM, ROM and save data are kept
    pub fn reset(&mut self) {
        let has_rom = self.board.cartridge.is_some();
        self.cpu.reset(self.board.bios_loaded, has_rom);
        self.board.memory.reset();
        self.board.video.reset();
        self.board.audio.reset();
        self.board.keys = 0;
        self.board.hardware.reset();
    }

    /// Latch the pressed keys, one bit per key, set when pressed
    pub fn set_keys(&mut self, keys: u16) {
        self.board.keys = keys & Keys::all().bits();
    }

    pub fn keys(&self) -> u16 {
        self.board.keys
    }

    /// Run the CPU to the next scheduled event
    pub fn run_loop(&mut self, sources: &mut Sources<'_>) {
        let Self { cpu, board } = self;
        let mut bus = GbaBus { board, sources };
        cpu.run_loop(&mut bus);
    }

    /// Frames completed since reset
    pub fn frame_counter(&self) -> u32 {
        self.board.video.frame_counter()
    }

    /// The renderer's 240x160 frame
    pub fn framebuffer(&self) -> &[u32] {
        self.board.video.renderer().output()
    }

    pub fn audio(&self) -> &Audio {
        &self.board.audio
    }

    pub fn audio_mut(&mut self) -> &mut Audio {
        &mut self.board.audio
    }

    pub fn savedata(&self) -> &Savedata {
        &self.board.savedata
    }

    pub fn savedata_mut(&mut self) -> &mut Savedata {
        &mut self.board.savedata
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.board.cartridge.as_ref()
    }

    pub fn hardware(&self) -> &Hardware {
        &self.board.hardware
    }

    pub fn cpu(&self) -> &ArmCore {
        &self.cpu
    }

    /// Borrow every memory region at once
    pub fn memory_areas(&mut self) -> MemoryAreas<'_> {
        let Board {
            memory,
            video,
            cartridge,
            ..
        } = &mut self.board;
        MemoryAreas {
            bios: &mut memory.bios,
            wram: &mut memory.wram,
            iwram: &mut memory.iwram,
            io: &mut memory.io,
            palette: &mut video.palette,
            vram: &mut video.vram,
            oam: &mut video.oam,
            rom: cartridge.as_mut().map(Cartridge::rom_mut).unwrap_or_default(),
        }
    }

    /// Access the memory map as the CPU sees it
    pub fn bus<'a, 's>(&'a mut self, sources: &'a mut Sources<'s>) -> GbaBus<'a, 's> {
        GbaBus {
            board: &mut self.board,
            sources,
        }
    }

    fn state_header(&self) -> StateHeader {
        match &self.board.cartridge {
            Some(cartridge) => StateHeader {
                game_code: cartridge.header().id,
                crc32: cartridge.crc32(),
            },
            None => StateHeader::default(),
        }
    }

    /// Write a full snapshot into `buf`
    pub fn serialize(&self, buf: &mut [u8]) -> Result<(), StateError> {
        if buf.len() != SERIALIZED_STATE_SIZE {
            return Err(StateError::Size {
                actual: buf.len(),
                expected: SERIALIZED_STATE_SIZE,
            });
        }
        let mut w = StateWriter::new(buf);
        self.state_header().write(&mut w);
        self.cpu.save_state(&mut w);
        self.board.video.save_state(&mut w);
        self.board.audio.save_state(&mut w);
        w.seek(offsets::KEYS);
        w.put_u16(self.board.keys);
        w.seek(offsets::SAVEDATA);
        self.board.savedata.save_state(&mut w);
        w.seek(offsets::HARDWARE);
        self.board.hardware.save_state(&mut w);
        self.board.memory.save_state(&mut w);
        Ok(())
    }

    /// Restore a snapshot taken from the same ROM
    ///
    /// The buffer is validated before anything is touched.
    pub fn deserialize(&mut self, buf: &[u8]) -> Result<(), StateError> {
        self.state_header().validate(buf)?;
        let mut r = StateReader::new(buf);
        self.cpu.load_state(&mut r);
        self.board.video.load_state(&mut r);
        self.board.audio.load_state(&mut r);
        r.seek(offsets::KEYS);
        self.board.keys = r.get_u16() & 0x3FF;
        r.seek(offsets::SAVEDATA);
        self.board.savedata.load_state(&mut r);
        r.seek(offsets::HARDWARE);
        self.board.hardware.load_state(&mut r);
        self.board.memory.load_state(&mut r);
        Ok(())
    }

    /// Take the machine apart, handing back the ROM and save files
    pub fn teardown(self) -> (Option<VFile>, VFile) {
        let Board {
            cartridge, savedata, ..
        } = self.board;
        (cartridge.map(Cartridge::eject), savedata.close())
    }
}

/// The memory map as seen by the CPU
pub struct GbaBus<'a, 's> {
    board: &'a mut Board,
    sources: &'a mut Sources<'s>,
}

impl GbaBus<'_, '_> {
    /// Read without side effects; the save space reads as zero
    fn peek16(&self, address: u32) -> u16 {
        let board = &*self.board;
        match address >> 24 {
            REGION_BIOS => memory::read16(&board.memory.bios, (address & !1) as usize),
            REGION_WORKING_RAM => {
                memory::read16(&board.memory.wram, Memory::wram_offset(address & !1))
            }
            REGION_WORKING_IRAM => {
                memory::read16(&board.memory.iwram, Memory::iwram_offset(address & !1))
            }
            REGION_IO => board.io_read16(address & OFFSET_MASK),
            REGION_PALETTE_RAM => board.video.load_palette16(address),
            REGION_VRAM => board.video.load_vram16(address),
            REGION_OAM => board.video.load_oam16(address),
            REGION_CART0..=REGION_CART2_EX => board.rom_read16(address),
            _ => 0,
        }
    }

    fn load_save8(&mut self, address: u32) -> u8 {
        if self.board.tilt_claims_save_space() {
            self.board.hardware.tilt_read(address & OFFSET_MASK)
        } else {
            self.board.savedata.read8(address)
        }
    }

    fn store_save8(&mut self, address: u32, value: u8) {
        if self.board.tilt_claims_save_space() {
            self.board
                .hardware
                .tilt_write(address & OFFSET_MASK, value, self.sources);
        } else {
            self.board.savedata.write8(address, value);
        }
    }

    pub fn load8(&mut self, address: u32) -> u8 {
        match address >> 24 {
            REGION_CART_SRAM | REGION_CART_SRAM_MIRROR => self.load_save8(address),
            _ => (self.load16(address & !1) >> (8 * (address & 1))) as u8,
        }
    }

    pub fn load16(&mut self, address: u32) -> u16 {
        match address >> 24 {
            REGION_CART2_EX if self.board.eeprom_window(address) => {
                self.board.savedata.read_eeprom()
            }
            REGION_CART_SRAM | REGION_CART_SRAM_MIRROR => {
                u16::from(self.load_save8(address)) * 0x0101
            }
            _ => self.peek16(address),
        }
    }

    pub fn load32(&mut self, address: u32) -> u32 {
        match address >> 24 {
            REGION_CART_SRAM | REGION_CART_SRAM_MIRROR => {
                u32::from(self.load_save8(address)) * 0x0101_0101
            }
            _ => {
                let address = address & !3;
                u32::from(self.load16(address)) | u32::from(self.load16(address + 2)) << 16
            }
        }
    }

    pub fn store8(&mut self, address: u32, value: u8) {
        match address >> 24 {
            REGION_WORKING_RAM => self.board.memory.wram[Memory::wram_offset(address)] = value,
            REGION_WORKING_IRAM => self.board.memory.iwram[Memory::iwram_offset(address)] = value,
            REGION_IO => {
                let offset = address & OFFSET_MASK;
                let current = self.board.memory.io16(offset & !1);
                let merged = if offset & 1 != 0 {
                    (current & 0x00FF) | u16::from(value) << 8
                } else {
                    (current & 0xFF00) | u16::from(value)
                };
                self.board.io_write16(offset & !1, merged);
            }
            // Byte stores to palette and VRAM fill both halves
            REGION_PALETTE_RAM | REGION_VRAM => {
                self.store16(address & !1, u16::from(value) * 0x0101)
            }
            REGION_CART_SRAM | REGION_CART_SRAM_MIRROR => self.store_save8(address, value),
            _ => {}
        }
    }

    pub fn store16(&mut self, address: u32, value: u16) {
        match address >> 24 {
            REGION_WORKING_RAM => memory::write16(
                &mut self.board.memory.wram,
                Memory::wram_offset(address & !1),
                value,
            ),
            REGION_WORKING_IRAM => memory::write16(
                &mut self.board.memory.iwram,
                Memory::iwram_offset(address & !1),
                value,
            ),
            REGION_IO => self.board.io_write16(address & OFFSET_MASK, value),
            REGION_PALETTE_RAM => self.board.video.store_palette16(address, value),
            REGION_VRAM => self.board.video.store_vram16(address, value),
            REGION_OAM => self.board.video.store_oam16(address, value),
            REGION_CART0 => {
                let offset = address & CART_OFFSET_MASK;
                let gpio = (GPIO_REG_DATA..GPIO_REG_CONTROL + 2).contains(&offset);
                if gpio && !self.board.hardware.devices().is_empty() {
                    self.board
                        .hardware
                        .write_register(offset, value, self.sources);
                } else {
                    tracing::trace!(address, value, "store to ROM ignored");
                }
            }
            REGION_CART2_EX if self.board.eeprom_window(address) => {
                self.board.savedata.write_eeprom(value);
            }
            REGION_CART_SRAM | REGION_CART_SRAM_MIRROR => {
                self.store_save8(address, (value >> (8 * (address & 1))) as u8);
            }
            _ => {}
        }
    }

    pub fn store32(&mut self, address: u32, value: u32) {
        match address >> 24 {
            REGION_CART_SRAM | REGION_CART_SRAM_MIRROR => {
                self.store_save8(address, (value >> (8 * (address & 3))) as u8);
            }
            _ => {
                let address = address & !3;
                self.store16(address, value as u16);
                self.store16(address + 2, (value >> 16) as u16);
            }
        }
    }
}

impl Bus for GbaBus<'_, '_> {
    fn fetch16(&mut self, address: u32) -> u16 {
        self.peek16(address)
    }

    fn fetch32(&mut self, address: u32) -> u32 {
        u32::from(self.peek16(address)) | u32::from(self.peek16(address.wrapping_add(2))) << 16
    }

    fn access_cycles(&self, address: u32, width: AccessWidth) -> i32 {
        self.board.memory.access_cycles(address, width)
    }

    fn branch_cycles(&self, address: u32) -> i32 {
        self.board.memory.nonsequential_cycles(address)
    }

    fn process_events(&mut self, cycles: i32) -> i32 {
        self.board.process_events(cycles)
    }

    fn read8(&mut self, address: u32) -> u8 {
        self.load8(address)
    }

    fn read16(&mut self, address: u32) -> u16 {
        self.load16(address)
    }

    fn read32(&mut self, address: u32) -> u32 {
        self.load32(address)
    }

    fn write8(&mut self, address: u32, value: u8) {
        self.store8(address, value);
    }

    fn write16(&mut self, address: u32, value: u16) {
        self.store16(address, value);
    }

    fn write32(&mut self, address: u32, value: u32) {
        self.store32(address, value);
    }
}
