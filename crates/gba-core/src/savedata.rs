//! Save data types and protocols
//!
//! The save buffer is a fixed 128 KiB virtual file, pre-erased to `0xFF`.
//! The save chip type is either forced by an override or detected on first
//! access: a write to the flash command address `0x5555`, any other access
//! to the save space (SRAM), or an access to the EEPROM window at
//! `0x0D000000`.

use crate::serialize::{StateReader, StateWriter};
use crate::vfile::VFile;

/// Capacity of the save buffer, the size of 1 Mbit flash
pub const SAVEDATA_CAPACITY: usize = 0x20000;

/// Erased flash value
pub const ERASED: u8 = 0xFF;

const FLASH_BANK_SIZE: usize = 0x10000;
const FLASH_SECTOR_SIZE: usize = 0x1000;
const FLASH_BASE_0: u32 = 0x5555;
const FLASH_BASE_1: u32 = 0x2AAA;

/// Panasonic 512 Kbit part, manufacturer then device
const FLASH_ID_PANASONIC: [u8; 2] = [0x32, 0x1B];
/// Sanyo 1 Mbit part, manufacturer then device
const FLASH_ID_SANYO: [u8; 2] = [0x62, 0x13];

const EEPROM_ADDRESS_BITS: u32 = 14;
const EEPROM_BLOCK_BITS: u32 = 64;
const EEPROM_READ_BITS: u32 = 68;

/// Save chip types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SavedataType {
    #[default]
    Autodetect,
    ForceNone,
    Flash512,
    Flash1M,
    Sram,
    Eeprom,
}

impl SavedataType {
    /// Bytes of the save buffer this type uses
    pub fn size(self) -> usize {
        match self {
            SavedataType::Autodetect | SavedataType::Flash1M => 0x20000,
            SavedataType::Flash512 => 0x10000,
            SavedataType::Eeprom => 0x2000,
            SavedataType::Sram => 0x8000,
            SavedataType::ForceNone => 0,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            SavedataType::Autodetect => 0,
            SavedataType::ForceNone => 1,
            SavedataType::Flash512 => 2,
            SavedataType::Flash1M => 3,
            SavedataType::Sram => 4,
            SavedataType::Eeprom => 5,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => SavedataType::ForceNone,
            2 => SavedataType::Flash512,
            3 => SavedataType::Flash1M,
            4 => SavedataType::Sram,
            5 => SavedataType::Eeprom,
            _ => SavedataType::Autodetect,
        }
    }
}

/// Flash command accepted after the unlock sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlashCommand {
    None,
    Erase,
    Id,
    Program,
    SwitchBank,
}

impl FlashCommand {
    fn to_u8(self) -> u8 {
        match self {
            FlashCommand::None => 0,
            FlashCommand::Erase => 0x80,
            FlashCommand::Id => 0x90,
            FlashCommand::Program => 0xA0,
            FlashCommand::SwitchBank => 0xB0,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0x80 => FlashCommand::Erase,
            0x90 => FlashCommand::Id,
            0xA0 => FlashCommand::Program,
            0xB0 => FlashCommand::SwitchBank,
            _ => FlashCommand::None,
        }
    }
}

/// Position in the `AA`/`55` unlock sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlashUnlock {
    Raw,
    Start,
    Continue,
}

/// EEPROM serial protocol phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EepromPhase {
    Null,
    Pending,
    Write,
    ReadPending,
    Read,
}

impl EepromPhase {
    fn to_u8(self) -> u8 {
        match self {
            EepromPhase::Null => 0,
            EepromPhase::Pending => 1,
            EepromPhase::Write => 2,
            EepromPhase::ReadPending => 3,
            EepromPhase::Read => 4,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => EepromPhase::Pending,
            2 => EepromPhase::Write,
            3 => EepromPhase::ReadPending,
            4 => EepromPhase::Read,
            _ => EepromPhase::Null,
        }
    }
}

/// Save chip attached to the cartridge
#[derive(Debug, Clone)]
pub struct Savedata {
    vf: VFile,
    savetype: SavedataType,
    command: FlashCommand,
    unlock: FlashUnlock,
    bank: u8,
    eeprom: EepromPhase,
    /// EEPROM block address during the header, then bit address
    address: u32,
    bit_count: u32,
    read_bits_remaining: u32,
    dirty: bool,
}

impl Savedata {
    /// Attach a save buffer, erasing it
    pub fn new(mut vf: VFile) -> Self {
        vf.map_mut().fill(ERASED);
        Self {
            vf,
            savetype: SavedataType::Autodetect,
            command: FlashCommand::None,
            unlock: FlashUnlock::Raw,
            bank: 0,
            eeprom: EepromPhase::Null,
            address: 0,
            bit_count: 0,
            read_bits_remaining: 0,
            dirty: false,
        }
    }

    /// Current save type
    pub fn savetype(&self) -> SavedataType {
        self.savetype
    }

    /// Bytes of the buffer used by the current save type
    pub fn size(&self) -> usize {
        self.savetype.size().min(self.vf.size())
    }

    /// Save bytes for the current type
    pub fn data(&self) -> &[u8] {
        &self.vf.map()[..self.size()]
    }

    /// Save bytes for the current type, writable
    pub fn data_mut(&mut self) -> &mut [u8] {
        let size = self.size();
        &mut self.vf.map_mut()[..size]
    }

    /// Whether the game has written since the last [`Savedata::clean`]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clean(&mut self) {
        self.dirty = false;
    }

    /// Return to autodetection, keeping the buffer contents
    pub fn reset_detection(&mut self) {
        self.savetype = SavedataType::Autodetect;
        self.reset_protocol();
    }

    /// Force a save type
    pub fn force_type(&mut self, savetype: SavedataType) {
        if self.savetype != savetype {
            tracing::debug!(?savetype, "savedata type forced");
        }
        self.savetype = savetype;
        self.reset_protocol();
    }

    fn reset_protocol(&mut self) {
        self.command = FlashCommand::None;
        self.unlock = FlashUnlock::Raw;
        self.bank = 0;
        self.eeprom = EepromPhase::Null;
        self.address = 0;
        self.bit_count = 0;
        self.read_bits_remaining = 0;
    }

    fn detect(&mut self, savetype: SavedataType) {
        tracing::debug!(?savetype, "savedata type detected");
        self.savetype = savetype;
    }

    /// Read a byte from the save space
    pub fn read8(&mut self, address: u32) -> u8 {
        let address = address & 0xFFFF;
        if self.savetype == SavedataType::Autodetect {
            self.detect(SavedataType::Sram);
        }
        match self.savetype {
            SavedataType::Sram => self.vf.map()[(address & 0x7FFF) as usize],
            SavedataType::Flash512 | SavedataType::Flash1M => self.read_flash(address),
            _ => ERASED,
        }
    }

    /// Write a byte to the save space
    pub fn write8(&mut self, address: u32, value: u8) {
        let address = address & 0xFFFF;
        if self.savetype == SavedataType::Autodetect {
            if address == FLASH_BASE_0 {
                self.detect(SavedataType::Flash512);
            } else {
                self.detect(SavedataType::Sram);
            }
        }
        match self.savetype {
            SavedataType::Sram => {
                self.vf.map_mut()[(address & 0x7FFF) as usize] = value;
                self.dirty = true;
            }
            SavedataType::Flash512 | SavedataType::Flash1M => self.write_flash(address, value),
            _ => {}
        }
    }

    fn bank_offset(&self) -> usize {
        usize::from(self.bank) * FLASH_BANK_SIZE
    }

    fn read_flash(&self, address: u32) -> u8 {
        if self.command == FlashCommand::Id && address < 2 {
            let id = if self.savetype == SavedataType::Flash1M {
                FLASH_ID_SANYO
            } else {
                FLASH_ID_PANASONIC
            };
            return id[address as usize];
        }
        self.vf.map()[self.bank_offset() + address as usize]
    }

    fn write_flash(&mut self, address: u32, value: u8) {
        match self.command {
            FlashCommand::Program => {
                let offset = self.bank_offset() + address as usize;
                self.vf.map_mut()[offset] = value;
                self.dirty = true;
                self.command = FlashCommand::None;
                return;
            }
            FlashCommand::SwitchBank if address == 0 => {
                self.bank = value & 1;
                if self.bank == 1 && self.savetype == SavedataType::Flash512 {
                    tracing::debug!("flash bank switch, upgrading to 1 Mbit");
                    self.savetype = SavedataType::Flash1M;
                }
                self.command = FlashCommand::None;
                return;
            }
            _ => {}
        }

        match (self.unlock, address, value) {
            (FlashUnlock::Raw, FLASH_BASE_0, 0xAA) => self.unlock = FlashUnlock::Start,
            (FlashUnlock::Raw, _, 0xF0) if self.command == FlashCommand::Id => {
                self.command = FlashCommand::None;
            }
            (FlashUnlock::Start, FLASH_BASE_1, 0x55) => self.unlock = FlashUnlock::Continue,
            (FlashUnlock::Continue, FLASH_BASE_0, _) => {
                self.unlock = FlashUnlock::Raw;
                if self.command == FlashCommand::Erase {
                    if value == 0x10 {
                        let size = self.savetype.size();
                        self.vf.map_mut()[..size].fill(ERASED);
                        self.dirty = true;
                    } else {
                        tracing::warn!(value, "unsupported flash erase command");
                    }
                    self.command = FlashCommand::None;
                    return;
                }
                self.command = match value {
                    0x80 | 0x90 | 0xA0 | 0xB0 => FlashCommand::from_u8(value),
                    0xF0 => FlashCommand::None,
                    _ => {
                        tracing::warn!(value, "unsupported flash command");
                        FlashCommand::None
                    }
                };
            }
            (FlashUnlock::Continue, _, 0x30) if self.command == FlashCommand::Erase => {
                let start = self.bank_offset() + (address as usize & !(FLASH_SECTOR_SIZE - 1));
                self.vf.map_mut()[start..start + FLASH_SECTOR_SIZE].fill(ERASED);
                self.dirty = true;
                self.unlock = FlashUnlock::Raw;
                self.command = FlashCommand::None;
            }
            _ => {
                if self.unlock != FlashUnlock::Raw {
                    tracing::warn!(address, value, "broken flash command sequence");
                }
                self.unlock = FlashUnlock::Raw;
            }
        }
    }

    /// Whether an EEPROM window access should claim the chip
    pub fn claims_eeprom(&mut self) -> bool {
        match self.savetype {
            SavedataType::Eeprom => true,
            SavedataType::Autodetect => {
                self.detect(SavedataType::Eeprom);
                true
            }
            _ => false,
        }
    }

    /// Clock one bit into the EEPROM
    pub fn write_eeprom(&mut self, value: u16) {
        let bit = u32::from(value & 1);
        match self.eeprom {
            EepromPhase::Null | EepromPhase::Read => {
                self.address = bit;
                self.eeprom = EepromPhase::Pending;
            }
            EepromPhase::Pending => {
                self.eeprom = match (self.address << 1) | bit {
                    0b10 => EepromPhase::Write,
                    0b11 => EepromPhase::ReadPending,
                    _ => EepromPhase::Null,
                };
                self.address = 0;
                self.bit_count = 0;
            }
            EepromPhase::Write => {
                if self.bit_count < EEPROM_ADDRESS_BITS {
                    self.address = (self.address << 1) | bit;
                    if self.bit_count + 1 == EEPROM_ADDRESS_BITS {
                        // Block address to bit address
                        self.address *= EEPROM_BLOCK_BITS;
                    }
                } else if self.bit_count < EEPROM_ADDRESS_BITS + EEPROM_BLOCK_BITS {
                    let byte = (self.address >> 3) as usize;
                    if byte < SavedataType::Eeprom.size() {
                        let shift = 7 - (self.address & 7);
                        let data = &mut self.vf.map_mut()[byte];
                        *data = (*data & !(1 << shift)) | ((bit as u8) << shift);
                        self.dirty = true;
                    } else {
                        tracing::warn!(byte, "writing beyond end of EEPROM");
                    }
                    self.address += 1;
                } else {
                    self.eeprom = EepromPhase::Null;
                }
                self.bit_count += 1;
            }
            EepromPhase::ReadPending => {
                if self.bit_count < EEPROM_ADDRESS_BITS {
                    self.address = (self.address << 1) | bit;
                    self.bit_count += 1;
                } else {
                    self.address *= EEPROM_BLOCK_BITS;
                    self.read_bits_remaining = EEPROM_READ_BITS;
                    self.eeprom = EepromPhase::Read;
                }
            }
        }
    }

    /// Clock one bit out of the EEPROM
    pub fn read_eeprom(&mut self) -> u16 {
        if self.eeprom != EepromPhase::Read {
            return 1;
        }
        self.read_bits_remaining -= 1;
        if self.read_bits_remaining >= EEPROM_BLOCK_BITS {
            return 0;
        }
        let step = EEPROM_BLOCK_BITS - 1 - self.read_bits_remaining;
        let bit_address = self.address + step;
        let byte = self.vf.map().get((bit_address >> 3) as usize).copied().unwrap_or(ERASED);
        if self.read_bits_remaining == 0 {
            self.eeprom = EepromPhase::Null;
        }
        u16::from((byte >> (7 - (bit_address & 7))) & 1)
    }

    /// Write the protocol state, not the buffer
    pub fn save_state(&self, w: &mut StateWriter<'_>) {
        w.put_u8(self.savetype.to_u8());
        w.put_u8(self.command.to_u8());
        w.put_u8(match self.unlock {
            FlashUnlock::Raw => 0,
            FlashUnlock::Start => 1,
            FlashUnlock::Continue => 2,
        });
        w.put_u8(self.bank);
        w.put_u8(self.eeprom.to_u8());
        w.put_u32(self.address);
        w.put_u32(self.bit_count);
        w.put_u32(self.read_bits_remaining);
    }

    /// Restore the protocol state
    pub fn load_state(&mut self, r: &mut StateReader<'_>) {
        self.savetype = SavedataType::from_u8(r.get_u8());
        self.command = FlashCommand::from_u8(r.get_u8());
        self.unlock = match r.get_u8() {
            1 => FlashUnlock::Start,
            2 => FlashUnlock::Continue,
            _ => FlashUnlock::Raw,
        };
        self.bank = r.get_u8() & u8::from(self.savetype == SavedataType::Flash1M);
        self.eeprom = EepromPhase::from_u8(r.get_u8());
        self.address = r.get_u32();
        self.bit_count = r.get_u32();
        self.read_bits_remaining = r.get_u32().min(EEPROM_READ_BITS);
        if self.eeprom == EepromPhase::Read && self.read_bits_remaining == 0 {
            self.eeprom = EepromPhase::Null;
        }
    }

    /// Hand back the save buffer
    pub fn close(self) -> VFile {
        self.vf
    }

}
