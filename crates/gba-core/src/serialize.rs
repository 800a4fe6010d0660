//! Fixed-size snapshot format
//!
//! A snapshot is exactly [`SERIALIZED_STATE_SIZE`] bytes. Every component
//! owns a fixed block; unused bytes are zero. All integers are little
//! endian. Save data contents and host sensor readings are not part of a
//! snapshot.

use thiserror::Error;

/// Size of a snapshot in bytes
pub const SERIALIZED_STATE_SIZE: usize = 0x61000;

/// Snapshot magic
pub const STATE_MAGIC: [u8; 4] = *b"GBAS";

/// Snapshot format version
pub const STATE_VERSION: u32 = 1;

/// Block offsets within a snapshot
pub mod offsets {
    pub const HEADER: usize = 0x00000;
    pub const CPU: usize = 0x00020;
    pub const VIDEO: usize = 0x00100;
    pub const AUDIO: usize = 0x00140;
    pub const KEYS: usize = 0x001F0;
    pub const SAVEDATA: usize = 0x00200;
    pub const HARDWARE: usize = 0x00240;
    pub const IO: usize = 0x00400;
    pub const PALETTE: usize = 0x00800;
    pub const OAM: usize = 0x00C00;
    pub const VRAM: usize = 0x01000;
    pub const IWRAM: usize = 0x19000;
    pub const WRAM: usize = 0x21000;
}

/// Snapshot error types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("state buffer is {actual} bytes, expected {expected}")]
    Size { actual: usize, expected: usize },
    #[error("state buffer has no snapshot magic")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("snapshot belongs to a different ROM")]
    RomMismatch,
}

/// Identity of the ROM a snapshot was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateHeader {
    pub game_code: [u8; 4],
    pub crc32: u32,
}

impl StateHeader {
    pub fn write(&self, w: &mut StateWriter<'_>) {
        w.seek(offsets::HEADER);
        w.put_bytes(&STATE_MAGIC);
        w.put_u32(STATE_VERSION);
        w.put_bytes(&self.game_code);
        w.put_u32(self.crc32);
    }

    /// Check a snapshot buffer against the mounted ROM
    pub fn validate(&self, buf: &[u8]) -> Result<(), StateError> {
        if buf.len() != SERIALIZED_STATE_SIZE {
            return Err(StateError::Size {
                actual: buf.len(),
                expected: SERIALIZED_STATE_SIZE,
            });
        }
        let mut r = StateReader::new(buf);
        let mut magic = [0u8; 4];
        r.get_bytes(&mut magic);
        if magic != STATE_MAGIC {
            return Err(StateError::BadMagic);
        }
        let version = r.get_u32();
        if version != STATE_VERSION {
            return Err(StateError::UnsupportedVersion(version));
        }
        let mut game_code = [0u8; 4];
        r.get_bytes(&mut game_code);
        let crc32 = r.get_u32();
        if game_code != self.game_code || crc32 != self.crc32 {
            return Err(StateError::RomMismatch);
        }
        Ok(())
    }
}

/// Cursor writing little-endian fields into a snapshot
pub struct StateWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> StateWriter<'a> {
    /// Start writing, zeroing the whole buffer
    pub fn new(buf: &'a mut [u8]) -> Self {
        buf.fill(0);
        Self { buf, pos: 0 }
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        if let Some(dst) = self.buf.get_mut(self.pos..self.pos + bytes.len()) {
            dst.copy_from_slice(bytes);
        }
        self.pos += bytes.len();
    }

    pub fn put_u8(&mut self, value: u8) {
        self.put_bytes(&[value]);
    }

    pub fn put_bool(&mut self, value: bool) {
        self.put_u8(u8::from(value));
    }

    pub fn put_u16(&mut self, value: u16) {
        self.put_bytes(&value.to_le_bytes());
    }

    pub fn put_u32(&mut self, value: u32) {
        self.put_bytes(&value.to_le_bytes());
    }

    pub fn put_i32(&mut self, value: i32) {
        self.put_bytes(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.put_bytes(&value.to_le_bytes());
    }
}

/// Cursor reading little-endian fields from a snapshot
///
/// Reads past the end yield zeros.
pub struct StateReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> StateReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn get_bytes(&mut self, out: &mut [u8]) {
        match self.buf.get(self.pos..self.pos + out.len()) {
            Some(src) => out.copy_from_slice(src),
            None => out.fill(0),
        }
        self.pos += out.len();
    }

    fn get_array<const N: usize>(&mut self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.get_bytes(&mut bytes);
        bytes
    }

    pub fn get_u8(&mut self) -> u8 {
        self.get_array::<1>()[0]
    }

    pub fn get_bool(&mut self) -> bool {
        self.get_u8() != 0
    }

    pub fn get_u16(&mut self) -> u16 {
        u16::from_le_bytes(self.get_array())
    }

    pub fn get_u32(&mut self) -> u32 {
        u32::from_le_bytes(self.get_array())
    }

    pub fn get_i32(&mut self) -> i32 {
        i32::from_le_bytes(self.get_array())
    }

    pub fn get_u64(&mut self) -> u64 {
        u64::from_le_bytes(self.get_array())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_layout_fills_state() {
        assert_eq!(offsets::VRAM + 0x18000, offsets::IWRAM);
        assert_eq!(offsets::IWRAM + 0x8000, offsets::WRAM);
        assert_eq!(offsets::WRAM + 0x40000, SERIALIZED_STATE_SIZE);
    }

    #[test]
    fn test_writer_zero_fills_and_reader_reads_back() {
        let mut buf = vec![0xAAu8; 16];
        let mut w = StateWriter::new(&mut buf);
        w.seek(2);
        w.put_u16(0x1234);
        w.put_u32(0xDEAD_BEEF);
        w.put_bool(true);
        assert_eq!(w.position(), 9);

        let mut r = StateReader::new(&buf);
        assert_eq!(r.get_u16(), 0);
        assert_eq!(r.get_u16(), 0x1234);
        assert_eq!(r.get_u32(), 0xDEAD_BEEF);
        assert!(r.get_bool());
        assert_eq!(buf[15], 0);
    }

    #[test]
    fn test_reader_past_end_yields_zero() {
        let buf = [1u8, 2];
        let mut r = StateReader::new(&buf);
        r.seek(1);
        assert_eq!(r.get_u32(), 0);
    }

    #[test]
    fn test_header_validation() {
        let header = StateHeader {
            game_code: *b"ATSE",
            crc32: 0x1234_5678,
        };
        let mut buf = vec![0u8; SERIALIZED_STATE_SIZE];
        assert_eq!(header.validate(&buf), Err(StateError::BadMagic));
        header.write(&mut StateWriter::new(&mut buf));
        assert_eq!(header.validate(&buf), Ok(()));

        let other = StateHeader {
            game_code: *b"ATSE",
            crc32: 0,
        };
        assert_eq!(other.validate(&buf), Err(StateError::RomMismatch));
        assert_eq!(
            header.validate(&buf[..16]),
            Err(StateError::Size {
                actual: 16,
                expected: SERIALIZED_STATE_SIZE
            })
        );

        buf[4] = 9;
        assert_eq!(header.validate(&buf), Err(StateError::UnsupportedVersion(9)));
    }
}
