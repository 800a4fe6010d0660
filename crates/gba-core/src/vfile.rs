//! Memory-backed virtual files
//!
//! A [`VFile`] owns a fixed-size byte buffer and exposes it through the
//! standard `Read`, `Write` and `Seek` traits plus direct mapping. ROM, BIOS
//! and save buffers are handed to the engine this way instead of through a
//! filesystem. Writes never grow the buffer.

use std::io::{self, Read, Seek, SeekFrom, Write};

/// Fixed-size in-memory file
#[derive(Debug, Clone)]
pub struct VFile {
    data: Box<[u8]>,
    position: usize,
}

impl VFile {
    /// Wrap a buffer as a virtual file positioned at the start
    pub fn from_memory(data: impl Into<Box<[u8]>>) -> Self {
        Self {
            data: data.into(),
            position: 0,
        }
    }

    /// Size of the backing buffer in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Map the whole backing buffer
    pub fn map(&self) -> &[u8] {
        &self.data
    }

    /// Map the whole backing buffer for writing
    pub fn map_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Close the file, handing back its buffer
    pub fn close(self) -> Box<[u8]> {
        self.data
    }
}

impl Read for VFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.data.get(self.position..).unwrap_or(&[]);
        let count = remaining.len().min(buf.len());
        buf[..count].copy_from_slice(&remaining[..count]);
        self.position += count;
        Ok(count)
    }
}

impl Write for VFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let remaining = self.data.get_mut(self.position..).unwrap_or(&mut []);
        let count = remaining.len().min(buf.len());
        remaining[..count].copy_from_slice(&buf[..count]);
        self.position += count;
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for VFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::End(offset) => self.data.len() as i128 + i128::from(offset),
            SeekFrom::Current(offset) => self.position as i128 + i128::from(offset),
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of virtual file",
            ));
        }
        self.position = usize::try_from(target)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "seek offset overflow"))?;
        Ok(self.position as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_after_seek() {
        let mut vf = VFile::from_memory(vec![1u8, 2, 3, 4, 5]);
        vf.seek(SeekFrom::Start(3)).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(vf.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[4, 5]);
        assert_eq!(vf.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_write_does_not_grow() {
        let mut vf = VFile::from_memory(vec![0u8; 4]);
        vf.seek(SeekFrom::End(-2)).unwrap();
        assert_eq!(vf.write(&[9, 9, 9]).unwrap(), 2);
        assert_eq!(vf.size(), 4);
        assert_eq!(vf.map(), &[0, 0, 9, 9]);
    }

    #[test]
    fn test_negative_seek_rejected() {
        let mut vf = VFile::from_memory(vec![0u8; 4]);
        assert!(vf.seek(SeekFrom::Current(-1)).is_err());
    }

    #[test]
    fn test_close_returns_buffer() {
        let mut vf = VFile::from_memory(vec![0u8; 2]);
        vf.map_mut()[1] = 7;
        assert_eq!(&*vf.close(), &[0, 7]);
    }
}
