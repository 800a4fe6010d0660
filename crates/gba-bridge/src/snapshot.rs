//! Save states and save RAM
//!
//! A save state is the fixed-size snapshot of the whole machine; it never
//! includes save RAM or the sensor latch. Save RAM is the battery-backed
//! part of the cartridge, sized by the save type detected so far.

use gba_core::serialize::SERIALIZED_STATE_SIZE;

use crate::context::Context;
use crate::error::Result;

/// Size of every save state
pub const fn state_size() -> usize {
    SERIALIZED_STATE_SIZE
}

impl Context {
    /// Write a save state into `buf`, which must be [`state_size`] bytes
    pub fn get_state(&self, buf: &mut [u8]) -> Result<()> {
        self.gba.serialize(buf)?;
        Ok(())
    }

    /// Restore a save state taken with the same ROM mounted
    ///
    /// A rejected buffer leaves the machine untouched.
    pub fn put_state(&mut self, buf: &[u8]) -> Result<()> {
        if let Err(err) = self.gba.deserialize(buf) {
            tracing::warn!(%err, "save state rejected");
            return Err(err.into());
        }
        Ok(())
    }

    /// Save RAM bytes for the current save type
    pub fn save_ram_size(&self) -> usize {
        self.gba.savedata().size()
    }

    /// Copy save RAM out, returning the bytes copied
    pub fn get_save_ram(&self, out: &mut [u8]) -> usize {
        let data = self.gba.savedata().data();
        let len = data.len().min(out.len());
        out[..len].copy_from_slice(&data[..len]);
        len
    }

    /// Copy save RAM in, returning the bytes copied
    pub fn put_save_ram(&mut self, data: &[u8]) -> usize {
        let save = self.gba.savedata_mut().data_mut();
        let len = save.len().min(data.len());
        save[..len].copy_from_slice(&data[..len]);
        len
    }
}
