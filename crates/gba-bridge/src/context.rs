//! Context lifecycle

use gba_core::cartridge::{is_bios, BIOS_SIZE};
use gba_core::savedata::{ERASED, SAVEDATA_CAPACITY};
use gba_core::vfile::VFile;
use gba_core::{Config, Gba};

use crate::error::{BridgeError, Result};
use crate::peripheral::SensorLatch;
use crate::{AUDIO_PAIRS_MAX, AUDIO_SAMPLE_RATE};

/// One embedded machine and everything it owns
///
/// The engine holds the ROM and save RAM files; the context keeps the BIOS
/// file and the sensor latch the peripheral adapters read from.
#[derive(Debug)]
pub struct Context {
    pub(crate) gba: Gba,
    pub(crate) bios: Option<VFile>,
    pub(crate) latch: SensorLatch,
}

impl Context {
    /// Build a context, optionally booting through a BIOS image
    ///
    /// Only the first 16 KiB of `bios` are used. Shorter input, or an image
    /// whose exception vectors are not branches, fails with
    /// [`BridgeError::InvalidBios`] and nothing is kept.
    pub fn create(bios: Option<&[u8]>) -> Result<Self> {
        let bios = bios.map(bios_file).transpose()?;
        let config = Config {
            audio_rate: AUDIO_SAMPLE_RATE,
            audio_buffer: AUDIO_PAIRS_MAX,
        };
        let save_ram = VFile::from_memory(vec![ERASED; SAVEDATA_CAPACITY]);
        let mut gba = Gba::new(config, save_ram);
        if let Some(bios) = &bios {
            gba.load_bios(bios);
            gba.reset();
        }
        tracing::debug!(bios = bios.is_some(), "context created");
        Ok(Self {
            gba,
            bios,
            latch: SensorLatch::default(),
        })
    }

    /// Reinitialize CPU and register state
    ///
    /// ROM, BIOS, save RAM and the contents of RAM and VRAM are kept.
    pub fn reset(&mut self) {
        self.gba.reset();
    }

    /// Release the ROM, BIOS and save RAM files, then the engine
    pub fn destroy(self) {
        let Self { gba, bios, .. } = self;
        let (rom, save_ram) = gba.teardown();
        let rom_size = rom.map(|rom| rom.close().len());
        let bios_size = bios.map(|bios| bios.close().len());
        let save_size = save_ram.close().len();
        tracing::debug!(?rom_size, ?bios_size, save_size, "context destroyed");
    }

    pub fn gba(&self) -> &Gba {
        &self.gba
    }

    /// Direct engine access for hosts that poke at the bus
    pub fn gba_mut(&mut self) -> &mut Gba {
        &mut self.gba
    }

    pub fn has_bios(&self) -> bool {
        self.bios.is_some()
    }

    /// Sensor readings latched by the last advance
    pub fn latch(&self) -> &SensorLatch {
        &self.latch
    }

    /// Frames produced since the last reset
    pub fn frame_counter(&self) -> u32 {
        self.gba.frame_counter()
    }
}

fn bios_file(bytes: &[u8]) -> Result<VFile> {
    let Some(image) = bytes.get(..BIOS_SIZE) else {
        tracing::warn!(len = bytes.len(), "BIOS image too short");
        return Err(BridgeError::InvalidBios);
    };
    let mut vf = VFile::from_memory(image.to_vec());
    if !is_bios(&mut vf) {
        tracing::warn!("BIOS image rejected");
        return Err(BridgeError::InvalidBios);
    }
    Ok(vf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_bios_rejected() {
        let bios = vec![0u8; BIOS_SIZE - 1];
        assert_eq!(Context::create(Some(&bios)).unwrap_err(), BridgeError::InvalidBios);
    }

    #[test]
    fn test_save_ram_erased() {
        let ctx = Context::create(None).unwrap();
        assert!(!ctx.has_bios());
        assert_eq!(ctx.gba().savedata().data().len(), SAVEDATA_CAPACITY);
        assert!(ctx.gba().savedata().data().iter().all(|&b| b == ERASED));
    }
}
