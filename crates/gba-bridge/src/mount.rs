//! ROM mount pipeline

use gba_core::cartridge::{is_rom, CartridgeError, ROM_MAX_SIZE};
use gba_core::overrides;
use gba_core::vfile::VFile;

use crate::context::Context;
use crate::error::{BridgeError, Result};

impl Context {
    /// Copy, validate and mount a ROM image
    ///
    /// On success the override table is consulted by game code and the
    /// machine is reset. On failure the context is left exactly as it was,
    /// including any previously mounted ROM.
    pub fn load(&mut self, rom: &[u8]) -> Result<()> {
        if rom.len() > ROM_MAX_SIZE {
            tracing::warn!(len = rom.len(), "ROM image too large");
            return Err(BridgeError::RomTooLarge(rom.len()));
        }
        let mut vf = VFile::from_memory(rom);
        if !is_rom(&mut vf) {
            tracing::warn!(len = rom.len(), "ROM signature missing");
            return Err(CartridgeError::BadSignature.into());
        }
        if let Err(err) = self.gba.load_rom(vf) {
            tracing::warn!(%err, "ROM mount failed");
            return Err(err.into());
        }

        let id = self
            .gba
            .cartridge()
            .map(|cartridge| cartridge.header().id)
            .unwrap_or_default();
        if let Some(quirks) = overrides::find(&id) {
            self.gba.apply_override(&quirks);
        }
        self.reset();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_rejected() {
        let mut ctx = Context::create(None).unwrap();
        assert_eq!(
            ctx.load(&[0u8; 0x200]),
            Err(BridgeError::InvalidRom(CartridgeError::BadSignature))
        );
        assert!(ctx.gba().cartridge().is_none());
    }

    #[test]
    fn test_short_signed_image_rejected() {
        let mut rom = vec![0u8; 0x40];
        rom[4..8].copy_from_slice(&gba_core::cartridge::ROM_MAGIC);
        let mut ctx = Context::create(None).unwrap();
        assert_eq!(
            ctx.load(&rom),
            Err(BridgeError::InvalidRom(CartridgeError::TooShort(0x40)))
        );
    }

    #[test]
    fn test_oversized_rejected_before_copy() {
        let rom = vec![0u8; ROM_MAX_SIZE + 1];
        let mut ctx = Context::create(None).unwrap();
        assert_eq!(ctx.load(&rom), Err(BridgeError::RomTooLarge(ROM_MAX_SIZE + 1)));
    }
}
