//! Memory region views
//!
//! In Rust the regions come back as [`MemoryAreas`], a set of slices that
//! borrow the context mutably and so cannot outlive it or overlap a frame.
//! [`RawMemoryAreas`] is the same set flattened into pointers for the C ABI;
//! those pointers stay valid until the context is destroyed or a new ROM is
//! loaded, and nothing synchronizes writes through them.

use std::ptr;

use gba_core::MemoryAreas;

use crate::context::Context;

/// Region base pointers in fixed order
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawMemoryAreas {
    pub bios: *mut u8,
    pub wram: *mut u8,
    pub iwram: *mut u8,
    pub mmio: *mut u8,
    pub palram: *mut u8,
    pub vram: *mut u8,
    pub oam: *mut u8,
    /// Null when no ROM is mounted
    pub rom: *mut u8,
}

impl Default for RawMemoryAreas {
    fn default() -> Self {
        Self {
            bios: ptr::null_mut(),
            wram: ptr::null_mut(),
            iwram: ptr::null_mut(),
            mmio: ptr::null_mut(),
            palram: ptr::null_mut(),
            vram: ptr::null_mut(),
            oam: ptr::null_mut(),
            rom: ptr::null_mut(),
        }
    }
}

impl From<MemoryAreas<'_>> for RawMemoryAreas {
    fn from(areas: MemoryAreas<'_>) -> Self {
        Self {
            bios: areas.bios.as_mut_ptr(),
            wram: areas.wram.as_mut_ptr(),
            iwram: areas.iwram.as_mut_ptr(),
            mmio: areas.io.as_mut_ptr(),
            palram: areas.palette.as_mut_ptr(),
            vram: areas.vram.as_mut_ptr(),
            oam: areas.oam.as_mut_ptr(),
            rom: if areas.rom.is_empty() {
                ptr::null_mut()
            } else {
                areas.rom.as_mut_ptr()
            },
        }
    }
}

impl Context {
    /// Borrow every memory region at once
    pub fn memory_areas(&mut self) -> MemoryAreas<'_> {
        self.gba.memory_areas()
    }

    /// Region base pointers for a foreign caller
    pub fn raw_memory_areas(&mut self) -> RawMemoryAreas {
        RawMemoryAreas::from(self.memory_areas())
    }
}
