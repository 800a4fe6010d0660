//! GBA Core - Game Boy Advance engine collaborators
//!
//! This crate provides the engine the embedding bridge drives: memory map,
//! cartridge loading, save data, cartridge sensors, video timing, audio
//! resampling and full-machine snapshots. It contains no FFI and no host
//! frontend code.

#![forbid(unsafe_code)]

/// Memory-backed virtual files
pub mod vfile;
/// Cartridge header parsing and ROM/BIOS validation
pub mod cartridge;
/// Static cartridge override table
pub mod overrides;
/// Save data types and protocols
pub mod savedata;
/// Cartridge GPIO devices and host sensor sources
pub mod hardware;
/// Memory regions and access timing
pub mod memory;
/// Scanline timing and the software renderer
pub mod video;
/// PSG channels and sample generation
pub mod audio;
/// Delta buffer resampler
pub mod blip;
/// ARM register file and run loop
pub mod cpu;
/// Fixed-size snapshot format
pub mod serialize;
/// Integration module for the complete machine
pub mod system;

pub use system::{Config, Gba, GbaBus, Keys, MemoryAreas};
