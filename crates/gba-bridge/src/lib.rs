//! GBA Bridge - frame-stepped embedding surface for the GBA engine
//!
//! A host creates a [`Context`], loads a ROM into it and then calls
//! [`Context::advance`] once per video frame. Each call latches the host's
//! keys and sensor readings, runs the engine to the next frame boundary and
//! converts the frame and the audio produced along the way into host
//! formats. The [`ffi`] module exports the same surface as a C ABI.

/// Context creation, reset and teardown
pub mod context;
/// Bridge error taxonomy
pub mod error;
/// ROM validation and mounting
pub mod mount;
/// Sensor latch and the adapters the engine samples
pub mod peripheral;
/// One-frame stepping
pub mod stepper;
/// Memory region views
pub mod memory;
/// Save states and save RAM
pub mod snapshot;
/// Pixel format conversion
pub mod blit;
/// C ABI entry points
pub mod ffi;

pub use context::Context;
pub use error::{BridgeError, Result};
pub use memory::RawMemoryAreas;
pub use peripheral::SensorLatch;
pub use stepper::FrameInput;

pub use gba_core::video::{VIDEO_HORIZONTAL_PIXELS, VIDEO_VERTICAL_PIXELS};

/// Pixels in a host framebuffer
pub const FRAMEBUFFER_PIXELS: usize = VIDEO_HORIZONTAL_PIXELS * VIDEO_VERTICAL_PIXELS;

/// Most stereo sample pairs handed out per frame
pub const AUDIO_PAIRS_MAX: usize = 1024;

/// Length of a host audio buffer in `i16` entries, interleaved left/right
pub const AUDIO_BUFFER_LEN: usize = AUDIO_PAIRS_MAX * 2;

/// Host audio sample rate in Hz
pub const AUDIO_SAMPLE_RATE: u32 = 44_100;

/// BIOS image size accepted at creation
pub use gba_core::cartridge::BIOS_SIZE;

/// Save RAM buffer capacity, the size of a 1 Mbit flash chip
pub use gba_core::savedata::SAVEDATA_CAPACITY as SAVE_RAM_CAPACITY;
