//! Frame stepping
//!
//! [`Context::advance`] polls the engine's frame counter: the run loop is
//! stepped until the counter moves, which happens once per vertical blank.

use gba_core::audio::Audio;

use crate::blit::blit;
use crate::context::Context;
use crate::peripheral::{Peripherals, SensorLatch};
use crate::AUDIO_PAIRS_MAX;

/// Host input for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInput {
    /// Pressed keys, one bit per key, set when pressed
    pub keys: u16,
    /// Wall-clock time, seconds since the Unix epoch
    pub time: i64,
    pub gyro_x: i16,
    pub gyro_y: i16,
    pub gyro_z: i16,
    /// Ambient light level
    pub luma: u8,
}

impl From<&FrameInput> for SensorLatch {
    fn from(input: &FrameInput) -> Self {
        Self {
            tilt_x: input.gyro_x,
            tilt_y: input.gyro_y,
            tilt_z: input.gyro_z,
            light: input.luma,
            time: input.time,
        }
    }
}

impl Context {
    /// Run exactly one frame
    ///
    /// The frame is written to `video` as `0xAARRGGBB` pixels and the audio
    /// produced is written to `audio` as interleaved stereo pairs. Returns
    /// the number of pairs written, at most [`AUDIO_PAIRS_MAX`]; anything
    /// the engine produced beyond that is dropped.
    pub fn advance(&mut self, input: &FrameInput, video: &mut [u32], audio: &mut [i16]) -> usize {
        self.gba.set_keys(input.keys);
        self.latch = SensorLatch::from(input);

        let Self { gba, latch, .. } = self;
        let mut peripherals = Peripherals::new(latch);
        let frame = gba.frame_counter();
        while gba.frame_counter() == frame {
            gba.run_loop(&mut peripherals.sources());
        }

        blit(gba.framebuffer(), video);
        let pairs = drain_audio(gba.audio_mut(), audio);
        tracing::trace!(frame = gba.frame_counter(), pairs, "frame advanced");
        pairs
    }
}

fn drain_audio(audio: &mut Audio, out: &mut [i16]) -> usize {
    let count = audio.samples_avail().min(AUDIO_PAIRS_MAX).min(out.len() / 2);
    let (left, right) = audio.buffers_mut();
    left.read_samples(out, count, true);
    if let Some(out) = out.get_mut(1..) {
        right.read_samples(out, count, true);
    }
    left.remove_samples(left.samples_avail());
    right.remove_samples(right.samples_avail());
    count
}
