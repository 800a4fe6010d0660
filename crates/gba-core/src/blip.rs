//! Delta buffer resampler
//!
//! Amplitude changes are recorded as deltas at clock-rate timestamps and
//! integrated into output samples at the host rate. Time within a frame is
//! converted with a 32-bit fixed-point factor so fractional sample positions
//! carry across frames.

const FRAC_BITS: u32 = 32;
const FRAC_MASK: u64 = (1 << FRAC_BITS) - 1;

/// Slots past the readable region that pending deltas may land in
pub const BUF_EXTRA: usize = 16;

/// A mono delta buffer
#[derive(Debug, Clone)]
pub struct BlipBuffer {
    factor: u64,
    offset: u64,
    avail: usize,
    size: usize,
    integrator: i32,
    buf: Vec<i32>,
}

impl BlipBuffer {
    /// Buffer holding up to `size` output samples
    pub fn new(size: usize) -> Self {
        Self {
            factor: 1 << FRAC_BITS,
            offset: 0,
            avail: 0,
            size,
            integrator: 0,
            buf: vec![0; size + BUF_EXTRA],
        }
    }

    /// Set the input clock and output sample rates
    pub fn set_rates(&mut self, clock_rate: u64, sample_rate: u64) {
        let clock_rate = clock_rate.max(1);
        // Round up so a frame never yields fewer samples than expected
        self.factor = ((sample_rate << FRAC_BITS) + clock_rate - 1) / clock_rate;
    }

    /// Capacity in output samples
    pub fn size(&self) -> usize {
        self.size
    }

    fn position(&self, time: u32) -> u64 {
        u64::from(time) * self.factor + self.offset
    }

    /// Record an amplitude change at `time` clocks into the current frame
    pub fn add_delta(&mut self, time: u32, delta: i32) {
        let index = self.avail + (self.position(time) >> FRAC_BITS) as usize;
        if let Some(slot) = self.buf.get_mut(index) {
            *slot = slot.wrapping_add(delta);
        }
    }

    /// Close the current frame after `time` clocks, making its samples readable
    pub fn end_frame(&mut self, time: u32) {
        let position = self.position(time);
        self.avail += (position >> FRAC_BITS) as usize;
        self.offset = position & FRAC_MASK;
        if self.avail > self.size {
            tracing::trace!(dropped = self.avail - self.size, "audio buffer overflow");
            self.avail = self.size;
        }
    }

    /// Output samples ready to read
    pub fn samples_avail(&self) -> usize {
        self.avail
    }

    /// Read up to `count` samples into `out`, every other slot when `stereo`
    pub fn read_samples(&mut self, out: &mut [i16], count: usize, stereo: bool) -> usize {
        let step = if stereo { 2 } else { 1 };
        let count = count.min(self.avail).min(out.len().div_ceil(step));
        let mut sum = self.integrator;
        for (slot, delta) in out.iter_mut().step_by(step).zip(&self.buf[..count]) {
            sum = sum.wrapping_add(*delta);
            *slot = sum.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        }
        self.integrator = sum;
        self.remove_samples(count);
        count
    }

    /// Drop `count` samples from the front of the buffer
    pub fn remove_samples(&mut self, count: usize) {
        let count = count.min(self.avail);
        let remaining = self.avail + BUF_EXTRA - count;
        self.buf.copy_within(count..count + remaining, 0);
        self.buf[remaining..].fill(0);
        self.avail -= count;
    }

    /// Discard everything, including pending deltas
    pub fn clear(&mut self) {
        self.offset = 0;
        self.avail = 0;
        self.integrator = 0;
        self.buf.fill(0);
    }
}
