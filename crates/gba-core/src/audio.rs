//! PSG channels and sample generation
//!
//! The two square-wave channels are mixed every [`SAMPLE_INTERVAL`] cycles.
//! Each mixed sample is pushed into a pair of delta buffers as the change
//! from the previous sample; the buffers resample to the host rate.

use crate::blip::BlipBuffer;
use crate::memory::io;
use crate::serialize::{offsets, StateReader, StateWriter};

/// CPU clock rate in Hz
pub const GBA_ARM7TDMI_FREQUENCY: u64 = 0x0100_0000;

/// Cycles between mixed samples
pub const SAMPLE_INTERVAL: i32 = 512;

/// Cycles per resampler frame
pub const CLOCKS_PER_FRAME: i32 = 0x400;

const DUTY_PATTERNS: [u8; 4] = [0b0000_0001, 0b1000_0001, 0b1000_0111, 0b0111_1110];

/// Amplitude step per volume unit
const VOLUME_SCALE: i32 = 64;

/// A square-wave PSG channel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SquareChannel {
    duty: u8,
    volume: u8,
    frequency: u16,
    enabled: bool,
    phase: u8,
    counter: i32,
}

impl SquareChannel {
    fn period(&self) -> i32 {
        16 * (2048 - i32::from(self.frequency))
    }

    fn write_control(&mut self, value: u16) {
        self.duty = ((value >> 6) & 3) as u8;
        self.volume = (value >> 12) as u8;
    }

    fn write_frequency(&mut self, value: u16) {
        self.frequency = value & 0x7FF;
        if value & 0x8000 != 0 {
            self.enabled = true;
            self.phase = 0;
            self.counter = self.period();
        }
    }

    fn step(&mut self, cycles: i32) {
        if !self.enabled {
            return;
        }
        self.counter -= cycles;
        while self.counter <= 0 {
            self.phase = (self.phase + 1) & 7;
            self.counter += self.period();
        }
    }

    fn output(&self) -> i32 {
        if !self.enabled {
            return 0;
        }
        let volume = i32::from(self.volume);
        if DUTY_PATTERNS[usize::from(self.duty)] >> self.phase & 1 != 0 {
            volume
        } else {
            -volume
        }
    }

    fn save_state(&self, w: &mut StateWriter<'_>) {
        w.put_u8(self.duty);
        w.put_u8(self.volume);
        w.put_u16(self.frequency);
        w.put_bool(self.enabled);
        w.put_u8(self.phase);
        w.put_i32(self.counter);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) {
        self.duty = r.get_u8() & 3;
        self.volume = r.get_u8() & 0xF;
        self.frequency = r.get_u16() & 0x7FF;
        self.enabled = r.get_bool();
        self.phase = r.get_u8() & 7;
        self.counter = r.get_i32();
    }
}

/// Sound unit
#[derive(Debug, Clone)]
pub struct Audio {
    left: BlipBuffer,
    right: BlipBuffer,
    ch1: SquareChannel,
    ch2: SquareChannel,
    soundcnt_lo: u16,
    enable: bool,
    clock: i32,
    next_sample: i32,
    last_left: i32,
    last_right: i32,
}

impl Audio {
    /// Sound unit resampling to `sample_rate`, buffering up to `samples` pairs
    pub fn new(sample_rate: u32, samples: usize) -> Self {
        let mut left = BlipBuffer::new(samples);
        let mut right = BlipBuffer::new(samples);
        left.set_rates(GBA_ARM7TDMI_FREQUENCY, u64::from(sample_rate));
        right.set_rates(GBA_ARM7TDMI_FREQUENCY, u64::from(sample_rate));
        Self {
            left,
            right,
            ch1: SquareChannel::default(),
            ch2: SquareChannel::default(),
            soundcnt_lo: 0,
            enable: false,
            clock: 0,
            next_sample: SAMPLE_INTERVAL,
            last_left: 0,
            last_right: 0,
        }
    }

    /// Silence the channels and empty the buffers
    pub fn reset(&mut self) {
        self.ch1 = SquareChannel::default();
        self.ch2 = SquareChannel::default();
        self.soundcnt_lo = 0;
        self.enable = false;
        self.clock = 0;
        self.next_sample = SAMPLE_INTERVAL;
        self.last_left = 0;
        self.last_right = 0;
        self.left.clear();
        self.right.clear();
    }

    /// Left and right delta buffers
    pub fn buffers_mut(&mut self) -> (&mut BlipBuffer, &mut BlipBuffer) {
        (&mut self.left, &mut self.right)
    }

    /// Stereo sample pairs ready to read
    pub fn samples_avail(&self) -> usize {
        self.left.samples_avail().min(self.right.samples_avail())
    }

    /// Observe a store to a sound register
    pub fn write_register(&mut self, offset: u32, value: u16) {
        match offset {
            io::SOUND1CNT_H => self.ch1.write_control(value),
            io::SOUND1CNT_X => self.ch1.write_frequency(value),
            io::SOUND2CNT_L => self.ch2.write_control(value),
            io::SOUND2CNT_H => self.ch2.write_frequency(value),
            io::SOUNDCNT_L => self.soundcnt_lo = value,
            io::SOUNDCNT_X => {
                self.enable = value & 0x80 != 0;
                if !self.enable {
                    self.ch1.enabled = false;
                    self.ch2.enabled = false;
                }
            }
            _ => {}
        }
    }

    fn mix(&self) -> (i32, i32) {
        if !self.enable {
            return (0, 0);
        }
        let right_volume = i32::from(self.soundcnt_lo & 7) + 1;
        let left_volume = i32::from((self.soundcnt_lo >> 4) & 7) + 1;
        let mut left = 0;
        let mut right = 0;
        for (i, channel) in [&self.ch1, &self.ch2].into_iter().enumerate() {
            let sample = channel.output();
            if self.soundcnt_lo & (0x100 << i) != 0 {
                right += sample;
            }
            if self.soundcnt_lo & (0x1000 << i) != 0 {
                left += sample;
            }
        }
        (left * left_volume * VOLUME_SCALE, right * right_volume * VOLUME_SCALE)
    }

    fn sample(&mut self) {
        self.ch1.step(SAMPLE_INTERVAL);
        self.ch2.step(SAMPLE_INTERVAL);
        let (left, right) = self.mix();
        let time = self.clock as u32;
        self.left.add_delta(time, left - self.last_left);
        self.right.add_delta(time, right - self.last_right);
        self.last_left = left;
        self.last_right = right;
        self.clock += SAMPLE_INTERVAL;
        if self.clock >= CLOCKS_PER_FRAME {
            self.left.end_frame(self.clock as u32);
            self.right.end_frame(self.clock as u32);
            self.clock -= CLOCKS_PER_FRAME;
        }
    }

    /// Advance by `cycles`, returning cycles until the next sample
    pub fn process_events(&mut self, cycles: i32) -> i32 {
        self.next_sample -= cycles;
        while self.next_sample <= 0 {
            self.sample();
            self.next_sample += SAMPLE_INTERVAL;
        }
        self.next_sample
    }

    pub fn save_state(&self, w: &mut StateWriter<'_>) {
        w.seek(offsets::AUDIO);
        self.ch1.save_state(w);
        self.ch2.save_state(w);
        w.put_u16(self.soundcnt_lo);
        w.put_bool(self.enable);
        w.put_i32(self.clock);
        w.put_i32(self.next_sample);
        w.put_i32(self.last_left);
        w.put_i32(self.last_right);
    }

    pub fn load_state(&mut self, r: &mut StateReader<'_>) {
        r.seek(offsets::AUDIO);
        self.ch1.load_state(r);
        self.ch2.load_state(r);
        self.soundcnt_lo = r.get_u16();
        self.enable = r.get_bool();
        self.clock = r.get_i32().clamp(0, CLOCKS_PER_FRAME - 1);
        self.next_sample = r.get_i32();
        self.last_left = r.get_i32();
        self.last_right = r.get_i32();
    }
}
