//! Sensor latch and adapters
//!
//! The host hands over one reading per sensor with every frame. Those
//! readings are latched in the context and served to the engine through
//! adapters that borrow the latch for the duration of a single frame, so
//! every sample the engine takes within a frame sees the same values.

use gba_core::hardware::{LuminanceSource, RotationSource, RtcSource, Sources};

/// Most recent host sensor readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorLatch {
    pub tilt_x: i16,
    pub tilt_y: i16,
    pub tilt_z: i16,
    pub light: u8,
    /// Wall-clock time, seconds since the Unix epoch
    pub time: i64,
}

/// Tilt and gyro readings in the engine's 16.16 range
#[derive(Debug, Clone, Copy)]
pub struct TiltAdapter<'a> {
    latch: &'a SensorLatch,
}

impl RotationSource for TiltAdapter<'_> {
    fn sample(&mut self) {}

    fn read_tilt_x(&self) -> i32 {
        i32::from(self.latch.tilt_x) << 16
    }

    fn read_tilt_y(&self) -> i32 {
        i32::from(self.latch.tilt_y) << 16
    }

    fn read_gyro_z(&self) -> i32 {
        i32::from(self.latch.tilt_z) << 16
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LightAdapter<'a> {
    latch: &'a SensorLatch,
}

impl LuminanceSource for LightAdapter<'_> {
    fn sample(&mut self) {}

    fn read_luminance(&self) -> u8 {
        self.latch.light
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClockAdapter<'a> {
    latch: &'a SensorLatch,
}

impl RtcSource for ClockAdapter<'_> {
    fn sample(&mut self) {}

    fn unix_time(&self) -> i64 {
        self.latch.time
    }
}

/// The three adapters bound to one latch
#[derive(Debug, Clone, Copy)]
pub struct Peripherals<'a> {
    tilt: TiltAdapter<'a>,
    light: LightAdapter<'a>,
    clock: ClockAdapter<'a>,
}

impl<'a> Peripherals<'a> {
    pub fn new(latch: &'a SensorLatch) -> Self {
        Self {
            tilt: TiltAdapter { latch },
            light: LightAdapter { latch },
            clock: ClockAdapter { latch },
        }
    }

    /// Sources handed to the engine for one run-loop step
    pub fn sources(&mut self) -> Sources<'_> {
        Sources {
            rotation: Some(&mut self.tilt),
            luminance: Some(&mut self.light),
            rtc: Some(&mut self.clock),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tilt_is_fixed_point() {
        let latch = SensorLatch {
            tilt_x: 1,
            tilt_y: -1,
            tilt_z: i16::MIN,
            ..Default::default()
        };
        let mut peripherals = Peripherals::new(&latch);
        let sources = peripherals.sources();
        let rotation = sources.rotation.unwrap();
        assert_eq!(rotation.read_tilt_x(), 0x1_0000);
        assert_eq!(rotation.read_tilt_y(), -0x1_0000);
        assert_eq!(rotation.read_gyro_z(), i32::MIN);
    }

    #[test]
    fn test_light_and_clock_pass_through() {
        let latch = SensorLatch {
            light: 0xC8,
            time: -5,
            ..Default::default()
        };
        let mut peripherals = Peripherals::new(&latch);
        let mut sources = peripherals.sources();
        let light = sources.luminance.as_deref_mut().unwrap();
        light.sample();
        assert_eq!(light.read_luminance(), 0xC8);
        assert_eq!(sources.rtc.unwrap().unix_time(), -5);
    }
}
