//! Integration tests for the cartridge GPIO devices and the tilt sensor

mod common;

use common::{machine, FixedSensors};
use gba_core::hardware::{Devices, Sources};
use gba_core::GbaBus;
use proptest::prelude::*;

const GPIO_DATA: u32 = 0x0800_00C4;
const GPIO_DIRECTION: u32 = 0x0800_00C6;
const GPIO_CONTROL: u32 = 0x0800_00C8;

/// 2004-05-06 19:08:09 UTC, a Thursday
const RTC_TIME: i64 = 1_083_870_489;

fn rtc_begin(bus: &mut GbaBus<'_, '_>) {
    bus.store16(GPIO_CONTROL, 1);
    bus.store16(GPIO_DIRECTION, 7);
    bus.store16(GPIO_DATA, 1);
    bus.store16(GPIO_DATA, 5);
}

fn rtc_write_byte(bus: &mut GbaBus<'_, '_>, byte: u8) {
    for i in 0..8 {
        let sio = u16::from((byte >> i) & 1) << 1;
        bus.store16(GPIO_DATA, 4 | sio);
        bus.store16(GPIO_DATA, 5 | sio);
    }
}

fn rtc_read_byte(bus: &mut GbaBus<'_, '_>) -> u8 {
    let mut byte = 0;
    for i in 0..8 {
        bus.store16(GPIO_DATA, 4);
        bus.store16(GPIO_DATA, 5);
        byte |= (((bus.load16(GPIO_DATA) >> 1) & 1) as u8) << i;
    }
    byte
}

#[test]
fn test_rtc_datetime_read() {
    let mut gba = machine(b"BPEE");
    assert!(gba.hardware().devices().contains(Devices::RTC));
    let mut clock = FixedSensors {
        time: RTC_TIME,
        ..Default::default()
    };
    let mut sources = Sources {
        rtc: Some(&mut clock),
        ..Default::default()
    };
    let mut bus = gba.bus(&mut sources);
    rtc_begin(&mut bus);
    rtc_write_byte(&mut bus, 0xA6);
    bus.store16(GPIO_DIRECTION, 5);
    let datetime: Vec<u8> = (0..7).map(|_| rtc_read_byte(&mut bus)).collect();
    assert_eq!(datetime, [0x04, 0x05, 0x06, 0x04, 0x19, 0x08, 0x09]);
}

#[test]
fn test_rtc_twelve_hour_mode() {
    let mut gba = machine(b"BPEE");
    let mut clock = FixedSensors {
        time: RTC_TIME,
        ..Default::default()
    };
    let mut sources = Sources {
        rtc: Some(&mut clock),
        ..Default::default()
    };
    let mut bus = gba.bus(&mut sources);
    rtc_begin(&mut bus);
    // Control write clearing the 24-hour flag
    rtc_write_byte(&mut bus, 0x46);
    rtc_write_byte(&mut bus, 0x00);
    rtc_write_byte(&mut bus, 0xE6);
    bus.store16(GPIO_DIRECTION, 5);
    let time: Vec<u8> = (0..3).map(|_| rtc_read_byte(&mut bus)).collect();
    assert_eq!(time, [0x07, 0x08, 0x09]);
}

#[test]
fn test_gpio_hidden_until_readable() {
    let mut gba = machine(b"BPEE");
    let mut sources = Sources::default();
    let mut bus = gba.bus(&mut sources);
    bus.store16(GPIO_DIRECTION, 7);
    assert_eq!(bus.load16(GPIO_DIRECTION), 0);
    bus.store16(GPIO_CONTROL, 1);
    assert_eq!(bus.load16(GPIO_DIRECTION), 7);
    assert_eq!(bus.load16(GPIO_CONTROL), 1);
}

#[test]
fn test_gpio_absent_without_devices() {
    let mut gba = machine(b"AUNE");
    let mut sources = Sources::default();
    let mut bus = gba.bus(&mut sources);
    bus.store16(GPIO_CONTROL, 1);
    bus.store16(GPIO_DIRECTION, 7);
    // Plain ROM contents show through
    assert_eq!(bus.load16(GPIO_DIRECTION), 0);
    assert_eq!(bus.load16(GPIO_CONTROL), 0);
}

#[test]
fn test_gyro_serial_sample() {
    let mut gba = machine(b"RZWE");
    assert_eq!(gba.hardware().devices(), Devices::GYRO);
    let mut gyro = FixedSensors {
        gyro_z: 0x1000_0000,
        ..Default::default()
    };
    let mut sources = Sources {
        rotation: Some(&mut gyro),
        ..Default::default()
    };
    let mut bus = gba.bus(&mut sources);
    bus.store16(GPIO_CONTROL, 1);
    bus.store16(GPIO_DIRECTION, 3);
    bus.store16(GPIO_DATA, 1);
    let mut sample = 0u16;
    for _ in 0..16 {
        bus.store16(GPIO_DATA, 2);
        bus.store16(GPIO_DATA, 0);
        sample = (sample << 1) | ((bus.load16(GPIO_DATA) >> 2) & 1);
    }
    assert_eq!(sample, 0x0740);
}

#[test]
fn test_light_sensor_counts_to_level() {
    let mut gba = machine(b"U3IE");
    assert!(gba.hardware().devices().contains(Devices::LIGHT_SENSOR));
    let mut sensor = FixedSensors {
        light: 3,
        ..Default::default()
    };
    let mut sources = Sources {
        luminance: Some(&mut sensor),
        ..Default::default()
    };
    let mut bus = gba.bus(&mut sources);
    bus.store16(GPIO_CONTROL, 1);
    bus.store16(GPIO_DIRECTION, 7);
    bus.store16(GPIO_DATA, 2);
    bus.store16(GPIO_DATA, 0);
    let mut edges = 0;
    while bus.load16(GPIO_DATA) & 8 == 0 {
        bus.store16(GPIO_DATA, 1);
        bus.store16(GPIO_DATA, 0);
        edges += 1;
        assert!(edges < 0x1000, "light sensor never reported");
    }
    assert_eq!(edges, 3);
}

fn read_tilt(bus: &mut GbaBus<'_, '_>) -> (u16, u16) {
    bus.store8(0x0E00_8000, 0x55);
    bus.store8(0x0E00_8100, 0xAA);
    let lo_x = u16::from(bus.load8(0x0E00_8200));
    let hi_x = u16::from(bus.load8(0x0E00_8300));
    let lo_y = u16::from(bus.load8(0x0E00_8400));
    let hi_y = u16::from(bus.load8(0x0E00_8500));
    assert_eq!(hi_x & 0x80, 0x80);
    (lo_x | (hi_x & 0xF) << 8, lo_y | (hi_y & 0xF) << 8)
}

#[test]
fn test_tilt_claims_save_space() {
    let mut gba = machine(b"KYGE");
    let mut tilt = FixedSensors {
        tilt_x: 5 << 21,
        tilt_y: -(3 << 21),
        ..Default::default()
    };
    let mut sources = Sources {
        rotation: Some(&mut tilt),
        ..Default::default()
    };
    let mut bus = gba.bus(&mut sources);
    assert_eq!(read_tilt(&mut bus), (0x3A5, 0x39D));
    assert_eq!(bus.load8(0x0E00_8600), 0xFF);
}

#[test]
fn test_tilt_needs_unlock() {
    let mut gba = machine(b"KYGE");
    let mut tilt = FixedSensors {
        tilt_x: 5 << 21,
        ..Default::default()
    };
    let mut sources = Sources {
        rotation: Some(&mut tilt),
        ..Default::default()
    };
    let mut bus = gba.bus(&mut sources);
    bus.store8(0x0E00_8100, 0xAA);
    assert_eq!(bus.load8(0x0E00_8200), 0);
}

proptest! {
    #[test]
    fn prop_tilt_centers_on_resting_value(x in any::<i16>(), y in any::<i16>()) {
        let mut gba = machine(b"KYGE");
        let mut tilt = FixedSensors {
            tilt_x: i32::from(x) << 16,
            tilt_y: i32::from(y) << 16,
            ..Default::default()
        };
        let mut sources = Sources {
            rotation: Some(&mut tilt),
            ..Default::default()
        };
        let mut bus = gba.bus(&mut sources);
        let expected = |v: i16| ((i32::from(v) << 16 >> 21) + 0x3A0) as u16;
        prop_assert_eq!(read_tilt(&mut bus), (expected(x), expected(y)));
    }
}
