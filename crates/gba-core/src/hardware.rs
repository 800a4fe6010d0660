//! Cartridge GPIO devices
//!
//! Some boards wire extra chips to a 4-bit GPIO port mapped into ROM space
//! at `0x080000C4` (data), `0x080000C6` (direction) and `0x080000C8`
//! (control). The real-time clock, gyro and light sensor hang off that port;
//! the tilt sensor instead lives in the save space. The host supplies the
//! physical readings through the source traits below.

use bitflags::bitflags;

use crate::serialize::{StateReader, StateWriter};

/// GPIO data register offset in ROM space
pub const GPIO_REG_DATA: u32 = 0xC4;
/// GPIO direction register offset in ROM space
pub const GPIO_REG_DIRECTION: u32 = 0xC6;
/// GPIO control register offset in ROM space
pub const GPIO_REG_CONTROL: u32 = 0xC8;

bitflags! {
    /// Devices wired on the cartridge board
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Devices: u8 {
        const RTC = 0x01;
        const LIGHT_SENSOR = 0x02;
        const GYRO = 0x04;
        const TILT = 0x08;
    }
}

/// Accelerometer and gyroscope readings, in 16.16-style fixed point
pub trait RotationSource {
    fn sample(&mut self);
    fn read_tilt_x(&self) -> i32;
    fn read_tilt_y(&self) -> i32;
    fn read_gyro_z(&self) -> i32;
}

/// Ambient light level
pub trait LuminanceSource {
    fn sample(&mut self);
    fn read_luminance(&self) -> u8;
}

/// Wall-clock time
pub trait RtcSource {
    fn sample(&mut self);
    /// Seconds since the Unix epoch
    fn unix_time(&self) -> i64;
}

/// Host sensor sources available while the machine runs
#[derive(Default)]
pub struct Sources<'a> {
    pub rotation: Option<&'a mut (dyn RotationSource + 'a)>,
    pub luminance: Option<&'a mut (dyn LuminanceSource + 'a)>,
    pub rtc: Option<&'a mut (dyn RtcSource + 'a)>,
}

const RTC_BYTES: [i32; 8] = [0, 0, 7, 0, 1, 0, 3, 0];
const RTC_MAGIC: u32 = 0x6;
const RTC_CONTROL_HOUR24: u8 = 0x40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RtcCommand {
    Reset = 0,
    DateTime = 2,
    ForceIrq = 3,
    Control = 4,
    Time = 6,
}

impl RtcCommand {
    fn decode(byte: u8) -> Option<Self> {
        match (byte >> 4) & 0x7 {
            0 => Some(RtcCommand::Reset),
            2 => Some(RtcCommand::DateTime),
            3 => Some(RtcCommand::ForceIrq),
            4 => Some(RtcCommand::Control),
            6 => Some(RtcCommand::Time),
            _ => None,
        }
    }
}

/// Serial real-time clock
#[derive(Debug, Clone, PartialEq, Eq)]
struct Rtc {
    bytes_remaining: i32,
    transfer_step: u8,
    bits_read: u32,
    bits: u32,
    command_active: bool,
    command: u8,
    control: u8,
    time: [u8; 7],
}

impl Default for Rtc {
    fn default() -> Self {
        Self {
            bytes_remaining: 0,
            transfer_step: 0,
            bits_read: 0,
            bits: 0,
            command_active: false,
            command: 0,
            control: RTC_CONTROL_HOUR24,
            time: [0; 7],
        }
    }
}

impl Rtc {
    fn is_reading(&self) -> bool {
        self.command & 0x80 != 0
    }

    fn output(&self) -> u8 {
        if !self.command_active {
            return 0;
        }
        let byte = match RtcCommand::decode(self.command) {
            Some(RtcCommand::Control) => self.control,
            Some(RtcCommand::DateTime) | Some(RtcCommand::Time) => {
                self.time[(7 - self.bytes_remaining).clamp(0, 6) as usize]
            }
            _ => 0,
        };
        (byte >> self.bits_read) & 1
    }

    fn process_byte(&mut self, sources: &mut Sources<'_>) {
        self.bytes_remaining -= 1;
        if !self.command_active {
            let command = self.bits as u8;
            if u32::from(command) & 0xF == RTC_MAGIC {
                self.command = command;
                let index = usize::from((command >> 4) & 0x7);
                self.bytes_remaining = RTC_BYTES[index];
                self.command_active = self.bytes_remaining > 0;
                match RtcCommand::decode(command) {
                    Some(RtcCommand::Reset) => self.control = 0,
                    Some(RtcCommand::DateTime) | Some(RtcCommand::Time) => {
                        self.update_clock(sources)
                    }
                    _ => {}
                }
            } else {
                tracing::warn!(byte = command, "invalid RTC command byte");
            }
        } else {
            match RtcCommand::decode(self.command) {
                Some(RtcCommand::Control) => self.control = self.bits as u8,
                Some(RtcCommand::ForceIrq) => tracing::warn!("RTC force IRQ is not implemented"),
                _ => {}
            }
        }

        self.bits = 0;
        self.bits_read = 0;
        if self.bytes_remaining <= 0 {
            self.command_active = false;
            self.command = 0;
        }
    }

    fn update_clock(&mut self, sources: &mut Sources<'_>) {
        let now = match sources.rtc.as_deref_mut() {
            Some(rtc) => {
                rtc.sample();
                rtc.unix_time()
            }
            None => 0,
        };
        self.time = encode_time(now, self.control & RTC_CONTROL_HOUR24 != 0);
    }
}

fn bcd(value: u32) -> u8 {
    (((value / 10) % 10) << 4 | (value % 10)) as u8
}

/// Days since the epoch to a proleptic Gregorian date
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// BCD date and time registers for a Unix timestamp, in UTC
fn encode_time(unix_time: i64, hour24: bool) -> [u8; 7] {
    let days = unix_time.div_euclid(86_400);
    let seconds = unix_time.rem_euclid(86_400) as u32;
    let (year, month, day) = civil_from_days(days);
    let weekday = (days + 4).rem_euclid(7) as u32;
    let hour = seconds / 3600;
    [
        bcd((year - 2000).rem_euclid(100) as u32),
        bcd(month),
        bcd(day),
        bcd(weekday),
        bcd(if hour24 { hour } else { hour % 12 }),
        bcd(seconds / 60 % 60),
        bcd(seconds % 60),
    ]
}

/// GPIO port and the devices behind it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hardware {
    devices: Devices,
    read_write: bool,
    pin_state: u8,
    direction: u8,
    rtc: Rtc,
    gyro_sample: u16,
    gyro_edge: bool,
    light_counter: u16,
    light_sample: u8,
    light_edge: bool,
    tilt_x: u16,
    tilt_y: u16,
    tilt_state: u8,
}

impl Hardware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Devices wired on the board
    pub fn devices(&self) -> Devices {
        self.devices
    }

    /// Wire devices onto the board
    pub fn init_devices(&mut self, devices: Devices) {
        self.devices |= devices;
        if devices.contains(Devices::RTC) {
            self.rtc = Rtc::default();
        }
    }

    /// Reset the port and device state, keeping the wiring
    pub fn reset(&mut self) {
        *self = Self {
            devices: self.devices,
            ..Self::default()
        };
    }

    /// Remove every device
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Whether the port registers are visible through ROM reads
    pub fn is_readable(&self) -> bool {
        self.read_write
    }

    /// Value visible at a GPIO register offset, if one is mapped there
    pub fn read_register(&self, offset: u32) -> Option<u16> {
        if self.devices.is_empty() {
            return None;
        }
        let value = match offset & !1 {
            GPIO_REG_DATA => u16::from(self.pin_state),
            GPIO_REG_DIRECTION => u16::from(self.direction),
            GPIO_REG_CONTROL => u16::from(self.read_write),
            _ => return None,
        };
        Some(if self.read_write { value } else { 0 })
    }

    /// Handle a store to a GPIO register
    pub fn write_register(&mut self, offset: u32, value: u16, sources: &mut Sources<'_>) {
        let value = (value & 0xF) as u8;
        match offset & !1 {
            GPIO_REG_DATA => {
                self.pin_state = (self.pin_state & !self.direction) | (value & self.direction);
                self.read_pins(sources);
            }
            GPIO_REG_DIRECTION => self.direction = value,
            GPIO_REG_CONTROL => self.read_write = value & 1 != 0,
            _ => tracing::warn!(offset, value, "invalid GPIO register"),
        }
    }

    fn read_pins(&mut self, sources: &mut Sources<'_>) {
        if self.devices.contains(Devices::RTC) {
            self.rtc_read_pins(sources);
        }
        if self.devices.contains(Devices::GYRO) {
            self.gyro_read_pins(sources);
        }
        if self.devices.contains(Devices::LIGHT_SENSOR) {
            self.light_read_pins(sources);
        }
    }

    fn output_pins(&mut self, pins: u8) {
        if self.read_write {
            self.pin_state = (self.pin_state & self.direction) | (pins & !self.direction & 0xF);
        }
    }

    // Transfer: CS low to high with SCK high starts a command, then eight
    // bits per byte on SIO, latched while SCK is low and clocked on rising SCK.
    fn rtc_read_pins(&mut self, sources: &mut Sources<'_>) {
        let pins = self.pin_state;
        match self.rtc.transfer_step {
            0 => {
                if pins & 5 == 1 {
                    self.rtc.transfer_step = 1;
                }
            }
            1 => {
                if pins & 5 == 5 {
                    self.rtc.transfer_step = 2;
                } else if pins & 5 != 1 {
                    self.rtc.transfer_step = 0;
                }
            }
            _ => {
                if pins & 1 == 0 {
                    let bit = self.rtc.bits_read & 31;
                    self.rtc.bits &= !(1 << bit);
                    self.rtc.bits |= u32::from((pins & 2) >> 1) << bit;
                } else if pins & 4 != 0 {
                    if !self.rtc.is_reading() {
                        self.rtc.bits_read += 1;
                        if self.rtc.bits_read == 8 {
                            self.rtc.process_byte(sources);
                        }
                    } else {
                        let out = self.rtc.output();
                        self.output_pins(5 | (out << 1));
                        self.rtc.bits_read += 1;
                        if self.rtc.bits_read == 8 {
                            self.rtc.bytes_remaining -= 1;
                            if self.rtc.bytes_remaining <= 0 {
                                self.rtc.command_active = false;
                                self.rtc.command = 0;
                            }
                            self.rtc.bits_read = 0;
                        }
                    }
                } else {
                    self.rtc.bits_read = 0;
                    self.rtc.bytes_remaining = 0;
                    self.rtc.command_active = false;
                    self.rtc.command = 0;
                    self.rtc.transfer_step = pins & 1;
                    self.output_pins(1);
                }
            }
        }
    }

    fn gyro_read_pins(&mut self, sources: &mut Sources<'_>) {
        let Some(rotation) = sources.rotation.as_deref_mut() else {
            return;
        };
        if self.pin_state & 1 != 0 {
            rotation.sample();
            let z = rotation.read_gyro_z();
            self.gyro_sample = ((z >> 21) + 0x6C0) as u16;
        }
        if self.gyro_edge && self.pin_state & 2 == 0 {
            // Falling edge shifts out the next bit
            let bit = (self.gyro_sample >> 15) as u8;
            self.gyro_sample <<= 1;
            self.output_pins(bit << 2);
        }
        self.gyro_edge = self.pin_state & 2 != 0;
    }

    fn light_read_pins(&mut self, sources: &mut Sources<'_>) {
        if self.pin_state & 4 != 0 {
            return;
        }
        if self.pin_state & 2 != 0 {
            self.light_counter = 0;
            self.light_sample = match sources.luminance.as_deref_mut() {
                Some(lux) => {
                    lux.sample();
                    lux.read_luminance()
                }
                None => 0xFF,
            };
        }
        if self.pin_state & 1 != 0 && self.light_edge {
            self.light_counter = (self.light_counter + 1) & 0xFFF;
        }
        self.light_edge = self.pin_state & 1 == 0;

        let send = self.light_counter >= u16::from(self.light_sample);
        self.output_pins(u8::from(send) << 3);
    }

    /// Handle a save-space store claimed by the tilt sensor
    pub fn tilt_write(&mut self, address: u32, value: u8, sources: &mut Sources<'_>) {
        match address {
            0x8000 => {
                if value == 0x55 {
                    self.tilt_state = 1;
                } else {
                    tracing::warn!(address, value, "tilt sensor wrote wrong byte");
                }
            }
            0x8100 => {
                if value == 0xAA && self.tilt_state == 1 {
                    self.tilt_state = 0;
                    let Some(rotation) = sources.rotation.as_deref_mut() else {
                        return;
                    };
                    rotation.sample();
                    let x = rotation.read_tilt_x();
                    let y = rotation.read_tilt_y();
                    self.tilt_x = ((x >> 21) + 0x3A0) as u16;
                    self.tilt_y = ((y >> 21) + 0x3A0) as u16;
                } else {
                    tracing::warn!(address, value, "tilt sensor wrote wrong byte");
                }
            }
            _ => tracing::warn!(address, value, "invalid tilt sensor write"),
        }
    }

    /// Handle a save-space load claimed by the tilt sensor
    pub fn tilt_read(&self, address: u32) -> u8 {
        match address {
            0x8200 => (self.tilt_x & 0xFF) as u8,
            0x8300 => ((self.tilt_x >> 8) & 0xF) as u8 | 0x80,
            0x8400 => (self.tilt_y & 0xFF) as u8,
            0x8500 => ((self.tilt_y >> 8) & 0xF) as u8,
            _ => 0xFF,
        }
    }

    pub fn save_state(&self, w: &mut StateWriter<'_>) {
        w.put_u8(self.devices.bits());
        w.put_bool(self.read_write);
        w.put_u8(self.pin_state);
        w.put_u8(self.direction);
        w.put_i32(self.rtc.bytes_remaining);
        w.put_u8(self.rtc.transfer_step);
        w.put_u32(self.rtc.bits_read);
        w.put_u32(self.rtc.bits);
        w.put_bool(self.rtc.command_active);
        w.put_u8(self.rtc.command);
        w.put_u8(self.rtc.control);
        w.put_bytes(&self.rtc.time);
        w.put_u16(self.gyro_sample);
        w.put_bool(self.gyro_edge);
        w.put_u16(self.light_counter);
        w.put_u8(self.light_sample);
        w.put_bool(self.light_edge);
        w.put_u16(self.tilt_x);
        w.put_u16(self.tilt_y);
        w.put_u8(self.tilt_state);
    }

    pub fn load_state(&mut self, r: &mut StateReader<'_>) {
        self.devices = Devices::from_bits_truncate(r.get_u8());
        self.read_write = r.get_bool();
        self.pin_state = r.get_u8() & 0xF;
        self.direction = r.get_u8() & 0xF;
        self.rtc.bytes_remaining = r.get_i32();
        self.rtc.transfer_step = r.get_u8().min(2);
        self.rtc.bits_read = r.get_u32() & 7;
        self.rtc.bits = r.get_u32();
        self.rtc.command_active = r.get_bool();
        self.rtc.command = r.get_u8();
        self.rtc.control = r.get_u8();
        r.get_bytes(&mut self.rtc.time);
        self.gyro_sample = r.get_u16();
        self.gyro_edge = r.get_bool();
        self.light_counter = r.get_u16() & 0xFFF;
        self.light_sample = r.get_u8();
        self.light_edge = r.get_bool();
        self.tilt_x = r.get_u16();
        self.tilt_y = r.get_u16();
        self.tilt_state = r.get_u8();
    }
}
