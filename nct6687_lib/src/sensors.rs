//! Cached sensor readings with running minimum and maximum
use std::time::{Duration, Instant};

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::board::FanChannelMap;
use crate::ec::registers::*;
use crate::ec::{EcError, EcResult, EcSpace, PortIo};

/// Readings younger than this are served from the cache
pub const STALE_AFTER: Duration = Duration::from_secs(1);

pub const TEMPERATURE_LABELS: [&str; NUM_REG_TEMP] = [
    "CPU",
    "System",
    "VRM MOS",
    "PCH",
    "CPU Socket",
    "PCIe x1",
    "M2_1",
];

/// One voltage input: where it lives and how it is scaled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoltageChannel {
    pub label: &'static str,
    /// Index into the voltage register block, not the channel number
    pub register: usize,
    pub multiplier: i32,
}

const fn vin(label: &'static str, register: usize, multiplier: i32) -> VoltageChannel {
    VoltageChannel {
        label,
        register,
        multiplier,
    }
}

pub const VOLTAGE_CHANNELS: [VoltageChannel; NUM_REG_VOLTAGE] = [
    vin("+12V", 0, 12),
    vin("+5V", 1, 5),
    vin("+3.3V", 11, 1),
    vin("CPU SoC", 2, 1),
    vin("CPU Vcore", 4, 1),
    vin("CPU 1P8", 9, 1),
    vin("CPU VDDP", 10, 1),
    vin("DRAM", 3, 2),
    vin("Chipset", 5, 1),
    vin("CPU SA", 6, 1),
    vin("Voltage #2", 7, 1),
    vin("AVCC3", 8, 1),
    vin("AVSB", 12, 1),
    vin("VBat", 13, 1),
];

/// Who drives a fan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
pub enum ControlMode {
    /// Host writes the duty cycle
    Manual = 1,
    /// Firmware fan curve
    #[default]
    Firmware = 2,
}

impl TryFrom<u32> for ControlMode {
    type Error = EcError;

    fn try_from(value: u32) -> EcResult<Self> {
        <ControlMode as FromPrimitive>::from_u32(value)
            .ok_or_else(|| EcError::InvalidArgument(format!("Invalid fan control mode {}", value)))
    }
}

impl ControlMode {
    fn from_mode_register(register: u8, channel: usize) -> Self {
        if register & (1 << channel) != 0 {
            ControlMode::Manual
        } else {
            ControlMode::Firmware
        }
    }
}

/// Current value plus the extremes seen since the first read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading<T> {
    pub current: T,
    pub min: T,
    pub max: T,
}

impl<T: Copy + Ord> Reading<T> {
    pub fn seed(value: T) -> Self {
        Reading {
            current: value,
            min: value,
            max: value,
        }
    }

    pub fn update(&mut self, value: T) {
        self.current = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }
}

fn record<T: Copy + Ord>(slot: &mut Option<Reading<T>>, value: T) {
    match slot {
        Some(reading) => reading.update(value),
        None => *slot = Some(Reading::seed(value)),
    }
}

/// Milli-degrees Celsius from the signed whole degree register and the
/// half degree flag in bit 7 of the register after it
pub fn decode_temperature(whole: u8, fraction: u8) -> i32 {
    let half = i32::from(fraction >> 7);
    i32::from(whole as i8) * 1000 + half * 500
}

/// 12 bit value from the high byte and the upper nibble of the low byte
pub fn decode_voltage(high: u8, low: u8, multiplier: i32) -> i32 {
    (i32::from(high) * 16 + i32::from(low >> 4)) * multiplier
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorSnapshot {
    pub voltage: [Option<Reading<i32>>; NUM_REG_VOLTAGE],
    /// Milli-degrees Celsius
    pub temperature: [Option<Reading<i32>>; NUM_REG_TEMP],
    /// RPM, `None` for fans that are not connected
    pub fan: [Option<Reading<u16>>; NUM_REG_FAN],
    pub fan_min: [u16; NUM_REG_FAN],
    pub pwm: [u8; NUM_REG_PWM],
    pub mode: [ControlMode; NUM_REG_PWM],
}

pub struct SensorCache {
    snapshot: SensorSnapshot,
    last_updated: Option<Instant>,
    valid: bool,
    have_fan: u8,
    have_pwm: u8,
}

impl SensorCache {
    pub fn new(have_fan: u8, have_pwm: u8) -> Self {
        SensorCache {
            snapshot: SensorSnapshot::default(),
            last_updated: None,
            valid: false,
            have_fan,
            have_pwm,
        }
    }

    pub fn snapshot(&self) -> &SensorSnapshot {
        &self.snapshot
    }

    pub fn have_fan(&self) -> u8 {
        self.have_fan
    }

    pub fn have_pwm(&self) -> u8 {
        self.have_pwm
    }

    pub fn set_present(&mut self, have_fan: u8, have_pwm: u8) {
        self.have_fan = have_fan;
        self.have_pwm = have_pwm;
    }

    pub fn needs_refresh(&self, now: Instant) -> bool {
        match self.last_updated {
            Some(last) if self.valid => now.saturating_duration_since(last) >= STALE_AFTER,
            _ => true,
        }
    }

    /// Next read goes to hardware, min and max are kept
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Re-read every sensor if the cache is stale. Returns whether hardware was read.
    pub fn refresh<P: PortIo>(
        &mut self,
        ec: &EcSpace<P>,
        map: &FanChannelMap,
        manual_voltage: bool,
        now: Instant,
    ) -> bool {
        if !self.needs_refresh(now) {
            return false;
        }
        debug!("Refreshing sensor cache");

        for (i, channel) in VOLTAGE_CHANNELS.iter().enumerate() {
            let (register, multiplier) = if manual_voltage {
                (i, 1)
            } else {
                (channel.register, channel.multiplier)
            };
            let address = reg_voltage(register);
            let value = decode_voltage(ec.read(address), ec.read(address + 1), multiplier);
            record(&mut self.snapshot.voltage[i], value);
        }

        for i in 0..NUM_REG_TEMP {
            let address = reg_temp(i);
            let value = decode_temperature(ec.read(address), ec.read(address + 1));
            record(&mut self.snapshot.temperature[i], value);
        }

        for (i, channel) in map.channels().iter().enumerate() {
            if self.have_fan & (1 << i) == 0 {
                continue;
            }
            record(&mut self.snapshot.fan[i], ec.read16(channel.rpm));
            self.snapshot.fan_min[i] = ec.read16(reg_fan_min(i));
        }

        let mode = ec.read(REG_FAN_CTRL_MODE);
        for (i, channel) in map.channels().iter().enumerate() {
            if self.have_pwm & (1 << i) == 0 {
                continue;
            }
            self.snapshot.pwm[i] = ec.read(channel.pwm_read);
            self.snapshot.mode[i] = ControlMode::from_mode_register(mode, i);
        }

        self.last_updated = Some(now);
        self.valid = true;
        true
    }

    /// Re-read duty and control mode of one fan, regardless of cache age
    pub fn read_pwm<P: PortIo>(&mut self, ec: &EcSpace<P>, map: &FanChannelMap, index: usize) {
        let Some(channel) = map.channel(index) else {
            return;
        };
        self.snapshot.pwm[index] = ec.read(channel.pwm_read);
        self.snapshot.mode[index] =
            ControlMode::from_mode_register(ec.read(REG_FAN_CTRL_MODE), index);
    }
}
