//! One NCT6687 EC: sensor cache, fan control and lifecycle
//!
//! All sensor refreshes and fan control sessions run under one update lock, so
//! a reader never sees a channel in the middle of a handshake and two writers
//! never share the engine status register.

use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::Instant;

use crate::board::{BoardVariant, FanChannelMap};
use crate::config::DeviceConfig;
use crate::ec::registers::*;
use crate::ec::{EcError, EcResult, EcSpace, PortIo};
use crate::fan::{FanRestoreRecord, FanSession};
use crate::handshake::{Delay, OsDelay};
use crate::sensors::{
    ControlMode, SensorCache, SensorSnapshot, TEMPERATURE_LABELS, VOLTAGE_CHANNELS,
};

/// All PWM outputs are always present
const ALL_PWM: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareInfo {
    pub version_hi: u8,
    pub version_lo: u8,
    pub build_year: u8,
    pub build_month: u8,
    pub build_day: u8,
}

impl std::fmt::Display for FirmwareInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} build {:02}/{:02}/{:02}",
            self.version_hi, self.version_lo, self.build_month, self.build_day, self.build_year
        )
    }
}

struct DeviceState {
    cache: SensorCache,
    restore: [FanRestoreRecord; NUM_REG_PWM],
    /// Saved across low power transitions
    hwm_cfg: Option<u8>,
}

pub struct Nct6687<P, D = OsDelay> {
    ec: EcSpace<P>,
    delay: D,
    config: RwLock<DeviceConfig>,
    state: Mutex<DeviceState>,
}

impl<P: PortIo> Nct6687<P, OsDelay> {
    pub fn new(ports: P, base: u16, config: DeviceConfig) -> Self {
        Self::with_delay(ports, base, config, OsDelay)
    }
}

impl<P: PortIo, D: Delay> Nct6687<P, D> {
    pub fn with_delay(ports: P, base: u16, config: DeviceConfig, delay: D) -> Self {
        Nct6687 {
            ec: EcSpace::new(ports, base),
            delay,
            config: RwLock::new(config),
            state: Mutex::new(DeviceState {
                cache: SensorCache::new(0, ALL_PWM),
                restore: [FanRestoreRecord::default(); NUM_REG_PWM],
                hwm_cfg: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        // No critical section leaves the state half updated
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn ec(&self) -> &EcSpace<P> {
        &self.ec
    }

    /// Start monitoring, detect fans and take the first readings
    pub fn probe(&self) {
        debug!("Probing NCT6687 at {:#X}", self.ec.base());
        self.init_device();
        self.setup_fans();
        self.refresh_at(Instant::now());

        let info = self.firmware_info();
        info!(
            "{} EC firmware version {}",
            self.config().kind.name(),
            info
        );
    }

    /// Start hardware monitoring and enable the voltage inputs
    pub fn init_device(&self) {
        let _state = self.state();
        let cfg = self.ec.read(HWM_CFG);
        if cfg & HWM_CFG_START == 0 {
            debug!("Starting hardware monitoring, HWM_CFG was {:#04X}", cfg);
            self.ec.write(HWM_CFG, cfg | HWM_CFG_START);
        }
        for (address, value) in SIO_VOLTAGE_ENABLE {
            self.ec.write(address, value);
        }
    }

    /// A fan is present if it is spinning right now
    pub fn setup_fans(&self) {
        let map = self.channel_map();
        let mut have_fan = 0u8;
        for (i, channel) in map.channels().iter().enumerate() {
            let rpm = self.ec.read16(channel.rpm);
            debug!("fan{}: {} rpm at probe", i, rpm);
            if rpm != 0 {
                have_fan |= 1 << i;
            }
        }
        let mut state = self.state();
        state.cache.set_present(have_fan, ALL_PWM);
        state.cache.invalidate();
    }

    pub fn have_fan(&self, channel: usize) -> bool {
        channel < NUM_REG_FAN && self.state().cache.have_fan() & (1 << channel) != 0
    }

    pub fn have_pwm(&self, channel: usize) -> bool {
        channel < NUM_REG_PWM && self.state().cache.have_pwm() & (1 << channel) != 0
    }

    pub fn config(&self) -> DeviceConfig {
        *self.config.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the configuration. Sessions already running keep their copy.
    pub fn override_config(&self, config: DeviceConfig) {
        info!("Configuration changed to {:?}", config);
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
    }

    pub fn select_variant(&self, variant: BoardVariant) {
        let mut config = self.config();
        config.variant = variant;
        self.override_config(config);
    }

    pub fn channel_map(&self) -> FanChannelMap {
        FanChannelMap::new(self.config().variant)
    }

    /// Sensor readings, at most [`STALE_AFTER`](crate::sensors::STALE_AFTER) old
    pub fn update(&self) -> SensorSnapshot {
        self.refresh_at(Instant::now())
    }

    pub fn refresh_at(&self, now: Instant) -> SensorSnapshot {
        let config = self.config();
        let map = FanChannelMap::new(config.variant);
        let mut state = self.state();
        state
            .cache
            .refresh(&self.ec, &map, config.manual_voltage, now);
        state.cache.snapshot().clone()
    }

    pub fn voltage_label(&self, channel: usize) -> Option<&'static str> {
        VOLTAGE_CHANNELS.get(channel).map(|c| c.label)
    }

    pub fn temperature_label(&self, channel: usize) -> Option<&'static str> {
        TEMPERATURE_LABELS.get(channel).copied()
    }

    pub fn fan_label(&self, channel: usize) -> Option<&'static str> {
        self.channel_map().channel(channel).map(|c| c.label)
    }

    fn check_channel(channel: usize) -> EcResult<()> {
        if channel >= NUM_REG_PWM {
            return Err(EcError::InvalidArgument(format!(
                "Unknown fan channel {}",
                channel
            )));
        }
        Ok(())
    }

    /// Run `op` on a session for `channel` under the update lock, then re-read
    /// the channel's duty and mode into the cache
    fn with_session<F>(&self, channel: usize, op: F) -> EcResult<()>
    where
        F: FnOnce(&FanSession<'_, P, D>, &mut FanRestoreRecord),
    {
        Self::check_channel(channel)?;
        let mut state = self.state();
        let config = self.config();
        let session = FanSession::new(&self.ec, &self.delay, config, channel)?;
        op(&session, &mut state.restore[channel]);
        state
            .cache
            .read_pwm(&self.ec, &FanChannelMap::new(config.variant), channel);
        Ok(())
    }

    /// Switch `channel` to manual control and run it at `duty` (0..=255)
    ///
    /// Fails only on invalid input. Handshake problems are logged, the result
    /// can be checked by reading back the duty and control mode.
    pub fn set_manual_duty(&self, channel: usize, duty: u32) -> EcResult<()> {
        let duty = u8::try_from(duty)
            .map_err(|_| EcError::InvalidArgument(format!("Duty {} out of range", duty)))?;
        self.with_session(channel, |session, record| {
            session.set_manual_duty(record, duty)
        })
    }

    pub fn set_control_mode(&self, channel: usize, mode: ControlMode) -> EcResult<()> {
        self.with_session(channel, |session, record| {
            session.set_control_mode(record, mode)
        })
    }

    /// Like [`Self::set_control_mode`] with the numeric value of a `pwm_enable` attribute
    pub fn set_pwm_enable(&self, channel: usize, value: u32) -> EcResult<()> {
        let mode = ControlMode::try_from(value)?;
        self.set_control_mode(channel, mode)
    }

    pub fn pwm(&self, channel: usize) -> EcResult<(u8, ControlMode)> {
        Self::check_channel(channel)?;
        let snapshot = self.update();
        Ok((snapshot.pwm[channel], snapshot.mode[channel]))
    }

    pub fn restore_needed(&self, channel: usize) -> bool {
        channel < NUM_REG_PWM && self.state().restore[channel].restore_needed
    }

    /// Give `channel` back to the firmware settings from before the first manual write
    pub fn revert(&self, channel: usize) -> EcResult<()> {
        self.with_session(channel, |session, record| session.restore(record))
    }

    /// Revert every channel that was switched to manual
    pub fn restore_all(&self) -> EcResult<()> {
        for channel in 0..NUM_REG_PWM {
            if self.restore_needed(channel) {
                self.revert(channel)?;
            }
        }
        Ok(())
    }

    /// Revert all channels before the device goes away. Calling it again does nothing.
    pub fn teardown(&self) -> EcResult<()> {
        debug!("Tearing down NCT6687 at {:#X}", self.ec.base());
        self.restore_all()
    }

    /// Remember the monitoring configuration before a low power transition
    pub fn save_config_byte(&self) {
        let mut state = self.state();
        state.hwm_cfg = Some(self.ec.read(HWM_CFG));
    }

    /// Write back the monitoring configuration and force a full re-read
    pub fn restore_config_byte(&self) {
        let mut state = self.state();
        if let Some(cfg) = state.hwm_cfg {
            self.ec.write(HWM_CFG, cfg);
        }
        state.cache.invalidate();
    }

    pub fn invalidate_cache(&self) {
        self.state().cache.invalidate();
    }

    pub fn firmware_info(&self) -> FirmwareInfo {
        FirmwareInfo {
            version_hi: self.ec.read(REG_VERSION_HI),
            version_lo: self.ec.read(REG_VERSION_LO),
            build_year: self.ec.read(REG_BUILD_YEAR),
            build_month: self.ec.read(REG_BUILD_MONTH),
            build_day: self.ec.read(REG_BUILD_DAY),
        }
    }

    pub fn dump_page(&self, page: u8) -> Vec<u8> {
        let _state = self.state();
        self.ec.read_page(page)
    }
}
