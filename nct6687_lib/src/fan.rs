//! Manual fan control on one channel
//!
//! A session remembers what the firmware had configured before the first manual
//! write, so it can be handed back later. Every duty write goes through the
//! [`FanConfigHandshake`].

use crate::board::{BoardVariant, FanChannel, FanChannelMap, FIRST_SYSTEM_FAN};
use crate::config::DeviceConfig;
use crate::ec::registers::{REG_FAN_CTRL_MODE, REG_FAN_PWM_COMMAND};
use crate::ec::{EcError, EcResult, EcSpace, PortIo};
use crate::handshake::{CommitReport, Delay, FanConfigHandshake};
use crate::sensors::ControlMode;

/// Number of points of the firmware fan curve
pub const CURVE_POINTS: u16 = 7;
/// Distance between the duty registers of two curve points
pub const CURVE_STRIDE: u16 = 2;

/// Firmware settings of one channel from before it was first switched to manual
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanRestoreRecord {
    pub saved_mode_bit: bool,
    pub saved_pwm_command: u8,
    pub restore_needed: bool,
}

/// How a duty value reaches the fan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    /// One write to the pwm register
    Single,
    /// The same duty to every curve point, so temperature no longer matters
    FlatCurve,
}

impl WriteStrategy {
    pub fn for_channel(config: &DeviceConfig, index: usize) -> Self {
        if config.brute_force
            && config.variant == BoardVariant::AlternateA
            && index >= FIRST_SYSTEM_FAN
        {
            WriteStrategy::FlatCurve
        } else {
            WriteStrategy::Single
        }
    }
}

/// Control operations on one fan channel
///
/// Resolves the channel's registers and the write strategy once, from the
/// configuration at the time the session is opened.
pub struct FanSession<'a, P, D> {
    ec: &'a EcSpace<P>,
    delay: &'a D,
    config: DeviceConfig,
    index: usize,
    channel: FanChannel,
    strategy: WriteStrategy,
}

impl<'a, P: PortIo, D: Delay> FanSession<'a, P, D> {
    pub fn new(
        ec: &'a EcSpace<P>,
        delay: &'a D,
        config: DeviceConfig,
        index: usize,
    ) -> EcResult<Self> {
        let channel = FanChannelMap::new(config.variant)
            .channel(index)
            .ok_or_else(|| EcError::InvalidArgument(format!("Unknown fan channel {}", index)))?;
        Ok(FanSession {
            ec,
            delay,
            config,
            index,
            channel,
            strategy: WriteStrategy::for_channel(&config, index),
        })
    }

    pub fn channel(&self) -> FanChannel {
        self.channel
    }

    pub fn strategy(&self) -> WriteStrategy {
        self.strategy
    }

    fn mode_bit(&self) -> u8 {
        1 << self.index
    }

    /// Remember the firmware settings, unless already remembered
    pub fn save(&self, record: &mut FanRestoreRecord) {
        if record.restore_needed {
            return;
        }
        let mode = self.ec.read(REG_FAN_CTRL_MODE);
        *record = FanRestoreRecord {
            saved_mode_bit: mode & self.mode_bit() != 0,
            saved_pwm_command: self.ec.read(REG_FAN_PWM_COMMAND),
            restore_needed: true,
        };
        debug!("fan{}: saved {:?}", self.index, record);
    }

    fn set_mode_bit(&self, manual: bool) {
        let mode = self.ec.read(REG_FAN_CTRL_MODE);
        let mode = if manual {
            mode | self.mode_bit()
        } else {
            mode & !self.mode_bit()
        };
        self.ec.write(REG_FAN_CTRL_MODE, mode);
    }

    fn write_value(&self, duty: u8) {
        match self.strategy {
            WriteStrategy::Single => self.ec.write(self.channel.pwm_write, duty),
            WriteStrategy::FlatCurve => {
                if self.ec.read(self.channel.pwm_read) == duty {
                    debug!("fan{}: already at {}", self.index, duty);
                    return;
                }
                for point in 0..CURVE_POINTS {
                    self.ec
                        .write(self.channel.pwm_write + point * CURVE_STRIDE, duty);
                }
            }
        }
    }

    /// Write a duty value inside one handshake
    ///
    /// Nothing is written if the EC does not grant access. The commit runs
    /// either way, since access may be granted just after `begin` gave up.
    pub fn write_duty(&self, duty: u8) -> EcResult<CommitReport> {
        let mut handshake =
            FanConfigHandshake::new(self.ec, self.delay, self.config.kind, self.index);
        let begun = handshake.begin();
        if begun.is_ok() {
            self.write_value(duty);
        }
        let report = handshake.commit();
        begun?;
        Ok(report)
    }

    /// Take the fan away from the firmware and run it at `duty`
    ///
    /// The channel stays in manual mode even if the EC never granted access to
    /// the duty registers.
    pub fn set_manual_duty(&self, record: &mut FanRestoreRecord, duty: u8) {
        self.save(record);
        self.set_mode_bit(true);
        if let Err(err) = self.write_duty(duty) {
            warn!("fan{}: duty {} not written: {}", self.index, duty, err);
        }
    }

    pub fn set_control_mode(&self, record: &mut FanRestoreRecord, mode: ControlMode) {
        self.save(record);
        self.set_mode_bit(mode == ControlMode::Manual);
    }

    /// Hand the channel back to whatever the firmware had configured
    ///
    /// Does nothing if there is nothing to restore.
    pub fn restore(&self, record: &mut FanRestoreRecord) {
        if !record.restore_needed {
            return;
        }
        self.set_mode_bit(record.saved_mode_bit);
        if let Err(err) = self.write_duty(record.saved_pwm_command) {
            warn!("fan{}: failed to restore duty: {}", self.index, err);
        }
        record.restore_needed = false;
        debug!(
            "fan{}: restored mode bit {} and duty {}",
            self.index, record.saved_mode_bit, record.saved_pwm_command
        );
    }
}
