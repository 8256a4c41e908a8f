//! Request/commit protocol that guards writes to the fan configuration registers
//!
//! The EC owns the fan registers until the host requests the configuration phase.
//! Only after the EC clears LOCK and sets PHASE may new values be written. Writing
//! the done code hands the registers back and the EC acknowledges with CHECK_DONE.

use bitflags::bitflags;

use crate::board::ChipKind;
use crate::ec::registers::{FAN_CFG_DONE, FAN_CFG_REQ, REG_FAN_PWM_COMMAND};
use crate::ec::{EcSpace, PortIo};
use crate::os_specific;

/// Upper bound of status polls per phase
pub const POLL_ITERATIONS: u32 = 1000;
/// Pause between two status polls
pub const POLL_INTERVAL_MS: u64 = 1;

bitflags! {
    /// Fan configuration engine status, as read back from the command register
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EngineStatus: u8 {
        /// Fan registers are not accessible
        const LOCK = 0x01;
        /// EC is in the configuration phase
        const PHASE = 0x02;
        /// EC rejected the new configuration
        const INVALID = 0x10;
        /// EC accepted the new configuration
        const CHECK_DONE = 0x20;
        /// Host is done writing
        const DONE = FAN_CFG_DONE;
        /// Host requests the configuration phase
        const REQ = FAN_CFG_REQ;
    }
}

impl EngineStatus {
    /// Register writes are safe
    pub fn is_unlocked(self) -> bool {
        !self.contains(Self::LOCK) && self.contains(Self::PHASE)
    }

    /// Neither in a configuration phase nor requesting one
    pub fn is_idle(self) -> bool {
        !self.intersects(Self::PHASE | Self::REQ)
    }
}

/// Sleep between polls
pub trait Delay: Send + Sync {
    fn sleep_ms(&self, ms: u64);
}

/// Sleeps on the OS scheduler
#[derive(Debug, Default, Clone, Copy)]
pub struct OsDelay;

impl Delay for OsDelay {
    fn sleep_ms(&self, ms: u64) {
        os_specific::sleep(ms * 1000)
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeFailure {
    #[error("fan configuration engine stuck in configuration phase")]
    StuckInConfigPhase,
    #[error("failed to gain access to the fan configuration registers")]
    AccessNotGranted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// EC owns the registers
    Idle,
    /// REQ written, waiting for the EC
    Requested,
    /// Registers may be written
    Unlocked,
    /// Done code written, waiting for CHECK_DONE
    Committing,
    /// EC acknowledged and locked the registers again
    Checked,
}

/// What happened while handing the registers back. Nothing in here is fatal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommitReport {
    /// Registers were already locked, no done code was written
    pub already_locked: bool,
    /// CHECK_DONE was seen before the timeout
    pub acknowledged: bool,
    /// INVALID was set in the final status
    pub rejected: bool,
    /// LOCK was still clear in the final status
    pub still_accessible: bool,
}

/// One pass of the handshake for one fan channel
pub struct FanConfigHandshake<'a, P, D> {
    ec: &'a EcSpace<P>,
    delay: &'a D,
    kind: ChipKind,
    channel: usize,
    state: HandshakeState,
}

impl<'a, P: PortIo, D: Delay> FanConfigHandshake<'a, P, D> {
    pub fn new(ec: &'a EcSpace<P>, delay: &'a D, kind: ChipKind, channel: usize) -> Self {
        FanConfigHandshake {
            ec,
            delay,
            kind,
            channel,
            state: HandshakeState::Idle,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Always read fresh from the EC, never cached
    pub fn status(&self) -> EngineStatus {
        EngineStatus::from_bits_retain(self.ec.read(REG_FAN_PWM_COMMAND))
    }

    fn poll_until(&self, ready: impl Fn(EngineStatus) -> bool) -> Option<EngineStatus> {
        for _ in 0..POLL_ITERATIONS {
            let status = self.status();
            if ready(status) {
                return Some(status);
            }
            self.delay.sleep_ms(POLL_INTERVAL_MS);
        }
        None
    }

    /// Enter the configuration phase
    ///
    /// On error the fan registers must not be written.
    pub fn begin(&mut self) -> Result<(), HandshakeFailure> {
        let status = self.status();
        if status.is_unlocked() {
            warn!(
                "fan{}: configuration registers already unlocked ({:?})",
                self.channel, status
            );
            self.state = HandshakeState::Unlocked;
            return Ok(());
        }

        if self.poll_until(EngineStatus::is_idle).is_none() {
            warn!(
                "fan{}: EC stuck in configuration phase ({:?})",
                self.channel,
                self.status()
            );
            return Err(HandshakeFailure::StuckInConfigPhase);
        }

        self.ec.write(REG_FAN_PWM_COMMAND, FAN_CFG_REQ);
        self.state = HandshakeState::Requested;

        match self.poll_until(EngineStatus::is_unlocked) {
            Some(status) => {
                debug!("fan{}: access granted ({:?})", self.channel, status);
                self.state = HandshakeState::Unlocked;
                Ok(())
            }
            None => {
                warn!(
                    "fan{}: failed to gain access to configuration registers ({:?})",
                    self.channel,
                    self.status()
                );
                Err(HandshakeFailure::AccessNotGranted)
            }
        }
    }

    fn done_code(&self) -> u8 {
        match self.kind {
            ChipKind::Nct6686 => 0x00,
            ChipKind::Nct6687 => FAN_CFG_DONE,
        }
    }

    /// Hand the registers back to the EC
    ///
    /// The new values are already written at this point, so every problem is
    /// only logged.
    pub fn commit(&mut self) -> CommitReport {
        let mut report = CommitReport::default();

        let status = self.status();
        if !status.is_unlocked() {
            warn!(
                "fan{}: configuration registers already locked ({:?})",
                self.channel, status
            );
            report.already_locked = true;
            self.state = HandshakeState::Idle;
            return report;
        }

        self.ec.write(REG_FAN_PWM_COMMAND, self.done_code());
        self.state = HandshakeState::Committing;

        if self
            .poll_until(|s| s.contains(EngineStatus::CHECK_DONE))
            .is_some()
        {
            report.acknowledged = true;
            self.state = HandshakeState::Checked;
        } else {
            warn!(
                "fan{}: failed waiting for the EC to accept the configuration",
                self.channel
            );
        }

        let status = self.status();
        if status.contains(EngineStatus::INVALID) {
            warn!("fan{}: EC rejected the configuration", self.channel);
            report.rejected = true;
        }
        if !status.contains(EngineStatus::LOCK) {
            warn!(
                "fan{}: configuration registers still accessible ({:?})",
                self.channel, status
            );
            report.still_accessible = true;
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec::mock::{Engine, MockEc, NoDelay, BASE};

    fn ec(engine: Engine) -> EcSpace<MockEc> {
        let mock = MockEc::new();
        mock.set_engine(engine);
        EcSpace::new(mock, BASE)
    }

    #[test]
    fn status_predicates() {
        assert!(EngineStatus::PHASE.is_unlocked());
        assert!(!(EngineStatus::PHASE | EngineStatus::LOCK).is_unlocked());
        assert!(EngineStatus::LOCK.is_idle());
        assert!(!EngineStatus::REQ.is_idle());
        assert!(!EngineStatus::PHASE.is_idle());
    }

    #[test]
    fn begin_and_commit_on_responsive_engine() {
        let ec = ec(Engine::Responsive);
        let delay = NoDelay::default();
        let mut hs = FanConfigHandshake::new(&ec, &delay, ChipKind::Nct6687, 0);

        assert_eq!(hs.begin(), Ok(()));
        assert_eq!(hs.state(), HandshakeState::Unlocked);
        assert_eq!(ec.ports().writes_to(REG_FAN_PWM_COMMAND), vec![FAN_CFG_REQ]);

        let report = hs.commit();
        assert_eq!(hs.state(), HandshakeState::Checked);
        assert!(report.acknowledged);
        assert!(!report.rejected);
        assert!(!report.still_accessible);
        assert_eq!(
            ec.ports().writes_to(REG_FAN_PWM_COMMAND),
            vec![FAN_CFG_REQ, FAN_CFG_DONE]
        );
        assert_eq!(delay.sleeps(), 0);
    }

    #[test]
    fn begin_fast_path_when_already_unlocked() {
        let ec = ec(Engine::Responsive);
        ec.ports().set(REG_FAN_PWM_COMMAND, EngineStatus::PHASE.bits());
        let delay = NoDelay::default();
        let mut hs = FanConfigHandshake::new(&ec, &delay, ChipKind::Nct6687, 1);

        assert_eq!(hs.begin(), Ok(()));
        assert!(ec.ports().writes().is_empty());
    }

    #[test]
    fn begin_times_out_without_grant() {
        let ec = ec(Engine::Wedged);
        let delay = NoDelay::default();
        let mut hs = FanConfigHandshake::new(&ec, &delay, ChipKind::Nct6687, 2);

        assert_eq!(hs.begin(), Err(HandshakeFailure::AccessNotGranted));
        assert_eq!(hs.state(), HandshakeState::Requested);
        assert_eq!(delay.sleeps(), POLL_ITERATIONS as usize);
    }

    #[test]
    fn begin_times_out_when_stuck_in_phase() {
        let ec = ec(Engine::StuckInPhase);
        let delay = NoDelay::default();
        let mut hs = FanConfigHandshake::new(&ec, &delay, ChipKind::Nct6687, 2);

        assert_eq!(hs.begin(), Err(HandshakeFailure::StuckInConfigPhase));
        // Never requested
        assert!(ec.ports().writes().is_empty());
        assert_eq!(delay.sleeps(), POLL_ITERATIONS as usize);
    }

    #[test]
    fn commit_when_already_locked_does_nothing() {
        let ec = ec(Engine::Responsive);
        let delay = NoDelay::default();
        let mut hs = FanConfigHandshake::new(&ec, &delay, ChipKind::Nct6687, 0);

        let report = hs.commit();
        assert!(report.already_locked);
        assert!(ec.ports().writes().is_empty());
        assert_eq!(hs.state(), HandshakeState::Idle);
    }

    #[test]
    fn legacy_chip_commits_with_zero() {
        let ec = ec(Engine::Responsive);
        let delay = NoDelay::default();
        let mut hs = FanConfigHandshake::new(&ec, &delay, ChipKind::Nct6686, 0);

        hs.begin().unwrap();
        assert!(hs.commit().acknowledged);
        assert_eq!(
            ec.ports().writes_to(REG_FAN_PWM_COMMAND),
            vec![FAN_CFG_REQ, 0x00]
        );
    }

    #[test]
    fn commit_reports_rejection() {
        let ec = ec(Engine::Rejecting);
        let delay = NoDelay::default();
        let mut hs = FanConfigHandshake::new(&ec, &delay, ChipKind::Nct6687, 0);

        hs.begin().unwrap();
        let report = hs.commit();
        assert!(report.acknowledged);
        assert!(report.rejected);
        assert!(!report.still_accessible);
    }

    #[test]
    fn commit_without_acknowledge_is_not_fatal() {
        let ec = ec(Engine::Silent);
        let delay = NoDelay::default();
        let mut hs = FanConfigHandshake::new(&ec, &delay, ChipKind::Nct6687, 0);

        hs.begin().unwrap();
        let report = hs.commit();
        assert!(!report.acknowledged);
        assert!(report.still_accessible);
        assert_eq!(hs.state(), HandshakeState::Committing);
        assert_eq!(delay.sleeps(), POLL_ITERATIONS as usize);
    }
}
