//! In-memory EC for tests
//!
//! Decodes the page/index/data protocol into a flat 64 KiB register file and
//! simulates the fan configuration engine behind the command register.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::registers::*;
use super::PortIo;
use crate::handshake::{Delay, EngineStatus};

pub const BASE: u16 = 0x0A20;

/// How the simulated fan configuration engine reacts to commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    /// Grants access on REQ, acknowledges and locks on the done code
    Responsive,
    /// Keeps REQ pending forever
    Wedged,
    /// Locked and in the configuration phase, ignores every command
    StuckInPhase,
    /// Like `Responsive` but flags the configuration as invalid
    Rejecting,
    /// Grants access but never acknowledges the done code
    Silent,
}

struct State {
    regs: Vec<u8>,
    page: u8,
    index: u8,
    page_armed: bool,
    writes: Vec<(u16, u8)>,
    engine: Engine,
}

impl State {
    fn address(&self) -> u16 {
        u16::from_be_bytes([self.page, self.index])
    }

    fn write(&mut self, address: u16, value: u8) {
        self.writes.push((address, value));
        if address == REG_FAN_PWM_COMMAND {
            let status = EngineStatus::from_bits_retain(self.regs[address as usize]);
            if let Some(next) = self.engine_response(status, value) {
                self.regs[address as usize] = next.bits();
            }
        } else {
            self.regs[address as usize] = value;
        }
    }

    fn engine_response(&self, status: EngineStatus, command: u8) -> Option<EngineStatus> {
        let request = command == FAN_CFG_REQ;
        match self.engine {
            Engine::StuckInPhase => None,
            Engine::Wedged if request => Some(EngineStatus::REQ),
            Engine::Wedged => None,
            _ if request => Some(EngineStatus::PHASE),
            Engine::Silent => None,
            Engine::Responsive if status.is_unlocked() => {
                Some(EngineStatus::LOCK | EngineStatus::CHECK_DONE)
            }
            Engine::Rejecting if status.is_unlocked() => {
                Some(EngineStatus::LOCK | EngineStatus::CHECK_DONE | EngineStatus::INVALID)
            }
            _ => None,
        }
    }
}

pub struct MockEc {
    state: Mutex<State>,
}

impl Default for MockEc {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEc {
    pub fn new() -> Self {
        let mut regs = vec![0; 0x10000];
        regs[REG_FAN_PWM_COMMAND as usize] = EngineStatus::LOCK.bits();
        MockEc {
            state: Mutex::new(State {
                regs,
                page: 0,
                index: 0,
                page_armed: false,
                writes: vec![],
                engine: Engine::Responsive,
            }),
        }
    }

    /// Set a register without recording a write
    pub fn set(&self, address: u16, value: u8) {
        self.state.lock().unwrap().regs[address as usize] = value;
    }

    pub fn set16(&self, address: u16, value: u16) {
        let [high, low] = value.to_be_bytes();
        self.set(address, high);
        self.set(address + 1, low);
    }

    pub fn get(&self, address: u16) -> u8 {
        self.state.lock().unwrap().regs[address as usize]
    }

    /// Every data port write so far, in order
    pub fn writes(&self) -> Vec<(u16, u8)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn writes_to(&self, address: u16) -> Vec<u8> {
        self.writes()
            .into_iter()
            .filter(|(a, _)| *a == address)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    pub fn set_engine(&self, engine: Engine) {
        let mut state = self.state.lock().unwrap();
        state.engine = engine;
        if engine == Engine::StuckInPhase {
            state.regs[REG_FAN_PWM_COMMAND as usize] =
                (EngineStatus::LOCK | EngineStatus::PHASE).bits();
        }
    }
}

impl PortIo for MockEc {
    fn inb(&self, port: u16) -> u8 {
        let state = self.state.lock().unwrap();
        match port.wrapping_sub(BASE) {
            EC_SPACE_DATA_REGISTER_OFFSET => state.regs[state.address() as usize],
            _ => 0xFF,
        }
    }

    fn outb(&self, port: u16, value: u8) {
        let mut state = self.state.lock().unwrap();
        match port.wrapping_sub(BASE) {
            EC_SPACE_PAGE_REGISTER_OFFSET => {
                if state.page_armed {
                    state.page = value;
                    state.page_armed = false;
                } else if value == EC_SPACE_PAGE_SELECT {
                    state.page_armed = true;
                }
            }
            EC_SPACE_INDEX_REGISTER_OFFSET => state.index = value,
            EC_SPACE_DATA_REGISTER_OFFSET => {
                let address = state.address();
                state.write(address, value);
            }
            _ => {}
        }
    }
}

/// Counts sleeps instead of sleeping
#[derive(Default)]
pub struct NoDelay {
    sleeps: AtomicUsize,
}

impl NoDelay {
    pub fn sleeps(&self) -> usize {
        self.sleeps.load(Ordering::SeqCst)
    }
}

impl Delay for NoDelay {
    fn sleep_ms(&self, _ms: u64) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
    }
}
