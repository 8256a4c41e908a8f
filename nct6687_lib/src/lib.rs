//! A library to read sensors and control fans through the embedded controller of
//! Nuvoton NCT6687 Super-I/O chips, as found on many MSI desktop mainboards.
//!
//! The EC exposes a paged 16-bit register space behind a four port window.
//! [`ec::EcSpace`] serializes accesses to that window, [`device::Nct6687`] keeps the
//! sensor cache and drives the fan configuration handshake around every PWM write.

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate log;

pub mod board;
#[cfg(feature = "std")]
pub mod commandline;
pub mod config;
pub mod device;
pub mod ec;
pub mod fan;
pub mod handshake;
pub mod sensors;
#[cfg(feature = "smbios")]
pub mod smbios;
pub mod superio;

mod os_specific;
mod util;

pub mod built_info {
    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}
