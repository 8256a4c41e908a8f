//! Access to the paged register space of the NCT6687 embedded controller
//!
//! - [`portio`]: Real port I/O (Linux/FreeBSD with `ioperm`)
//! - [`EcSpace`]: Page/index/data sequencing on top of any [`PortIo`]

use std::sync::Arc;

use crate::handshake::HandshakeFailure;

#[cfg(test)]
pub mod mock;
#[cfg(feature = "raw_pio")]
pub mod portio;
pub mod registers;
mod transport;

pub use transport::EcSpace;

#[derive(thiserror::Error, Debug)]
pub enum EcError {
    /// Rejected before any hardware access
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// No supported chip answered on any Super-I/O port
    #[error("No supported Nuvoton chip found")]
    NotFound,
    /// Fan configuration engine did not grant access in time
    #[error("Fan configuration handshake failed: {0}")]
    Timeout(#[from] HandshakeFailure),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Device error: {0}")]
    DeviceError(String),
}

pub type EcResult<T> = Result<T, EcError>;

/// Byte wide access to I/O ports
///
/// Implemented by [`portio::PortIoDriver`] for real hardware and by test doubles.
pub trait PortIo: Send + Sync {
    fn inb(&self, port: u16) -> u8;
    fn outb(&self, port: u16, value: u8);
}

impl<T: PortIo + ?Sized> PortIo for Arc<T> {
    fn inb(&self, port: u16) -> u8 {
        (**self).inb(port)
    }
    fn outb(&self, port: u16, value: u8) {
        (**self).outb(port, value)
    }
}
