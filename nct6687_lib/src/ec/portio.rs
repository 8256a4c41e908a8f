//! Direct port I/O. Works as root on Linux, unless blocked by kernel lockdown.

use hwio::{Io, Pio};
#[cfg(target_os = "linux")]
use libc::ioperm;
#[cfg(target_os = "linux")]
use nix::unistd::Uid;
use spin::Mutex;

use super::registers::{EC_SPACE_PAGE_REGISTER_OFFSET, EC_SPACE_PORT_COUNT};
use super::{EcError, EcResult, PortIo};

lazy_static! {
    /// Port ranges (start, length) that ioperm already granted
    static ref GRANTED: Mutex<Vec<(u16, u16)>> = Mutex::new(vec![]);
}

/// Request access to `len` ports starting at `start`
///
/// Already granted ranges are not requested again.
pub fn request_ports(start: u16, len: u16) -> EcResult<()> {
    let mut granted = GRANTED.lock();
    if granted
        .iter()
        .any(|(s, l)| *s <= start && start + len <= *s + *l)
    {
        return Ok(());
    }

    // In Linux userspace has to first request access to ioports
    #[cfg(target_os = "linux")]
    {
        if !Uid::effective().is_root() {
            error!("Must be root to use port based I/O for EC communication.");
            return Err(EcError::DeviceError("Not running as root".to_string()));
        }

        let res = unsafe { ioperm(start as u64, len as u64, 1) };
        if res != 0 {
            error!("ioperm failed. portio driver is likely block by Linux kernel lockdown mode");
            return Err(EcError::DeviceError(format!(
                "ioperm({:#X}, {}) failed with {}",
                start, len, res
            )));
        }
    }

    debug!("Granted access to ports {:#X}..{:#X}", start, start + len);
    granted.push((start, len));
    Ok(())
}

/// Request the EC space window of a chip at `base`
pub fn request_ec_space(base: u16) -> EcResult<()> {
    request_ports(base + EC_SPACE_PAGE_REGISTER_OFFSET, EC_SPACE_PORT_COUNT)
}

/// Port access through `in`/`out` instructions
///
/// The caller must have requested the ports it touches with [`request_ports`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PortIoDriver;

impl PortIo for PortIoDriver {
    fn inb(&self, port: u16) -> u8 {
        Pio::<u8>::new(port).read()
    }

    fn outb(&self, port: u16, value: u8) {
        Pio::<u8>::new(port).write(value)
    }
}
