//! Discovery of the chip through the Super-I/O configuration ports
//!
//! Finds the chip kind and the base address of its hardware monitor.

use crate::board::ChipKind;
use crate::ec::{EcError, EcResult, PortIo};
use crate::handshake::Delay;

/// Configuration ports to try, in order
pub const SIO_PORTS: [u16; 2] = [0x2E, 0x4E];

const SIO_REG_LDSEL: u8 = 0x07;
const SIO_REG_DEVID: u8 = 0x20;
const SIO_REG_DEVREVISION: u8 = 0x21;
const SIO_REG_ENABLE: u8 = 0x30;
const SIO_REG_ADDR: u8 = 0x60;

/// Hardware monitor logical device
const NCT6687_LD_HWM: u8 = 0x0B;

const SIO_NCT6687_ID: u16 = 0xD592;
const SIO_NCT6686_ID: u16 = 0xD440;

/// The base address is read twice, this far apart, and must not change
const ADDRESS_SETTLE_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipInfo {
    pub kind: ChipKind,
    pub sio_port: u16,
    /// Hardware monitor base address, the EC space window starts 4 ports above
    pub base_address: u16,
}

/// Extended function mode on one configuration port, left again on drop
struct SuperIo<'a, P: PortIo> {
    ports: &'a P,
    port: u16,
}

impl<'a, P: PortIo> SuperIo<'a, P> {
    fn enter(ports: &'a P, port: u16) -> Self {
        ports.outb(port, 0x87);
        ports.outb(port, 0x87);
        SuperIo { ports, port }
    }

    fn inb(&self, reg: u8) -> u8 {
        self.ports.outb(self.port, reg);
        self.ports.inb(self.port + 1)
    }

    fn outb(&self, reg: u8, value: u8) {
        self.ports.outb(self.port, reg);
        self.ports.outb(self.port + 1, value);
    }

    fn inw(&self, reg: u8) -> u16 {
        u16::from_be_bytes([self.inb(reg), self.inb(reg + 1)])
    }

    fn select(&self, ld: u8) {
        self.outb(SIO_REG_LDSEL, ld);
    }
}

impl<P: PortIo> Drop for SuperIo<'_, P> {
    fn drop(&mut self) {
        self.ports.outb(self.port, 0xAA);
        self.outb(0x02, 0x02);
    }
}

fn validate_address(address: u16) -> EcResult<u16> {
    let address = if address & 0x07 == 0x05 {
        address & 0xFFF8
    } else {
        address
    };
    if address < 0x100 || address & 0xF007 != 0 {
        error!("EC Invalid address: {:#06X}", address);
        return Err(EcError::DeviceError(format!(
            "Invalid EC address {:#06X}",
            address
        )));
    }
    Ok(address)
}

/// Look for a supported chip behind configuration port `sio_port`
pub fn find<P: PortIo, D: Delay>(ports: &P, delay: &D, sio_port: u16) -> EcResult<ChipInfo> {
    let sio = SuperIo::enter(ports, sio_port);

    let id = u16::from_be_bytes([sio.inb(SIO_REG_DEVID), sio.inb(SIO_REG_DEVREVISION)]);
    let kind = match id {
        SIO_NCT6687_ID => ChipKind::Nct6687,
        SIO_NCT6686_ID => ChipKind::Nct6686,
        0xFFFF => return Err(EcError::NotFound),
        _ => {
            debug!("Unsupported chip ID {:#06X} at {:#X}", id, sio_port);
            return Err(EcError::NotFound);
        }
    };

    sio.select(NCT6687_LD_HWM);
    let address = sio.inw(SIO_REG_ADDR);
    delay.sleep_ms(ADDRESS_SETTLE_MS);
    let verify = sio.inw(SIO_REG_ADDR);
    if address == 0 || address != verify {
        error!("EC base I/O port unconfigured");
        return Err(EcError::DeviceError(
            "EC base I/O port unconfigured".to_string(),
        ));
    }
    let base_address = validate_address(address)?;

    let enable = sio.inb(SIO_REG_ENABLE);
    if enable & 0x01 == 0 {
        warn!("Forcibly enabling EC access. Data may be unusable.");
        sio.outb(SIO_REG_ENABLE, enable | 0x01);
    }

    info!(
        "Found {} or compatible chip at {:#X}:{:#06X}",
        kind.name(),
        sio_port,
        base_address
    );
    Ok(ChipInfo {
        kind,
        sio_port,
        base_address,
    })
}

/// Try every configuration port until a supported chip answers
pub fn probe<P: PortIo, D: Delay>(ports: &P, delay: &D) -> EcResult<ChipInfo> {
    for sio_port in SIO_PORTS {
        match find(ports, delay, sio_port) {
            Ok(info) => return Ok(info),
            Err(EcError::NotFound) => continue,
            Err(err) => return Err(err),
        }
    }
    Err(EcError::NotFound)
}
