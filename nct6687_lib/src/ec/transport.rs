use spin::Mutex;

use super::registers::*;
use super::PortIo;

/// Paged register space of one EC
///
/// Every access selects the page, then the index, then touches the data port.
/// The four port operations happen under one lock so no other access can
/// interleave, no matter which channel or thread it belongs to.
pub struct EcSpace<P> {
    ports: P,
    base: u16,
    lock: Mutex<()>,
}

impl<P: PortIo> EcSpace<P> {
    pub fn new(ports: P, base: u16) -> Self {
        EcSpace {
            ports,
            base,
            lock: Mutex::new(()),
        }
    }

    /// HWM base I/O address
    pub fn base(&self) -> u16 {
        self.base
    }

    pub fn ports(&self) -> &P {
        &self.ports
    }

    fn select(&self, address: u16) {
        let [page, index] = address.to_be_bytes();
        let page_port = self.base + EC_SPACE_PAGE_REGISTER_OFFSET;
        self.ports.outb(page_port, EC_SPACE_PAGE_SELECT);
        self.ports.outb(page_port, page);
        self.ports
            .outb(self.base + EC_SPACE_INDEX_REGISTER_OFFSET, index);
    }

    pub fn read(&self, address: u16) -> u8 {
        let value = {
            let _guard = self.lock.lock();
            self.select(address);
            self.ports.inb(self.base + EC_SPACE_DATA_REGISTER_OFFSET)
        };
        trace!("read({:#06X}) = {:#04X}", address, value);
        value
    }

    /// Big endian composition of `address` and `address + 1`
    ///
    /// Not atomic, the EC may update the value between both reads.
    pub fn read16(&self, address: u16) -> u16 {
        let high = u16::from(self.read(address));
        let low = u16::from(self.read(address.wrapping_add(1)));
        (high << 8) | low
    }

    pub fn write(&self, address: u16, value: u8) {
        trace!("write({:#06X}, {:#04X})", address, value);
        let _guard = self.lock.lock();
        self.select(address);
        self.ports
            .outb(self.base + EC_SPACE_DATA_REGISTER_OFFSET, value);
    }

    /// Read all 256 registers of one page
    pub fn read_page(&self, page: u8) -> Vec<u8> {
        (0..=u8::MAX)
            .map(|index| self.read(u16::from_be_bytes([page, index])))
            .collect()
    }
}
