//! ATmega in-system programming over the 25mm board.
//!
//! The ISP protocol exchanges 4-byte instructions; the target echoes the
//! stream one byte late, which [`SpiLink::instruction`] verifies. Reads are
//! batched into one long instruction stream per call; writes go through the
//! page buffer (flash) or byte-by-byte (EEPROM).

use std::thread;
use std::time::Duration;

use crate::bridge::{BoardProfile, PinMap, UsbBridge, MAX_BAUD_RATE, SLOW_BAUD_RATE};
use crate::error::{Error, Result};
use crate::image::{self, WriteRegions};
use crate::link::SpiLink;
use super::{check_range, devices, fuses::FuseRecord, Geometry, Target};

const PROG_ENABLE: u16 = 0xAC53;
const CHIP_ERASE: u16 = 0xAC80;
const READ_FLASH_LOW: u16 = 0x2000;
const READ_FLASH_HIGH: u16 = 0x2800;
const LOAD_PAGE_LOW: u16 = 0x4000;
const LOAD_PAGE_HIGH: u16 = 0x4800;
const WRITE_PAGE: u16 = 0x4C00;
const READ_EEPROM: u16 = 0xA000;
const WRITE_EEPROM: u16 = 0xC000;
const READ_SIGNATURE: u16 = 0x3000;
const WRITE_FUSE_LOW: u16 = 0xACA0;
const WRITE_FUSE_HIGH: u16 = 0xACA8;
const WRITE_FUSE_EXT: u16 = 0xACA4;
const READ_FUSE_LOW: u16 = 0x5000;
const READ_FUSE_HIGH: u16 = 0x5808;
const READ_FUSE_EXT: u16 = 0x5008;

/* Settle times, roughly double the datasheet worst case. The target cannot
   be polled for completion over this link, so these are hard waits. */
const INIT_DELAY: Duration = Duration::from_millis(40);
const FLASH_PAGE_DELAY: Duration = Duration::from_millis(10);
const EEPROM_BYTE_DELAY: Duration = Duration::from_millis(20);
const ERASE_DELAY: Duration = Duration::from_millis(20);
const FUSE_DELAY: Duration = Duration::from_millis(5);
// the low fuse byte carries the clock selection and needs the longer wait
const FUSE_LOW_DELAY: Duration = Duration::from_millis(10);
const RESET_PULSE: Duration = Duration::from_millis(20);

const PIN_NCS: u8 = 0x08;
const PIN_SCK: u8 = 0x04;
const PIN_UART_RX: u8 = 0x01;
const PIN_UART_TX: u8 = 0x02;
const PIN_MISO: u8 = 0x40;
const PIN_MOSI: u8 = 0x10;

pub const BOARD_DESCRIPTION: &str = "Mote 25mm USB Programmer";

/// Wiring layouts seen on the 25mm connector, in probe order. The common
/// boards program the ATmega over its UART0 pins; the alternative layout
/// uses the dedicated SPI pins.
const PIN_CANDIDATES: [PinMap; 2] = [
    PinMap { ncs: PIN_NCS, sck: PIN_SCK, miso: PIN_UART_TX, mosi: PIN_UART_RX },
    PinMap { ncs: PIN_NCS, sck: PIN_SCK, miso: PIN_MISO, mosi: PIN_MOSI },
];

pub fn board_profile(slow_clock: bool) -> BoardProfile {
    BoardProfile {
        description: BOARD_DESCRIPTION,
        pins: PIN_CANDIDATES[0],
        baud_rate: if slow_clock { SLOW_BAUD_RATE } else { MAX_BAUD_RATE },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvrMemory {
    Flash,
    Eeprom,
    Fuses,
}

pub struct AvrTarget<B> {
    link: SpiLink<B>,
    memory: AvrMemory,
    device: &'static devices::AvrDevice,
    geometry: Geometry,
    erased: bool,
}

impl<B: UsbBridge> AvrTarget<B> {
    /// Probe the candidate pin assignments, enter programming mode and
    /// identify the part by its signature bytes.
    pub fn open(bridge: B, memory: AvrMemory) -> Result<Self> {
        let mut link = SpiLink::new(bridge, PIN_CANDIDATES[0])?;
        let mut enabled = false;
        for (i, &pins) in PIN_CANDIDATES.iter().enumerate() {
            if i > 0 {
                link.set_pins(pins)?;
            }
            if Self::enable_programming(&mut link)? {
                enabled = true;
                break;
            }
            log::debug!("no programming-enable echo on pin layout {i}; trying the next");
        }
        if !enabled {
            return Err(Error::ProgrammingEnableFailed);
        }

        let signature = Self::read_signature(&mut link)?;
        let device = devices::find(signature).ok_or(Error::UnknownSignature(signature))?;
        log::info!("signature 0x{signature:06X}: {}", device.name);

        let geometry = match memory {
            AvrMemory::Flash => Geometry {
                memory_size: device.flash_size,
                code_size: device.flash_size,
                page_size: device.flash_page_size,
            },
            AvrMemory::Eeprom => Geometry {
                memory_size: device.eeprom_size,
                code_size: device.eeprom_size,
                page_size: device.eeprom_page_size,
            },
            AvrMemory::Fuses => Geometry { memory_size: 3, code_size: 3, page_size: 3 },
        };
        Ok(Self { link, memory, device, geometry, erased: false })
    }

    pub fn device(&self) -> &'static devices::AvrDevice {
        self.device
    }

    pub fn signature(&self) -> u32 {
        self.device.signature
    }

    pub fn bridge(&self) -> &B {
        self.link.bridge()
    }

    /// Toggle reset (wired to chip select), wait for the oscillator, then
    /// send the programming-enable handshake. The third reply byte echoes
    /// the second instruction byte once the target is in sync.
    fn enable_programming(link: &mut SpiLink<B>) -> Result<bool> {
        link.assert_cs()?;
        thread::sleep(INIT_DELAY);
        link.release_cs()?;
        thread::sleep(INIT_DELAY);
        link.assert_cs()?;
        thread::sleep(INIT_DELAY);

        let cmd = [hi(PROG_ENABLE), lo(PROG_ENABLE), 0, 0];
        let mut reply = [0u8; 4];
        link.write_read(Some(&mut reply), &cmd, false)?;
        Ok(reply[2] == lo(PROG_ENABLE))
    }

    fn read_signature(link: &mut SpiLink<B>) -> Result<u32> {
        let mut signature = 0u32;
        for index in 0..3u8 {
            let mut cmd = [hi(READ_SIGNATURE), lo(READ_SIGNATURE), index, 0];
            link.instruction(&mut cmd)?;
            signature = signature << 8 | u32::from(cmd[3]);
        }
        Ok(signature)
    }

    fn read_flash(&mut self, buf: &mut [u8], address: u32) -> Result<()> {
        let mut cmds = Vec::with_capacity(buf.len() * 4);
        for i in 0..buf.len() as u32 {
            let byte_address = address + i;
            let op = if byte_address & 1 == 0 { READ_FLASH_LOW } else { READ_FLASH_HIGH };
            let word = byte_address >> 1;
            cmds.extend_from_slice(&[hi(op), (word >> 8) as u8, word as u8, 0]);
        }
        let mut replies = vec![0u8; cmds.len()];
        self.link.write_read(Some(&mut replies), &cmds, false)?;
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = replies[i * 4 + 3];
        }
        Ok(())
    }

    fn write_flash(&mut self, data: &[u8], address: u32) -> Result<()> {
        let page_mask = self.geometry.page_size - 1;
        let end = address + data.len() as u32 - 1;
        let mut address = address;
        let mut offset = 0usize;
        loop {
            let page_end = (address | page_mask).min(end);
            let len = (page_end - address + 1) as usize;
            self.write_flash_page(&data[offset..offset + len], address)?;
            if page_end == end {
                return Ok(());
            }
            offset += len;
            address = page_end + 1;
        }
    }

    /// Load one page buffer and commit it. `data` must not cross a page
    /// boundary.
    fn write_flash_page(&mut self, data: &[u8], start: u32) -> Result<()> {
        let mut cmds = Vec::with_capacity(data.len() * 4 + 8);
        let mut address = start;
        for &byte in data {
            let op = if address & 1 == 0 { LOAD_PAGE_LOW } else { LOAD_PAGE_HIGH };
            cmds.extend_from_slice(&[hi(op), lo(op), (address >> 1) as u8 & 0x7F, byte]);
            address += 1;
        }
        // flash programs in 16-bit words; pad an odd-ending page with an
        // erased high byte
        if address & 1 == 1 {
            cmds.extend_from_slice(&[
                hi(LOAD_PAGE_HIGH),
                lo(LOAD_PAGE_HIGH),
                (address >> 1) as u8 & 0x7F,
                0xFF,
            ]);
        }
        let page_word = (start >> 1) & !(self.geometry.page_size / 2 - 1);
        cmds.extend_from_slice(&[hi(WRITE_PAGE), (page_word >> 8) as u8, page_word as u8, 0]);

        self.link.write_read(None, &cmds, false)?;
        thread::sleep(FLASH_PAGE_DELAY);
        Ok(())
    }

    fn read_eeprom(&mut self, buf: &mut [u8], address: u32) -> Result<()> {
        let mut cmds = Vec::with_capacity(buf.len() * 4);
        for i in 0..buf.len() as u32 {
            let a = address + i;
            cmds.extend_from_slice(&[hi(READ_EEPROM), (a >> 8) as u8, a as u8, 0]);
        }
        let mut replies = vec![0u8; cmds.len()];
        self.link.write_read(Some(&mut replies), &cmds, false)?;
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = replies[i * 4 + 3];
        }
        Ok(())
    }

    fn write_eeprom(&mut self, data: &[u8], address: u32) -> Result<()> {
        for (offset, &byte) in data.iter().enumerate() {
            let a = address + offset as u32;
            let mut cmd = [hi(WRITE_EEPROM), (a >> 8) as u8, a as u8, byte];
            self.link.instruction(&mut cmd)?;
            thread::sleep(EEPROM_BYTE_DELAY);
        }
        Ok(())
    }

    fn erase_chip(&mut self) -> Result<()> {
        log::debug!("chip erase");
        let mut cmd = [hi(CHIP_ERASE), lo(CHIP_ERASE), 0, 0];
        self.link.instruction(&mut cmd)?;
        thread::sleep(ERASE_DELAY);
        Ok(())
    }

    pub fn read_fuses(&mut self) -> Result<FuseRecord> {
        let mut record = FuseRecord::default();
        for (op, slot) in [
            (READ_FUSE_EXT, 0usize),
            (READ_FUSE_HIGH, 1),
            (READ_FUSE_LOW, 2),
        ] {
            let mut cmd = [hi(op), lo(op), 0, 0];
            self.link.instruction(&mut cmd)?;
            match slot {
                0 => record.ext = cmd[3],
                1 => record.high = cmd[3],
                _ => record.low = cmd[3],
            }
        }
        Ok(record)
    }

    pub fn write_fuses(&mut self, fuses: &FuseRecord) -> Result<()> {
        for (op, value, settle) in [
            (WRITE_FUSE_EXT, fuses.ext, FUSE_DELAY),
            (WRITE_FUSE_HIGH, fuses.high, FUSE_DELAY),
            (WRITE_FUSE_LOW, fuses.low, FUSE_LOW_DELAY),
        ] {
            let mut cmd = [hi(op), lo(op), 0, value];
            self.link.instruction(&mut cmd)?;
            thread::sleep(settle);
        }
        Ok(())
    }
}

impl<B: UsbBridge> Target for AvrTarget<B> {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn read(&mut self, buf: &mut [u8], address: u32) -> Result<()> {
        check_range(&self.geometry, address, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }
        match self.memory {
            AvrMemory::Flash => self.read_flash(buf, address),
            AvrMemory::Eeprom => self.read_eeprom(buf, address),
            AvrMemory::Fuses => {
                let record = self.read_fuses()?;
                let bytes = record.to_bytes();
                buf.copy_from_slice(&bytes[address as usize..address as usize + buf.len()]);
                Ok(())
            }
        }
    }

    fn write(&mut self, data: &[u8], address: u32) -> Result<()> {
        check_range(&self.geometry, address, data.len())?;
        if data.is_empty() {
            return Ok(());
        }
        match self.memory {
            AvrMemory::Flash => {
                // flash can only flip bits to 0; erase once before the
                // first write of this session
                if !self.erased {
                    self.erase_chip()?;
                    self.erased = true;
                }
                self.write_flash(data, address)
            }
            AvrMemory::Eeprom => self.write_eeprom(data, address),
            AvrMemory::Fuses => self.write_fuses(&FuseRecord::from_bytes(data)?),
        }
    }

    fn erase(&mut self) -> Result<()> {
        match self.memory {
            AvrMemory::Flash => {
                self.erased = true;
                self.erase_chip()
            }
            AvrMemory::Eeprom => {
                let blank = vec![0xFF; self.geometry.memory_size as usize];
                self.write_eeprom(&blank, 0)
            }
            AvrMemory::Fuses => Err(Error::FusesNotErasable),
        }
    }

    fn add_header(
        &mut self,
        image: &mut [u8],
        raw_len: u32,
        reprogram: bool,
    ) -> Result<WriteRegions> {
        if !reprogram || self.memory != AvrMemory::Flash {
            return Ok(image::plain_regions(raw_len));
        }
        self.geometry.code_size = image::avr_code_area(self.geometry.memory_size);
        Ok(image::add_avr_header(image, raw_len, self.geometry.memory_size))
    }

    /// Pulse reset (wired to chip select) so the freshly programmed
    /// application starts.
    fn reset(&mut self) -> Result<()> {
        self.link.assert_cs()?;
        thread::sleep(RESET_PULSE);
        self.link.release_cs()
    }
}

const fn hi(word: u16) -> u8 {
    (word >> 8) as u8
}

const fn lo(word: u16) -> u8 {
    word as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_fuse_write_gets_the_long_settle() {
        assert_eq!(FUSE_LOW_DELAY, Duration::from_millis(10));
        assert!(FUSE_LOW_DELAY > FUSE_DELAY);
    }
}
