//! The 25320 SPI EEPROM holding the nRF9E5's boot image on the 10mm stack.
//!
//! The nRF9E5 has no internal non-volatile memory; at power-up its boot ROM
//! copies the headered image out of this EEPROM. The EEPROM speaks the
//! standard WREN/WRITE/READ instruction set with 32-byte write pages, and
//! every transaction is framed by chip select.

use std::thread;
use std::time::Duration;

use crate::bridge::{BoardProfile, PinMap, UsbBridge, MAX_BAUD_RATE, SLOW_BAUD_RATE};
use crate::error::{Error, Result};
use crate::image::{self, WriteRegions};
use crate::link::SpiLink;
use super::{check_range, Geometry, Target};

const OP_WREN: u8 = 0x06;
const OP_WRITE: u8 = 0x02;
const OP_READ: u8 = 0x03;

const MEMORY_SIZE: u32 = 8192;
const PAGE_SIZE: u32 = 32;
const CODE_SIZE: u32 = 4096 - image::NRF_HEADER_SIZE;

/* Faster to wait out the self-timed write cycle than to poll the status
   register over this link. */
const WRITE_CYCLE_DELAY: Duration = Duration::from_millis(10);

const PINS: PinMap = PinMap { ncs: 0x40, sck: 0x04, miso: 0x08, mosi: 0x10 };

pub const BOARD_DESCRIPTION: &str = "Mote 10mm Interface";

pub fn board_profile(slow_clock: bool) -> BoardProfile {
    BoardProfile {
        description: BOARD_DESCRIPTION,
        pins: PINS,
        baud_rate: if slow_clock { SLOW_BAUD_RATE } else { MAX_BAUD_RATE },
    }
}

pub const VALID_CRYSTALS: [u32; 5] = [4, 8, 12, 16, 20];

pub struct NrfTarget<B> {
    link: SpiLink<B>,
    crystal_mhz: u32,
    reset_warning_shown: bool,
}

impl<B: UsbBridge> NrfTarget<B> {
    pub fn open(bridge: B, crystal_mhz: u32) -> Result<Self> {
        if !VALID_CRYSTALS.contains(&crystal_mhz) {
            return Err(Error::InvalidCrystalFrequency(crystal_mhz));
        }
        let link = SpiLink::new(bridge, PINS)?;
        Ok(Self { link, crystal_mhz, reset_warning_shown: false })
    }

    pub fn bridge(&self) -> &B {
        self.link.bridge()
    }

    /// Write-enable then program one page worth of data. `data` must not
    /// cross a page boundary.
    fn write_page(&mut self, data: &[u8], start: u32) -> Result<()> {
        self.link.write_read(None, &[OP_WREN], true)?;
        let mut frame = Vec::with_capacity(data.len() + 3);
        frame.push(OP_WRITE);
        frame.push((start >> 8) as u8);
        frame.push(start as u8);
        frame.extend_from_slice(data);
        self.link.write_read(None, &frame, true)?;
        thread::sleep(WRITE_CYCLE_DELAY);
        Ok(())
    }
}

impl<B: UsbBridge> Target for NrfTarget<B> {
    fn geometry(&self) -> Geometry {
        Geometry { memory_size: MEMORY_SIZE, code_size: CODE_SIZE, page_size: PAGE_SIZE }
    }

    fn read(&mut self, buf: &mut [u8], address: u32) -> Result<()> {
        check_range(&self.geometry(), address, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }
        let mut frame = vec![0xFF; buf.len() + 3];
        frame[0] = OP_READ;
        frame[1] = (address >> 8) as u8;
        frame[2] = address as u8;
        let mut reply = vec![0u8; frame.len()];
        self.link.write_read(Some(&mut reply), &frame, true)?;
        buf.copy_from_slice(&reply[3..]);
        Ok(())
    }

    fn write(&mut self, data: &[u8], address: u32) -> Result<()> {
        check_range(&self.geometry(), address, data.len())?;
        if data.is_empty() {
            return Ok(());
        }
        let end = address + data.len() as u32 - 1;
        let mut address = address;
        let mut offset = 0usize;
        loop {
            let page_end = (address | (PAGE_SIZE - 1)).min(end);
            let len = (page_end - address + 1) as usize;
            let chunk = &data[offset..offset + len];
            self.write_page(chunk, address)?;
            if page_end == end {
                // the last page of a range sometimes fails to stick on the
                // first attempt; writing it a second time is reliable
                self.write_page(chunk, address)?;
                break;
            }
            offset += len;
            address = page_end + 1;
        }
        if !self.reset_warning_shown {
            log::warn!("reset the 10mm board manually so the new image boots");
            self.reset_warning_shown = true;
        }
        Ok(())
    }

    fn erase(&mut self) -> Result<()> {
        let blank = [0xFF; PAGE_SIZE as usize];
        for page in 0..MEMORY_SIZE / PAGE_SIZE {
            self.write_page(&blank, page * PAGE_SIZE)?;
        }
        Ok(())
    }

    fn add_header(
        &mut self,
        image: &mut [u8],
        raw_len: u32,
        reprogram: bool,
    ) -> Result<WriteRegions> {
        image::add_nrf_header(image, raw_len, self.crystal_mhz, MEMORY_SIZE, CODE_SIZE, reprogram)
    }
}
