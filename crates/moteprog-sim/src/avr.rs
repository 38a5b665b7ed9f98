//! ATmega ISP responder.
//!
//! Implements the instruction subset the programmer uses: programming
//! enable, chip erase, signature read, flash page load/commit, flash and
//! EEPROM byte reads, EEPROM byte writes, and the fuse instructions. Every
//! received byte is echoed one position late; instruction results appear in
//! the fourth reply byte, matching the real part's timing.

use crate::SpiResponder;

pub struct AvrIsp {
    signature: u32,
    flash: Vec<u8>,
    eeprom: Vec<u8>,
    /// ext, high, low
    fuses: [u8; 3],
    page_size: usize,
    page_buffer: Vec<u8>,
    programming_enabled: bool,
    erase_count: usize,
    instruction: [u8; 4],
    received: usize,
}

impl AvrIsp {
    pub fn new(signature: u32, flash_size: usize, page_size: usize, eeprom_size: usize) -> Self {
        AvrIsp {
            signature,
            flash: vec![0xFF; flash_size],
            eeprom: vec![0xFF; eeprom_size],
            fuses: [0xFF, 0x99, 0xE1],
            page_size,
            page_buffer: vec![0xFF; page_size],
            programming_enabled: false,
            erase_count: 0,
            instruction: [0; 4],
            received: 0,
        }
    }

    pub fn atmega128() -> Self {
        Self::new(0x1E9702, 131072, 256, 4096)
    }

    pub fn atmega325p() -> Self {
        Self::new(0x1E950D, 32768, 128, 1024)
    }

    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    pub fn eeprom(&self) -> &[u8] {
        &self.eeprom
    }

    pub fn eeprom_mut(&mut self) -> &mut [u8] {
        &mut self.eeprom
    }

    pub fn fuses(&self) -> [u8; 3] {
        self.fuses
    }

    pub fn programming_enabled(&self) -> bool {
        self.programming_enabled
    }

    pub fn erase_count(&self) -> usize {
        self.erase_count
    }

    fn word_address(&self) -> usize {
        (usize::from(self.instruction[1]) << 8 | usize::from(self.instruction[2])) & 0xFFFF
    }

    /// Reply byte for read instructions, shifted out while the fourth
    /// instruction byte arrives.
    fn read_reply(&self) -> u8 {
        let [op, b1, b2, _] = self.instruction;
        match op {
            0x30 => {
                let shift = (2 - usize::from(b2 % 3)) * 8;
                (self.signature >> shift) as u8
            }
            0x20 => self.flash[self.word_address() * 2],
            0x28 => self.flash[self.word_address() * 2 + 1],
            0xA0 => self.eeprom[self.word_address()],
            0x50 if b1 == 0x00 => self.fuses[2],
            0x50 if b1 == 0x08 => self.fuses[0],
            0x58 if b1 == 0x08 => self.fuses[1],
            _ => 0,
        }
    }

    /// Side effects of a complete instruction, applied once the fourth byte
    /// has arrived.
    fn execute(&mut self) {
        let [op, b1, b2, b3] = self.instruction;
        match (op, b1) {
            (0xAC, 0x53) => self.programming_enabled = true,
            (0xAC, 0x80) => {
                self.flash.fill(0xFF);
                self.erase_count += 1;
            }
            (0xAC, 0xA0) => self.fuses[2] = b3,
            (0xAC, 0xA8) => self.fuses[1] = b3,
            (0xAC, 0xA4) => self.fuses[0] = b3,
            (0x40, _) => {
                let word = usize::from(b2 & 0x7F) % (self.page_size / 2);
                self.page_buffer[word * 2] = b3;
            }
            (0x48, _) => {
                let word = usize::from(b2 & 0x7F) % (self.page_size / 2);
                self.page_buffer[word * 2 + 1] = b3;
            }
            (0x4C, _) => {
                let base = self.word_address() * 2;
                let end = (base + self.page_size).min(self.flash.len());
                self.flash[base..end].copy_from_slice(&self.page_buffer[..end - base]);
                self.page_buffer.fill(0xFF);
            }
            (0xC0, _) => {
                let address = self.word_address();
                self.eeprom[address] = b3;
            }
            _ => {}
        }
    }
}

impl SpiResponder for AvrIsp {
    fn select(&mut self) {
        self.received = 0;
    }

    fn byte_received(&mut self, byte: u8) -> u8 {
        self.instruction[self.received] = byte;
        self.received += 1;
        match self.received {
            1 | 2 => byte,
            3 => self.read_reply(),
            _ => {
                self.received = 0;
                self.execute();
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(isp: &mut AvrIsp, instruction: [u8; 4]) -> [u8; 4] {
        let mut reply = [0u8; 4];
        // reply[k] is what shifts out while instruction[k] shifts in
        for (k, &byte) in instruction.iter().enumerate() {
            let next = isp.byte_received(byte);
            if k + 1 < 4 {
                reply[k + 1] = next;
            }
        }
        reply
    }

    #[test]
    fn echo_and_enable() {
        let mut isp = AvrIsp::atmega128();
        isp.select();
        let reply = feed(&mut isp, [0xAC, 0x53, 0x00, 0x00]);
        assert_eq!(reply[1], 0xAC);
        assert_eq!(reply[2], 0x53);
        assert!(isp.programming_enabled());
    }

    #[test]
    fn signature_bytes() {
        let mut isp = AvrIsp::atmega128();
        isp.select();
        assert_eq!(feed(&mut isp, [0x30, 0x00, 0x00, 0x00])[3], 0x1E);
        assert_eq!(feed(&mut isp, [0x30, 0x00, 0x01, 0x00])[3], 0x97);
        assert_eq!(feed(&mut isp, [0x30, 0x00, 0x02, 0x00])[3], 0x02);
    }

    #[test]
    fn page_load_and_commit() {
        let mut isp = AvrIsp::atmega128();
        isp.select();
        feed(&mut isp, [0x40, 0x00, 0x01, 0x11]); // word 1 low
        feed(&mut isp, [0x48, 0x00, 0x01, 0x22]); // word 1 high
        feed(&mut isp, [0x4C, 0x00, 0x80, 0x00]); // commit second page
        let base = 0x80 * 2;
        assert_eq!(isp.flash()[base + 2], 0x11);
        assert_eq!(isp.flash()[base + 3], 0x22);
        // untouched words committed as erased
        assert_eq!(isp.flash()[base], 0xFF);
    }

    #[test]
    fn eeprom_write_and_read() {
        let mut isp = AvrIsp::atmega128();
        isp.select();
        feed(&mut isp, [0xC0, 0x01, 0x05, 0x42]);
        assert_eq!(isp.eeprom()[0x105], 0x42);
        assert_eq!(feed(&mut isp, [0xA0, 0x01, 0x05, 0x00])[3], 0x42);
    }

    #[test]
    fn fuse_write_and_read_back() {
        let mut isp = AvrIsp::atmega128();
        isp.select();
        feed(&mut isp, [0xAC, 0xA0, 0x00, 0xE4]); // low
        feed(&mut isp, [0xAC, 0xA8, 0x00, 0x91]); // high
        feed(&mut isp, [0xAC, 0xA4, 0x00, 0xFF]); // ext
        assert_eq!(isp.fuses(), [0xFF, 0x91, 0xE4]);
        assert_eq!(feed(&mut isp, [0x50, 0x00, 0x00, 0x00])[3], 0xE4);
        assert_eq!(feed(&mut isp, [0x58, 0x08, 0x00, 0x00])[3], 0x91);
        assert_eq!(feed(&mut isp, [0x50, 0x08, 0x00, 0x00])[3], 0xFF);
    }
}
