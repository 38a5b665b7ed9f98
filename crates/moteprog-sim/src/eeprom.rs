//! 25320-style serial EEPROM responder: WREN, WRITE and READ with 32-byte
//! write pages. Writes wrap within a page, reads run sequentially across
//! the whole array, and the write-enable latch clears when a write
//! transaction ends, as on the real part.

use crate::SpiResponder;

const OP_WREN: u8 = 0x06;
const OP_WRITE: u8 = 0x02;
const OP_READ: u8 = 0x03;

const PAGE_MASK: usize = 31;

enum State {
    Opcode,
    AddressHigh(u8),
    AddressLow { op: u8, high: u8 },
    Write { address: usize },
    Read { address: usize },
    Ignore,
}

pub struct SerialEeprom {
    memory: Vec<u8>,
    state: State,
    write_enabled: bool,
    /// WRITE transactions observed, for asserting page-write behavior.
    pub write_ops: usize,
}

impl SerialEeprom {
    pub fn new(size: usize) -> Self {
        SerialEeprom {
            memory: vec![0xFF; size],
            state: State::Opcode,
            write_enabled: false,
            write_ops: 0,
        }
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }
}

impl SpiResponder for SerialEeprom {
    fn select(&mut self) {
        self.state = State::Opcode;
    }

    fn deselect(&mut self) {
        if matches!(self.state, State::Write { .. }) {
            self.write_enabled = false;
        }
    }

    fn byte_received(&mut self, byte: u8) -> u8 {
        match self.state {
            State::Opcode => {
                self.state = match byte {
                    OP_WREN => {
                        self.write_enabled = true;
                        State::Ignore
                    }
                    OP_WRITE | OP_READ => State::AddressHigh(byte),
                    _ => State::Ignore,
                };
                0
            }
            State::AddressHigh(op) => {
                self.state = State::AddressLow { op, high: byte };
                0
            }
            State::AddressLow { op, high } => {
                let address = (usize::from(high) << 8 | usize::from(byte)) % self.memory.len();
                if op == OP_READ {
                    self.state = State::Read { address };
                    // first data byte shifts out while the next byte arrives
                    self.memory[address]
                } else {
                    self.write_ops += 1;
                    self.state = State::Write { address };
                    0
                }
            }
            State::Write { address } => {
                if self.write_enabled {
                    self.memory[address] = byte;
                }
                let next = (address & !PAGE_MASK) | ((address + 1) & PAGE_MASK);
                self.state = State::Write { address: next };
                0
            }
            State::Read { address } => {
                let next = (address + 1) % self.memory.len();
                self.state = State::Read { address: next };
                self.memory[next]
            }
            State::Ignore => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transaction(eeprom: &mut SerialEeprom, bytes: &[u8]) -> Vec<u8> {
        eeprom.select();
        let mut out = Vec::with_capacity(bytes.len());
        // out[k] shifts during byte k+1; prepend the undefined first byte
        out.push(0);
        for &byte in &bytes[..bytes.len() - 1] {
            out.push(eeprom.byte_received(byte));
        }
        eeprom.byte_received(bytes[bytes.len() - 1]);
        eeprom.deselect();
        out
    }

    #[test]
    fn write_requires_write_enable() {
        let mut eeprom = SerialEeprom::new(8192);
        transaction(&mut eeprom, &[OP_WRITE, 0x00, 0x10, 0xAA]);
        assert_eq!(eeprom.memory()[0x10], 0xFF);
        transaction(&mut eeprom, &[OP_WREN]);
        transaction(&mut eeprom, &[OP_WRITE, 0x00, 0x10, 0xAA]);
        assert_eq!(eeprom.memory()[0x10], 0xAA);
        // the latch cleared; another write needs another WREN
        transaction(&mut eeprom, &[OP_WRITE, 0x00, 0x11, 0xBB]);
        assert_eq!(eeprom.memory()[0x11], 0xFF);
    }

    #[test]
    fn sequential_read() {
        let mut eeprom = SerialEeprom::new(8192);
        eeprom.memory_mut()[0x20..0x24].copy_from_slice(&[1, 2, 3, 4]);
        let reply = transaction(&mut eeprom, &[OP_READ, 0x00, 0x20, 0, 0, 0, 0]);
        assert_eq!(&reply[3..], &[1, 2, 3, 4]);
    }

    #[test]
    fn page_writes_wrap_within_the_page() {
        let mut eeprom = SerialEeprom::new(8192);
        transaction(&mut eeprom, &[OP_WREN]);
        // start two bytes before a page boundary and write four
        transaction(&mut eeprom, &[OP_WRITE, 0x00, 0x1E, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(eeprom.memory()[0x1E], 0x01);
        assert_eq!(eeprom.memory()[0x1F], 0x02);
        // wrapped to the start of the same page, not the next page
        assert_eq!(eeprom.memory()[0x00], 0x03);
        assert_eq!(eeprom.memory()[0x01], 0x04);
        assert_eq!(eeprom.memory()[0x20], 0xFF);
    }
}
