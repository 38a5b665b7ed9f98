//! Simulated FT232R bridge and SPI targets.
//!
//! [`SimBridge`] models the synchronous bit-bang port faithfully enough to
//! exercise the whole programming stack: every written byte returns the pin
//! state latched before that byte was driven (the one-transfer latency the
//! link compensates for), and SCK/MOSI edges clock an attached
//! [`SpiResponder`] one bit at a time.
//!
//! The bridge is built with the board's physical wiring; reconfiguring the
//! link to a wrong [`PinMap`] therefore produces garbage, exactly like
//! probing the wrong connector layout on real hardware.

mod avr;
mod eeprom;

pub use avr::AvrIsp;
pub use eeprom::SerialEeprom;

use std::collections::VecDeque;

use moteprog_core::bridge::{PinMap, UsbBridge};
use moteprog_core::error::{Error, Result};

/// Default transfer limit, matching the libftdi backend.
pub const DEFAULT_TRANSFER_LIMIT: usize = 384;

/// A device clocked by the simulated SPI bus.
pub trait SpiResponder {
    fn select(&mut self) {}
    fn deselect(&mut self) {}
    /// A full byte has shifted in; return the byte to shift out while the
    /// next one is received.
    fn byte_received(&mut self, byte: u8) -> u8;
}

pub struct SimBridge<R> {
    responder: R,
    /// Physical wiring of the simulated board.
    wiring: PinMap,
    direction: u8,
    transfer_limit: usize,
    latched: u8,
    queue: VecDeque<u8>,
    prev_sck: bool,
    selected: bool,
    bit_count: u8,
    shift_in: u8,
    shift_out: u8,
}

impl<R: SpiResponder> SimBridge<R> {
    pub fn new(responder: R, wiring: PinMap) -> Self {
        Self::with_transfer_limit(responder, wiring, DEFAULT_TRANSFER_LIMIT)
    }

    pub fn with_transfer_limit(responder: R, wiring: PinMap, transfer_limit: usize) -> Self {
        SimBridge {
            responder,
            wiring,
            direction: wiring.direction(),
            transfer_limit,
            latched: 0,
            queue: VecDeque::new(),
            prev_sck: false,
            selected: false,
            bit_count: 0,
            shift_in: 0,
            shift_out: 0,
        }
    }

    pub fn responder(&self) -> &R {
        &self.responder
    }

    pub fn responder_mut(&mut self) -> &mut R {
        &mut self.responder
    }

    /// Apply one pin vector and return the resulting pin state.
    fn drive(&mut self, vector: u8) -> u8 {
        let selected = vector & self.wiring.ncs == 0;
        if selected != self.selected {
            if selected {
                self.responder.select();
                self.shift_out = 0;
            } else {
                self.responder.deselect();
            }
            self.bit_count = 0;
            self.shift_in = 0;
            self.selected = selected;
        }

        let sck = vector & self.wiring.sck != 0;
        // the target presents its current output bit; on a rising edge it
        // also latches MOSI and both registers shift
        let miso = self.shift_out & 0x80 != 0;
        if sck && !self.prev_sck && selected {
            let mosi = vector & self.wiring.mosi != 0;
            self.shift_in = self.shift_in << 1 | u8::from(mosi);
            self.shift_out <<= 1;
            self.bit_count += 1;
            if self.bit_count == 8 {
                self.shift_out = self.responder.byte_received(self.shift_in);
                self.bit_count = 0;
                self.shift_in = 0;
            }
        }
        self.prev_sck = sck;

        (vector & self.direction) | if miso { self.wiring.miso } else { 0 }
    }
}

impl<R: SpiResponder> UsbBridge for SimBridge<R> {
    fn transfer_limit(&self) -> usize {
        self.transfer_limit
    }

    fn configure(&mut self, pins: PinMap) -> Result<()> {
        self.direction = pins.direction();
        self.queue.clear();
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > self.transfer_limit {
            return Err(Error::Transport(format!(
                "write of {} bytes exceeds the {} byte transfer limit",
                data.len(),
                self.transfer_limit
            )));
        }
        for &vector in data {
            self.queue.push_back(self.latched);
            self.latched = self.drive(vector);
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        for byte in buf.iter_mut() {
            *byte = self
                .queue
                .pop_front()
                .ok_or_else(|| Error::Transport("sim read underrun".into()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moteprog_core::link::SpiLink;

    const PINS: PinMap = PinMap { ncs: 0x08, sck: 0x04, miso: 0x02, mosi: 0x01 };

    /// Echoes every byte back one position late, like the AVR ISP port.
    struct Echo {
        selects: usize,
    }

    impl SpiResponder for Echo {
        fn select(&mut self) {
            self.selects += 1;
        }

        fn byte_received(&mut self, byte: u8) -> u8 {
            byte
        }
    }

    #[test]
    fn one_byte_late_echo() {
        let bridge = SimBridge::new(Echo { selects: 0 }, PINS);
        let mut link = SpiLink::new(bridge, PINS).unwrap();
        link.assert_cs().unwrap();
        let data = [0xA5, 0x3C, 0x00];
        let mut reply = [0u8; 3];
        link.write_read(Some(&mut reply), &data, false).unwrap();
        assert_eq!(reply, [0x00, 0xA5, 0x3C]);
        assert_eq!(link.bridge().responder().selects, 1);
    }

    #[test]
    fn chip_select_framing_reselects_per_transfer() {
        let bridge = SimBridge::new(Echo { selects: 0 }, PINS);
        let mut link = SpiLink::new(bridge, PINS).unwrap();
        link.write_read(None, &[0x01], true).unwrap();
        link.write_read(None, &[0x02], true).unwrap();
        assert_eq!(link.bridge().responder().selects, 2);
    }

    #[test]
    fn oversized_writes_are_rejected() {
        let mut bridge = SimBridge::with_transfer_limit(Echo { selects: 0 }, PINS, 8);
        assert!(bridge.write(&[0u8; 9]).is_err());
    }
}
