//! USB bridge abstraction.
//!
//! An FT232R in synchronous bit-bang mode behaves like a clocked parallel
//! port: every byte written drives the pins, and for every byte written one
//! byte of sampled pin state becomes readable. Backends implement [`UsbBridge`]
//! over that model; [`crate::link::SpiLink`] does the rest.

use crate::error::Result;

/// Enables the analogue switch routing the SPI lines to the target.
/// Active low, and always driven as an output.
pub const PROG_EN: u8 = 0x80;

/// Highest bit-bang baud rate that stays reliable on the FT232R.
pub const MAX_BAUD_RATE: u32 = 921_600;

/// Very slow clock for marginal targets and long cables.
pub const SLOW_BAUD_RATE: u32 = 9_600;

/// Bit masks of the four SPI roles on the bridge's parallel port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinMap {
    pub ncs: u8,
    pub sck: u8,
    pub miso: u8,
    pub mosi: u8,
}

impl PinMap {
    /// Pin-direction mask: nCS, SCK and MOSI are driven, MISO is sampled,
    /// and PROG_EN is always an output.
    pub fn direction(&self) -> u8 {
        PROG_EN | self.ncs | self.sck | self.mosi
    }
}

/// Static description of one programming board.
#[derive(Debug, Clone)]
pub struct BoardProfile {
    /// FTDI EEPROM product string, used in operator-facing messages.
    pub description: &'static str,
    /// Initial pin assignment (targets may probe alternatives).
    pub pins: PinMap,
    pub baud_rate: u32,
}

pub trait UsbBridge {
    /// Largest byte count a single write or read may carry, including the
    /// trailing latency byte the link appends.
    fn transfer_limit(&self) -> usize;

    /// Reprogram the pin-direction mask for a new pin assignment and drop
    /// any stale sampled data.
    fn configure(&mut self, pins: PinMap) -> Result<()>;

    /// Drive one pin vector per byte, in order.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Fill `buf` with sampled pin states, one per previously written byte.
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_mask_includes_prog_enable_and_outputs() {
        let pins = PinMap { ncs: 0x08, sck: 0x04, miso: 0x02, mosi: 0x01 };
        assert_eq!(pins.direction(), 0x80 | 0x08 | 0x04 | 0x01);
        // MISO must stay an input
        assert_eq!(pins.direction() & pins.miso, 0);
    }
}
