//! SPI over the bit-banged bridge.
//!
//! [`SpiLink`] owns a [`UsbBridge`] and layers three things on top of the raw
//! pin-vector stream:
//!
//! - chip-select framing: each transfer is wrapped in two framing bytes on
//!   either side carrying the idle chip-select level,
//! - chunking: transfers are split to the bridge's limit, with the last
//!   vector of each chunk duplicated and the first sampled byte discarded to
//!   compensate for the bridge's one-transfer read latency,
//! - the 4-byte instruction exchange used by the AVR ISP protocol, where the
//!   target echoes the stream one byte late.

use crate::bitbang::{self, VECTORS_PER_BYTE};
use crate::bridge::{PinMap, UsbBridge};
use crate::error::{Error, Result};

pub struct SpiLink<B> {
    bridge: B,
    pins: PinMap,
}

impl<B: UsbBridge> SpiLink<B> {
    pub fn new(mut bridge: B, pins: PinMap) -> Result<Self> {
        bridge.configure(pins)?;
        Ok(Self { bridge, pins })
    }

    pub fn pins(&self) -> PinMap {
        self.pins
    }

    /// Switch to a different pin assignment, reconfiguring the bridge.
    pub fn set_pins(&mut self, pins: PinMap) -> Result<()> {
        self.bridge.configure(pins)?;
        self.pins = pins;
        Ok(())
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn into_bridge(self) -> B {
        self.bridge
    }

    /// Shift `data` out and, when `read` is given, collect the bytes shifted
    /// back in. `read` must be as long as `data`.
    ///
    /// With `chip_select` set the line is raised before and after the data;
    /// otherwise the framing leaves it at its current (asserted) level.
    pub fn write_read(
        &mut self,
        read: Option<&mut [u8]>,
        data: &[u8],
        chip_select: bool,
    ) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let total = data.len() * VECTORS_PER_BYTE + 4;
        let mut vectors = vec![0u8; total];
        let idle = if chip_select { self.pins.ncs } else { 0 };
        vectors[0] = idle;
        vectors[total - 1] = idle;
        bitbang::serialize_into(self.pins, data, false, &mut vectors[2..total - 2]);

        let sampled = self.transfer(&vectors)?;
        if let Some(read) = read {
            debug_assert_eq!(read.len(), data.len());
            bitbang::deserialize_into(self.pins, &sampled[2..total - 2], read)?;
        }
        Ok(())
    }

    /// Pull chip select low (asserted).
    pub fn assert_cs(&mut self) -> Result<()> {
        let vectors = [self.pins.ncs, 0];
        self.transfer(&vectors).map(|_| ())
    }

    /// Raise chip select (released).
    pub fn release_cs(&mut self) -> Result<()> {
        let vectors = [0, self.pins.ncs];
        self.transfer(&vectors).map(|_| ())
    }

    /// Exchange one 4-byte ISP instruction. The target echoes each byte one
    /// position late; bytes 1 and 2 of the reply are checked against the
    /// instruction and the reply data replaces byte 3 in place.
    pub fn instruction(&mut self, bytes: &mut [u8; 4]) -> Result<()> {
        let sent = *bytes;
        let mut reply = [0u8; 4];
        self.write_read(Some(&mut reply), &sent, false)?;
        if reply[1] != sent[0] || reply[2] != sent[1] {
            return Err(Error::EchoMismatch { sent, received: reply });
        }
        bytes[3] = reply[3];
        Ok(())
    }

    /// Drive raw vectors through the bridge in chunks, returning one sampled
    /// byte per vector. Each chunk carries a duplicated trailing vector whose
    /// sample is the last chunk byte's pin state; the first sampled byte of a
    /// chunk predates the chunk and is dropped.
    fn transfer(&mut self, vectors: &[u8]) -> Result<Vec<u8>> {
        let limit = self.bridge.transfer_limit();
        debug_assert!(limit >= 2);
        let mut sampled = Vec::with_capacity(vectors.len());
        for chunk in vectors.chunks(limit - 1) {
            let mut tx = Vec::with_capacity(chunk.len() + 1);
            tx.extend_from_slice(chunk);
            tx.push(chunk[chunk.len() - 1]);
            self.bridge.write(&tx)?;
            let mut rx = vec![0u8; tx.len()];
            self.bridge.read(&mut rx)?;
            sampled.extend_from_slice(&rx[1..]);
        }
        Ok(sampled)
    }
}
