//! Pin-vector serialization.
//!
//! One logical byte becomes sixteen pin vectors: for each bit, MSB first, a
//! vector with the data bit set and the clock low, then the same vector with
//! the clock high. The target latches MOSI on the rising edge, and the vector
//! sampled while the clock is high carries the target's MISO bit.

use crate::bridge::PinMap;
use crate::error::{Error, Result};

/// Pin vectors produced per serialized byte.
pub const VECTORS_PER_BYTE: usize = 16;

/// Expand `bytes` into pin vectors in `out`, which must hold
/// `bytes.len() * VECTORS_PER_BYTE` bytes. With `clock_only` set the data
/// line is held low and only the clock toggles.
pub fn serialize_into(pins: PinMap, bytes: &[u8], clock_only: bool, out: &mut [u8]) {
    debug_assert_eq!(out.len(), bytes.len() * VECTORS_PER_BYTE);
    let mut v = 0;
    for &byte in bytes {
        let byte = if clock_only { 0 } else { byte };
        for bit in (0..8).rev() {
            let mosi = if byte & (1 << bit) != 0 { pins.mosi } else { 0 };
            out[v] = mosi;
            out[v + 1] = mosi | pins.sck;
            v += 2;
        }
    }
}

/// Collapse sampled pin vectors back into bytes. `vectors` must hold
/// `out.len() * VECTORS_PER_BYTE` bytes. Each vector pair must show the
/// clock low then high; anything else means the bridge returned garbage.
pub fn deserialize_into(pins: PinMap, vectors: &[u8], out: &mut [u8]) -> Result<()> {
    debug_assert_eq!(vectors.len(), out.len() * VECTORS_PER_BYTE);
    for (i, byte) in out.iter_mut().enumerate() {
        let mut value = 0u8;
        for bit in 0..8 {
            let low = vectors[(i * 8 + bit) * 2];
            let high = vectors[(i * 8 + bit) * 2 + 1];
            if low & pins.sck != 0 || high & pins.sck == 0 {
                return Err(Error::ClockIntegrity);
            }
            value <<= 1;
            if high & pins.miso != 0 {
                value |= 1;
            }
        }
        *byte = value;
    }
    Ok(())
}
