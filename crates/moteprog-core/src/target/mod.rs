//! Programmable target memories.
//!
//! Each board/memory combination implements [`Target`]; everything above
//! this trait (header injection choices aside) is memory-agnostic.

pub mod avr;
pub mod devices;
pub mod fuses;
pub mod nrf;

pub use avr::{AvrMemory, AvrTarget};
pub use nrf::NrfTarget;

use crate::error::{Error, Result};
use crate::image::WriteRegions;

#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    /// Total addressable bytes.
    pub memory_size: u32,
    /// Bytes usable for application code (less than `memory_size` when a
    /// reprogramming layout reserves space).
    pub code_size: u32,
    /// Write granularity; 1 for byte-programmed memories.
    pub page_size: u32,
}

pub trait Target {
    fn geometry(&self) -> Geometry;

    /// Read `buf.len()` bytes starting at `address`.
    fn read(&mut self, buf: &mut [u8], address: u32) -> Result<()>;

    /// Program `data` starting at `address`. Any address, any length;
    /// page-programmed memories split internally.
    fn write(&mut self, data: &[u8], address: u32) -> Result<()>;

    /// Erase the whole memory to 0xFF.
    fn erase(&mut self) -> Result<()>;

    /// Prepare `image` (spanning the whole memory, 0xFF-padded past
    /// `raw_len`) for programming and return the regions worth writing.
    /// With `reprogram` set the wireless-reprogramming layout is applied.
    fn add_header(&mut self, image: &mut [u8], raw_len: u32, reprogram: bool)
        -> Result<WriteRegions>;

    /// Kick the target out of programming mode so the new image runs.
    /// No-op for boards that need a manual reset.
    fn reset(&mut self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn check_range(geometry: &Geometry, address: u32, len: usize) -> Result<()> {
    if u64::from(address) + len as u64 > u64::from(geometry.memory_size) {
        return Err(Error::OutOfBounds {
            start: address,
            len: len as u32,
            size: geometry.memory_size,
        });
    }
    Ok(())
}
