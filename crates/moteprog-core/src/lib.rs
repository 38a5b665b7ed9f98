//! moteprog-core - in-system programming of wireless-sensor-node memories
//!
//! The programming boards carry an FT232R whose parallel port is wired to the
//! target's SPI programming pins. There is no SPI hardware anywhere on the
//! host side: every clock edge and data bit is a byte written to the bridge in
//! synchronous bit-bang mode, and every sample is a byte read back.
//!
//! The layering, bottom up:
//!
//! - [`bitbang`] turns logical bytes into pin-vector streams and back,
//! - [`link`] frames those streams with chip-select handling, splits them
//!   into USB-sized chunks and compensates for the bridge's one-transfer
//!   read latency,
//! - [`target`] implements the per-chip programming algorithms (ATmega
//!   flash/EEPROM/fuses, and the 25320 EEPROM behind the nRF9E5),
//! - [`image`] prepares firmware images for wireless in-system
//!   reprogramming (dual-copy layout plus a length/CRC header),
//! - [`program`] drives write-then-verify with a bounded error budget.
//!
//! The actual USB access is abstracted behind [`bridge::UsbBridge`] so the
//! whole stack can be exercised against a simulated bridge.

pub mod bitbang;
pub mod bridge;
pub mod crc16;
pub mod error;
pub mod image;
pub mod link;
pub mod program;
pub mod target;

pub use error::{Error, Result};
