//! ATmega fuse bytes: parsing, formatting and human-readable decoding.

use std::fmt::Write;

use crate::error::{Error, Result};
use super::devices;

/// SPIEN bit in the high fuse byte, active low. Unprogramming it would cut
/// off the only interface this tool has to the chip, so it is forced back to
/// the programmed state.
const SPI_DISABLE: u8 = 0x20;

/// Extended, high and low fuse bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FuseRecord {
    pub ext: u8,
    pub high: u8,
    pub low: u8,
}

impl FuseRecord {
    /// Parse a 6-hex-digit string, `<ext><high><low>`.
    pub fn parse(value: &str) -> Result<Self> {
        if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidFuseValue);
        }
        let byte = |range| u8::from_str_radix(&value[range], 16).map_err(|_| Error::InvalidFuseValue);
        let mut record = FuseRecord {
            ext: byte(0..2)?,
            high: byte(2..4)?,
            low: byte(4..6)?,
        };
        if record.high & SPI_DISABLE != 0 {
            log::warn!("refusing to disable the SPI programming interface; keeping SPIEN programmed");
        }
        record.high &= !SPI_DISABLE;
        Ok(record)
    }

    pub fn format(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.ext, self.high, self.low)
    }

    pub fn to_bytes(&self) -> [u8; 3] {
        [self.ext, self.high, self.low]
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [ext, high, low] => Ok(FuseRecord { ext: *ext, high: *high, low: *low }),
            _ => Err(Error::InvalidFuseValue),
        }
    }
}

/// Decode the fuse bytes for the given device signature. Families with an
/// unknown bit layout get the raw values only.
pub fn describe(signature: u32, fuses: &FuseRecord) -> String {
    let mut out = String::new();
    match signature {
        devices::ATMEGA128_SIGNATURE => describe_m128(fuses, &mut out),
        devices::ATMEGA1281_SIGNATURE | devices::ATMEGA2561_SIGNATURE => {
            describe_m1281(fuses, &mut out)
        }
        _ => {
            let _ = writeln!(
                out,
                "  (no fuse decode for signature 0x{signature:06X}; raw values only)"
            );
        }
    }
    out
}

fn on_off(programmed: bool) -> &'static str {
    // fuse bits are active low: 0 = programmed = feature on
    if programmed {
        "enabled"
    } else {
        "disabled"
    }
}

fn boot_section(high: u8, out: &mut String) {
    let (words, start) = match (high >> 1) & 0x03 {
        0x00 => (4096, 0x1F000u32),
        0x01 => (2048, 0x1F800),
        0x02 => (1024, 0x1FC00),
        _ => (512, 0x1FE00),
    };
    let _ = writeln!(out, "  Boot section: {words} words at 0x{start:05X}");
    let vector = if high & 0x01 == 0 { "boot section" } else { "application" };
    let _ = writeln!(out, "  Reset vector: {vector}");
}

fn describe_m128(fuses: &FuseRecord, out: &mut String) {
    let source = match fuses.low & 0x0F {
        0x0 => "external clock",
        0x1 => "internal RC, 1 MHz",
        0x2 => "internal RC, 2 MHz",
        0x3 => "internal RC, 4 MHz",
        0x4 => "internal RC, 8 MHz",
        0x5 | 0x6 | 0x7 | 0x8 => "external RC",
        0x9 => "external low-frequency crystal",
        0xA | 0xB => "external crystal, 0.4-0.9 MHz",
        0xC | 0xD => "external crystal, 0.9-3.0 MHz",
        _ => "external crystal, 3.0 MHz or faster",
    };
    let _ = writeln!(out, "  Clock source: {source} (CKSEL/SUT 0x{:02X})", fuses.low & 0x3F);
    let level = if fuses.low & 0x80 == 0 { "4.0 V" } else { "2.7 V" };
    let _ = writeln!(out, "  Brown-out detection: {}, level {level}", on_off(fuses.low & 0x40 == 0));
    let _ = writeln!(out, "  On-chip debug: {}", on_off(fuses.high & 0x80 == 0));
    let _ = writeln!(out, "  JTAG: {}", on_off(fuses.high & 0x40 == 0));
    let _ = writeln!(out, "  SPI programming: {}", on_off(fuses.high & SPI_DISABLE == 0));
    let _ = writeln!(out, "  Preserve EEPROM on erase: {}", if fuses.high & 0x08 == 0 { "yes" } else { "no" });
    boot_section(fuses.high, out);
    let _ = writeln!(out, "  ATmega103 compatibility: {}", on_off(fuses.ext & 0x02 == 0));
    let _ = writeln!(out, "  Watchdog always on: {}", if fuses.ext & 0x01 == 0 { "yes" } else { "no" });
}

fn describe_m1281(fuses: &FuseRecord, out: &mut String) {
    let source = match fuses.low & 0x0F {
        0x0 => "external clock",
        0x2 => "internal RC, 8 MHz",
        0x3 => "internal RC, 128 kHz",
        0x4 | 0x5 => "external low-frequency crystal",
        0x6 | 0x7 => "full-swing crystal",
        0x8 | 0x9 => "external crystal, 0.4-0.9 MHz",
        0xA | 0xB => "external crystal, 0.9-3.0 MHz",
        0xC | 0xD => "external crystal, 3.0-8.0 MHz",
        0xE | 0xF => "external crystal, 8.0 MHz or faster",
        _ => "reserved",
    };
    let _ = writeln!(out, "  Clock source: {source} (CKSEL/SUT 0x{:02X})", fuses.low & 0x3F);
    let _ = writeln!(out, "  Divide clock by 8: {}", if fuses.low & 0x80 == 0 { "yes" } else { "no" });
    let _ = writeln!(out, "  Clock output on CLKO: {}", if fuses.low & 0x40 == 0 { "yes" } else { "no" });
    let _ = writeln!(out, "  On-chip debug: {}", on_off(fuses.high & 0x80 == 0));
    let _ = writeln!(out, "  JTAG: {}", on_off(fuses.high & 0x40 == 0));
    let _ = writeln!(out, "  SPI programming: {}", on_off(fuses.high & SPI_DISABLE == 0));
    let _ = writeln!(out, "  Watchdog always on: {}", if fuses.high & 0x10 == 0 { "yes" } else { "no" });
    let _ = writeln!(out, "  Preserve EEPROM on erase: {}", if fuses.high & 0x08 == 0 { "yes" } else { "no" });
    boot_section(fuses.high, out);
    let level = match fuses.ext & 0x07 {
        0x4 => "4.3 V",
        0x5 => "2.7 V",
        0x6 => "1.8 V",
        0x7 => "disabled",
        _ => "reserved",
    };
    let _ = writeln!(out, "  Brown-out level: {level}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format_round_trip() {
        let record = FuseRecord::parse("FF91E4").unwrap();
        assert_eq!(record, FuseRecord { ext: 0xFF, high: 0x91, low: 0xE4 });
        assert_eq!(record.format(), "FF91E4");
    }

    #[test]
    fn parse_accepts_lowercase() {
        let record = FuseRecord::parse("ff91e4").unwrap();
        assert_eq!(record.format(), "FF91E4");
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert!(FuseRecord::parse("FF91").is_err());
        assert!(FuseRecord::parse("FF91E4A0").is_err());
        assert!(FuseRecord::parse("FF91G4").is_err());
        assert!(FuseRecord::parse("").is_err());
    }

    #[test]
    fn spi_disable_bit_is_always_cleared() {
        // 0xB1 has the SPIEN-disable bit set; it must come back cleared
        let record = FuseRecord::parse("FFB1E4").unwrap();
        assert_eq!(record.high, 0x91);
        // and an already-programmed SPIEN is left alone
        let record = FuseRecord::parse("FF91E4").unwrap();
        assert_eq!(record.high, 0x91);
    }

    #[test]
    fn byte_round_trip() {
        let record = FuseRecord { ext: 0xFF, high: 0x91, low: 0xE4 };
        assert_eq!(FuseRecord::from_bytes(&record.to_bytes()).unwrap(), record);
        assert!(FuseRecord::from_bytes(&[1, 2]).is_err());
    }

    #[test]
    fn describe_known_and_unknown_families() {
        let record = FuseRecord { ext: 0xFF, high: 0x91, low: 0xE4 };
        let text = describe(devices::ATMEGA128_SIGNATURE, &record);
        assert!(text.contains("Clock source"));
        assert!(text.contains("JTAG"));
        let text = describe(devices::ATMEGA1281_SIGNATURE, &record);
        assert!(text.contains("Brown-out level"));
        let text = describe(0x1E0000, &record);
        assert!(text.contains("raw values only"));
    }
}
