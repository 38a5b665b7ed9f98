//! CRC-16 used by the reprogramming image header (polynomial 0xA001,
//! initial value 0xFFFF, LSB-first). The wireless bootloader computes the
//! same checksum to decide whether a received image is intact.

#[derive(Debug, Clone, Copy)]
pub struct Crc16(u16);

impl Crc16 {
    pub const INIT: u16 = 0xFFFF;
    pub const POLY: u16 = 0xA001;

    pub fn new() -> Self {
        Crc16(Self::INIT)
    }

    pub fn update(&mut self, byte: u8) {
        self.0 ^= u16::from(byte);
        for _ in 0..8 {
            if self.0 & 1 != 0 {
                self.0 = (self.0 >> 1) ^ Self::POLY;
            } else {
                self.0 >>= 1;
            }
        }
    }

    pub fn update_slice(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.update(byte);
        }
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot checksum of a byte slice.
pub fn crc16(bytes: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update_slice(bytes);
    crc.value()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Independent reflected-CRC reference: process bits explicitly.
    fn reference(bytes: &[u8]) -> u16 {
        let mut crc: u16 = 0xFFFF;
        for &byte in bytes {
            for bit in 0..8 {
                let input = (byte >> bit) & 1;
                let feedback = (crc & 1) as u8 ^ input;
                crc >>= 1;
                if feedback != 0 {
                    crc ^= 0xA001;
                }
            }
        }
        crc
    }

    #[test]
    fn empty_input_is_the_initial_value() {
        assert_eq!(crc16(&[]), 0xFFFF);
    }

    #[test]
    fn check_string() {
        // CRC-16 with poly 0xA001 and init 0xFFFF over "123456789"
        assert_eq!(crc16(b"123456789"), 0x4B37);
    }

    #[test]
    fn matches_bitwise_reference() {
        let samples: [&[u8]; 4] = [b"", b"\x00", b"\xFF\xFF\xFF", b"firmware image bytes"];
        for sample in samples {
            assert_eq!(crc16(sample), reference(sample));
        }
    }

    #[test]
    fn incremental_equals_one_shot() {
        let data = b"split across updates";
        let mut crc = Crc16::new();
        crc.update_slice(&data[..7]);
        crc.update_slice(&data[7..]);
        assert_eq!(crc.value(), crc16(data));
    }
}
