//! Image preparation for wireless in-system reprogramming.
//!
//! Nodes that reprogram themselves over the air keep two copies of the
//! application: the live copy at the bottom of memory and a mirror in the
//! upper half that the bootloader can fall back to. A small header carries
//! the code length and a CRC-16 so the bootloader can judge whether an image
//! is intact before jumping into it.

use crate::crc16::Crc16;
use crate::error::{Error, Result};

/// Top of the usable AVR code area; the reprogramming header lives here.
pub const AVR_HEADER_OFFSET: u32 = 0xF800;
/// Two copies of the 4-byte length/CRC record.
pub const AVR_HEADER_SIZE: u32 = 8;
/// Start of the wireless bootloader in the upper bank.
pub const AVR_BOOTLOADER_OFFSET: u32 = 0x1F800;

/// Prefix header the nRF9E5 boot ROM expects in the 25320 EEPROM.
pub const NRF_HEADER_SIZE: u32 = 7;
/// Config-byte flag selecting the fast EEPROM speed grade.
pub const NRF_FAST_EEPROM: u8 = 0x08;

/// Usable code bytes below the AVR header, clamped for parts too small to
/// hold the dual-copy layout.
pub fn avr_code_area(memory_size: u32) -> u32 {
    AVR_HEADER_OFFSET.min(memory_size / 2)
}

/// One contiguous span of the image that actually gets programmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteRegion {
    pub start: u32,
    pub len: u32,
}

impl WriteRegion {
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Region list produced by header injection. Zero-length entries are legal
/// and skipped by the programming orchestrator.
pub type WriteRegions = [WriteRegion; 4];

/// Single region covering `[0, len)`, for plain non-reprogrammable writes.
pub fn plain_regions(len: u32) -> WriteRegions {
    let mut regions = WriteRegions::default();
    regions[0] = WriteRegion { start: 0, len };
    regions
}

/// Scan backward from the end of the code area for the last byte that is
/// neither 0x00 nor 0xFF; everything below that index is code.
pub fn find_code_end(data: &[u8], code_area: u32) -> u32 {
    let mut code_end = 0;
    for i in (1..=code_area).rev() {
        let byte = data[i as usize];
        if byte == 0x00 || byte == 0xFF {
            code_end = i;
        } else {
            break;
        }
    }
    code_end.saturating_sub(1)
}

/// Lay out an AVR image for reprogramming support.
///
/// The code is mirrored into the upper memory bank and an 8-byte header
/// (little-endian code end and CRC-16, stored twice) is placed at
/// [`AVR_HEADER_OFFSET`]. Returns the regions worth programming: the code,
/// the header, the mirror, and whatever of the image reaches into the
/// bootloader area.
///
/// `data` must span the whole memory, padded with 0xFF past `raw_len`.
pub fn add_avr_header(data: &mut [u8], raw_len: u32, memory_size: u32) -> WriteRegions {
    debug_assert_eq!(data.len(), memory_size as usize);
    let code_end = find_code_end(data, avr_code_area(memory_size));
    let mirror = memory_size / 2;

    data.copy_within(0..code_end as usize, mirror as usize);

    let mut crc = Crc16::new();
    crc.update_slice(&data[..code_end as usize]);
    let len_bytes = (code_end as u16).to_le_bytes();
    let crc_bytes = crc.value().to_le_bytes();
    let header = AVR_HEADER_OFFSET as usize;
    for base in [header, header + 4] {
        data[base..base + 2].copy_from_slice(&len_bytes);
        data[base + 2..base + 4].copy_from_slice(&crc_bytes);
    }

    let mut regions = WriteRegions::default();
    regions[0] = WriteRegion { start: 0, len: code_end };
    regions[1] = WriteRegion { start: AVR_HEADER_OFFSET, len: AVR_HEADER_SIZE };
    regions[2] = WriteRegion { start: mirror, len: code_end };
    regions[3] = WriteRegion {
        start: AVR_BOOTLOADER_OFFSET,
        len: raw_len.saturating_sub(AVR_BOOTLOADER_OFFSET),
    };
    regions
}

/// Prefix an nRF9E5 image with the 7-byte boot header and, when reprogram
/// support is wanted, mirror the headered image into the upper half.
///
/// `data` must span the whole memory; the code is shifted up by the header
/// size in place.
pub fn add_nrf_header(
    data: &mut [u8],
    raw_len: u32,
    crystal_mhz: u32,
    memory_size: u32,
    code_size: u32,
    reprogram: bool,
) -> Result<WriteRegions> {
    if raw_len > code_size {
        return Err(Error::ImageTooLarge { len: raw_len, max: code_size });
    }
    let quarters = crystal_mhz / 4;
    if quarters == 0 || quarters > 5 || crystal_mhz % 4 != 0 {
        return Err(Error::InvalidCrystalFrequency(crystal_mhz));
    }

    let total = raw_len + NRF_HEADER_SIZE;
    let blocks = total.div_ceil(256);
    let crc = crate::crc16::crc16(&data[..raw_len as usize]);

    data.copy_within(0..raw_len as usize, NRF_HEADER_SIZE as usize);
    data[0] = NRF_FAST_EEPROM | (quarters - 1) as u8;
    data[1] = NRF_HEADER_SIZE as u8;
    data[2] = (blocks - 1) as u8;
    data[3..5].copy_from_slice(&(raw_len as u16).to_le_bytes());
    data[5..7].copy_from_slice(&crc.to_le_bytes());

    let mut regions = WriteRegions::default();
    regions[0] = WriteRegion { start: 0, len: total };
    if reprogram {
        let mirror = memory_size / 2;
        data.copy_within(0..total as usize, mirror as usize);
        regions[1] = WriteRegion { start: mirror, len: total };
    }
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc16::crc16;

    const MEMORY: u32 = 131072;

    fn image_with_code(code: &[u8]) -> Vec<u8> {
        let mut data = vec![0xFF; MEMORY as usize];
        data[..code.len()].copy_from_slice(code);
        data
    }

    #[test]
    fn code_end_ignores_trailing_padding() {
        let mut code = vec![0u8; 300];
        for (i, byte) in code.iter_mut().enumerate() {
            *byte = (i % 251) as u8 + 1;
        }
        code.extend_from_slice(&[0x00, 0xFF, 0x00]);
        let data = image_with_code(&code);
        assert_eq!(find_code_end(&data, avr_code_area(MEMORY)), 299);
    }

    #[test]
    fn code_end_of_blank_image_is_zero() {
        let data = vec![0xFF; MEMORY as usize];
        assert_eq!(find_code_end(&data, avr_code_area(MEMORY)), 0);
    }

    #[test]
    fn avr_header_layout() {
        let code: Vec<u8> = (0..500u32).map(|i| (i % 200) as u8 + 1).collect();
        let mut data = image_with_code(&code);

        // snapshot the scan result before the header bytes land in the buffer
        let code_end = find_code_end(&data, avr_code_area(MEMORY));
        assert_eq!(code_end, 499);

        let regions = add_avr_header(&mut data, code.len() as u32, MEMORY);
        assert_eq!(regions[0], WriteRegion { start: 0, len: code_end });
        assert_eq!(regions[1], WriteRegion { start: 0xF800, len: 8 });
        assert_eq!(regions[2], WriteRegion { start: 65536, len: code_end });
        assert!(regions[3].is_empty());

        // mirror copy in the upper bank
        assert_eq!(
            data[65536..65536 + code_end as usize],
            data[..code_end as usize]
        );

        // both header copies: little-endian code end then CRC
        let crc = crc16(&data[..code_end as usize]);
        for base in [0xF800usize, 0xF804] {
            assert_eq!(data[base], (code_end & 0xFF) as u8);
            assert_eq!(data[base + 1], (code_end >> 8) as u8);
            assert_eq!(data[base + 2], (crc & 0xFF) as u8);
            assert_eq!(data[base + 3], (crc >> 8) as u8);
        }
    }

    #[test]
    fn avr_header_is_insensitive_to_padding_amount() {
        let code: Vec<u8> = (1..=100u8).collect();
        let mut short = image_with_code(&code);
        let mut padded = image_with_code(&[&code[..], &[0xFF; 64][..]].concat());
        let r1 = add_avr_header(&mut short, 100, MEMORY);
        let r2 = add_avr_header(&mut padded, 164, MEMORY);
        assert_eq!(r1[0], r2[0]);
        assert_eq!(short[0xF800..0xF808], padded[0xF800..0xF808]);
    }

    #[test]
    fn bootloader_tail_region() {
        let raw_len = 0x1F800 + 512;
        let mut data = vec![0x55; MEMORY as usize];
        data[600..].fill(0xFF);
        let regions = add_avr_header(&mut data, raw_len, MEMORY);
        assert_eq!(regions[3], WriteRegion { start: 0x1F800, len: 512 });
    }

    #[test]
    fn nrf_header_fields() {
        let code: Vec<u8> = (0..300u32).map(|i| (i % 97) as u8 + 1).collect();
        let mut data = vec![0xFF; 8192];
        data[..300].copy_from_slice(&code);
        let crc = crc16(&code);

        let regions = add_nrf_header(&mut data, 300, 20, 8192, 4096 - 7, true).unwrap();
        assert_eq!(regions[0], WriteRegion { start: 0, len: 307 });
        assert_eq!(regions[1], WriteRegion { start: 4096, len: 307 });

        assert_eq!(data[0], NRF_FAST_EEPROM | 4); // 20 MHz crystal
        assert_eq!(data[1], 7);
        assert_eq!(data[2], 1); // 307 bytes = 2 blocks
        assert_eq!(u16::from_le_bytes([data[3], data[4]]), 300);
        assert_eq!(u16::from_le_bytes([data[5], data[6]]), crc);
        // code shifted up by the header size, and mirrored
        assert_eq!(data[7..307], code[..]);
        assert_eq!(data[4096..4403], data[..307]);
    }

    #[test]
    fn nrf_header_rejects_oversize_and_bad_crystal() {
        let mut data = vec![0xFF; 8192];
        assert!(matches!(
            add_nrf_header(&mut data, 4090, 20, 8192, 4096 - 7, false),
            Err(Error::ImageTooLarge { .. })
        ));
        assert!(matches!(
            add_nrf_header(&mut data, 100, 24, 8192, 4096 - 7, false),
            Err(Error::InvalidCrystalFrequency(24))
        ));
        assert!(matches!(
            add_nrf_header(&mut data, 100, 10, 8192, 4096 - 7, false),
            Err(Error::InvalidCrystalFrequency(10))
        ));
    }
}
