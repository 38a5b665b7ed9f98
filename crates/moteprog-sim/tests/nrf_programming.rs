//! Full-stack 25320 EEPROM programming for the 10mm (nRF9E5) boards.

use moteprog_core::bridge::PinMap;
use moteprog_core::image;
use moteprog_core::program::{write_and_verify, NoProgress, DEFAULT_MAX_VERIFY_ERRORS};
use moteprog_core::target::{NrfTarget, Target};
use moteprog_sim::{SerialEeprom, SimBridge};

const WIRING: PinMap = PinMap { ncs: 0x40, sck: 0x04, miso: 0x08, mosi: 0x10 };

fn open_target(crystal_mhz: u32) -> NrfTarget<SimBridge<SerialEeprom>> {
    let bridge = SimBridge::new(SerialEeprom::new(8192), WIRING);
    NrfTarget::open(bridge, crystal_mhz).expect("open failed")
}

fn firmware(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 249) as u8 + 1).collect()
}

#[test]
fn rejects_unsupported_crystal_frequencies() {
    let bridge = SimBridge::new(SerialEeprom::new(8192), WIRING);
    assert!(NrfTarget::open(bridge, 10).is_err());
}

#[test]
fn write_read_round_trip() {
    let mut target = open_target(20);
    let data = firmware(100);
    target.write(&data, 0x30).unwrap();
    let mut readback = vec![0u8; data.len()];
    target.read(&mut readback, 0x30).unwrap();
    assert_eq!(readback, data);
}

#[test]
fn final_page_is_written_twice() {
    let mut target = open_target(20);
    // 40 bytes from 0: a full page plus a partial one
    target.write(&firmware(40), 0).unwrap();
    // one WRITE for the first page, two for the last
    assert_eq!(target.bridge().responder().write_ops, 3);
}

#[test]
fn headered_image_boots_the_right_fields() {
    let mut target = open_target(16);
    let geometry = target.geometry();
    let code = firmware(300);
    let mut image_buf = vec![0xFF; geometry.memory_size as usize];
    image_buf[..code.len()].copy_from_slice(&code);

    let regions = target.add_header(&mut image_buf, 300, true).unwrap();
    write_and_verify(
        &mut target,
        &image_buf,
        &regions,
        DEFAULT_MAX_VERIFY_ERRORS,
        &mut NoProgress,
    )
    .unwrap();

    let mut header = [0u8; 7];
    target.read(&mut header, 0).unwrap();
    assert_eq!(header[0], image::NRF_FAST_EEPROM | 3); // 16 MHz crystal
    assert_eq!(header[1], 7);
    assert_eq!(u16::from_le_bytes([header[3], header[4]]), 300);
    assert_eq!(
        u16::from_le_bytes([header[5], header[6]]),
        moteprog_core::crc16::crc16(&code)
    );

    // shifted code and the reprogramming mirror
    let mut body = vec![0u8; 300];
    target.read(&mut body, 7).unwrap();
    assert_eq!(body, code);
    let mut mirror = vec![0u8; 307];
    target.read(&mut mirror, 4096).unwrap();
    assert_eq!(mirror[..], image_buf[..307]);
}

#[test]
fn erase_blanks_the_array() {
    let mut target = open_target(20);
    target.write(&firmware(64), 0).unwrap();
    target.erase().unwrap();
    let mut readback = vec![0u8; 128];
    target.read(&mut readback, 0).unwrap();
    assert!(readback.iter().all(|&b| b == 0xFF));
}
