//! ATmega parts reachable through the 25mm programming board. Supporting a
//! new part is one more row here, provided it speaks the same ISP protocol.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvrDevice {
    pub name: &'static str,
    pub signature: u32,
    pub flash_size: u32,
    pub flash_page_size: u32,
    pub eeprom_size: u32,
    pub eeprom_page_size: u32,
}

pub const ATMEGA128_SIGNATURE: u32 = 0x1E9702;
pub const ATMEGA1281_SIGNATURE: u32 = 0x1E9704;
pub const ATMEGA2561_SIGNATURE: u32 = 0x1E9802;
pub const ATMEGA325P_SIGNATURE: u32 = 0x1E950D;

pub const DEVICES: &[AvrDevice] = &[
    AvrDevice {
        name: "ATmega128",
        signature: ATMEGA128_SIGNATURE,
        flash_size: 131072,
        flash_page_size: 256,
        eeprom_size: 4096,
        eeprom_page_size: 8,
    },
    AvrDevice {
        name: "ATmega1281",
        signature: ATMEGA1281_SIGNATURE,
        flash_size: 131072,
        flash_page_size: 256,
        eeprom_size: 4096,
        eeprom_page_size: 8,
    },
    AvrDevice {
        name: "ATmega2561",
        signature: ATMEGA2561_SIGNATURE,
        flash_size: 262144,
        flash_page_size: 256,
        eeprom_size: 4096,
        eeprom_page_size: 8,
    },
    AvrDevice {
        name: "ATmega325P",
        signature: ATMEGA325P_SIGNATURE,
        flash_size: 32768,
        flash_page_size: 128,
        eeprom_size: 1024,
        eeprom_page_size: 4,
    },
];

pub fn find(signature: u32) -> Option<&'static AvrDevice> {
    DEVICES.iter().find(|device| device.signature == signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_signature() {
        let device = find(0x1E9702).unwrap();
        assert_eq!(device.name, "ATmega128");
        assert_eq!(device.flash_size, 131072);
        assert!(find(0x1E0000).is_none());
    }

    #[test]
    fn signatures_are_unique() {
        for (i, a) in DEVICES.iter().enumerate() {
            for b in &DEVICES[i + 1..] {
                assert_ne!(a.signature, b.signature);
            }
        }
    }
}
