//! Command implementations

pub mod erase;
pub mod fuses;
pub mod read;
pub mod write;

use std::error::Error;

use moteprog_core::target::{avr, nrf, AvrMemory, AvrTarget, NrfTarget, Target};
use moteprog_ftdi::Ft232r;

use crate::cli::{LinkArgs, MemoryKind};

pub type CommandResult = Result<(), Box<dyn Error>>;

/// Open the right board and enter programming mode for the selected memory.
pub fn open_target(memory: MemoryKind, link: &LinkArgs) -> Result<Box<dyn Target>, Box<dyn Error>> {
    match memory {
        MemoryKind::AvrFlash | MemoryKind::AvrEeprom => {
            let profile = avr::board_profile(link.slow);
            let bridge = Ft232r::open(&profile)?;
            let kind = if memory == MemoryKind::AvrFlash {
                AvrMemory::Flash
            } else {
                AvrMemory::Eeprom
            };
            let target = AvrTarget::open(bridge, kind)?;
            println!(
                "Found {} (signature 0x{:06X})",
                target.device().name,
                target.signature()
            );
            Ok(Box::new(target))
        }
        MemoryKind::NrfEeprom => {
            let profile = nrf::board_profile(link.slow);
            let bridge = Ft232r::open(&profile)?;
            Ok(Box::new(NrfTarget::open(bridge, link.crystal)?))
        }
    }
}
