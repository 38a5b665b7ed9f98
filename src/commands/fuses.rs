//! Fuses command implementation

use moteprog_core::target::fuses::{describe, FuseRecord};
use moteprog_core::target::{avr, AvrMemory, AvrTarget};
use moteprog_ftdi::Ft232r;

use crate::cli::LinkArgs;
use super::CommandResult;

pub fn run(write: Option<&str>, link: &LinkArgs) -> CommandResult {
    // parse before touching hardware
    let wanted = write.map(FuseRecord::parse).transpose()?;

    let profile = avr::board_profile(link.slow);
    let bridge = Ft232r::open(&profile)?;
    let mut target = AvrTarget::open(bridge, AvrMemory::Fuses)?;
    println!(
        "Found {} (signature 0x{:06X})",
        target.device().name,
        target.signature()
    );

    if let Some(record) = wanted {
        target.write_fuses(&record)?;
        println!("Fuses written: {}", record.format());
    }

    let record = target.read_fuses()?;
    println!("Fuses: {}", record.format());
    print!("{}", describe(target.signature(), &record));
    Ok(())
}
