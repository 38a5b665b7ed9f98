//! Command-line interface definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use moteprog_core::program::DEFAULT_MAX_VERIFY_ERRORS;

#[derive(Parser)]
#[command(name = "moteprog")]
#[command(author, version, about = "USB programmer for 25mm and 10mm wireless sensor nodes")]
pub struct Cli {
    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which memory on which board family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MemoryKind {
    /// ATmega program flash on the 25mm boards (page programmed)
    AvrFlash,
    /// ATmega data EEPROM on the 25mm boards (byte programmed)
    AvrEeprom,
    /// 25320 EEPROM behind the nRF9E5 on the 10mm boards
    NrfEeprom,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct LinkArgs {
    /// Program with a very slow SPI clock (9600 baud)
    #[arg(long)]
    pub slow: bool,

    /// Crystal frequency in MHz on the 10mm board (4, 8, 12, 16 or 20)
    #[arg(long, default_value_t = 20)]
    pub crystal: u32,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Erase a memory to 0xFF
    Erase {
        #[arg(short, long, value_enum)]
        memory: MemoryKind,

        #[command(flatten)]
        link: LinkArgs,
    },

    /// Read the whole memory into a binary file
    Read {
        #[arg(short, long, value_enum)]
        memory: MemoryKind,

        /// Output file (overwritten if it exists)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        link: LinkArgs,
    },

    /// Write a binary image to a memory and verify it
    Write {
        #[arg(short, long, value_enum)]
        memory: MemoryKind,

        /// Input file (raw binary)
        #[arg(short, long)]
        input: PathBuf,

        /// Lay the image out for wireless in-system reprogramming
        #[arg(short, long)]
        reprogram: bool,

        /// Verification error budget before giving up (0 = unlimited)
        #[arg(long, default_value_t = DEFAULT_MAX_VERIFY_ERRORS)]
        max_errors: u32,

        #[command(flatten)]
        link: LinkArgs,
    },

    /// Read, and optionally write, the ATmega fuse bytes
    Fuses {
        /// 6-hex-digit value to write first (<ext><high><low>, e.g. FF91E4)
        #[arg(short, long)]
        write: Option<String>,

        #[command(flatten)]
        link: LinkArgs,
    },
}
