//! moteprog - USB programmer for wireless sensor nodes
//!
//! Talks to the 25mm (ATmega) and 10mm (nRF9E5) node families through their
//! FT232R-based programming boards. The FT232R runs in synchronous bit-bang
//! mode; everything from SPI clock edges upward is done in software in
//! `moteprog-core`, with this binary providing the command-line surface.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};

/// Default log filter for the given `-v` count; `RUST_LOG` still overrides.
fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(cli.verbose)),
    )
    .init();

    let result = match cli.command {
        Commands::Erase { memory, link } => commands::erase::run(memory, &link),
        Commands::Read { memory, output, link } => commands::read::run(memory, &output, &link),
        Commands::Write { memory, input, reprogram, max_errors, link } => {
            commands::write::run(memory, &input, reprogram, max_errors, &link)
        }
        Commands::Fuses { write, link } => commands::fuses::run(write.as_deref(), &link),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::log_filter;

    #[test]
    fn verbosity_flags_select_the_filter() {
        assert_eq!(log_filter(0), "info");
        assert_eq!(log_filter(1), "debug");
        assert_eq!(log_filter(2), "trace");
        assert_eq!(log_filter(5), "trace");
    }
}
