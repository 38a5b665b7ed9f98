//! Read command implementation

use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::cli::{LinkArgs, MemoryKind};
use super::{open_target, CommandResult};

pub fn run(memory: MemoryKind, output: &Path, link: &LinkArgs) -> CommandResult {
    let mut target = open_target(memory, link)?;
    let geometry = target.geometry();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Reading {} bytes...", geometry.memory_size));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let mut data = vec![0u8; geometry.memory_size as usize];
    target.read(&mut data, 0)?;

    spinner.finish_with_message("Read complete");

    fs::write(output, &data)?;
    println!("Wrote {} bytes to {}", data.len(), output.display());
    Ok(())
}
