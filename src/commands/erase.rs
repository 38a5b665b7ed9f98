//! Erase command implementation

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::cli::{LinkArgs, MemoryKind};
use super::{open_target, CommandResult};

pub fn run(memory: MemoryKind, link: &LinkArgs) -> CommandResult {
    let mut target = open_target(memory, link)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Erasing...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    target.erase()?;

    spinner.finish_with_message("Erase complete");
    Ok(())
}
