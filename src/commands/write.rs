//! Write command implementation

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;

use moteprog_core::program::{write_and_verify, ProgramProgress};

use crate::cli::{LinkArgs, MemoryKind};
use super::{open_target, CommandResult};

/// File the headered nRF image is mirrored into, for inspection and for
/// feeding the over-the-air reprogramming tools.
const NRF_IMAGE_DUMP: &str = "nrf9e5_out.bin";

/// Progress reporter using indicatif progress bars
struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
}

impl IndicatifProgress {
    fn new() -> Self {
        Self { multi: MultiProgress::new(), current_bar: None }
    }

    fn create_bar(&mut self, total: u64, phase: &'static str) {
        let pb = self.multi.add(ProgressBar::new(total));
        pb.set_style(
            ProgressStyle::default_bar()
                .template(&format!(
                    "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                    phase
                ))
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        self.current_bar = Some(pb);
    }

    fn finish(&mut self, message: &'static str) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_with_message(message);
        }
    }
}

impl ProgramProgress for IndicatifProgress {
    fn writing(&mut self, total_bytes: u64) {
        self.create_bar(total_bytes, "Writing");
    }

    fn wrote(&mut self, bytes: u64) {
        if let Some(pb) = &self.current_bar {
            pb.inc(bytes);
        }
    }

    fn verifying(&mut self, total_bytes: u64) {
        self.finish("Write complete");
        self.create_bar(total_bytes, "Verifying");
    }

    fn verified(&mut self, bytes: u64) {
        if let Some(pb) = &self.current_bar {
            pb.inc(bytes);
        }
    }

    fn mismatch(&mut self, address: u32, wrote: u8, read: u8) {
        if let Some(pb) = &self.current_bar {
            pb.println(format!(
                "mismatch at 0x{address:04X}: wrote 0x{wrote:02X}, read 0x{read:02X}"
            ));
        }
    }
}

pub fn run(
    memory: MemoryKind,
    input: &Path,
    reprogram: bool,
    max_errors: u32,
    link: &LinkArgs,
) -> CommandResult {
    let raw = fs::read(input)?;

    let mut target = open_target(memory, link)?;
    let geometry = target.geometry();

    if raw.len() > geometry.memory_size as usize {
        return Err(format!(
            "{} is {} bytes; the selected memory holds {}",
            input.display(),
            raw.len(),
            geometry.memory_size
        )
        .into());
    }

    let mut image = vec![0xFF; geometry.memory_size as usize];
    image[..raw.len()].copy_from_slice(&raw);

    let regions = target.add_header(&mut image, raw.len() as u32, reprogram)?;

    if memory == MemoryKind::NrfEeprom {
        let headered = regions[0].len as usize;
        fs::write(NRF_IMAGE_DUMP, &image[..headered])?;
        log::info!("headered image saved to {NRF_IMAGE_DUMP}");
    }

    let code_size = target.geometry().code_size;
    println!(
        "Programming {} bytes ({:.1}% of the {} byte code area)",
        regions[0].len,
        regions[0].len as f64 * 100.0 / code_size as f64,
        code_size
    );

    let mut progress = IndicatifProgress::new();
    write_and_verify(&mut *target, &image, &regions, max_errors, &mut progress)?;
    progress.finish("Verify complete");

    target.reset()?;
    println!("Write verified");
    Ok(())
}
