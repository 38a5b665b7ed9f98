//! Write-then-verify orchestration.

use crate::error::{Error, Result};
use crate::image::WriteRegions;
use crate::target::Target;

/// Mismatches tolerated (after retry) before programming is abandoned.
pub const DEFAULT_MAX_VERIFY_ERRORS: u32 = 10;

/// Progress callbacks so the command layer can render bars without the
/// library knowing about terminals.
pub trait ProgramProgress {
    fn writing(&mut self, _total_bytes: u64) {}
    fn wrote(&mut self, _bytes: u64) {}
    fn verifying(&mut self, _total_bytes: u64) {}
    fn verified(&mut self, _bytes: u64) {}
    fn mismatch(&mut self, _address: u32, _wrote: u8, _read: u8) {}
}

pub struct NoProgress;

impl ProgramProgress for NoProgress {}

/// Program every non-empty region of `image` and read each back.
///
/// A mismatched byte gets one unconditional rewrite-and-reread before it
/// counts against `max_errors` (0 = unlimited). Transient bit errors on the
/// marginal bit-banged link are common enough that the retry rescues most
/// runs; persistent mismatches mean a worn or broken part.
pub fn write_and_verify<T, P>(
    target: &mut T,
    image: &[u8],
    regions: &WriteRegions,
    max_errors: u32,
    progress: &mut P,
) -> Result<()>
where
    T: Target + ?Sized,
    P: ProgramProgress,
{
    let total: u64 = regions.iter().map(|r| u64::from(r.len)).sum();

    progress.writing(total);
    for region in regions.iter().filter(|r| !r.is_empty()) {
        let span = region.start as usize..(region.start + region.len) as usize;
        target.write(&image[span], region.start)?;
        progress.wrote(u64::from(region.len));
    }

    progress.verifying(total);
    let mut errors = 0u32;
    for region in regions.iter().filter(|r| !r.is_empty()) {
        let base = region.start as usize;
        let mut readback = vec![0u8; region.len as usize];
        target.read(&mut readback, region.start)?;
        for (i, &got) in readback.iter().enumerate() {
            let expected = image[base + i];
            if got == expected {
                continue;
            }
            let address = region.start + i as u32;
            target.write(&image[base + i..base + i + 1], address)?;
            let mut reread = [0u8];
            target.read(&mut reread, address)?;
            if reread[0] == expected {
                log::debug!("0x{address:04X} recovered on rewrite");
                continue;
            }
            progress.mismatch(address, expected, reread[0]);
            log::error!(
                "verify mismatch at 0x{address:04X}: wrote 0x{expected:02X}, read 0x{:02X}",
                reread[0]
            );
            errors += 1;
            if max_errors != 0 && errors > max_errors {
                return Err(Error::VerifyFailed(errors));
            }
        }
        progress.verified(u64::from(region.len));
    }
    if errors > 0 {
        return Err(Error::VerifyFailed(errors));
    }
    Ok(())
}
