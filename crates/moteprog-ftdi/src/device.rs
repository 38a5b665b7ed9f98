use std::io::{Read, Write};
use std::time::{Duration, Instant};

use ftdi::{find_by_vid_pid, BitMode, Device, Interface};
use moteprog_core::bridge::{BoardProfile, PinMap, UsbBridge};
use moteprog_core::error::Error as CoreError;

use crate::error::{FtdiBridgeError, Result};

pub const VENDOR_ID: u16 = 0x0403;
pub const PRODUCT_ID: u16 = 0x6001;

/// Largest single bit-bang transfer that does not time out inside libftdi.
/// Found empirically; larger writes stall in usb_reap.
pub const MAX_TRANSFER_SIZE: usize = 384;

/// Sampled data should arrive within the bit-bang clock period plus the
/// 2 ms latency timer; a full second means the bridge wedged.
const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// An FT232R-based programming board in synchronous bit-bang mode.
pub struct Ft232r {
    device: Device,
    board: &'static str,
}

impl Ft232r {
    /// Open the bridge and put it into synchronous bit-bang mode with the
    /// profile's pin directions and clock rate.
    pub fn open(profile: &BoardProfile) -> Result<Self> {
        log::debug!(
            "looking for {} (VID={VENDOR_ID:04X} PID={PRODUCT_ID:04X})",
            profile.description
        );
        let mut device = find_by_vid_pid(VENDOR_ID, PRODUCT_ID)
            .interface(Interface::A)
            .open()
            .map_err(|e| FtdiBridgeError::Open {
                board: profile.description,
                reason: e.to_string(),
            })?;

        device
            .usb_reset()
            .map_err(|e| FtdiBridgeError::Config(format!("USB reset failed: {e}")))?;
        device
            .set_latency_timer(2)
            .map_err(|e| FtdiBridgeError::Config(format!("set latency timer failed: {e}")))?;
        device
            .set_baud_rate(profile.baud_rate)
            .map_err(|e| FtdiBridgeError::Config(format!("set baud rate failed: {e}")))?;
        device
            .set_bitmode(profile.pins.direction(), BitMode::SyncBB)
            .map_err(|e| FtdiBridgeError::Config(format!("set bit-bang mode failed: {e}")))?;
        device
            .usb_purge_buffers()
            .map_err(|e| FtdiBridgeError::Config(format!("purge failed: {e}")))?;

        log::info!("{} opened at {} baud", profile.description, profile.baud_rate);
        Ok(Ft232r { device, board: profile.description })
    }
}

impl UsbBridge for Ft232r {
    fn transfer_limit(&self) -> usize {
        MAX_TRANSFER_SIZE
    }

    fn configure(&mut self, pins: PinMap) -> moteprog_core::Result<()> {
        log::debug!("reconfiguring {} pin directions to 0x{:02X}", self.board, pins.direction());
        self.device
            .set_bitmode(pins.direction(), BitMode::SyncBB)
            .map_err(|e| CoreError::Transport(format!("set bit-bang mode failed: {e}")))?;
        self.device
            .usb_purge_buffers()
            .map_err(|e| CoreError::Transport(format!("purge failed: {e}")))?;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> moteprog_core::Result<()> {
        self.device
            .write_all(data)
            .map_err(|e| CoreError::Transport(format!("USB write failed: {e}")))?;
        log::trace!("wrote {} vectors", data.len());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> moteprog_core::Result<()> {
        let deadline = Instant::now() + READ_TIMEOUT;
        let mut total = 0;
        while total < buf.len() {
            match self.device.read(&mut buf[total..]) {
                Ok(0) => {
                    if Instant::now() > deadline {
                        return Err(CoreError::Transport(format!(
                            "USB read timed out after {total} of {} bytes",
                            buf.len()
                        )));
                    }
                    std::thread::sleep(Duration::from_micros(100));
                }
                Ok(n) => total += n,
                Err(e) => return Err(CoreError::Transport(format!("USB read failed: {e}"))),
            }
        }
        log::trace!("read {} vectors", total);
        Ok(())
    }
}

impl Drop for Ft232r {
    fn drop(&mut self) {
        // leave the port floating so the target can run
        if let Err(e) = self.device.usb_purge_buffers() {
            log::warn!("purge on close failed: {e}");
        }
        if let Err(e) = self.device.set_bitmode(0, BitMode::Reset) {
            log::warn!("bit-mode reset on close failed: {e}");
        }
    }
}
