use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// USB transport failure reported by the bridge backend.
    #[error("USB transport error: {0}")]
    Transport(String),

    /// The sampled vectors do not show SCK toggling. The board is
    /// disconnected, unpowered, or the bridge lost sync.
    #[error("clock not toggling in sampled data; check USB connection and board power")]
    ClockIntegrity,

    /// The target did not echo the instruction stream back one byte late.
    #[error("target out of sync: sent {sent:02X?}, received {received:02X?}")]
    EchoMismatch { sent: [u8; 4], received: [u8; 4] },

    /// No candidate pin assignment produced a programming-enable handshake.
    #[error("could not enter programming mode; check target connection and power")]
    ProgrammingEnableFailed,

    #[error("unrecognised device signature 0x{0:06X}")]
    UnknownSignature(u32),

    #[error("address range 0x{start:X}+{len} exceeds the {size} byte memory")]
    OutOfBounds { start: u32, len: u32, size: u32 },

    #[error("image is {len} bytes but at most {max} bytes fit")]
    ImageTooLarge { len: u32, max: u32 },

    #[error("fuse value must be 6 hexadecimal digits (<ext><high><low>, e.g. FF91E4)")]
    InvalidFuseValue,

    #[error("invalid crystal frequency {0} MHz (supported: 4, 8, 12, 16, 20)")]
    InvalidCrystalFrequency(u32),

    #[error("fuses cannot be erased")]
    FusesNotErasable,

    /// Verification failed even after per-byte rewrite retries.
    #[error("verification failed: {0} byte(s) did not match after retry")]
    VerifyFailed(u32),
}
