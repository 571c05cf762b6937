//! Error types shared between the command core and its collaborators.

use thiserror::Error;

/// Storage-card playback fault detected when a job runs out of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StorageFault {
    /// Card removed mid-build.
    #[error("storage card removed")]
    NoCard,

    /// Block checksum mismatch.
    #[error("storage CRC mismatch")]
    Crc,

    /// Any other read failure.
    #[error("storage read failure")]
    Read,
}

impl StorageFault {
    /// Operator-facing message latched after the safety shutdown.
    pub const fn message(&self) -> &'static str {
        match self {
            Self::NoCard => "SD card removed",
            Self::Crc => "SD CRC error",
            Self::Read => "SD read error",
        }
    }
}

/// Toolhead request failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ToolheadError {
    /// The toolhead did not answer in time.
    #[error("toolhead response timeout")]
    Timeout,

    /// The toolhead link is busy with another transaction; retry later.
    #[error("toolhead link busy")]
    Busy,

    /// The toolhead answered with a failure code.
    #[error("toolhead rejected request (code {0})")]
    Rejected(u8),
}

impl ToolheadError {
    /// Busy is the only failure the command loop retries on its own.
    #[inline]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy)
    }
}
