//! Error types returned by every imaging operation.
use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a transfer or of device discovery.
///
/// Each variant is a distinct failure class: callers decide whether to retry
/// the whole transfer, the core never retries on its own.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The compressed container is malformed, truncated or not what its name claims.
    #[error("invalid {format} stream: {reason}")]
    Format {
        format: &'static str,
        reason: String,
    },

    /// An open, read, write or stat on the source or destination failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The copy finished cleanly but moved a different number of bytes than expected.
    #[error("size mismatch: expected {expected} bytes, transferred {actual} bytes")]
    SizeMismatch { expected: u64, actual: u64 },

    /// Flushing the destination to stable storage failed.
    #[error("failed to sync destination to stable storage: {0}")]
    Sync(#[source] io::Error),

    /// The host could not be queried for block devices.
    #[error("failed to query block devices: {0}")]
    DeviceQuery(#[source] io::Error),

    /// Enumeration succeeded but no device survived filtering.
    #[error("no eligible devices found (removable only: {removable_only})")]
    NoEligibleDevice { removable_only: bool },

    /// A copy was requested with a zero-sized buffer.
    #[error("chunk size must be at least one byte")]
    InvalidChunkSize,
}

impl Error {
    pub(crate) fn format(format: &'static str, reason: impl Into<String>) -> Self {
        Error::Format {
            format,
            reason: reason.into(),
        }
    }
}
