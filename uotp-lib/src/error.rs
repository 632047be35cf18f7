use std::array::TryFromSliceError;
use std::io;
use thiserror::Error;

/// The primary error type for the `uotp-lib` library.
#[derive(Error, Debug)]
pub enum UotpError {
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    #[error("Insufficient data: expected at least {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Server returned status {status}: {message}")]
    Server { status: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Timeout during network operation: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Account has not been issued yet")]
    NotIssued,
}

impl UotpError {
    /// Malformed or undersized wire data.
    pub fn is_framing(&self) -> bool {
        matches!(self, UotpError::InvalidPacket(_) | UotpError::InsufficientData { .. })
    }

    /// Connection, I/O, timeout or cancellation failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, UotpError::Io(_) | UotpError::Timeout(_) | UotpError::Cancelled)
    }
}

impl From<TryFromSliceError> for UotpError {
    fn from(_: TryFromSliceError) -> Self {
        UotpError::InvalidPacket("Failed to convert slice to array".to_string())
    }
}

/// Bail out with `InsufficientData` when `data` is shorter than `expected`.
pub(crate) fn ensure_len(data: &[u8], expected: usize) -> Result<(), UotpError> {
    if data.len() < expected {
        return Err(UotpError::InsufficientData {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}
