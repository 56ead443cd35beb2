//! Error types for the wavelet transform engine.

use core::fmt;

/// The error type for all transform operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DwtError {
    /// A scratch buffer or sparse block could not be allocated.
    OutOfMemory,
    /// A buffer size computation exceeded the addressable range.
    SizeOverflow,
    /// A sparse-array access referenced a rectangle outside the storage.
    InvalidRegion,
    /// The tile-component is structurally invalid (zero resolutions,
    /// missing window, mismatched buffer sizes).
    InvalidComponent,
}

impl fmt::Display for DwtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "out of memory"),
            Self::SizeOverflow => write!(f, "buffer size overflow"),
            Self::InvalidRegion => write!(f, "region exceeds sparse storage"),
            Self::InvalidComponent => write!(f, "invalid tile-component"),
        }
    }
}

impl std::error::Error for DwtError {}

/// Result type for all transform operations.
pub type Result<T> = core::result::Result<T, DwtError>;

macro_rules! bail {
    ($err:expr) => {
        return Err($err)
    };
}

pub(crate) use bail;
