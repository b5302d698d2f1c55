//! Error types for rasterkit.
//!
//! Every codec and raster operation reports failures through [`Error`]. The
//! variants describe who is at fault: the caller (bad dimensions), the input
//! bytes (corrupt stream), or the library (a feature it does not implement).

use thiserror::Error;

/// Main error type for rasterkit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Zero or inconsistent image dimensions, an empty frame sequence, or
    /// frame geometry that does not fit the target format.
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// The byte stream violates its format: bad signature, checksum
    /// mismatch, malformed block, or out-of-range compressed codes.
    #[error("Corrupt stream: {0}")]
    CorruptStream(String),

    /// The stream is well-formed as far as we can tell but uses a feature
    /// this library does not implement (or an unknown critical chunk).
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// A deferred operation could not complete on its worker thread.
    #[error("Worker failed: {0}")]
    Worker(String),
}

impl Error {
    /// Shorthand for [`Error::CorruptStream`].
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Error::CorruptStream(msg.into())
    }

    /// Shorthand for [`Error::InvalidDimensions`].
    pub fn dimensions(msg: impl Into<String>) -> Self {
        Error::InvalidDimensions(msg.into())
    }

    /// Shorthand for [`Error::UnsupportedFeature`].
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedFeature(msg.into())
    }

    /// True when the error blames the input bytes.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Error::CorruptStream(_))
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        let kind = match err {
            Error::InvalidDimensions(_) => std::io::ErrorKind::InvalidInput,
            Error::CorruptStream(_) | Error::UnsupportedFeature(_) => {
                std::io::ErrorKind::InvalidData
            }
            Error::Worker(_) => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}

/// Result type alias for rasterkit operations.
pub type Result<T> = std::result::Result<T, Error>;
