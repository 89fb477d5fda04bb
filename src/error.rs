//! Error types for EspFs image access

use std::io;

use thiserror::Error;

use crate::image::{ESPFS_MAGIC, Whence};

/// Result type for EspFs operations
pub type Result<T> = std::result::Result<T, Error>;

/// EspFs error types
#[derive(Error, Debug)]
pub enum Error {
    /// An operation was attempted before an image was installed
    #[error("EspFs not initialized, call init first")]
    NotInitialized,

    /// The first header of the image does not carry the EspFs magic
    #[error("No EspFs image: magic {found:#010x} (should be {:#010x})", ESPFS_MAGIC)]
    NoImage { found: u32 },

    /// The directory scan reached the terminal entry without a match
    #[error("File not found: {0}")]
    NotFound(String),

    /// The image is malformed past the point the scan or read reached
    #[error("Corrupt EspFs image: {0}")]
    Corrupt(String),

    /// Seek request the entry's representation cannot honor
    #[error("Invalid seek: offset {offset} from {whence}")]
    InvalidSeek { offset: i64, whence: Whence },

    /// The file handle has already been closed
    #[error("File handle is closed")]
    Closed,

    /// IO error from the backing storage
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::Corrupt(reason.into())
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            Error::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, err),
            Error::InvalidSeek { .. } => io::Error::new(io::ErrorKind::InvalidInput, err),
            Error::Corrupt(_) | Error::NoImage { .. } => {
                io::Error::new(io::ErrorKind::InvalidData, err)
            }
            Error::NotInitialized | Error::Closed => io::Error::other(err),
        }
    }
}
