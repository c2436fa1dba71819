//! Error taxonomy shared by every reader, builder and extraction routine.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors produced while reading, building or merging disc images.
#[derive(Error, Debug)]
pub enum Error {
    /// Underlying read/write failure on the container or host file system.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Struct (de)serialization failure, covers truncated/misaligned binary data.
    #[error("binary read/write error: {0}")]
    BinRw(#[from] binrw::Error),

    /// Bad magic, malformed FST, or any other structurally invalid image.
    #[error("invalid disc format: {0}")]
    InvalidFormat(String),

    /// Common-key index out of range, or a required key file is missing.
    #[error("crypto mismatch: {0}")]
    CryptoMismatch(String),

    /// The planned layout does not fit within the destination's capacity.
    #[error("disk full: {0}")]
    DiskFull(String),

    /// Unable to create a directory or open a host file during extraction or build.
    #[error("host io error at {path}: {source}")]
    HostIo {
        /// Path that could not be accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A required host file (e.g. `sys/boot.bin`) was not found.
    #[error("required file not found: {0}")]
    NotFound(PathBuf),
}

impl Error {
    /// Shorthand for [`Error::InvalidFormat`].
    pub fn invalid_format(msg: impl Into<String>) -> Self { Error::InvalidFormat(msg.into()) }

    /// Shorthand for [`Error::CryptoMismatch`].
    pub fn crypto_mismatch(msg: impl Into<String>) -> Self { Error::CryptoMismatch(msg.into()) }

    /// Shorthand for [`Error::DiskFull`].
    pub fn disk_full(msg: impl Into<String>) -> Self { Error::DiskFull(msg.into()) }
}
