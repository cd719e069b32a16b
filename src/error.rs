//! Error types for archive resolution.
//!
//! Every fallible core operation returns [`Result<T>`]. Variants are concrete
//! so callers can report precisely what went wrong; [`Error::kind`] folds them
//! into the coarse [`ErrorKind`] taxonomy when only the category matters.
//!
//! A CRC mismatch is deliberately *not* an error: it is reported through
//! [`MaterializationResult::crc_mismatch`](crate::MaterializationResult) so
//! callers can still inspect the damaged bytes.

use std::io;

use crate::zip::CompressionMethod;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A record failed signature, reserved-bit or structural checks.
    MalformedRecord,
    /// A required record or entry could not be located.
    NotFound,
    /// The archive uses something this crate does not implement.
    UnsupportedFeature,
    /// Consumed or produced byte counts disagree with the declared ones.
    SizeMismatch,
    /// A read went past the end of the buffer.
    OutOfBounds,
    /// Underlying I/O failure.
    Io,
}

/// Errors produced while locating, decoding or materializing entries.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Buffer too short to hold an end of central directory record.
    #[error("buffer of {len} bytes is too small to be an archive (need at least {min})")]
    TooSmall { len: usize, min: usize },

    /// Backward scan reached the start of the buffer without a match.
    #[error("end of central directory record not found")]
    DirectoryEndNotFound,

    /// No entry with the requested name exists.
    #[error("entry not found: {0}")]
    EntryNotFound(String),

    /// A fixed record did not start with its signature.
    #[error("invalid {record} signature {found:#010x} at offset {offset:#x}")]
    BadSignature {
        record: &'static str,
        offset: u64,
        found: u32,
    },

    /// Reserved bits were set in a coder flag byte.
    #[error("reserved coder flag bits set: {flags:#04x}")]
    ReservedFlagsSet { flags: u8 },

    /// A record was structurally inconsistent.
    #[error("malformed record at offset {offset:#x}: {reason}")]
    MalformedRecord { offset: u64, reason: String },

    /// A decompressor rejected its input.
    #[error("corrupt {method} data: {reason}")]
    CorruptData {
        method: CompressionMethod,
        reason: String,
    },

    #[error("unsupported compression method: {0}")]
    UnsupportedCompressionMethod(CompressionMethod),

    #[error("alternative coder methods are not supported")]
    UnsupportedAlternativeMethods,

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),

    /// Consumed or decompressed byte counts disagree with the authoritative sizes.
    #[error(
        "size mismatch: compressed {actual_compressed} (expected {expected_compressed}), \
         uncompressed {actual_uncompressed} (expected {expected_uncompressed})"
    )]
    SizeMismatch {
        expected_compressed: u64,
        actual_compressed: u64,
        expected_uncompressed: u64,
        actual_uncompressed: u64,
    },

    #[error("read of {requested} bytes at offset {offset:#x} exceeds buffer length {len}")]
    OutOfBounds {
        offset: usize,
        requested: usize,
        len: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            offset: offset as u64,
            reason: reason.into(),
        }
    }

    pub(crate) fn corrupt(method: CompressionMethod, reason: impl ToString) -> Self {
        Error::CorruptData {
            method,
            reason: reason.to_string(),
        }
    }

    /// Category of this error in the coarse taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::BadSignature { .. }
            | Error::ReservedFlagsSet { .. }
            | Error::MalformedRecord { .. }
            | Error::CorruptData { .. } => ErrorKind::MalformedRecord,
            Error::TooSmall { .. } | Error::DirectoryEndNotFound | Error::EntryNotFound(_) => {
                ErrorKind::NotFound
            }
            Error::UnsupportedCompressionMethod(_)
            | Error::UnsupportedAlternativeMethods
            | Error::UnsupportedFeature(_) => ErrorKind::UnsupportedFeature,
            Error::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            Error::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
