//! Error types for archive operations.

use tar_header::HeaderError;
use thiserror::Error;

/// Errors that can occur while reading, creating or updating an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// I/O error from the underlying medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed header (checksum, invalid octal, inconsistent ustar fields).
    #[error("format error: {0}")]
    Format(#[from] HeaderError),

    /// The operation is not allowed in the archive's mode or access pattern.
    #[error("{operation} is not supported: {reason}")]
    Unsupported {
        /// The rejected operation.
        operation: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The entry was deleted.
    #[error("entry {0:?} has been deleted")]
    EntryDeleted(String),

    /// The entry handle does not belong to this archive.
    #[error("no entry with index {0}")]
    UnknownEntry(usize),

    /// The entry was released by streaming iteration.
    #[error("entry {0:?} was released when the stream advanced")]
    StaleEntry(String),

    /// The archive has been closed.
    #[error("archive has been closed")]
    Disposed,

    /// An earlier scan stopped at a malformed header.
    #[error("archive is unusable past the malformed header at offset {offset}")]
    Faulted {
        /// Offset of the header that failed to decode.
        offset: u64,
    },

    /// Path exceeds configured maximum length.
    #[error("path exceeds limit: {len} bytes > {limit} bytes")]
    PathTooLong {
        /// Actual path length.
        len: usize,
        /// Configured limit.
        limit: usize,
    },

    /// GNU long name record exceeds configured maximum size.
    #[error("GNU long name exceeds limit: {size} bytes > {limit} bytes")]
    LongNameTooLarge {
        /// Size of the record's content.
        size: u64,
        /// Configured limit.
        limit: u64,
    },

    /// Two long name records without an intervening entry.
    #[error("duplicate GNU long name entry")]
    DuplicateLongName,

    /// A long name record at the end of the archive.
    #[error("GNU long name entry without a following entry")]
    OrphanedLongName,

    /// Entry size in header is invalid (overflow when computing padded size).
    #[error("invalid entry size: {0}")]
    InvalidSize(u64),

    /// The medium ended inside a header or an entry's data.
    #[error("unexpected EOF at position {pos}")]
    UnexpectedEof {
        /// Position in the medium where the data runs out.
        pos: u64,
    },

    /// The entry name cannot be represented in the configured encoding.
    #[error("entry name {name:?} cannot be encoded as {encoding}")]
    UnencodableName {
        /// The rejected name.
        name: String,
        /// Name of the configured encoding.
        encoding: &'static str,
    },

    /// The entry name is empty.
    #[error("entry name is empty")]
    EmptyName,
}

impl ArchiveError {
    pub(crate) fn unsupported(operation: &'static str, reason: impl Into<String>) -> Self {
        ArchiveError::Unsupported {
            operation,
            reason: reason.into(),
        }
    }
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;
