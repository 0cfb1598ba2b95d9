//! Configurable limits on names read from an archive.

/// Configurable limits on names read from an archive.
///
/// These protect against malformed archives whose long name records would
/// otherwise make the scanner allocate unbounded buffers.
///
/// # Example
///
/// ```
/// use tar_archive::Limits;
///
/// let limits = Limits {
///     max_path_len: 1024,
///     ..Default::default()
/// };
/// assert_eq!(limits.max_long_name_size, Limits::default().max_long_name_size);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum path length in bytes.
    ///
    /// Applies to paths read from an archive and to names of new entries.
    /// Longer paths cause a [`ArchiveError::PathTooLong`] error.
    ///
    /// Default: 4096 bytes (Linux PATH_MAX).
    ///
    /// [`ArchiveError::PathTooLong`]: crate::ArchiveError::PathTooLong
    pub max_path_len: usize,

    /// Maximum size of a GNU long name record's content in bytes.
    ///
    /// Larger records cause a [`ArchiveError::LongNameTooLarge`] error.
    ///
    /// Default: 4097 bytes (a maximal path plus its terminator).
    ///
    /// [`ArchiveError::LongNameTooLarge`]: crate::ArchiveError::LongNameTooLarge
    pub max_long_name_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_path_len: 4096,
            max_long_name_size: 4097,
        }
    }
}

impl Limits {
    /// Create a new `Limits` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits that effectively disable the checks, for trusted archives.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            max_path_len: usize::MAX,
            max_long_name_size: u64::MAX,
        }
    }

    /// Conservative limits for untrusted archives.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            max_path_len: 1024,
            max_long_name_size: 1025,
        }
    }

    pub(crate) fn check_path(&self, len: usize) -> crate::Result<()> {
        if len > self.max_path_len {
            return Err(crate::ArchiveError::PathTooLong {
                len,
                limit: self.max_path_len,
            });
        }
        Ok(())
    }
}
