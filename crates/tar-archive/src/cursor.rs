//! Block alignment arithmetic.

use tar_header::HEADER_SIZE;

use crate::{ArchiveError, Result};

const BLOCK: u64 = HEADER_SIZE as u64;

/// Tracks the offset of the next header while walking an archive.
///
/// The associated functions are the pure arithmetic behind the walk: data
/// regions are rounded up to whole 512-byte blocks, and the next header
/// follows immediately after the padding. No I/O happens here.
///
/// ```
/// use tar_archive::BlockCursor;
///
/// assert_eq!(BlockCursor::padded_length(0), Some(0));
/// assert_eq!(BlockCursor::padded_length(513), Some(1024));
/// assert_eq!(BlockCursor::padding(3), Some(509));
/// assert_eq!(BlockCursor::next_header(1024, 3), Some(2048));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockCursor {
    position: u64,
}

impl BlockCursor {
    /// A cursor at the start of the medium.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A cursor at the given offset.
    #[must_use]
    pub fn at(position: u64) -> Self {
        Self { position }
    }

    /// Length of a data region rounded up to a whole number of blocks.
    ///
    /// Returns `None` if the rounded length does not fit in a `u64`.
    #[must_use]
    pub fn padded_length(len: u64) -> Option<u64> {
        len.checked_next_multiple_of(BLOCK)
    }

    /// Number of zero bytes that follow a data region of `len` bytes.
    #[must_use]
    pub fn padding(len: u64) -> Option<u64> {
        Self::padded_length(len).map(|padded| padded - len)
    }

    /// Offset of the header after the one at `header` whose data is `len`
    /// bytes long.
    #[must_use]
    pub fn next_header(header: u64, len: u64) -> Option<u64> {
        header
            .checked_add(BLOCK)?
            .checked_add(Self::padded_length(len)?)
    }

    /// Current offset.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Step over one header block, returning the offset it started at.
    pub fn advance_header(&mut self) -> u64 {
        let start = self.position;
        self.position += BLOCK;
        start
    }

    /// Step over a data region of `len` bytes and its padding, returning
    /// the offset the data starts at.
    pub fn advance_data(&mut self, len: u64) -> Result<u64> {
        let start = self.position;
        self.position = Self::padded_length(len)
            .and_then(|padded| start.checked_add(padded))
            .ok_or(ArchiveError::InvalidSize(len))?;
        Ok(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_table() {
        for (len, padded, padding) in [
            (0, 0, 0),
            (1, 512, 511),
            (511, 512, 1),
            (512, 512, 0),
            (513, 1024, 511),
            (1024, 1024, 0),
        ] {
            assert_eq!(BlockCursor::padded_length(len), Some(padded), "len {len}");
            assert_eq!(BlockCursor::padding(len), Some(padding), "len {len}");
        }
    }

    #[test]
    fn test_empty_data_follows_header() {
        assert_eq!(BlockCursor::next_header(0, 0), Some(512));
        assert_eq!(BlockCursor::next_header(512, 1), Some(1536));
    }

    #[test]
    fn test_overflow() {
        assert_eq!(BlockCursor::padded_length(u64::MAX), None);
        assert_eq!(BlockCursor::next_header(u64::MAX - 100, 0), None);

        let mut cursor = BlockCursor::at(512);
        assert!(matches!(
            cursor.advance_data(u64::MAX - 10),
            Err(ArchiveError::InvalidSize(_))
        ));
    }

    #[test]
    fn test_walk() {
        let mut cursor = BlockCursor::new();
        assert_eq!(cursor.advance_header(), 0);
        assert_eq!(cursor.advance_data(3).unwrap(), 512);
        assert_eq!(cursor.advance_header(), 1024);
        assert_eq!(cursor.advance_data(0).unwrap(), 1536);
        assert_eq!(cursor.position(), 1536);
        assert_eq!(BlockCursor::next_header(0, 3), Some(1024));
    }
}
