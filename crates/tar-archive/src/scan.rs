//! Header walking shared by the random-access and streaming readers.

use std::io::{self, Read, Seek, SeekFrom};

use log::trace;
use tar_header::{decode, EntryType, HeaderError, HeaderRecord, HEADER_SIZE};

use crate::{ArchiveError, BlockCursor, Limits, Result};

/// Where the scanner pulls blocks from.
pub(crate) trait BlockSource {
    /// Fill `buf` from `pos`. Returns `Ok(false)` if the medium ends exactly
    /// at `pos`.
    fn read_block(&mut self, buf: &mut [u8], pos: u64) -> Result<bool>;

    /// Read `len` bytes starting at `pos`.
    fn read_vec(&mut self, len: u64, pos: u64) -> Result<Vec<u8>>;

    /// Step over `len` bytes starting at `pos`.
    fn skip(&mut self, len: u64, pos: u64) -> Result<()>;
}

/// A seekable medium of known length.
pub(crate) struct SeekSource<'a, R: ?Sized> {
    pub(crate) inner: &'a mut R,
    pub(crate) len: u64,
}

impl<R: Read + Seek + ?Sized> BlockSource for SeekSource<'_, R> {
    fn read_block(&mut self, buf: &mut [u8], pos: u64) -> Result<bool> {
        if pos >= self.len {
            return Ok(false);
        }
        self.inner.seek(SeekFrom::Start(pos))?;
        read_exact_or_eof(&mut *self.inner, buf, pos)
    }

    fn read_vec(&mut self, len: u64, pos: u64) -> Result<Vec<u8>> {
        crate::medium::read_region(&mut *self.inner, pos, len)
    }

    fn skip(&mut self, len: u64, pos: u64) -> Result<()> {
        let end = pos.checked_add(len).ok_or(ArchiveError::InvalidSize(len))?;
        if end > self.len {
            return Err(ArchiveError::UnexpectedEof { pos: self.len });
        }
        Ok(())
    }
}

/// A forward-only reader. Skipping reads and discards.
pub(crate) struct StreamSource<'a, R: ?Sized> {
    pub(crate) inner: &'a mut R,
}

impl<R: Read + ?Sized> BlockSource for StreamSource<'_, R> {
    fn read_block(&mut self, buf: &mut [u8], pos: u64) -> Result<bool> {
        read_exact_or_eof(&mut *self.inner, buf, pos)
    }

    fn read_vec(&mut self, len: u64, pos: u64) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let read = (&mut *self.inner).take(len).read_to_end(&mut buf)?;
        if (read as u64) < len {
            return Err(ArchiveError::UnexpectedEof {
                pos: pos + read as u64,
            });
        }
        Ok(buf)
    }

    fn skip(&mut self, len: u64, pos: u64) -> Result<()> {
        let skipped = io::copy(&mut (&mut *self.inner).take(len), &mut io::sink())?;
        if skipped < len {
            return Err(ArchiveError::UnexpectedEof { pos: pos + skipped });
        }
        Ok(())
    }
}

/// One entry found by the scanner.
#[derive(Debug)]
pub(crate) struct Scanned {
    pub(crate) record: HeaderRecord,
    /// Effective path: the long name if one preceded the header.
    pub(crate) path: Vec<u8>,
    pub(crate) header_offset: u64,
    pub(crate) data_offset: u64,
    /// Data captured during the scan, for sources that cannot be revisited.
    pub(crate) content: Option<Vec<u8>>,
}

/// A long name waiting for the header it applies to.
#[derive(Debug)]
struct PendingName {
    path: Vec<u8>,
}

/// Walks headers one entry at a time.
///
/// Long name records are consumed here and attached to the entry that
/// follows them, so callers only ever see real entries.
#[derive(Debug)]
pub(crate) struct Scanner {
    cursor: BlockCursor,
    limits: Limits,
    pending: Option<PendingName>,
    last_header: u64,
    done: bool,
}

impl Scanner {
    pub(crate) fn new(limits: Limits) -> Self {
        Self {
            cursor: BlockCursor::new(),
            limits,
            pending: None,
            last_header: 0,
            done: false,
        }
    }

    /// Offset of the most recently read header block.
    pub(crate) fn last_header(&self) -> u64 {
        self.last_header
    }

    fn finish(&mut self) -> Result<Option<Scanned>> {
        self.done = true;
        if self.pending.take().is_some() {
            return Err(ArchiveError::OrphanedLongName);
        }
        Ok(None)
    }

    /// Decode the next entry, or `None` at the end of the archive.
    ///
    /// With `capture` set, the entry's data is read into memory before the
    /// cursor moves past it.
    pub(crate) fn next<S: BlockSource>(
        &mut self,
        source: &mut S,
        capture: bool,
    ) -> Result<Option<Scanned>> {
        if self.done {
            return Ok(None);
        }

        loop {
            let header_offset = self.cursor.position();
            self.last_header = header_offset;
            let mut block = [0u8; HEADER_SIZE];
            if !source.read_block(&mut block, header_offset)? {
                return self.finish();
            }

            let record = match decode(&block) {
                Ok(record) => record,
                Err(HeaderError::EndOfArchive) => return self.finish(),
                Err(e) => return Err(e.into()),
            };
            trace!("header at {header_offset}: {record:?}");
            self.cursor.advance_header();

            let size = record.size;
            let padded = BlockCursor::padded_length(size).ok_or(ArchiveError::InvalidSize(size))?;

            if record.entry_type == EntryType::LongLink {
                self.read_long_name(source, size, padded)?;
                continue;
            }

            let path = match self.pending.take() {
                Some(pending) => pending.path,
                None => record.path().into_owned(),
            };
            self.limits.check_path(path.len())?;

            let data_offset = self.cursor.position();
            let content = if capture {
                let content = source.read_vec(size, data_offset)?;
                source.skip(padded - size, data_offset + size)?;
                Some(content)
            } else {
                source.skip(padded, data_offset)?;
                None
            };
            self.cursor.advance_data(size)?;

            return Ok(Some(Scanned {
                record,
                path,
                header_offset,
                data_offset,
                content,
            }));
        }
    }

    fn read_long_name<S: BlockSource>(
        &mut self,
        source: &mut S,
        size: u64,
        padded: u64,
    ) -> Result<()> {
        if self.pending.is_some() {
            return Err(ArchiveError::DuplicateLongName);
        }
        if size > self.limits.max_long_name_size {
            return Err(ArchiveError::LongNameTooLarge {
                size,
                limit: self.limits.max_long_name_size,
            });
        }

        let start = self.cursor.position();
        let mut path = source.read_vec(size, start)?;
        source.skip(padded - size, start + size)?;
        self.cursor.advance_data(size)?;

        if let Some(nul) = path.iter().position(|&b| b == 0) {
            path.truncate(nul);
        }
        self.limits.check_path(path.len())?;
        self.pending = Some(PendingName { path });
        Ok(())
    }
}

/// Fill `buf` completely, or report a clean end if nothing was read.
fn read_exact_or_eof<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8], pos: u64) -> Result<bool> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..]) {
            Ok(0) => {
                if total == 0 {
                    return Ok(false);
                }
                return Err(ArchiveError::UnexpectedEof {
                    pos: pos + total as u64,
                });
            }
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}
