//! Sequential archive output.

use std::io::Write;

use log::trace;
use tar_header::{
    compute_checksum, encode, split_path, EntryType, HeaderRecord, HEADER_SIZE, LONG_LINK_NAME,
    NAME_SIZE,
};

use crate::{BlockCursor, Result};

const ZEROS: [u8; HEADER_SIZE] = [0; HEADER_SIZE];

/// Owner recorded on long name records.
const LONG_LINK_OWNER: &[u8] = b"root";

/// Where an entry landed in the output.
#[derive(Debug, Clone)]
pub struct Placement {
    /// Offset of the entry's own header block.
    pub header_offset: u64,
    /// Offset of the entry's first data byte.
    pub data_offset: u64,
    /// The record as written, with name fields and checksum filled in.
    pub record: HeaderRecord,
}

/// Writes entries one after another, then the end-of-archive marker.
///
/// Paths that fit are stored in the `name` field, or split across
/// `prefix` and `name` for POSIX headers. Anything longer gets a GNU long
/// name record in front of the entry.
///
/// ```
/// use tar_archive::ArchiveWriter;
/// use tar_header::HeaderRecord;
///
/// let mut out = Vec::new();
/// let mut writer = ArchiveWriter::new(&mut out);
/// let placement = writer
///     .append(&HeaderRecord::default(), b"hello.txt", b"hi")
///     .unwrap();
/// assert_eq!(placement.data_offset, 512);
/// writer.finish().unwrap();
/// assert_eq!(out.len(), 512 * 4);
/// ```
#[derive(Debug)]
pub struct ArchiveWriter<W> {
    inner: W,
    cursor: BlockCursor,
}

impl<W: Write> ArchiveWriter<W> {
    /// Start writing at the current position of `inner`, which is taken to
    /// be offset zero.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            cursor: BlockCursor::new(),
        }
    }

    /// Bytes written so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Write one entry: an optional long name record, the header, the
    /// content, and the padding after it.
    ///
    /// `record.size` and the name fields are overwritten from `content`
    /// and `path`.
    ///
    /// # Errors
    ///
    /// Header fields that do not fit (see [`tar_header::encode`]) and I/O
    /// errors from the output.
    pub fn append(
        &mut self,
        record: &HeaderRecord,
        path: &[u8],
        content: &[u8],
    ) -> Result<Placement> {
        let mut record = record.clone();
        record.size = content.len() as u64;
        record.prefix.clear();

        let split = if record.is_ustar() {
            split_path(path)
        } else if path.len() <= NAME_SIZE {
            Some((&[][..], path))
        } else {
            None
        };
        match split {
            Some((prefix, name)) => {
                record.prefix = prefix.to_vec();
                record.name = name.to_vec();
            }
            None => {
                self.write_long_name(path)?;
                record.name = path[..NAME_SIZE].to_vec();
            }
        }

        let block = encode(&record)?;
        record.checksum = compute_checksum(&block);
        let header_offset = self.cursor.position();
        self.inner.write_all(&block)?;
        self.cursor.advance_header();
        let data_offset = self.write_data(content)?;
        trace!("wrote {record:?} at {header_offset}");

        Ok(Placement {
            header_offset,
            data_offset,
            record,
        })
    }

    fn write_long_name(&mut self, path: &[u8]) -> Result<()> {
        let mut content = Vec::with_capacity(path.len() + 1);
        content.extend_from_slice(path);
        content.push(0);

        let mut record = HeaderRecord::new_gnu(EntryType::LongLink);
        record.name = LONG_LINK_NAME.to_vec();
        record.uname = LONG_LINK_OWNER.to_vec();
        record.gname = LONG_LINK_OWNER.to_vec();
        record.size = content.len() as u64;

        self.inner.write_all(&encode(&record)?)?;
        self.cursor.advance_header();
        self.write_data(&content)?;
        Ok(())
    }

    fn write_data(&mut self, content: &[u8]) -> Result<u64> {
        let len = content.len() as u64;
        let padding = BlockCursor::padding(len).ok_or(crate::ArchiveError::InvalidSize(len))?;
        self.inner.write_all(content)?;
        // `padding` is always below one block.
        self.inner.write_all(&ZEROS[..padding as usize])?;
        self.cursor.advance_data(len)
    }

    /// Write the two zero blocks that end an archive, flush, and return
    /// the output.
    pub fn finish(mut self) -> Result<W> {
        self.inner.write_all(&ZEROS)?;
        self.inner.write_all(&ZEROS)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}
