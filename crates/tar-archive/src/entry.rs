//! Archive members and their content.

use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tar_header::{EntryType, HeaderRecord};

use crate::options::NameEncoding;
use crate::scan::Scanned;

/// Handle to an entry within its archive.
///
/// Handles are plain indices: they stay valid across deletion (the entry
/// is tombstoned, not removed) and across flushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub(crate) usize);

impl EntryId {
    /// Position of the entry in archive order.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub(crate) enum EntryData {
    /// Data lives in the medium at `data_offset`.
    Medium { header_offset: u64, data_offset: u64 },
    /// Data held in memory until the next flush.
    Buffered(Vec<u8>),
}

/// One member of an archive: its decoded header plus a reference to its
/// data.
///
/// Entries are owned by their [`Archive`] and borrowed out of it, so they
/// cannot outlive it. Content is read through [`Archive::open_entry`].
///
/// [`Archive`]: crate::Archive
/// [`Archive::open_entry`]: crate::Archive::open_entry
#[derive(Clone)]
pub struct Entry {
    id: EntryId,
    header: HeaderRecord,
    path: Vec<u8>,
    full_name: String,
    link_name: String,
    pub(crate) data: EntryData,
    pub(crate) deleted: bool,
}

impl Entry {
    pub(crate) fn from_scanned(id: EntryId, scanned: Scanned, encoding: NameEncoding) -> Self {
        let data = match scanned.content {
            Some(content) => EntryData::Buffered(content),
            None => EntryData::Medium {
                header_offset: scanned.header_offset,
                data_offset: scanned.data_offset,
            },
        };
        Self {
            id,
            full_name: encoding.decode(&scanned.path),
            link_name: encoding.decode(&scanned.record.link_name),
            header: scanned.record,
            path: scanned.path,
            data,
            deleted: false,
        }
    }

    pub(crate) fn new_buffered(
        id: EntryId,
        header: HeaderRecord,
        path: Vec<u8>,
        encoding: NameEncoding,
        content: Vec<u8>,
    ) -> Self {
        Self {
            id,
            full_name: encoding.decode(&path),
            link_name: encoding.decode(&header.link_name),
            header,
            path,
            data: EntryData::Buffered(content),
            deleted: false,
        }
    }

    /// This entry's handle.
    #[must_use]
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Full path within the archive.
    ///
    /// Resolved from a preceding long name record when there is one, else
    /// `prefix/name`.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Last component of the path, ignoring a trailing `/`.
    #[must_use]
    pub fn name(&self) -> &str {
        let trimmed = self.full_name.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(i) => &trimmed[i + 1..],
            None => trimmed,
        }
    }

    /// Raw path bytes as stored in the archive.
    #[must_use]
    pub fn path_bytes(&self) -> &[u8] {
        &self.path
    }

    /// Target of a hard or symbolic link; empty for other entries.
    #[must_use]
    pub fn link_name(&self) -> &str {
        &self.link_name
    }

    /// Length of the entry's data in bytes.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.header.size
    }

    #[must_use]
    pub fn mode(&self) -> u32 {
        self.header.mode
    }

    #[must_use]
    pub fn uid(&self) -> u64 {
        self.header.uid
    }

    #[must_use]
    pub fn gid(&self) -> u64 {
        self.header.gid
    }

    /// Owner user name, lossily decoded.
    #[must_use]
    pub fn uname(&self) -> String {
        String::from_utf8_lossy(&self.header.uname).into_owned()
    }

    /// Owner group name, lossily decoded.
    #[must_use]
    pub fn gname(&self) -> String {
        String::from_utf8_lossy(&self.header.gname).into_owned()
    }

    /// Modification time in seconds since the Unix epoch.
    #[must_use]
    pub fn mtime(&self) -> u64 {
        self.header.mtime
    }

    /// Modification time, or `None` if it cannot be represented.
    #[must_use]
    pub fn last_write_time(&self) -> Option<SystemTime> {
        UNIX_EPOCH.checked_add(Duration::from_secs(self.header.mtime))
    }

    #[must_use]
    pub fn entry_type(&self) -> EntryType {
        self.header.entry_type
    }

    #[must_use]
    pub fn dev_major(&self) -> u32 {
        self.header.dev_major
    }

    #[must_use]
    pub fn dev_minor(&self) -> u32 {
        self.header.dev_minor
    }

    /// The decoded header.
    #[must_use]
    pub fn header(&self) -> &HeaderRecord {
        &self.header
    }

    /// Offset of this entry's header block, if it has been written.
    ///
    /// A preceding long name record is not included.
    #[must_use]
    pub fn header_offset(&self) -> Option<u64> {
        match self.data {
            EntryData::Medium { header_offset, .. } => Some(header_offset),
            EntryData::Buffered(_) => None,
        }
    }

    /// Offset of this entry's data, if it has been written.
    #[must_use]
    pub fn data_offset(&self) -> Option<u64> {
        match self.data {
            EntryData::Medium { data_offset, .. } => Some(data_offset),
            EntryData::Buffered(_) => None,
        }
    }

    /// Returns true once the entry has been deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Regular file, including the old-style and contiguous variants.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.entry_type().is_file()
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.entry_type().is_dir()
    }

    #[must_use]
    pub fn is_symlink(&self) -> bool {
        self.entry_type().is_symlink()
    }

    #[must_use]
    pub fn is_hard_link(&self) -> bool {
        self.entry_type().is_hard_link()
    }

    #[must_use]
    pub fn is_char_device(&self) -> bool {
        self.entry_type() == EntryType::Character
    }

    #[must_use]
    pub fn is_block_device(&self) -> bool {
        self.entry_type() == EntryType::Block
    }

    #[must_use]
    pub fn is_fifo(&self) -> bool {
        self.entry_type() == EntryType::Fifo
    }

    /// Character or block device.
    #[must_use]
    pub fn is_device(&self) -> bool {
        self.entry_type().is_device()
    }

    pub(crate) fn header_mut(&mut self) -> &mut HeaderRecord {
        &mut self.header
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id.0)
            .field("full_name", &self.full_name)
            .field("entry_type", &self.header.entry_type)
            .field("length", &self.header.size)
            .field("deleted", &self.deleted)
            .finish_non_exhaustive()
    }
}

/// Description of an entry to add to an archive.
///
/// ```
/// use tar_archive::NewEntry;
///
/// let entry = NewEntry::file("bin/tool", b"#!/bin/sh\n".to_vec())
///     .mode(0o755)
///     .owner(1000, 1000)
///     .mtime(1_700_000_000);
/// # let _ = entry;
/// ```
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub(crate) path: String,
    pub(crate) entry_type: EntryType,
    pub(crate) content: Vec<u8>,
    pub(crate) link_name: String,
    pub(crate) mode: u32,
    pub(crate) uid: u64,
    pub(crate) gid: u64,
    pub(crate) mtime: Option<u64>,
    pub(crate) uname: String,
    pub(crate) gname: String,
    pub(crate) dev_major: u32,
    pub(crate) dev_minor: u32,
}

impl NewEntry {
    fn new(path: impl Into<String>, entry_type: EntryType, mode: u32) -> Self {
        Self {
            path: path.into(),
            entry_type,
            content: Vec::new(),
            link_name: String::new(),
            mode,
            uid: 0,
            gid: 0,
            mtime: None,
            uname: String::new(),
            gname: String::new(),
            dev_major: 0,
            dev_minor: 0,
        }
    }

    /// A regular file with the given content.
    pub fn file(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            ..Self::new(path, EntryType::Normal, 0o644)
        }
    }

    /// A directory. A trailing `/` is added to the path if missing.
    pub fn directory(path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Self::new(path, EntryType::Directory, 0o755)
    }

    pub fn symlink(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            link_name: target.into(),
            ..Self::new(path, EntryType::SymbolicLink, 0o777)
        }
    }

    /// A hard link to another entry in the archive.
    pub fn hard_link(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            link_name: target.into(),
            ..Self::new(path, EntryType::Link, 0o644)
        }
    }

    pub fn fifo(path: impl Into<String>) -> Self {
        Self::new(path, EntryType::Fifo, 0o644)
    }

    pub fn char_device(path: impl Into<String>, major: u32, minor: u32) -> Self {
        Self {
            dev_major: major,
            dev_minor: minor,
            ..Self::new(path, EntryType::Character, 0o644)
        }
    }

    pub fn block_device(path: impl Into<String>, major: u32, minor: u32) -> Self {
        Self {
            dev_major: major,
            dev_minor: minor,
            ..Self::new(path, EntryType::Block, 0o644)
        }
    }

    /// Permission bits.
    #[must_use]
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn owner(mut self, uid: u64, gid: u64) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    /// Owner names, at most 32 bytes each.
    #[must_use]
    pub fn owner_names(mut self, uname: impl Into<String>, gname: impl Into<String>) -> Self {
        self.uname = uname.into();
        self.gname = gname.into();
        self
    }

    /// Modification time in seconds since the Unix epoch. Defaults to now.
    #[must_use]
    pub fn mtime(mut self, mtime: u64) -> Self {
        self.mtime = Some(mtime);
        self
    }

    /// The path the entry will be stored under.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn resolved_mtime(&self) -> u64 {
        self.mtime.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs())
        })
    }
}

/// Readable view over one entry's data.
///
/// Reads never go past the end of the entry, and seeking is relative to
/// the start of the entry's data.
pub enum EntryReader<'a, M> {
    /// Data read from the medium on demand.
    Medium {
        /// The archive's medium.
        medium: &'a mut M,
        /// Offset of the first data byte.
        start: u64,
        /// Data length.
        len: u64,
        /// Position within the data.
        pos: u64,
    },
    /// Data held in memory.
    Buffered(Cursor<&'a [u8]>),
}

impl<'a, M> EntryReader<'a, M> {
    pub(crate) fn medium(medium: &'a mut M, start: u64, len: u64) -> Self {
        EntryReader::Medium {
            medium,
            start,
            len,
            pos: 0,
        }
    }

    pub(crate) fn buffered(data: &'a [u8]) -> Self {
        EntryReader::Buffered(Cursor::new(data))
    }
}

impl<M: Read + Seek> Read for EntryReader<'_, M> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            EntryReader::Medium {
                medium,
                start,
                len,
                pos,
            } => {
                let remaining = len.saturating_sub(*pos);
                if remaining == 0 || buf.is_empty() {
                    return Ok(0);
                }
                let want = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
                medium.seek(SeekFrom::Start(*start + *pos))?;
                let n = medium.read(&mut buf[..want])?;
                if n == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "medium ended inside entry data",
                    ));
                }
                *pos += n as u64;
                Ok(n)
            }
            EntryReader::Buffered(cursor) => cursor.read(buf),
        }
    }
}

impl<M: Read + Seek> Seek for EntryReader<'_, M> {
    fn seek(&mut self, from: SeekFrom) -> io::Result<u64> {
        match self {
            EntryReader::Medium { len, pos, .. } => {
                let target = match from {
                    SeekFrom::Start(n) => Some(n),
                    SeekFrom::End(n) => len.checked_add_signed(n),
                    SeekFrom::Current(n) => pos.checked_add_signed(n),
                };
                let target = target.ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "invalid seek to a negative position")
                })?;
                *pos = target;
                Ok(target)
            }
            EntryReader::Buffered(cursor) => cursor.seek(from),
        }
    }
}

impl<M> fmt::Debug for EntryReader<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryReader::Medium { start, len, pos, .. } => f
                .debug_struct("EntryReader::Medium")
                .field("start", start)
                .field("len", len)
                .field("pos", pos)
                .finish_non_exhaustive(),
            EntryReader::Buffered(cursor) => f
                .debug_struct("EntryReader::Buffered")
                .field("len", &cursor.get_ref().len())
                .field("pos", &cursor.position())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, entry_type: EntryType) -> Entry {
        let mut header = HeaderRecord::new(entry_type);
        header.mtime = 1_600_000_000;
        Entry::new_buffered(
            EntryId(0),
            header,
            path.as_bytes().to_vec(),
            NameEncoding::Ascii,
            Vec::new(),
        )
    }

    #[test]
    fn test_name() {
        assert_eq!(entry("dir/sub/file3.txt", EntryType::Normal).name(), "file3.txt");
        assert_eq!(entry("dir/sub/", EntryType::Directory).name(), "sub");
        assert_eq!(entry("file1.txt", EntryType::Normal).name(), "file1.txt");
    }

    #[test]
    fn test_predicates() {
        let file = entry("a", EntryType::OldNormal);
        assert!(file.is_file() && !file.is_dir() && !file.is_device());
        assert!(entry("d/", EntryType::Directory).is_dir());
        assert!(entry("s", EntryType::SymbolicLink).is_symlink());
        assert!(entry("h", EntryType::Link).is_hard_link());
        let chr = entry("c", EntryType::Character);
        assert!(chr.is_char_device() && chr.is_device());
        assert!(entry("b", EntryType::Block).is_block_device());
        assert!(entry("p", EntryType::Fifo).is_fifo());
        assert!(entry("x", EntryType::Contiguous).is_file());
    }

    #[test]
    fn test_last_write_time() {
        let e = entry("a", EntryType::Normal);
        assert_eq!(
            e.last_write_time(),
            Some(UNIX_EPOCH + Duration::from_secs(1_600_000_000))
        );
        assert_eq!(e.header_offset(), None);
    }

    #[test]
    fn test_new_entry_defaults() {
        let dir = NewEntry::directory("dir");
        assert_eq!(dir.path(), "dir/");
        assert_eq!(dir.mode, 0o755);
        assert_eq!(NewEntry::directory("dir/").path(), "dir/");

        let link = NewEntry::symlink("l", "target");
        assert_eq!(link.link_name, "target");
        assert_eq!(link.mode, 0o777);

        let dev = NewEntry::block_device("dev/sda", 8, 0);
        assert_eq!((dev.dev_major, dev.dev_minor), (8, 0));
        assert_eq!(NewEntry::file("f", "x").mtime(5).resolved_mtime(), 5);
    }

    #[test]
    fn test_medium_reader_is_bounded() {
        let mut medium = Cursor::new(b"....hello world....".to_vec());
        let mut reader = EntryReader::medium(&mut medium, 4, 11);
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello world");

        reader.seek(SeekFrom::Start(6)).unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "world");

        reader.seek(SeekFrom::End(-5)).unwrap();
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"wo");
        assert!(reader.seek(SeekFrom::Current(-100)).is_err());
    }

    #[test]
    fn test_buffered_reader() {
        let data = b"abc".to_vec();
        let mut reader = EntryReader::<Cursor<Vec<u8>>>::buffered(&data);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abc");
    }
}
