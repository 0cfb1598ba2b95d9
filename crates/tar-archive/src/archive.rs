//! The archive: a medium plus its ordered entries.

use std::fmt;
use std::io::{BufWriter, Cursor, Read, Seek, SeekFrom};

use log::{debug, warn};
use tar_header::{encode, EntryType, HeaderRecord};

use crate::entry::{EntryData, EntryReader};
use crate::medium::{medium_len, read_region};
use crate::scan::{Scanner, SeekSource};
use crate::{
    ArchiveError, ArchiveWriter, Entry, EntryId, Medium, Mode, NewEntry, Result, TarOptions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing read yet.
    Unopened,
    /// Entries are being produced one at a time by `next_entry`.
    Scanning,
    /// Every entry is known.
    Ready,
    /// A header failed to decode; entries before it stay usable.
    Faulted { offset: u64 },
    Closed,
}

/// How the entries have been consumed so far. The two are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Unset,
    Listing,
    Streaming,
}

type Flusher<M> = fn(&mut Archive<M>) -> Result<()>;

/// A tar archive over a seekable medium.
///
/// Entries are read lazily: nothing touches the medium until the entries
/// are first needed, and the full list is then scanned once and cached.
/// In [`Mode::Create`] and [`Mode::Update`], mutations are held in memory
/// and written out by [`Archive::flush`], by [`Archive::close`], or on drop.
///
/// ```
/// use std::io::{Cursor, Read};
/// use tar_archive::{Archive, Mode, TarOptions};
///
/// let mut archive = Archive::open(Cursor::new(Vec::new()), TarOptions {
///     mode: Mode::Create,
///     leave_open: true,
///     ..Default::default()
/// })?;
/// archive.create_entry("hello.txt", b"hi".to_vec())?;
/// let medium = archive.close()?.expect("leave_open returns the medium");
///
/// let mut archive = Archive::open_read_only(medium, TarOptions::default())?;
/// let id = archive.get_entry("hello.txt")?.expect("entry exists").id();
/// let mut content = String::new();
/// archive.open_entry(id)?.read_to_string(&mut content)?;
/// assert_eq!(content, "hi");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Archive<M> {
    medium: Option<M>,
    options: TarOptions,
    state: State,
    access: Access,
    entries: Vec<Entry>,
    /// Entries dropped by streaming; ids below this are stale.
    released: usize,
    scanner: Scanner,
    medium_len: Option<u64>,
    dirty: bool,
    flusher: Option<Flusher<M>>,
}

/// Live entries of an archive in archive order.
#[derive(Debug, Clone)]
pub struct Entries<'a> {
    inner: std::slice::Iter<'a, Entry>,
}

impl<'a> Iterator for Entries<'a> {
    type Item = &'a Entry;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.find(|entry| !entry.deleted)
    }
}

impl<M: Read + Seek> Archive<M> {
    fn with_options(medium: M, options: TarOptions) -> Self {
        let state = match options.mode {
            Mode::Create => State::Ready,
            Mode::Read | Mode::Update => State::Unopened,
        };
        let dirty = options.mode == Mode::Create;
        Self {
            scanner: Scanner::new(options.limits.clone()),
            medium: Some(medium),
            options,
            state,
            access: Access::Unset,
            entries: Vec::new(),
            released: 0,
            medium_len: None,
            dirty,
            flusher: None,
        }
    }

    /// Open a read-only medium.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::Unsupported`] unless `options.mode` is [`Mode::Read`];
    /// writable modes need a [`Medium`] and [`Archive::open`].
    pub fn open_read_only(medium: M, options: TarOptions) -> Result<Self> {
        if options.mode != Mode::Read {
            return Err(ArchiveError::unsupported(
                "open_read_only",
                format!("{} mode needs a writable medium", options.mode),
            ));
        }
        Ok(Self::with_options(medium, options))
    }

    /// The options the archive was opened with.
    #[must_use]
    pub fn options(&self) -> &TarOptions {
        &self.options
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.options.mode
    }

    /// Returns true if there are changes not yet written to the medium.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Offset of the header that stopped the scan, if one did.
    #[must_use]
    pub fn scan_fault(&self) -> Option<u64> {
        match self.state {
            State::Faulted { offset } => Some(offset),
            _ => None,
        }
    }

    fn check_open(&self) -> Result<()> {
        match self.state {
            State::Closed => Err(ArchiveError::Disposed),
            _ => Ok(()),
        }
    }

    fn check_writable(&self, operation: &'static str) -> Result<()> {
        self.check_open()?;
        if !self.options.mode.is_writable() {
            return Err(ArchiveError::unsupported(
                operation,
                format!("archive is open in {} mode", self.options.mode),
            ));
        }
        if let State::Faulted { offset } = self.state {
            return Err(ArchiveError::Faulted { offset });
        }
        Ok(())
    }

    fn set_access(&mut self, access: Access, operation: &'static str) -> Result<()> {
        match (self.access, access) {
            (Access::Unset, _) => {
                self.access = access;
                Ok(())
            }
            (current, wanted) if current == wanted => Ok(()),
            (Access::Streaming, _) => Err(ArchiveError::unsupported(
                operation,
                "entries are being streamed with next_entry",
            )),
            _ => Err(ArchiveError::unsupported(
                operation,
                "entries have already been listed",
            )),
        }
    }

    fn source_len(&mut self) -> Result<u64> {
        if let Some(len) = self.medium_len {
            return Ok(len);
        }
        let medium = self.medium.as_mut().ok_or(ArchiveError::Disposed)?;
        let len = medium_len(medium)?;
        self.medium_len = Some(len);
        Ok(len)
    }

    /// Scan the whole medium once. A failure leaves the archive faulted
    /// with the entries found so far.
    fn ensure_scanned(&mut self) -> Result<()> {
        match self.state {
            State::Ready | State::Faulted { .. } => return Ok(()),
            State::Closed => return Err(ArchiveError::Disposed),
            State::Unopened | State::Scanning => {}
        }

        let len = self.source_len()?;
        let medium = self.medium.as_mut().ok_or(ArchiveError::Disposed)?;
        let mut source = SeekSource { inner: medium, len };
        debug!("scanning archive of {len} bytes");
        loop {
            match self.scanner.next(&mut source, false) {
                Ok(Some(scanned)) => {
                    let id = EntryId(self.released + self.entries.len());
                    self.entries
                        .push(Entry::from_scanned(id, scanned, self.options.name_encoding));
                }
                Ok(None) => break,
                Err(e) => {
                    let offset = self.scanner.last_header();
                    debug!("scan stopped at offset {offset}: {e}");
                    self.state = State::Faulted { offset };
                    return Err(e);
                }
            }
        }
        debug!("found {} entries", self.entries.len());
        self.state = State::Ready;
        Ok(())
    }

    /// Iterate over the live entries, scanning the medium on first use.
    ///
    /// # Errors
    ///
    /// The first call propagates any scan failure. The archive keeps the
    /// entries decoded before the failure, and later calls return them;
    /// see [`Archive::scan_fault`].
    pub fn entries(&mut self) -> Result<Entries<'_>> {
        self.check_open()?;
        self.set_access(Access::Listing, "entries")?;
        self.ensure_scanned()?;
        Ok(Entries {
            inner: self.entries.iter(),
        })
    }

    /// Full names of the live entries.
    pub fn entry_names(&mut self) -> Result<Vec<String>> {
        Ok(self
            .entries()?
            .map(|entry| entry.full_name().to_owned())
            .collect())
    }

    /// Find a live entry by full name.
    ///
    /// When several entries share a name, the last one wins, matching how
    /// extraction would leave the file system.
    pub fn get_entry(&mut self, path: &str) -> Result<Option<&Entry>> {
        self.check_open()?;
        self.set_access(Access::Listing, "get_entry")?;
        self.ensure_scanned()?;
        Ok(self
            .entries
            .iter()
            .rev()
            .find(|entry| !entry.deleted && entry.full_name() == path))
    }

    fn slot(&self, id: EntryId) -> Result<usize> {
        self.check_open()?;
        let index = id
            .0
            .checked_sub(self.released)
            .ok_or(ArchiveError::StaleEntry(format!("#{}", id.0)))?;
        if index >= self.entries.len() {
            return Err(ArchiveError::UnknownEntry(id.0));
        }
        Ok(index)
    }

    fn live_slot(&self, id: EntryId) -> Result<usize> {
        let index = self.slot(id)?;
        let entry = &self.entries[index];
        if entry.deleted {
            return Err(ArchiveError::EntryDeleted(entry.full_name().to_owned()));
        }
        Ok(index)
    }

    /// Look up an entry by handle, including deleted ones.
    pub fn entry(&self, id: EntryId) -> Result<&Entry> {
        let index = self.slot(id)?;
        Ok(&self.entries[index])
    }

    /// Open an entry's data for reading.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::EntryDeleted`] for a deleted entry and
    /// [`ArchiveError::Disposed`] after [`Archive::close`].
    pub fn open_entry(&mut self, id: EntryId) -> Result<EntryReader<'_, M>> {
        let index = self.live_slot(id)?;
        let entry = &self.entries[index];
        match &entry.data {
            EntryData::Buffered(data) => Ok(EntryReader::buffered(data)),
            EntryData::Medium { data_offset, .. } => {
                let medium = self.medium.as_mut().ok_or(ArchiveError::Disposed)?;
                Ok(EntryReader::medium(medium, *data_offset, entry.length()))
            }
        }
    }

    /// Read an entry's data into memory.
    pub fn read_entry(&mut self, id: EntryId) -> Result<Vec<u8>> {
        let index = self.live_slot(id)?;
        let entry = &self.entries[index];
        match &entry.data {
            EntryData::Buffered(data) => Ok(data.clone()),
            EntryData::Medium { data_offset, .. } => {
                let medium = self.medium.as_mut().ok_or(ArchiveError::Disposed)?;
                read_region(medium, *data_offset, entry.length())
            }
        }
    }

    /// Decode the next entry without building the full list.
    ///
    /// The previous entry is released first; its handle becomes stale.
    /// Only available in [`Mode::Read`], and not after [`Archive::entries`]
    /// or [`Archive::get_entry`] have been used.
    pub fn next_entry(&mut self) -> Result<Option<&Entry>> {
        self.check_open()?;
        if self.options.mode != Mode::Read {
            return Err(ArchiveError::unsupported(
                "next_entry",
                format!("archive is open in {} mode", self.options.mode),
            ));
        }
        self.set_access(Access::Streaming, "next_entry")?;
        match self.state {
            State::Faulted { offset } => return Err(ArchiveError::Faulted { offset }),
            State::Ready => return Ok(None),
            _ => {}
        }

        self.released += self.entries.len();
        self.entries.clear();
        self.state = State::Scanning;

        let len = self.source_len()?;
        let medium = self.medium.as_mut().ok_or(ArchiveError::Disposed)?;
        let mut source = SeekSource { inner: medium, len };
        match self.scanner.next(&mut source, false) {
            Ok(Some(scanned)) => {
                let id = EntryId(self.released);
                self.entries
                    .push(Entry::from_scanned(id, scanned, self.options.name_encoding));
                Ok(self.entries.last())
            }
            Ok(None) => {
                self.state = State::Ready;
                Ok(None)
            }
            Err(e) => {
                self.state = State::Faulted {
                    offset: self.scanner.last_header(),
                };
                Err(e)
            }
        }
    }

    /// Close the archive, flushing pending changes first.
    ///
    /// Returns the medium when the archive was opened with `leave_open`;
    /// otherwise the medium is dropped. Every later call on the archive
    /// fails with [`ArchiveError::Disposed`].
    ///
    /// # Errors
    ///
    /// A failed flush is reported here and the archive is closed anyway;
    /// the medium may then hold a partial archive.
    pub fn close(&mut self) -> Result<Option<M>> {
        self.check_open()?;
        let flushed = match self.flusher {
            Some(flush) if self.dirty => flush(self),
            _ => Ok(()),
        };
        self.dirty = false;
        self.state = State::Closed;
        self.entries.clear();
        let medium = self.medium.take();
        flushed?;
        debug!("archive closed");
        Ok(if self.options.leave_open { medium } else { None })
    }
}

impl<T: AsRef<[u8]>> Archive<Cursor<T>> {
    /// Borrow an entry's data straight out of an in-memory medium.
    ///
    /// Any `AsRef<[u8]>` buffer works, including a memory-mapped file.
    pub fn entry_bytes(&self, id: EntryId) -> Result<&[u8]> {
        let index = self.live_slot(id)?;
        let entry = &self.entries[index];
        match &entry.data {
            EntryData::Buffered(data) => Ok(data.as_slice()),
            EntryData::Medium { data_offset, .. } => {
                let medium = self.medium.as_ref().ok_or(ArchiveError::Disposed)?;
                let bytes = medium.get_ref().as_ref();
                let end = data_offset
                    .checked_add(entry.length())
                    .ok_or(ArchiveError::InvalidSize(entry.length()))?;
                let range = usize::try_from(*data_offset)
                    .ok()
                    .zip(usize::try_from(end).ok())
                    .filter(|&(_, end)| end <= bytes.len())
                    .ok_or(ArchiveError::UnexpectedEof {
                        pos: bytes.len() as u64,
                    })?;
                Ok(&bytes[range.0..range.1])
            }
        }
    }
}

impl Archive<Cursor<Vec<u8>>> {
    /// Buffer a non-seekable source in memory and open it.
    ///
    /// With `leave_open` set, [`Archive::close`] hands back the buffer,
    /// including any changes made in [`Mode::Update`].
    pub fn from_reader<R: Read>(mut reader: R, options: TarOptions) -> Result<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        debug!("buffered {} bytes from reader", buf.len());
        Self::open(Cursor::new(buf), options)
    }
}

impl<M: Medium> Archive<M> {
    /// Open an archive over a writable medium in any mode.
    ///
    /// In [`Mode::Create`] the existing contents are ignored and replaced
    /// on flush, even if nothing was added.
    pub fn open(medium: M, options: TarOptions) -> Result<Self> {
        let mut archive = Self::with_options(medium, options);
        archive.flusher = Some(Self::flush);
        Ok(archive)
    }

    fn encode_name(&self, name: &str) -> Result<Vec<u8>> {
        if name.is_empty() {
            return Err(ArchiveError::EmptyName);
        }
        let encoding = self.options.name_encoding;
        let bytes = encoding
            .encode(name)
            .ok_or_else(|| ArchiveError::UnencodableName {
                name: name.to_owned(),
                encoding: encoding.name(),
            })?;
        self.options.limits.check_path(bytes.len())?;
        Ok(bytes)
    }

    /// Add a regular file.
    pub fn create_entry(&mut self, path: &str, content: impl Into<Vec<u8>>) -> Result<EntryId> {
        self.add_entry(NewEntry::file(path, content))
    }

    /// Add an entry of any type at the end of the archive.
    ///
    /// The header is validated now, so fields that cannot be encoded are
    /// reported here rather than at flush time.
    ///
    /// # Errors
    ///
    /// - [`ArchiveError::Unsupported`] in [`Mode::Read`].
    /// - [`ArchiveError::EmptyName`], [`ArchiveError::UnencodableName`] or
    ///   [`ArchiveError::PathTooLong`] for a bad path.
    /// - [`ArchiveError::Format`] for a link target, owner name or number
    ///   that does not fit its header field.
    pub fn add_entry(&mut self, new: NewEntry) -> Result<EntryId> {
        self.check_writable("add_entry")?;
        self.ensure_scanned()?;

        let path = self.encode_name(&new.path)?;
        let link_name = if new.link_name.is_empty() {
            Vec::new()
        } else {
            self.encode_name(&new.link_name)?
        };

        let mut header = HeaderRecord::new(new.entry_type);
        header.mode = new.mode;
        header.uid = new.uid;
        header.gid = new.gid;
        header.mtime = new.resolved_mtime();
        header.size = new.content.len() as u64;
        header.link_name = link_name;
        header.uname = new.uname.into_bytes();
        header.gname = new.gname.into_bytes();
        header.dev_major = new.dev_major;
        header.dev_minor = new.dev_minor;
        // Everything except the path, which the writer places later.
        encode(&header)?;

        let content = match new.entry_type {
            EntryType::Directory | EntryType::SymbolicLink | EntryType::Link => Vec::new(),
            _ => new.content,
        };
        header.size = content.len() as u64;

        let id = EntryId(self.released + self.entries.len());
        let entry = Entry::new_buffered(id, header, path, self.options.name_encoding, content);
        debug!("adding {entry:?}");
        self.entries.push(entry);
        self.dirty = true;
        Ok(id)
    }

    /// Mark an entry deleted. The medium changes on the next flush.
    pub fn delete_entry(&mut self, id: EntryId) -> Result<()> {
        self.check_writable("delete_entry")?;
        let index = self.live_slot(id)?;
        let entry = &mut self.entries[index];
        entry.deleted = true;
        // Release buffered content right away.
        entry.data = EntryData::Buffered(Vec::new());
        debug!("deleted {entry:?}");
        self.dirty = true;
        Ok(())
    }

    /// Replace an entry's data, keeping its other metadata.
    pub fn replace_content(&mut self, id: EntryId, content: impl Into<Vec<u8>>) -> Result<()> {
        self.check_writable("replace_content")?;
        let index = self.live_slot(id)?;
        let entry = &mut self.entries[index];
        if entry.is_dir() || entry.is_symlink() || entry.is_hard_link() {
            return Err(ArchiveError::unsupported(
                "replace_content",
                format!("{} cannot hold data", entry.full_name()),
            ));
        }
        let content = content.into();
        entry.header_mut().size = content.len() as u64;
        entry.data = EntryData::Buffered(content);
        self.dirty = true;
        Ok(())
    }

    /// Rewrite the medium from the start with every live entry, followed
    /// by the end-of-archive marker.
    ///
    /// Does nothing in [`Mode::Read`] or when there are no pending
    /// changes.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::Faulted`] if the archive could not be fully scanned,
    /// since rewriting it would drop the unread tail. I/O errors are fatal;
    /// the medium may hold a partial archive afterwards.
    pub fn flush(&mut self) -> Result<()> {
        self.check_open()?;
        if !self.dirty || !self.options.mode.is_writable() {
            return Ok(());
        }
        if let State::Faulted { offset } = self.state {
            return Err(ArchiveError::Faulted { offset });
        }
        self.ensure_scanned()?;

        let medium = self.medium.as_mut().ok_or(ArchiveError::Disposed)?;

        // Everything still on the medium is about to be overwritten.
        for entry in self.entries.iter_mut().filter(|entry| !entry.deleted) {
            if let EntryData::Medium { data_offset, .. } = entry.data {
                let content = read_region(medium, data_offset, entry.length())?;
                entry.data = EntryData::Buffered(content);
            }
        }

        medium.seek(SeekFrom::Start(0))?;
        medium.set_len(0)?;

        let mut writer = ArchiveWriter::new(BufWriter::new(&mut *medium));
        let mut placements = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.deleted {
                continue;
            }
            let content = match &entry.data {
                EntryData::Buffered(content) => content.as_slice(),
                EntryData::Medium { .. } => &[],
            };
            let placement = writer.append(entry.header(), entry.path_bytes(), content)?;
            placements.push((index, placement));
        }
        let end = writer.position() + 1024;
        writer
            .finish()?
            .into_inner()
            .map_err(|e| ArchiveError::Io(e.into_error()))?;
        medium.flush()?;

        for (index, placement) in placements {
            let entry = &mut self.entries[index];
            entry.data = EntryData::Medium {
                header_offset: placement.header_offset,
                data_offset: placement.data_offset,
            };
            *entry.header_mut() = placement.record;
        }
        debug!(
            "flushed {} entries, {end} bytes",
            self.entries.iter().filter(|entry| !entry.deleted).count()
        );
        self.medium_len = Some(end);
        self.dirty = false;
        Ok(())
    }
}

impl<M> Drop for Archive<M> {
    fn drop(&mut self) {
        if !self.dirty || self.state == State::Closed {
            return;
        }
        if let Some(flush) = self.flusher {
            if let Err(e) = flush(self) {
                warn!("failed to flush archive on drop: {e}");
            }
        }
    }
}

impl<M> fmt::Debug for Archive<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("access", &self.access)
            .field("entries", &self.entries.len())
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, Write};

    use super::*;

    /// Reads and seeks work, every write fails.
    #[derive(Debug, Default)]
    struct FullDisk(Cursor<Vec<u8>>);

    impl Read for FullDisk {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl Seek for FullDisk {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.0.seek(pos)
        }
    }

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Medium for FullDisk {
        fn set_len(&mut self, len: u64) -> io::Result<()> {
            self.0.set_len(len)
        }
    }

    fn create(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut archive = Archive::open(
            Cursor::new(&mut buf),
            TarOptions::new(Mode::Create),
        )
        .unwrap();
        for (path, content) in entries {
            archive.create_entry(path, content.to_vec()).unwrap();
        }
        archive.close().unwrap();
        drop(archive);
        buf
    }

    fn read(buf: Vec<u8>) -> Archive<Cursor<Vec<u8>>> {
        Archive::open_read_only(Cursor::new(buf), TarOptions::default()).unwrap()
    }

    #[test]
    fn test_lazy_scan() {
        let buf = create(&[("a", b"1")]);
        let archive = read(buf);
        assert_eq!(archive.state, State::Unopened);
        assert!(archive.entries.is_empty());
    }

    #[test]
    fn test_create_then_read() {
        let buf = create(&[("a", b"1"), ("b/c", b"22")]);
        let mut archive = read(buf);
        assert_eq!(archive.entry_names().unwrap(), ["a", "b/c"]);
        let id = archive.get_entry("b/c").unwrap().unwrap().id();
        assert_eq!(archive.read_entry(id).unwrap(), b"22");
        assert_eq!(archive.entry_bytes(id).unwrap(), b"22");
        assert_eq!(archive.state, State::Ready);
    }

    #[test]
    fn test_read_mode_rejects_mutation() {
        let mut archive = read(create(&[("a", b"1")]));
        assert!(matches!(
            archive.create_entry("b", b"x".to_vec()),
            Err(ArchiveError::Unsupported { operation: "add_entry", .. })
        ));
        let id = archive.get_entry("a").unwrap().unwrap().id();
        assert!(matches!(
            archive.delete_entry(id),
            Err(ArchiveError::Unsupported { .. })
        ));
        assert!(!archive.is_dirty());
    }

    #[test]
    fn test_open_read_only_rejects_writable_modes() {
        assert!(matches!(
            Archive::open_read_only(Cursor::new(Vec::<u8>::new()), TarOptions::new(Mode::Update)),
            Err(ArchiveError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_streaming_and_listing_are_exclusive() {
        let buf = create(&[("a", b"1"), ("b", b"2")]);

        let mut archive = read(buf.clone());
        assert_eq!(archive.next_entry().unwrap().unwrap().full_name(), "a");
        assert!(matches!(
            archive.entries(),
            Err(ArchiveError::Unsupported { operation: "entries", .. })
        ));
        assert!(matches!(
            archive.get_entry("a"),
            Err(ArchiveError::Unsupported { .. })
        ));

        let mut archive = read(buf);
        assert_eq!(archive.entries().unwrap().count(), 2);
        assert!(matches!(
            archive.next_entry(),
            Err(ArchiveError::Unsupported { operation: "next_entry", .. })
        ));
    }

    #[test]
    fn test_streaming_releases_previous_entry() {
        let mut archive = read(create(&[("a", b"1"), ("b", b"2")]));
        let first = archive.next_entry().unwrap().unwrap().id();
        assert_eq!(archive.read_entry(first).unwrap(), b"1");

        let second = archive.next_entry().unwrap().unwrap().id();
        assert_eq!(second.index(), 1);
        assert!(matches!(
            archive.read_entry(first),
            Err(ArchiveError::StaleEntry(_))
        ));
        assert_eq!(archive.read_entry(second).unwrap(), b"2");
        assert!(archive.next_entry().unwrap().is_none());
        assert!(archive.next_entry().unwrap().is_none());
    }

    #[test]
    fn test_deleted_entry() {
        let mut archive = Archive::open(
            Cursor::new(Vec::new()),
            TarOptions::new(Mode::Create),
        )
        .unwrap();
        let id = archive.create_entry("gone", b"x".to_vec()).unwrap();
        archive.delete_entry(id).unwrap();

        assert!(archive.entry(id).unwrap().is_deleted());
        assert!(matches!(
            archive.open_entry(id),
            Err(ArchiveError::EntryDeleted(name)) if name == "gone"
        ));
        assert!(matches!(
            archive.delete_entry(id),
            Err(ArchiveError::EntryDeleted(_))
        ));
        assert!(archive.get_entry("gone").unwrap().is_none());
        assert_eq!(archive.entries().unwrap().count(), 0);
    }

    #[test]
    fn test_disposed() {
        let mut archive = read(create(&[("a", b"1")]));
        assert!(archive.close().unwrap().is_none());
        assert!(matches!(archive.entries(), Err(ArchiveError::Disposed)));
        assert!(matches!(archive.close(), Err(ArchiveError::Disposed)));
        assert!(matches!(
            archive.entry(EntryId(0)),
            Err(ArchiveError::Disposed)
        ));
    }

    #[test]
    fn test_unknown_entry() {
        let mut archive = read(create(&[("a", b"1")]));
        assert_eq!(archive.entries().unwrap().count(), 1);
        assert!(matches!(
            archive.entry(EntryId(5)),
            Err(ArchiveError::UnknownEntry(5))
        ));
    }

    #[test]
    fn test_name_validation() {
        let mut archive = Archive::open(
            Cursor::new(Vec::new()),
            TarOptions::new(Mode::Create),
        )
        .unwrap();
        assert!(matches!(
            archive.create_entry("", Vec::new()),
            Err(ArchiveError::EmptyName)
        ));
        assert!(matches!(
            archive.create_entry("caf\u{e9}", Vec::new()),
            Err(ArchiveError::UnencodableName { encoding: "ASCII", .. })
        ));
        assert!(matches!(
            archive.create_entry(&"x".repeat(5000), Vec::new()),
            Err(ArchiveError::PathTooLong { .. })
        ));
        assert!(matches!(
            archive.add_entry(NewEntry::symlink("l", "t".repeat(101))),
            Err(ArchiveError::Format(_))
        ));
        assert!(matches!(
            archive.add_entry(NewEntry::file("f", "").owner_names("u".repeat(33), "g")),
            Err(ArchiveError::Format(_))
        ));
        assert_eq!(archive.entries().unwrap().count(), 0);
    }

    #[test]
    fn test_drop_flushes() {
        let mut buf = Vec::new();
        {
            let mut archive =
                Archive::open(Cursor::new(&mut buf), TarOptions::new(Mode::Create)).unwrap();
            archive.create_entry("kept", b"on drop".to_vec()).unwrap();
        }
        let mut archive = read(buf);
        let id = archive.get_entry("kept").unwrap().unwrap().id();
        assert_eq!(archive.read_entry(id).unwrap(), b"on drop");
    }

    #[test]
    fn test_flush_updates_offsets() {
        let mut archive = Archive::open(
            Cursor::new(Vec::new()),
            TarOptions::new(Mode::Create),
        )
        .unwrap();
        let a = archive.create_entry("a", vec![b'a'; 600]).unwrap();
        let b = archive.create_entry("b", b"b".to_vec()).unwrap();
        assert_eq!(archive.entry(a).unwrap().data_offset(), None);

        archive.flush().unwrap();
        assert!(!archive.is_dirty());
        assert_eq!(archive.entry(a).unwrap().header_offset(), Some(0));
        assert_eq!(archive.entry(b).unwrap().header_offset(), Some(1536));
        assert_eq!(archive.entry_bytes(b).unwrap(), b"b");
        assert_eq!(archive.read_entry(a).unwrap().len(), 600);
    }

    #[test]
    fn test_directories_drop_content() {
        let mut archive = Archive::open(
            Cursor::new(Vec::new()),
            TarOptions::new(Mode::Create),
        )
        .unwrap();
        let id = archive.add_entry(NewEntry::directory("dir")).unwrap();
        let entry = archive.entry(id).unwrap();
        assert_eq!(entry.full_name(), "dir/");
        assert_eq!(entry.length(), 0);
        assert!(entry.is_dir());
        assert!(matches!(
            archive.replace_content(id, b"data".to_vec()),
            Err(ArchiveError::Unsupported { operation: "replace_content", .. })
        ));
    }

    #[test]
    fn test_flush_io_failure_is_reported() {
        let mut archive =
            Archive::open(FullDisk::default(), TarOptions::new(Mode::Create)).unwrap();
        archive.create_entry("a", b"1".to_vec()).unwrap();

        let err = archive.flush().unwrap_err();
        assert!(matches!(err, ArchiveError::Io(ref e) if e.to_string() == "disk full"), "{err}");
        assert!(archive.is_dirty());

        assert!(matches!(archive.close(), Err(ArchiveError::Io(_))));
        assert!(matches!(archive.entries(), Err(ArchiveError::Disposed)));
    }
}
