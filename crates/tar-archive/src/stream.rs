//! Forward-only reading of archives from non-seekable sources.

use std::io::Read;

use log::debug;

use crate::entry::EntryData;
use crate::scan::{Scanner, StreamSource};
use crate::{ArchiveError, Entry, EntryId, Mode, Result, TarOptions};

/// Reads an archive one entry at a time from any [`Read`] source.
///
/// Each entry's data is captured into memory as its header is decoded,
/// since a pipe cannot be rewound. Advancing to the next entry releases
/// the previous one, so at most one entry's data is held at a time.
///
/// ```
/// use tar_archive::{ArchiveReader, TarOptions};
///
/// # fn list(input: impl std::io::Read) -> tar_archive::Result<()> {
/// let mut reader = ArchiveReader::new(input, TarOptions::default())?;
/// while let Some(entry) = reader.next_entry()? {
///     println!("{} ({} bytes)", entry.full_name(), entry.length());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ArchiveReader<R> {
    reader: R,
    options: TarOptions,
    scanner: Scanner,
    current: Option<Entry>,
    count: usize,
    fault: Option<u64>,
}

impl<R: Read> ArchiveReader<R> {
    /// Wrap a reader positioned at the start of an archive.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::Unsupported`] unless `options.mode` is [`Mode::Read`].
    pub fn new(reader: R, options: TarOptions) -> Result<Self> {
        if options.mode != Mode::Read {
            return Err(ArchiveError::unsupported(
                "ArchiveReader::new",
                format!("a stream cannot be opened in {} mode", options.mode),
            ));
        }
        Ok(Self {
            reader,
            scanner: Scanner::new(options.limits.clone()),
            options,
            current: None,
            count: 0,
            fault: None,
        })
    }

    /// The options the reader was created with.
    #[must_use]
    pub fn options(&self) -> &TarOptions {
        &self.options
    }

    /// Advance to the next entry, releasing the current one.
    ///
    /// Returns `None` at the end of the archive.
    ///
    /// # Errors
    ///
    /// Scan failures are returned once; every later call fails with
    /// [`ArchiveError::Faulted`].
    pub fn next_entry(&mut self) -> Result<Option<&Entry>> {
        if let Some(offset) = self.fault {
            return Err(ArchiveError::Faulted { offset });
        }
        self.current = None;

        let mut source = StreamSource {
            inner: &mut self.reader,
        };
        match self.scanner.next(&mut source, true) {
            Ok(Some(scanned)) => {
                let id = EntryId(self.count);
                self.count += 1;
                let entry = Entry::from_scanned(id, scanned, self.options.name_encoding);
                let entry: &Entry = self.current.insert(entry);
                Ok(Some(entry))
            }
            Ok(None) => {
                debug!("stream ended after {} entries", self.count);
                Ok(None)
            }
            Err(e) => {
                self.fault = Some(self.scanner.last_header());
                Err(e)
            }
        }
    }

    /// The current entry, if the stream is positioned on one.
    #[must_use]
    pub fn current(&self) -> Option<&Entry> {
        self.current.as_ref()
    }

    /// Data of the current entry.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::Unsupported`] if there is no current entry.
    pub fn content(&self) -> Result<&[u8]> {
        match self.current.as_ref().map(|entry| &entry.data) {
            Some(EntryData::Buffered(data)) => Ok(data.as_slice()),
            _ => Err(ArchiveError::unsupported(
                "content",
                "no current entry; call next_entry first",
            )),
        }
    }

    /// Consume the reader and return the underlying source.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use super::*;
    use crate::Archive;

    /// A reader that refuses to seek, hands out a few bytes at a time.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.0.len()).min(7);
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0 = &self.0[n..];
            Ok(n)
        }
    }

    fn sample() -> Vec<u8> {
        let mut buf = Vec::new();
        let mut archive =
            Archive::open(Cursor::new(&mut buf), TarOptions::new(Mode::Create)).unwrap();
        archive.create_entry("one", b"first".to_vec()).unwrap();
        archive.create_entry(&"deep/".repeat(60), b"second".to_vec()).unwrap();
        archive.create_entry("three", Vec::new()).unwrap();
        archive.close().unwrap();
        drop(archive);
        buf
    }

    #[test]
    fn test_stream_entries() {
        let data = sample();
        let mut reader = ArchiveReader::new(Trickle(&data), TarOptions::default()).unwrap();

        let entry = reader.next_entry().unwrap().unwrap();
        assert_eq!(entry.full_name(), "one");
        assert_eq!(reader.content().unwrap(), b"first");

        let entry = reader.next_entry().unwrap().unwrap();
        assert_eq!(entry.full_name().len(), 300);
        assert_eq!(entry.id().index(), 1);
        assert_eq!(reader.content().unwrap(), b"second");

        assert_eq!(reader.next_entry().unwrap().unwrap().length(), 0);
        assert_eq!(reader.content().unwrap(), b"");

        assert!(reader.next_entry().unwrap().is_none());
        assert!(reader.current().is_none());
        assert!(reader.content().is_err());
        assert!(reader.next_entry().unwrap().is_none());
    }

    #[test]
    fn test_stream_fault_is_sticky() {
        let mut data = sample();
        data[1] ^= 0x20;
        let mut reader = ArchiveReader::new(data.as_slice(), TarOptions::default()).unwrap();
        assert!(matches!(
            reader.next_entry(),
            Err(ArchiveError::Format(_))
        ));
        assert!(matches!(
            reader.next_entry(),
            Err(ArchiveError::Faulted { offset: 0 })
        ));
    }

    #[test]
    fn test_stream_rejects_writable_modes() {
        assert!(matches!(
            ArchiveReader::new(io::empty(), TarOptions::new(Mode::Create)),
            Err(ArchiveError::Unsupported { .. })
        ));
    }
}
