//! Reading, creating and updating tar archives.
//!
//! An [`Archive`] owns a seekable medium and exposes its members as
//! [`Entry`] values. It is opened in one of three [`Mode`]s:
//!
//! - [`Mode::Read`]: entries are scanned lazily and cached, or consumed one
//!   at a time with [`Archive::next_entry`].
//! - [`Mode::Create`]: the medium starts out empty and entries are added
//!   with [`Archive::create_entry`] or [`Archive::add_entry`].
//! - [`Mode::Update`]: existing entries are scanned and can be deleted or
//!   replaced, and new ones appended.
//!
//! Changes are held in memory and written by rewriting the medium from the
//! start on [`Archive::flush`], [`Archive::close`] or drop.
//!
//! Non-seekable sources are either buffered whole with
//! [`Archive::from_reader`] or read forward-only with [`ArchiveReader`].
//!
//! Headers are POSIX ustar. Paths longer than the 100-byte `name` field are
//! split into `prefix` and `name` where possible, and otherwise stored in a
//! GNU long name record before the entry.
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use tar_archive::{Archive, Mode, TarOptions};
//!
//! let mut buf = Vec::new();
//! let mut archive = Archive::open(Cursor::new(&mut buf), TarOptions::new(Mode::Create))?;
//! archive.create_entry("file1.txt", "AAA")?;
//! archive.create_entry("dir/file2.txt", "BBB")?;
//! archive.close()?;
//! drop(archive);
//!
//! let mut archive = Archive::from_reader(buf.as_slice(), TarOptions::default())?;
//! assert_eq!(archive.entry_names()?, ["file1.txt", "dir/file2.txt"]);
//! # Ok::<(), tar_archive::ArchiveError>(())
//! ```

mod archive;
mod cursor;
mod entry;
mod error;
mod limits;
mod medium;
mod options;
mod scan;
mod stream;
mod writer;

pub use archive::{Archive, Entries};
pub use cursor::BlockCursor;
pub use entry::{Entry, EntryId, EntryReader, NewEntry};
pub use error::{ArchiveError, Result};
pub use limits::Limits;
pub use medium::Medium;
pub use options::{Mode, NameEncoding, TarOptions};
pub use stream::ArchiveReader;
pub use tar_header::{EntryType, HeaderError, HeaderRecord};
pub use writer::{ArchiveWriter, Placement};
