//! The byte-addressable resource behind a writable archive.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use crate::{ArchiveError, Result};

/// A seekable, writable, truncatable medium.
///
/// Flushing an archive rewrites the medium from offset zero, so it must be
/// possible to cut off whatever the old contents left behind.
pub trait Medium: Read + Write + Seek {
    /// Truncate or extend the medium to exactly `len` bytes.
    fn set_len(&mut self, len: u64) -> io::Result<()>;
}

impl Medium for File {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

fn vec_len(len: u64) -> io::Result<usize> {
    usize::try_from(len).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length overflow"))
}

impl Medium for Cursor<Vec<u8>> {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        let len = vec_len(len)?;
        self.get_mut().resize(len, 0);
        Ok(())
    }
}

impl Medium for Cursor<&mut Vec<u8>> {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        let len = vec_len(len)?;
        self.get_mut().resize(len, 0);
        Ok(())
    }
}

impl<T: Medium + ?Sized> Medium for &mut T {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        (**self).set_len(len)
    }
}

impl<T: Medium + ?Sized> Medium for Box<T> {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        (**self).set_len(len)
    }
}

/// Total length of a seekable medium. Leaves the position at the end.
pub(crate) fn medium_len<M: Seek + ?Sized>(medium: &mut M) -> Result<u64> {
    Ok(medium.seek(SeekFrom::End(0))?)
}

/// Read `len` bytes starting at `offset`.
pub(crate) fn read_region<M: Read + Seek + ?Sized>(
    medium: &mut M,
    offset: u64,
    len: u64,
) -> Result<Vec<u8>> {
    let size = usize::try_from(len).map_err(|_| ArchiveError::InvalidSize(len))?;
    medium.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; size];
    medium.read_exact(&mut buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ArchiveError::UnexpectedEof { pos: offset + len },
        _ => ArchiveError::Io(e),
    })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_set_len() {
        let mut medium = Cursor::new(vec![1u8; 10]);
        Medium::set_len(&mut medium, 4).unwrap();
        assert_eq!(medium.get_ref().len(), 4);
        Medium::set_len(&mut medium, 6).unwrap();
        assert_eq!(medium.get_ref(), &[1, 1, 1, 1, 0, 0]);
    }

    #[test]
    fn test_borrowed_vec() {
        let mut buf = vec![7u8; 8];
        {
            let mut medium = Cursor::new(&mut buf);
            let mut by_ref = &mut medium;
            Medium::set_len(&mut by_ref, 2).unwrap();
        }
        assert_eq!(buf, [7, 7]);
    }

    #[test]
    fn test_file_set_len() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(&[0u8; 1024]).unwrap();
        Medium::set_len(&mut file, 512).unwrap();
        assert_eq!(medium_len(&mut file).unwrap(), 512);
    }

    #[test]
    fn test_read_region() {
        let mut medium = Cursor::new((0u8..16).collect::<Vec<_>>());
        assert_eq!(read_region(&mut medium, 4, 3).unwrap(), [4, 5, 6]);
        assert!(matches!(
            read_region(&mut medium, 10, 10),
            Err(ArchiveError::UnexpectedEof { pos: 20 })
        ));
    }
}
