//! Zerocopy-based ustar header codec.
//!
//! This crate maps the fixed 512-byte tar header block to and from a
//! structured [`HeaderRecord`]. The block layout is described by
//! [`UstarBlock`], a `#[repr(C)]` struct of byte arrays handled through the
//! [`zerocopy`] crate, so decoding never copies the block and encoding never
//! needs pointer arithmetic.
//!
//! # Header Field Layout
//!
//! | Offset | Size | Field     | Description                              |
//! |--------|------|-----------|------------------------------------------|
//! | 0      | 100  | name      | File path (null-terminated if < 100)     |
//! | 100    | 8    | mode      | File mode in octal ASCII                 |
//! | 108    | 8    | uid       | Owner user ID in octal ASCII             |
//! | 116    | 8    | gid       | Owner group ID in octal ASCII            |
//! | 124    | 12   | size      | File size in octal ASCII                 |
//! | 136    | 12   | mtime     | Modification time (Unix epoch, octal)    |
//! | 148    | 8    | checksum  | Header checksum in octal ASCII           |
//! | 156    | 1    | typeflag  | Entry type (see [`EntryType`])           |
//! | 157    | 100  | linkname  | Link target for hard/symbolic links      |
//! | 257    | 6    | magic     | `"ustar\0"` (POSIX) or `"ustar "` (GNU)  |
//! | 263    | 2    | version   | `"00"` (POSIX) or `" \0"` (GNU)          |
//! | 265    | 32   | uname     | Owner user name                          |
//! | 297    | 32   | gname     | Owner group name                         |
//! | 329    | 8    | devmajor  | Device major number                      |
//! | 337    | 8    | devminor  | Device minor number                      |
//! | 345    | 155  | prefix    | Path prefix for long names (POSIX only)  |
//! | 500    | 12   | pad       | Unused                                   |
//!
//! # Example
//!
//! ```
//! use tar_header::{decode, encode, EntryType, HeaderRecord};
//!
//! let mut record = HeaderRecord::new(EntryType::Normal);
//! record.name = b"hello.txt".to_vec();
//! record.size = 13;
//!
//! let block = encode(&record).unwrap();
//! let decoded = decode(&block).unwrap();
//! assert_eq!(decoded.name, b"hello.txt");
//! assert_eq!(decoded.size, 13);
//! ```

mod path;
mod record;

use std::fmt;

use thiserror::Error;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub use path::{join_path, split_path};
pub use record::{decode, decode_slice, encode, HeaderRecord};

/// Size of a tar block (and of a header) in bytes.
pub const HEADER_SIZE: usize = 512;

/// Width of the `name` and `linkname` fields.
pub const NAME_SIZE: usize = 100;

/// Width of the POSIX `prefix` field.
pub const PREFIX_SIZE: usize = 155;

/// Width of the `uname` and `gname` fields.
pub const OWNER_NAME_SIZE: usize = 32;

/// Magic string for POSIX ustar headers ("ustar\0").
pub const USTAR_MAGIC: &[u8; 6] = b"ustar\0";

/// Version field for POSIX ustar headers ("00").
pub const USTAR_VERSION: &[u8; 2] = b"00";

/// Magic string for GNU tar headers ("ustar ").
pub const GNU_MAGIC: &[u8; 6] = b"ustar ";

/// Version field written by GNU tar (" \0").
pub const GNU_VERSION: &[u8; 2] = b" \0";

/// The two version terminator patterns accepted alongside [`GNU_MAGIC`].
pub const GNU_VERSIONS: [&[u8; 2]; 2] = [GNU_VERSION, b"\0\0"];

/// Name GNU tar gives to the pseudo-entry carrying a long path.
pub const LONG_LINK_NAME: &[u8] = b"././@LongLink";

/// Errors that can occur when decoding or encoding tar headers.
#[derive(Debug, Error)]
pub enum HeaderError {
    /// The provided data is too short to contain a header.
    #[error("insufficient data: expected {HEADER_SIZE} bytes, got {0}")]
    InsufficientData(usize),

    /// An octal field contains invalid characters.
    #[error("invalid octal field: {0:?}")]
    InvalidOctal(Vec<u8>),

    /// The header checksum does not match the computed value.
    #[error("checksum mismatch: expected {expected}, computed {computed}")]
    ChecksumMismatch {
        /// The checksum value stored in the header.
        expected: u64,
        /// The checksum computed from the header bytes.
        computed: u64,
    },

    /// A GNU-magic header without owner names or with a bad version field.
    #[error("inconsistent ustar fields: {0}")]
    InvalidUstarFields(&'static str),

    /// The block is the all-zero end-of-archive sentinel.
    #[error("end of archive")]
    EndOfArchive,

    /// A string does not fit its fixed-width field.
    #[error("{field} is {len} bytes, the field holds at most {limit}")]
    FieldTooLong {
        /// Name of the header field.
        field: &'static str,
        /// Length of the rejected value.
        len: usize,
        /// Width of the field.
        limit: usize,
    },

    /// A number cannot be represented in its field, even in base-256.
    #[error("value {value} does not fit a {width}-byte numeric field")]
    NumericOverflow {
        /// The rejected value.
        value: u64,
        /// Width of the field.
        width: usize,
    },

    /// A decoded number is too large for the field's type.
    #[error("{field} value {value} is out of range")]
    ValueOutOfRange {
        /// Name of the header field.
        field: &'static str,
        /// The decoded value.
        value: u64,
    },
}

impl HeaderError {
    /// Returns true for the end-of-archive signal, which is not a failure.
    #[must_use]
    pub fn is_end_of_archive(&self) -> bool {
        matches!(self, HeaderError::EndOfArchive)
    }
}

/// Result type for header operations.
pub type Result<T> = std::result::Result<T, HeaderError>;

// ============================================================================
// Block layout
// ============================================================================

/// On-disk layout of a ustar header block.
///
/// Every field is a byte array, so any 512 bytes are a valid `UstarBlock`
/// and the struct can be viewed in place over a read buffer.
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct UstarBlock {
    /// File path name (null-terminated if shorter than 100 bytes).
    pub name: [u8; NAME_SIZE],
    /// File mode in octal ASCII.
    pub mode: [u8; 8],
    /// Owner user ID in octal ASCII.
    pub uid: [u8; 8],
    /// Owner group ID in octal ASCII.
    pub gid: [u8; 8],
    /// File size in octal ASCII.
    pub size: [u8; 12],
    /// Modification time as Unix timestamp in octal ASCII.
    pub mtime: [u8; 12],
    /// Header checksum in octal ASCII.
    pub checksum: [u8; 8],
    /// Entry type flag.
    pub typeflag: u8,
    /// Link target name for hard/symbolic links.
    pub linkname: [u8; NAME_SIZE],
    /// Format magic.
    pub magic: [u8; 6],
    /// Format version.
    pub version: [u8; 2],
    /// Owner user name (null-terminated).
    pub uname: [u8; OWNER_NAME_SIZE],
    /// Owner group name (null-terminated).
    pub gname: [u8; OWNER_NAME_SIZE],
    /// Device major number in octal ASCII.
    pub devmajor: [u8; 8],
    /// Device minor number in octal ASCII.
    pub devminor: [u8; 8],
    /// Path prefix for names longer than 100 bytes.
    pub prefix: [u8; PREFIX_SIZE],
    /// Padding to fill the 512-byte block.
    pub pad: [u8; 12],
}

impl UstarBlock {
    /// View a block buffer as a header layout.
    #[must_use]
    pub fn from_block(block: &[u8; HEADER_SIZE]) -> &UstarBlock {
        zerocopy::transmute_ref!(block)
    }

    /// Copy the layout back into a plain block.
    #[must_use]
    pub fn into_block(self) -> [u8; HEADER_SIZE] {
        zerocopy::transmute!(self)
    }

    /// Returns true if the magic field identifies a GNU header.
    #[must_use]
    pub fn is_gnu(&self) -> bool {
        self.magic == *GNU_MAGIC
    }

    /// Returns true if the magic field identifies a POSIX ustar header.
    #[must_use]
    pub fn is_ustar(&self) -> bool {
        self.magic == *USTAR_MAGIC
    }
}

impl Default for UstarBlock {
    fn default() -> Self {
        zerocopy::FromZeros::new_zeroed()
    }
}

impl fmt::Debug for UstarBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UstarBlock")
            .field("name", &String::from_utf8_lossy(truncate_null(&self.name)))
            .field("mode", &String::from_utf8_lossy(truncate_null(&self.mode)))
            .field("typeflag", &self.typeflag)
            .field("magic", &self.magic)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Entry Type
// ============================================================================

/// Kind of file system object an entry describes.
///
/// The type is stored as a single ASCII byte in the header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EntryType {
    /// Regular file written by pre-POSIX tar (type '\0').
    OldNormal,
    /// Regular file (type '0').
    #[default]
    Normal,
    /// Hard link to another file in the archive (type '1').
    Link,
    /// Symbolic link (type '2').
    SymbolicLink,
    /// Character device (type '3').
    Character,
    /// Block device (type '4').
    Block,
    /// Directory (type '5').
    Directory,
    /// FIFO/named pipe (type '6').
    Fifo,
    /// Contiguous file (type '7').
    Contiguous,
    /// GNU long name record for the entry that follows (type 'L').
    LongLink,
    /// Any other type byte; the entry is treated as a regular file.
    Other(u8),
}

impl EntryType {
    /// Parse an entry type from a raw byte value.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'\0' => EntryType::OldNormal,
            b'0' => EntryType::Normal,
            b'1' => EntryType::Link,
            b'2' => EntryType::SymbolicLink,
            b'3' => EntryType::Character,
            b'4' => EntryType::Block,
            b'5' => EntryType::Directory,
            b'6' => EntryType::Fifo,
            b'7' => EntryType::Contiguous,
            b'L' => EntryType::LongLink,
            other => EntryType::Other(other),
        }
    }

    /// Convert an entry type to its raw byte representation.
    #[must_use]
    pub fn to_byte(self) -> u8 {
        match self {
            EntryType::OldNormal => b'\0',
            EntryType::Normal => b'0',
            EntryType::Link => b'1',
            EntryType::SymbolicLink => b'2',
            EntryType::Character => b'3',
            EntryType::Block => b'4',
            EntryType::Directory => b'5',
            EntryType::Fifo => b'6',
            EntryType::Contiguous => b'7',
            EntryType::LongLink => b'L',
            EntryType::Other(b) => b,
        }
    }

    /// Returns true for the regular file variants.
    #[must_use]
    pub fn is_file(self) -> bool {
        matches!(
            self,
            EntryType::OldNormal | EntryType::Normal | EntryType::Contiguous | EntryType::Other(_)
        )
    }

    /// Returns true if this is a directory entry.
    #[must_use]
    pub fn is_dir(self) -> bool {
        self == EntryType::Directory
    }

    /// Returns true if this is a symbolic link entry.
    #[must_use]
    pub fn is_symlink(self) -> bool {
        self == EntryType::SymbolicLink
    }

    /// Returns true if this is a hard link entry.
    #[must_use]
    pub fn is_hard_link(self) -> bool {
        self == EntryType::Link
    }

    /// Returns true for character and block devices.
    #[must_use]
    pub fn is_device(self) -> bool {
        matches!(self, EntryType::Character | EntryType::Block)
    }
}

impl From<u8> for EntryType {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

impl From<EntryType> for u8 {
    fn from(entry_type: EntryType) -> Self {
        entry_type.to_byte()
    }
}

// ============================================================================
// Field helpers
// ============================================================================

/// Parse an octal ASCII field into a u64.
///
/// Octal fields in tar headers are ASCII strings with optional leading
/// spaces and trailing spaces or null bytes. For example:
/// - `"0000644\0"` -> 420 (file mode 0644)
/// - `"     123 "` -> 83
///
/// # Errors
///
/// Returns [`HeaderError::InvalidOctal`] if the field contains invalid
/// characters (anything other than spaces, digits 0-7, or null bytes), or
/// anything but spaces and nulls after the terminator.
pub fn parse_octal(bytes: &[u8]) -> Result<u64> {
    let start = bytes.iter().position(|&b| b != b' ').unwrap_or(bytes.len());
    let end = bytes[start..]
        .iter()
        .position(|&b| b == b' ' || b == b'\0')
        .map_or(bytes.len(), |i| start + i);
    if bytes[end..].iter().any(|&b| b != b' ' && b != b'\0') {
        return Err(HeaderError::InvalidOctal(bytes.to_vec()));
    }

    let mut value: u64 = 0;
    for &byte in &bytes[start..end] {
        if !(b'0'..=b'7').contains(&byte) {
            return Err(HeaderError::InvalidOctal(bytes.to_vec()));
        }
        value = value
            .checked_mul(8)
            .and_then(|v| v.checked_add(u64::from(byte - b'0')))
            .ok_or_else(|| HeaderError::InvalidOctal(bytes.to_vec()))?;
    }

    Ok(value)
}

/// Parse a numeric field that may be octal ASCII or GNU base-256 encoded.
///
/// When the high bit of the first byte is set the remaining bits are a
/// big-endian binary value.
///
/// # Errors
///
/// Returns [`HeaderError::InvalidOctal`] if octal parsing fails or a
/// base-256 value exceeds 64 bits.
pub fn parse_numeric(bytes: &[u8]) -> Result<u64> {
    match bytes.first() {
        Some(&first) if first & 0x80 != 0 => {
            let mut value: u64 = 0;
            for (i, &byte) in bytes.iter().enumerate() {
                let b = if i == 0 { byte & 0x7f } else { byte };
                if value >> 56 != 0 {
                    return Err(HeaderError::InvalidOctal(bytes.to_vec()));
                }
                value = (value << 8) | u64::from(b);
            }
            Ok(value)
        }
        _ => parse_octal(bytes),
    }
}

/// Render a number into a fixed-width field.
///
/// The value is written as zero-padded octal followed by `terminator`. When
/// it does not fit, a single null terminator is tried (buying one digit),
/// and past that the GNU base-256 form is used.
///
/// # Errors
///
/// Returns [`HeaderError::NumericOverflow`] when even base-256 cannot hold
/// the value.
pub fn format_numeric(field: &mut [u8], value: u64, terminator: &[u8]) -> Result<()> {
    let width = field.len();
    for term in [terminator, b"\0".as_slice()] {
        let Some(digits) = width.checked_sub(term.len()) else {
            continue;
        };
        if digits > 0 && fits_octal(value, digits) {
            let text = format!("{value:0digits$o}");
            field[..digits].copy_from_slice(text.as_bytes());
            field[digits..].copy_from_slice(term);
            return Ok(());
        }
    }

    let payload = width.saturating_sub(1);
    if payload == 0 || (payload < 8 && value >> (payload * 8) != 0) {
        return Err(HeaderError::NumericOverflow { value, width });
    }
    field.fill(0);
    let n = payload.min(8);
    field[width - n..].copy_from_slice(&value.to_be_bytes()[8 - n..]);
    field[0] |= 0x80;
    Ok(())
}

fn fits_octal(value: u64, digits: usize) -> bool {
    digits >= 22 || value < (1u64 << (3 * digits))
}

/// Copy a string into a fixed-width field, rejecting values that overflow.
///
/// Bytes after the value are zeroed, so shorter values are null-terminated.
///
/// # Errors
///
/// Returns [`HeaderError::FieldTooLong`] if `value` is wider than `field`.
pub fn write_str_field(field: &mut [u8], value: &[u8], name: &'static str) -> Result<()> {
    if value.len() > field.len() {
        return Err(HeaderError::FieldTooLong {
            field: name,
            len: value.len(),
            limit: field.len(),
        });
    }
    field[..value.len()].copy_from_slice(value);
    field[value.len()..].fill(0);
    Ok(())
}

/// Compute the header checksum.
///
/// This is the unsigned sum of all header bytes with the checksum field
/// (bytes 148..156) counted as eight ASCII spaces.
#[must_use]
pub fn compute_checksum(block: &[u8; HEADER_SIZE]) -> u64 {
    block
        .iter()
        .enumerate()
        .map(|(i, &byte)| {
            if (148..156).contains(&i) {
                u64::from(b' ')
            } else {
                u64::from(byte)
            }
        })
        .sum()
}

/// Check whether a block is the all-zero end-of-archive sentinel.
#[must_use]
pub fn is_zero_block(block: &[u8]) -> bool {
    block.iter().all(|&b| b == 0)
}

/// Truncate a byte slice at the first null byte.
///
/// This is used to extract null-terminated strings from fixed-size fields.
/// If no null byte is found, returns the entire slice.
///
/// # Example
///
/// ```
/// use tar_header::truncate_null;
///
/// assert_eq!(truncate_null(b"hello\0world"), b"hello");
/// assert_eq!(truncate_null(b"no null here"), b"no null here");
/// assert_eq!(truncate_null(b"\0empty"), b"");
/// ```
#[must_use]
pub fn truncate_null(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(pos) => &bytes[..pos],
        None => bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size() {
        assert_eq!(size_of::<UstarBlock>(), HEADER_SIZE);
    }

    #[test]
    fn test_default_block_is_zero() {
        let block = UstarBlock::default().into_block();
        assert!(is_zero_block(&block));
    }

    #[test]
    fn test_parse_octal() {
        assert_eq!(parse_octal(b"0000644\0").unwrap(), 0o644);
        assert_eq!(parse_octal(b"000755 \0").unwrap(), 0o755);
        assert_eq!(parse_octal(b"     123 ").unwrap(), 0o123);
        assert_eq!(parse_octal(b"0").unwrap(), 0);
        assert_eq!(parse_octal(b"").unwrap(), 0);
        assert_eq!(parse_octal(b"   \0\0\0").unwrap(), 0);
        assert_eq!(parse_octal(b"77777777777").unwrap(), 0o77777777777);
    }

    #[test]
    fn test_parse_octal_invalid() {
        assert!(parse_octal(b"abc").is_err());
        assert!(parse_octal(b"128").is_err());
        assert!(parse_octal(b"12-4").is_err());
        assert!(parse_octal(b"644\0Z").is_err());
        assert!(parse_octal(b"64 4").is_err());
        assert!(parse_octal(b"011204\07").is_err());
    }

    #[test]
    fn test_parse_numeric_base256() {
        let mut field = [0u8; 12];
        field[0] = 0x80;
        field[8..].copy_from_slice(&0x1234_5678u32.to_be_bytes());
        assert_eq!(parse_numeric(&field).unwrap(), 0x1234_5678);

        let mut overflow = [0xffu8; 12];
        overflow[0] = 0x81;
        assert!(parse_numeric(&overflow).is_err());
    }

    #[test]
    fn test_format_numeric_conventions() {
        let mut mode = [0u8; 8];
        format_numeric(&mut mode, 0o644, b" \0").unwrap();
        assert_eq!(&mode, b"000644 \0");

        let mut size = [0u8; 12];
        format_numeric(&mut size, 3, b" ").unwrap();
        assert_eq!(&size, b"00000000003 ");

        let mut checksum = [0u8; 8];
        format_numeric(&mut checksum, 0o11204, b"\0 ").unwrap();
        assert_eq!(&checksum, b"011204\0 ");
    }

    #[test]
    fn test_format_numeric_fallbacks() {
        // One more digit is available with a lone null terminator.
        let mut uid = [0u8; 8];
        format_numeric(&mut uid, 0o1234567, b" \0").unwrap();
        assert_eq!(&uid, b"1234567\0");
        assert_eq!(parse_numeric(&uid).unwrap(), 0o1234567);

        // Past that the value goes to base-256.
        let big = 64 * 1024 * 1024 * 1024u64;
        let mut size = [0u8; 12];
        format_numeric(&mut size, big, b" ").unwrap();
        assert_eq!(size[0] & 0x80, 0x80);
        assert_eq!(parse_numeric(&size).unwrap(), big);

        let mut tiny = [0u8; 8];
        assert!(matches!(
            format_numeric(&mut tiny, u64::MAX, b" \0"),
            Err(HeaderError::NumericOverflow { width: 8, .. })
        ));
    }

    #[test]
    fn test_write_str_field() {
        let mut field = [0xffu8; 8];
        write_str_field(&mut field, b"root", "uname").unwrap();
        assert_eq!(&field, b"root\0\0\0\0");
        write_str_field(&mut field, b"exactly8", "uname").unwrap();
        assert_eq!(&field, b"exactly8");
        assert!(matches!(
            write_str_field(&mut field, b"ninechars", "uname"),
            Err(HeaderError::FieldTooLong {
                field: "uname",
                len: 9,
                limit: 8
            })
        ));
    }

    #[test]
    fn test_truncate_null() {
        assert_eq!(truncate_null(b"hello\0world"), b"hello");
        assert_eq!(truncate_null(b"no null"), b"no null");
        assert_eq!(truncate_null(b"\0start"), b"");
        assert_eq!(truncate_null(b""), b"");
    }

    #[test]
    fn test_checksum_counts_field_as_spaces() {
        let mut block = [0u8; HEADER_SIZE];
        assert_eq!(compute_checksum(&block), 8 * 32);
        block[148..156].copy_from_slice(b"77777777");
        assert_eq!(compute_checksum(&block), 8 * 32);
        block[0] = b'a';
        assert_eq!(compute_checksum(&block), 8 * 32 + 97);
    }

    #[test]
    fn test_entry_type_roundtrip() {
        let types = [
            EntryType::OldNormal,
            EntryType::Normal,
            EntryType::Link,
            EntryType::SymbolicLink,
            EntryType::Character,
            EntryType::Block,
            EntryType::Directory,
            EntryType::Fifo,
            EntryType::Contiguous,
            EntryType::LongLink,
            EntryType::Other(b'x'),
        ];

        for t in types {
            assert_eq!(EntryType::from_byte(t.to_byte()), t);
        }
    }

    #[test]
    fn test_entry_type_predicates() {
        assert!(EntryType::Normal.is_file());
        assert!(EntryType::OldNormal.is_file());
        assert!(EntryType::Contiguous.is_file());
        assert!(EntryType::Other(b'S').is_file());
        assert!(!EntryType::Directory.is_file());
        assert!(!EntryType::LongLink.is_file());

        assert!(EntryType::Directory.is_dir());
        assert!(EntryType::SymbolicLink.is_symlink());
        assert!(EntryType::Link.is_hard_link());
        assert!(EntryType::Character.is_device());
        assert!(EntryType::Block.is_device());
        assert!(!EntryType::Fifo.is_device());
    }
}
