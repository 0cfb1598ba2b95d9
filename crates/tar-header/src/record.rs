//! Structured header records and the block codec.

use std::fmt;

use crate::{
    compute_checksum, format_numeric, is_zero_block, parse_numeric, parse_octal, truncate_null,
    write_str_field, EntryType, HeaderError, Result, UstarBlock, GNU_MAGIC, GNU_VERSION,
    GNU_VERSIONS, HEADER_SIZE, USTAR_MAGIC, USTAR_VERSION,
};

/// Decoded contents of one header block.
///
/// String fields hold the raw bytes of the field without the null
/// terminator; numeric fields hold the parsed values. `checksum` is the
/// value stored in the block when decoding and is ignored by [`encode`],
/// which always recomputes it.
#[derive(Clone, PartialEq, Eq)]
pub struct HeaderRecord {
    /// Name field (last part of the path when `prefix` is in use).
    pub name: Vec<u8>,
    /// Permission and mode bits.
    pub mode: u32,
    /// Owner user ID.
    pub uid: u64,
    /// Owner group ID.
    pub gid: u64,
    /// Length of the data following the header.
    pub size: u64,
    /// Modification time as seconds since the Unix epoch.
    pub mtime: u64,
    /// Checksum stored in the block.
    pub checksum: u64,
    /// Entry type flag.
    pub entry_type: EntryType,
    /// Link target for hard and symbolic links.
    pub link_name: Vec<u8>,
    /// Format magic.
    pub magic: [u8; 6],
    /// Format version.
    pub version: [u8; 2],
    /// Owner user name.
    pub uname: Vec<u8>,
    /// Owner group name.
    pub gname: Vec<u8>,
    /// Device major number.
    pub dev_major: u32,
    /// Device minor number.
    pub dev_minor: u32,
    /// Leading path components for names over 100 bytes (POSIX only).
    pub prefix: Vec<u8>,
}

impl HeaderRecord {
    /// Create an empty POSIX ustar record of the given type.
    #[must_use]
    pub fn new(entry_type: EntryType) -> Self {
        Self {
            name: Vec::new(),
            mode: 0,
            uid: 0,
            gid: 0,
            size: 0,
            mtime: 0,
            checksum: 0,
            entry_type,
            link_name: Vec::new(),
            magic: *USTAR_MAGIC,
            version: *USTAR_VERSION,
            uname: Vec::new(),
            gname: Vec::new(),
            dev_major: 0,
            dev_minor: 0,
            prefix: Vec::new(),
        }
    }

    /// Create a GNU-format record of the given type.
    ///
    /// GNU headers have no `prefix` field and must name an owner.
    #[must_use]
    pub fn new_gnu(entry_type: EntryType) -> Self {
        Self {
            magic: *GNU_MAGIC,
            version: *GNU_VERSION,
            ..Self::new(entry_type)
        }
    }

    /// Returns true if the magic field identifies a POSIX ustar header.
    #[must_use]
    pub fn is_ustar(&self) -> bool {
        self.magic == *USTAR_MAGIC
    }

    /// Returns true if the magic field identifies a GNU header.
    #[must_use]
    pub fn is_gnu(&self) -> bool {
        self.magic == *GNU_MAGIC
    }

    /// The entry path: `prefix/name` when a prefix is present, else `name`.
    #[must_use]
    pub fn path(&self) -> std::borrow::Cow<'_, [u8]> {
        crate::join_path(&self.prefix, &self.name)
    }
}

impl Default for HeaderRecord {
    fn default() -> Self {
        Self::new(EntryType::Normal)
    }
}

impl fmt::Debug for HeaderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderRecord")
            .field("path", &String::from_utf8_lossy(&self.path()))
            .field("entry_type", &self.entry_type)
            .field("size", &self.size)
            .field("mode", &format_args!("{:04o}", self.mode))
            .field("is_ustar", &self.is_ustar())
            .field("is_gnu", &self.is_gnu())
            .finish_non_exhaustive()
    }
}

fn parse_u32(bytes: &[u8], field: &'static str) -> Result<u32> {
    let value = parse_numeric(bytes)?;
    u32::try_from(value).map_err(|_| HeaderError::ValueOutOfRange { field, value })
}

fn check_gnu_fields(magic: &[u8; 6], version: &[u8; 2], uname: &[u8], gname: &[u8]) -> Result<()> {
    if magic != GNU_MAGIC {
        return Ok(());
    }
    if uname.is_empty() {
        return Err(HeaderError::InvalidUstarFields("empty uname"));
    }
    if gname.is_empty() {
        return Err(HeaderError::InvalidUstarFields("empty gname"));
    }
    if !GNU_VERSIONS.iter().any(|v| *v == version) {
        return Err(HeaderError::InvalidUstarFields("unexpected version"));
    }
    Ok(())
}

/// Decode a 512-byte header block.
///
/// The checksum is verified before any field is interpreted. Owner names,
/// device numbers and the prefix are only read from ustar or GNU headers;
/// the prefix only from POSIX ustar, since GNU headers reuse those bytes.
///
/// # Errors
///
/// - [`HeaderError::EndOfArchive`] if the block is all zeros.
/// - [`HeaderError::ChecksumMismatch`] or [`HeaderError::InvalidOctal`] for
///   a corrupt block.
/// - [`HeaderError::InvalidUstarFields`] for a GNU-magic header missing its
///   owner names or carrying an unknown version.
/// - [`HeaderError::ValueOutOfRange`] for a mode or device number wider
///   than 32 bits.
pub fn decode(block: &[u8; HEADER_SIZE]) -> Result<HeaderRecord> {
    if is_zero_block(block) {
        return Err(HeaderError::EndOfArchive);
    }

    let raw = UstarBlock::from_block(block);
    let expected = parse_octal(&raw.checksum)?;
    let computed = compute_checksum(block);
    if expected != computed {
        return Err(HeaderError::ChecksumMismatch { expected, computed });
    }

    let extended = raw.is_ustar() || raw.is_gnu();
    let (uname, gname) = if extended {
        (truncate_null(&raw.uname), truncate_null(&raw.gname))
    } else {
        (&[][..], &[][..])
    };
    check_gnu_fields(&raw.magic, &raw.version, uname, gname)?;

    let (dev_major, dev_minor) = if extended {
        (
            parse_u32(&raw.devmajor, "devmajor")?,
            parse_u32(&raw.devminor, "devminor")?,
        )
    } else {
        (0, 0)
    };
    let prefix = if raw.is_ustar() {
        truncate_null(&raw.prefix).to_vec()
    } else {
        Vec::new()
    };

    Ok(HeaderRecord {
        name: truncate_null(&raw.name).to_vec(),
        mode: parse_u32(&raw.mode, "mode")?,
        uid: parse_numeric(&raw.uid)?,
        gid: parse_numeric(&raw.gid)?,
        size: parse_numeric(&raw.size)?,
        mtime: parse_numeric(&raw.mtime)?,
        checksum: expected,
        entry_type: EntryType::from_byte(raw.typeflag),
        link_name: truncate_null(&raw.linkname).to_vec(),
        magic: raw.magic,
        version: raw.version,
        uname: uname.to_vec(),
        gname: gname.to_vec(),
        dev_major,
        dev_minor,
        prefix,
    })
}

/// Decode the header block at the start of `bytes`.
///
/// # Errors
///
/// [`HeaderError::InsufficientData`] if fewer than 512 bytes are given,
/// otherwise as for [`decode`].
pub fn decode_slice(bytes: &[u8]) -> Result<HeaderRecord> {
    let block = bytes
        .get(..HEADER_SIZE)
        .and_then(|b| <&[u8; HEADER_SIZE]>::try_from(b).ok())
        .ok_or(HeaderError::InsufficientData(bytes.len()))?;
    decode(block)
}

/// Encode a record into a 512-byte header block.
///
/// Numeric fields use the classic terminators: mode, uid, gid and device
/// numbers end in a space and a null, size and mtime in a space, and the
/// checksum in a null and a space. The checksum is computed over the
/// finished block.
///
/// # Errors
///
/// - [`HeaderError::FieldTooLong`] if a string exceeds its field. Callers
///   split long paths with [`crate::split_path`] first.
/// - [`HeaderError::NumericOverflow`] for a number base-256 cannot hold.
/// - [`HeaderError::InvalidUstarFields`] for a GNU record that would not
///   decode (no owner names, bad version, or a non-empty prefix).
pub fn encode(record: &HeaderRecord) -> Result<[u8; HEADER_SIZE]> {
    check_gnu_fields(&record.magic, &record.version, &record.uname, &record.gname)?;
    if record.is_gnu() && !record.prefix.is_empty() {
        return Err(HeaderError::InvalidUstarFields("GNU headers have no prefix"));
    }

    let mut raw = UstarBlock::default();
    write_str_field(&mut raw.name, &record.name, "name")?;
    format_numeric(&mut raw.mode, u64::from(record.mode), b" \0")?;
    format_numeric(&mut raw.uid, record.uid, b" \0")?;
    format_numeric(&mut raw.gid, record.gid, b" \0")?;
    format_numeric(&mut raw.size, record.size, b" ")?;
    format_numeric(&mut raw.mtime, record.mtime, b" ")?;
    raw.typeflag = record.entry_type.to_byte();
    write_str_field(&mut raw.linkname, &record.link_name, "linkname")?;
    raw.magic = record.magic;
    raw.version = record.version;
    write_str_field(&mut raw.uname, &record.uname, "uname")?;
    write_str_field(&mut raw.gname, &record.gname, "gname")?;
    format_numeric(&mut raw.devmajor, u64::from(record.dev_major), b" \0")?;
    format_numeric(&mut raw.devminor, u64::from(record.dev_minor), b" \0")?;
    write_str_field(&mut raw.prefix, &record.prefix, "prefix")?;

    let checksum = compute_checksum(&raw.into_block());
    format_numeric(&mut raw.checksum, checksum, b"\0 ")?;
    Ok(raw.into_block())
}
