//! Archive options: access mode, name encoding and limits.

use std::fmt;

use crate::Limits;

/// Which operations an archive permits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Read existing entries; no mutation.
    #[default]
    Read,
    /// Start a new archive; existing medium contents are discarded.
    Create,
    /// Read existing entries and add, delete or replace them.
    Update,
}

impl Mode {
    /// Returns true for the modes that rewrite the medium on flush.
    #[must_use]
    pub fn is_writable(self) -> bool {
        matches!(self, Mode::Create | Mode::Update)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Read => "read",
            Mode::Create => "create",
            Mode::Update => "update",
        })
    }
}

/// Character set used for entry names and link targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum NameEncoding {
    /// 7-bit ASCII. Non-ASCII bytes decode to U+FFFD; non-ASCII names
    /// cannot be encoded.
    #[default]
    Ascii,
    /// UTF-8, decoded lossily.
    Utf8,
    /// ISO 8859-1, where every byte is the code point of the same value.
    Latin1,
}

impl NameEncoding {
    /// Name of the encoding for messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            NameEncoding::Ascii => "ASCII",
            NameEncoding::Utf8 => "UTF-8",
            NameEncoding::Latin1 => "ISO-8859-1",
        }
    }

    /// Decode raw header bytes into a string.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            NameEncoding::Ascii => bytes
                .iter()
                .map(|&b| {
                    if b.is_ascii() {
                        char::from(b)
                    } else {
                        char::REPLACEMENT_CHARACTER
                    }
                })
                .collect(),
            NameEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            NameEncoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }

    /// Encode a string into header bytes.
    ///
    /// Returns `None` if the string has characters outside the charset.
    #[must_use]
    pub fn encode(self, name: &str) -> Option<Vec<u8>> {
        match self {
            NameEncoding::Ascii => name.is_ascii().then(|| name.as_bytes().to_vec()),
            NameEncoding::Utf8 => Some(name.as_bytes().to_vec()),
            NameEncoding::Latin1 => name.chars().map(|c| u8::try_from(c).ok()).collect(),
        }
    }
}

/// Options fixed when an archive is opened.
///
/// Build with struct-update syntax:
///
/// ```
/// use tar_archive::{Mode, TarOptions};
///
/// let options = TarOptions {
///     mode: Mode::Update,
///     leave_open: true,
///     ..Default::default()
/// };
/// assert_eq!(options.mode, Mode::Update);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TarOptions {
    /// Access mode.
    pub mode: Mode,
    /// Hand the medium back from [`Archive::close`] instead of dropping it.
    ///
    /// [`Archive::close`]: crate::Archive::close
    pub leave_open: bool,
    /// Encoding of entry names and link targets.
    pub name_encoding: NameEncoding,
    /// Limits applied to names.
    pub limits: Limits,
}

impl TarOptions {
    /// Default options with the given mode.
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }
}
