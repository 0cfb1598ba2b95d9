//! Splitting long paths across the ustar `prefix` and `name` fields.

use std::borrow::Cow;

use crate::{NAME_SIZE, PREFIX_SIZE};

/// Split a path into `(prefix, name)` so that both fit their fields.
///
/// Paths of up to 100 bytes go entirely into `name`. Longer paths are
/// split at the `/` that yields the longest prefix of at most 155 bytes
/// while leaving a non-empty name of at most 100 bytes; the separator
/// itself is not stored. Returns `None` when no such split exists, in
/// which case the path needs a GNU long name record.
///
/// # Example
///
/// ```
/// use tar_header::split_path;
///
/// assert_eq!(split_path(b"dir/file"), Some((&b""[..], &b"dir/file"[..])));
///
/// let long = format!("{}/{}", "a".repeat(120), "b".repeat(20));
/// let (prefix, name) = split_path(long.as_bytes()).unwrap();
/// assert_eq!(prefix.len(), 120);
/// assert_eq!(name, "b".repeat(20).as_bytes());
///
/// assert_eq!(split_path("c".repeat(300).as_bytes()), None);
/// ```
#[must_use]
pub fn split_path(path: &[u8]) -> Option<(&[u8], &[u8])> {
    if path.len() <= NAME_SIZE {
        return Some((&[], path));
    }

    let last = PREFIX_SIZE.min(path.len() - 1);
    for i in (1..=last).rev() {
        let name_len = path.len() - i - 1;
        if name_len > NAME_SIZE {
            // Moving left only makes the name longer.
            break;
        }
        if path[i] == b'/' && name_len > 0 {
            return Some((&path[..i], &path[i + 1..]));
        }
    }
    None
}

/// Join the ustar `prefix` and `name` fields into a full path.
#[must_use]
pub fn join_path<'a>(prefix: &'a [u8], name: &'a [u8]) -> Cow<'a, [u8]> {
    if prefix.is_empty() {
        return Cow::Borrowed(name);
    }
    let mut full = Vec::with_capacity(prefix.len() + 1 + name.len());
    full.extend_from_slice(prefix);
    full.push(b'/');
    full.extend_from_slice(name);
    Cow::Owned(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_paths_stay_in_name() {
        assert_eq!(split_path(b""), Some((&b""[..], &b""[..])));
        let exact = vec![b'n'; NAME_SIZE];
        assert_eq!(split_path(&exact), Some((&b""[..], exact.as_slice())));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let path = format!("{}/{}/{}", "a".repeat(60), "b".repeat(60), "c".repeat(30));
        let (prefix, name) = split_path(path.as_bytes()).unwrap();
        assert_eq!(prefix.len(), 121);
        assert_eq!(name, "c".repeat(30).as_bytes());
        assert_eq!(join_path(prefix, name).as_ref(), path.as_bytes());
    }

    #[test]
    fn test_maximum_split() {
        let path = format!("{}/{}", "p".repeat(PREFIX_SIZE), "n".repeat(NAME_SIZE));
        assert_eq!(path.len(), 256);
        let (prefix, name) = split_path(path.as_bytes()).unwrap();
        assert_eq!(prefix.len(), PREFIX_SIZE);
        assert_eq!(name.len(), NAME_SIZE);
    }

    #[test]
    fn test_unsplittable_paths() {
        // Name part too long.
        let path = format!("{}/{}", "p".repeat(10), "n".repeat(NAME_SIZE + 1));
        assert_eq!(split_path(path.as_bytes()), None);

        // Prefix part too long.
        let path = format!("{}/{}", "p".repeat(PREFIX_SIZE + 1), "n".repeat(10));
        assert_eq!(split_path(path.as_bytes()), None);

        // Trailing slash leaves an empty name.
        let path = format!("{}/", "p".repeat(NAME_SIZE + 5));
        assert_eq!(split_path(path.as_bytes()), None);

        // No separator at all.
        assert_eq!(split_path(&[b'x'; 300]), None);
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path(b"", b"file").as_ref(), b"file");
        assert_eq!(join_path(b"dir/sub", b"file").as_ref(), b"dir/sub/file");
    }
}
