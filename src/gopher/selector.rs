use std::ffi::OsStr;
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use bytes::Bytes;

/// Longest request the server reads from a client.
pub const MAX_SELECTOR_LEN: usize = 255;

/// Client-supplied resource path with the line terminator removed.
///
/// The bytes are kept as received. No unescaping or `..` stripping happens here;
/// traversal is stopped by [`ServedRoot`](crate::confine::ServedRoot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// A bare line terminator: serve the root index.
    Empty,
    Path(Bytes),
}

impl Selector {
    /// Path relative to the served root, with leading slashes dropped so it can
    /// never replace the root when joined.
    pub fn relative_path(&self) -> &Path {
        match self {
            Selector::Empty => Path::new(""),
            Selector::Path(raw) => {
                let start = raw.iter().position(|&b| b != b'/').unwrap_or(raw.len());
                Path::new(OsStr::from_bytes(&raw[start..]))
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Empty => f.write_str("<root>"),
            Selector::Path(raw) => write!(f, "{}", String::from_utf8_lossy(raw).escape_debug()),
        }
    }
}

/// Turns the bytes of a single read into a [`Selector`].
///
/// At most [`MAX_SELECTOR_LEN`] bytes are considered and one trailing `\r\n`
/// or `\n` is removed.
pub fn parse_selector(raw: &[u8]) -> Selector {
    let raw = &raw[..raw.len().min(MAX_SELECTOR_LEN)];

    let body = raw
        .strip_suffix(b"\r\n")
        .or_else(|| raw.strip_suffix(b"\n"))
        .unwrap_or(raw);

    if body.is_empty() {
        Selector::Empty
    } else {
        Selector::Path(Bytes::copy_from_slice(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_terminators_select_root() {
        assert_eq!(parse_selector(b"\n"), Selector::Empty);
        assert_eq!(parse_selector(b"\r\n"), Selector::Empty);
        assert_eq!(parse_selector(b""), Selector::Empty);
    }

    #[test]
    fn leading_slashes_are_not_absolute() {
        let sel = parse_selector(b"//docs/intro.txt\n");
        assert_eq!(sel.relative_path(), Path::new("docs/intro.txt"));
    }
}
