use std::path::PathBuf;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::{Error, Result};

/// Separator every normalized base URI ends with.
pub const URI_SEPARATOR: char = '/';

/// Scheme and empty authority of local file URIs.
pub const FILE_SCHEME: &str = "file://";

/// Octets left untouched inside the path portion of a catalog URI:
/// ASCII alphanumerics, the unreserved marks and the `/` separator.
/// Everything else (space, `%`, reserved punctuation, non-ASCII) is escaped.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// True if `s` contains at least one `%XX` escape sequence.
///
/// This is a heuristic: a legacy file name holding a literal `%41` is
/// indistinguishable from an escaped `A`.
pub fn is_encoded(s: &str) -> bool {
    s.as_bytes()
        .windows(3)
        .any(|w| w[0] == b'%' && w[1].is_ascii_hexdigit() && w[2].is_ascii_hexdigit())
}

/// Percent-decode `s` and interpret the bytes as UTF-8.
/// Text without escapes comes back unchanged.
pub fn decode(s: &str) -> Result<String> {
    percent_decode_str(s)
        .decode_utf8()
        .map(|text| text.into_owned())
        .map_err(|_| Error::Encoding {
            value: s.to_string(),
        })
}

/// Like [`decode`], replacing invalid UTF-8 with U+FFFD instead of failing.
pub fn decode_lossy(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Percent-encode the UTF-8 bytes of `s` for use in a URI path.
pub fn encode(s: &str) -> String {
    utf8_percent_encode(s, PATH_SEGMENT).to_string()
}

/// Split a base URI into its `scheme://authority` prefix and its path portion.
///
/// `file:///photos/2011/` → (`file://`, `/photos/2011/`).
/// A string without a scheme is all path.
pub fn split_base_uri(uri: &str) -> (&str, &str) {
    let Some(scheme_end) = uri.find("://").map(|i| i + 3) else {
        return ("", uri);
    };
    match uri[scheme_end..].find(URI_SEPARATOR) {
        Some(offset) => uri.split_at(scheme_end + offset),
        None => (uri, ""),
    }
}

/// Canonical escaped form of a base URI: the prefix is kept verbatim, the
/// path portion is decoded then re-encoded.
pub fn canonical_base_uri(base_uri: &str) -> Result<String> {
    let (prefix, path) = split_base_uri(base_uri);
    Ok(format!("{prefix}{}", encode(&decode(path)?)))
}

/// Canonical escaped form of a file name.
pub fn canonical_filename(filename: &str) -> Result<String> {
    Ok(encode(&decode(filename)?))
}

/// Native filesystem path for a stored (base URI, file name) pair, whether
/// or not the fields are escaped and whether or not the base URI carries its
/// trailing separator.
pub fn to_fs_path(base_uri: &str, filename: &str) -> PathBuf {
    let (_, path) = split_base_uri(base_uri);
    PathBuf::from(decode_lossy(path)).join(decode_lossy(filename))
}
