//! Shell-style `*`/`?` path patterns to SQL `LIKE` patterns over stored URIs.

use crate::uri;
use crate::version::SchemaEra;

/// Escape character used in encoded-era `LIKE` patterns.
pub const LIKE_ESCAPE: char = '\\';

/// Escaped forms `uri::encode` produces for the glob markers.
const ENCODED_STAR: &str = "%2A";
const ENCODED_QUESTION: &str = "%3F";

/// A `LIKE` match against `base_uri || filename`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriFilter {
    pub pattern: String,
    pub escape: Option<char>,
}

/// Translate a user glob into a URI filter for the catalog's era.
///
/// In the encoded era the pattern is escaped the same way stored paths are,
/// so it only matches records that have been normalized already.
/// An absolute path pattern is anchored behind the `file://` scheme; a
/// pattern already spelled as a `file://` URI keeps its scheme unescaped.
pub fn translate(pattern: &str, era: SchemaEra) -> UriFilter {
    let (scheme, pattern) = match pattern.strip_prefix(uri::FILE_SCHEME) {
        Some(path) => (uri::FILE_SCHEME, path),
        None if pattern.starts_with(uri::URI_SEPARATOR) => (uri::FILE_SCHEME, pattern),
        None => ("", pattern),
    };
    match era {
        SchemaEra::Legacy => UriFilter {
            pattern: format!("{scheme}{}", pattern.replace('*', "%").replace('?', "_")),
            escape: None,
        },
        SchemaEra::Encoded => UriFilter {
            pattern: format!("{scheme}{}", translate_encoded(pattern)),
            escape: Some(LIKE_ESCAPE),
        },
    }
}

fn translate_encoded(pattern: &str) -> String {
    let encoded = uri::encode(pattern);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / 2);
    let mut rest = encoded.as_str();

    // A `%` in `encoded` always starts a three-character escape, so matching
    // the glob markers at each `%` cannot straddle two escapes.
    while let Some(c) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix(ENCODED_STAR) {
            out.push('%');
            rest = tail;
            continue;
        }
        if let Some(tail) = rest.strip_prefix(ENCODED_QUESTION) {
            out.push('_');
            rest = tail;
            continue;
        }
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}
