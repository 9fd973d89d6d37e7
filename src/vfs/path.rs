//! Request path decoding and key construction.
//!
//! Keys are bucket-relative and never start with `/`. A request path is
//! decoded, cleaned against the root and only then joined onto the site's
//! prefix, so `..` can never climb out of the prefix.

use percent_encoding::percent_decode_str;

/// Why a request path could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid percent escape at byte {0}")]
    InvalidEscape(usize),

    #[error("decoded path is not valid UTF-8")]
    InvalidUtf8,

    #[error("decoded path contains a NUL byte")]
    Nul,
}

/// Strictly percent-decode a request path.
///
/// Unlike `percent_decode_str` alone, a `%` that is not followed by two
/// hex digits is an error rather than passed through.
pub fn decode_path(raw: &str) -> Result<String, DecodeError> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(DecodeError::InvalidEscape(i));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| DecodeError::InvalidUtf8)?;
    if decoded.contains('\0') {
        return Err(DecodeError::Nul);
    }
    Ok(decoded.into_owned())
}

/// Lexically clean a path against the root: drop empty and `.` segments,
/// let `..` pop a segment but never go above the root.
///
/// The result has no leading or trailing `/`; the root is `""`.
pub fn clean(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Join two cleaned, relative paths.
pub fn join(base: &str, rest: &str) -> String {
    match (base.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{base}/{rest}"),
    }
}
