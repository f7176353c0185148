//! Reversible backslash escaping for free-form descriptions.
//!
//! The metadata tool re-encodes non-ASCII text on its way through a
//! sidecar, so descriptions are stored in a pure printable-ASCII form:
//!
//! - `\` becomes `\\`
//! - every byte outside `0x20..=0x7E` becomes `\xHH` (lowercase hex)
//!
//! [`unescape_bytes`] is the exact inverse of [`escape_bytes`] for every
//! byte string, so a description read back from a sidecar compares equal
//! to the freshly escaped catalog description.

use crate::error::ParseError;

/// Escape arbitrary bytes into printable ASCII.
pub fn escape_bytes(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    for &byte in raw {
        match byte {
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(byte as char),
            _ => {
                out.push_str("\\x");
                out.push(hex_digit(byte >> 4));
                out.push(hex_digit(byte & 0x0f));
            }
        }
    }
    out
}

/// Reverse [`escape_bytes`].
///
/// Fails on a dangling backslash, an unknown escape, malformed hex, or a
/// raw byte that [`escape_bytes`] would never emit.
pub fn unescape_bytes(escaped: &str) -> Result<Vec<u8>, ParseError> {
    let bytes = escaped.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        if byte != b'\\' {
            if !(0x20..=0x7e).contains(&byte) {
                return Err(escape_err(i, "unescaped byte outside printable ASCII"));
            }
            out.push(byte);
            i += 1;
            continue;
        }
        match bytes.get(i + 1) {
            Some(b'\\') => {
                out.push(b'\\');
                i += 2;
            }
            Some(b'x') => {
                let hi = bytes.get(i + 2).and_then(|b| hex_value(*b));
                let lo = bytes.get(i + 3).and_then(|b| hex_value(*b));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => out.push((hi << 4) | lo),
                    _ => return Err(escape_err(i, "expected two hex digits after \\x")),
                }
                i += 4;
            }
            Some(_) => return Err(escape_err(i, "unknown escape sequence")),
            None => return Err(escape_err(i, "dangling backslash")),
        }
    }
    Ok(out)
}

/// Escape a description for storage in a sidecar.
pub fn escape_description(raw: &str) -> String {
    escape_bytes(raw.as_bytes())
}

/// Recover the original description text from its stored form.
pub fn unescape_description(escaped: &str) -> Result<String, ParseError> {
    let bytes = unescape_bytes(escaped)?;
    String::from_utf8(bytes).map_err(|e| {
        escape_err(e.utf8_error().valid_up_to(), "escaped bytes are not valid UTF-8")
    })
}

fn hex_digit(nibble: u8) -> char {
    char::from(b"0123456789abcdef"[usize::from(nibble & 0x0f)])
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn escape_err(position: usize, reason: &str) -> ParseError {
    ParseError::Escape {
        position,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("plain text", "plain text")]
    #[case("back\\slash", "back\\\\slash")]
    #[case("nbsp\u{a0}here", "nbsp\\xc2\\xa0here")]
    #[case("line\nbreak", "line\\x0abreak")]
    #[case("", "")]
    fn escape_known_values(#[case] raw: &str, #[case] escaped: &str) {
        assert_eq!(escape_description(raw), escaped);
        assert_eq!(unescape_description(escaped).unwrap(), raw);
    }

    #[rstest]
    #[case("\\", "dangling backslash")]
    #[case("\\q", "unknown escape sequence")]
    #[case("\\x4", "expected two hex digits after \\x")]
    #[case("\\xzz", "expected two hex digits after \\x")]
    #[case("tab\there", "unescaped byte outside printable ASCII")]
    fn unescape_rejects_malformed(#[case] input: &str, #[case] reason: &str) {
        match unescape_bytes(input) {
            Err(ParseError::Escape { reason: got, .. }) => assert_eq!(got, reason),
            other => panic!("expected escape error, got {other:?}"),
        }
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        assert_eq!(unescape_bytes("\\xC2\\xA0").unwrap(), vec![0xc2, 0xa0]);
    }

    #[test]
    fn invalid_utf8_is_rejected_for_descriptions() {
        let err = unescape_description("ok\\xff").unwrap_err();
        assert!(matches!(err, ParseError::Escape { position: 2, .. }), "got {err:?}");
    }

    proptest! {
        #[test]
        fn prop_bytes_roundtrip(raw in proptest::collection::vec(any::<u8>(), 0..256)) {
            let escaped = escape_bytes(&raw);
            prop_assert_eq!(unescape_bytes(&escaped).unwrap(), raw);
        }

        #[test]
        fn prop_escaped_is_printable_ascii(raw in proptest::collection::vec(any::<u8>(), 0..256)) {
            let escaped = escape_bytes(&raw);
            prop_assert!(escaped.bytes().all(|b| (0x20..=0x7e).contains(&b)));
        }

        #[test]
        fn prop_double_escape_needs_double_decode(raw in "\\PC*") {
            let once = escape_description(&raw);
            prop_assert_eq!(unescape_description(&once).unwrap(), raw.clone());
            let twice = escape_description(&once);
            prop_assert_eq!(unescape_description(&twice).unwrap(), once);
        }

        #[test]
        fn prop_safe_ascii_is_identity(raw in "[ -\\[\\]-~]*") {
            prop_assert_eq!(escape_description(&raw), raw);
        }
    }
}
