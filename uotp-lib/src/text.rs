//! Fixed-width ASCII fields and legacy (EUC-KR) text.
//!
//! Every numeric field on the wire is a fixed-width decimal string, and the
//! server sends non-ASCII text (history entries, help, error messages) in
//! EUC-KR rather than UTF-8.

use crate::error::UotpError;
use encoding_rs::EUC_KR;
use std::ops::Range;
use std::str::FromStr;

/// Decode legacy-encoded bytes. Malformed sequences become U+FFFD.
pub fn decode_legacy(data: &[u8]) -> String {
    let (text, _had_errors) = EUC_KR.decode_without_bom_handling(data);
    text.into_owned()
}

/// Encode text into the legacy encoding.
pub fn encode_legacy(text: &str) -> Vec<u8> {
    let (bytes, _, _) = EUC_KR.encode(text);
    bytes.into_owned()
}

/// Borrow `range` of `data` as ASCII text.
pub(crate) fn ascii_field<'a>(data: &'a [u8], range: Range<usize>, name: &str) -> Result<&'a str, UotpError> {
    let raw = data
        .get(range.clone())
        .ok_or_else(|| UotpError::InvalidPacket(format!("{name} field out of bounds ({range:?})")))?;
    std::str::from_utf8(raw).map_err(|_| UotpError::InvalidPacket(format!("{name} field is not ASCII")))
}

/// Parse a fixed-width decimal field.
pub(crate) fn decimal_field<T: FromStr>(data: &[u8], range: Range<usize>, name: &str) -> Result<T, UotpError> {
    let text = ascii_field(data, range, name)?;
    text.parse()
        .map_err(|_| UotpError::InvalidPacket(format!("{name} field is not a number: {text:?}")))
}

/// Write `text` left-justified in a field of `width` bytes, space-padded.
///
/// Longer input is written untruncated, matching `%-Ns` formatting.
pub(crate) fn push_left(out: &mut Vec<u8>, text: &[u8], width: usize) {
    out.extend_from_slice(text);
    out.resize(out.len() + width.saturating_sub(text.len()), b' ');
}

/// Write `text` right-justified in a field of `width` bytes, space-padded.
pub(crate) fn push_right(out: &mut Vec<u8>, text: &[u8], width: usize) {
    out.resize(out.len() + width.saturating_sub(text.len()), b' ');
    out.extend_from_slice(text);
}

/// Split `text` into groups of `each` characters joined by `separator`.
///
/// With `max_groups` set, grouping stops once that many groups exist and the
/// remainder stays in the last group.
pub fn group_chars(text: &str, separator: &str, each: usize, max_groups: Option<usize>) -> String {
    if each == 0 {
        return text.to_string();
    }
    let total = text.chars().count();
    let max_groups = max_groups.unwrap_or_else(|| total.div_ceil(each));

    let mut out = String::with_capacity(text.len() + separator.len() * max_groups);
    let mut in_group = 0;
    let mut groups = 1;
    for c in text.chars() {
        out.push(c);
        in_group += 1;
        if groups < max_groups && in_group == each {
            out.push_str(separator);
            in_group = 0;
            groups += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_text_roundtrip() {
        let encoded = encode_legacy("로그인");
        assert_eq!(encoded.len(), 6, "three hangul syllables take two bytes each");
        assert_eq!(decode_legacy(&encoded), "로그인");
        assert_eq!(decode_legacy(b"plain ascii"), "plain ascii");
    }

    #[test]
    fn test_group_serial_number() {
        assert_eq!(group_chars("1234567890123456", "-", 4, None), "1234-5678-9012-3456");
        assert_eq!(group_chars("123456", "-", 4, None), "1234-56");
    }

    #[test]
    fn test_group_token_two_groups() {
        assert_eq!(group_chars("1234567", "-", 3, Some(2)), "123-4567");
        assert_eq!(group_chars("12", "-", 3, Some(2)), "12");
    }

    #[test]
    fn test_fixed_fields() {
        let mut out = Vec::new();
        push_left(&mut out, b"KTF", 5);
        push_right(&mut out, b"42", 4);
        assert_eq!(out, b"KTF    42");

        assert_eq!(decimal_field::<u64>(b"00012345678", 0..11, "oid").unwrap(), 12345678);
        assert!(decimal_field::<u64>(b"12 45", 0..5, "oid").unwrap_err().is_framing());
        assert!(ascii_field(b"abc", 0..4, "short").unwrap_err().is_framing());
    }
}
