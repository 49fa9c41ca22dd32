//! Byte/text conversion used for window boundary arithmetic.
//!
//! A [`Codec`] turns raw file bytes into text and measures how many bytes a
//! piece of text occupies once encoded back. [`Codec::decode`] is exact: a
//! byte that does not decode is kept as a raw-byte character (U+10FF00 plus
//! the byte) that encodes back to that single byte, so `encode(decode(b))`
//! is `b` for any input. A well-formed character that itself falls in the
//! raw-byte range is kept as raw bytes too.
//!
//! [`Codec::decode_lossy`] replaces undecodable sequences with U+FFFD. The
//! boundary adjuster uses it to notice a sample that starts inside a
//! character, by comparing the sample's byte span with its re-encoded length.
//!
//! Only ASCII-compatible, stateless encodings are accepted: line terminators
//! must be the single bytes `0x0A`/`0x0D`, and encoded length must be additive
//! per character.

use std::borrow::Cow;

use encoding_rs::DecoderResult;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown encoding label: {0}")]
    UnknownLabel(String),
    #[error("encoding {0} is not ASCII-compatible")]
    NotAsciiCompatible(&'static str),
}

const RAW_BYTE_BASE: u32 = 0x10_FF00;

/// The character standing for an undecodable `byte`.
pub fn raw_byte_char(byte: u8) -> char {
    char::from_u32(RAW_BYTE_BASE + u32::from(byte)).unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// The byte a raw-byte character stands for.
pub fn raw_byte(c: char) -> Option<u8> {
    u32::from(c)
        .checked_sub(RAW_BYTE_BASE)
        .and_then(|b| u8::try_from(b).ok())
}

/// Number of raw-byte characters in `text`.
///
/// They are the only characters whose UTF-8 form starts `F4 8F BC..=BF`.
fn raw_count(text: &str) -> usize {
    let bytes = text.as_bytes();
    memchr::memchr_iter(0xF4, bytes)
        .filter(|&i| bytes.get(i + 1) == Some(&0x8F) && bytes.get(i + 2).is_some_and(|&b| b >= 0xBC))
        .count()
}

/// `text` with raw-byte characters shown as U+FFFD.
pub fn for_display(text: &str) -> Cow<'_, str> {
    if raw_count(text) == 0 {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|c| if raw_byte(c).is_some() { char::REPLACEMENT_CHARACTER } else { c })
            .collect(),
    )
}

/// Append well-formed `valid` text, turning any character in the raw-byte
/// range into the raw bytes `bytes_of` gives for it.
fn push_checked(out: &mut String, valid: &str, bytes_of: impl Fn(char) -> Vec<u8>) {
    if raw_count(valid) == 0 {
        out.push_str(valid);
        return;
    }
    for c in valid.chars() {
        if raw_byte(c).is_some() {
            out.extend(bytes_of(c).into_iter().map(raw_byte_char));
        } else {
            out.push(c);
        }
    }
}

fn floor_by_chars<C: Codec + ?Sized>(codec: &C, text: &str, bytes: usize) -> (usize, usize) {
    let mut encoded = 0;
    for (idx, c) in text.char_indices() {
        let len = codec.char_len(c);
        if encoded + len > bytes {
            return (idx, encoded);
        }
        encoded += len;
    }
    (text.len(), encoded)
}

fn ceil_by_chars<C: Codec + ?Sized>(codec: &C, text: &str, bytes: usize) -> (usize, usize) {
    let mut encoded = 0;
    for (idx, c) in text.char_indices() {
        if encoded >= bytes {
            return (idx, encoded);
        }
        encoded += codec.char_len(c);
    }
    (text.len(), encoded)
}

pub trait Codec {
    fn name(&self) -> &'static str;

    /// Decode `bytes` exactly; undecodable bytes become raw-byte characters.
    fn decode(&self, bytes: &[u8]) -> String;

    /// Decode `bytes`, replacing undecodable sequences with U+FFFD.
    fn decode_lossy(&self, bytes: &[u8]) -> String;

    /// Encode `text`; raw-byte characters become their byte.
    fn encode(&self, text: &str) -> Vec<u8>;

    /// Number of bytes `text` occupies once encoded.
    fn encoded_len(&self, text: &str) -> usize {
        self.encode(text).len()
    }

    fn char_len(&self, c: char) -> usize {
        let mut buf = [0u8; 4];
        self.encoded_len(c.encode_utf8(&mut buf))
    }

    /// Largest char boundary whose encoded prefix does not exceed `bytes`.
    /// Returns `(text_offset, encoded_prefix_len)`.
    fn floor_boundary(&self, text: &str, bytes: usize) -> (usize, usize) {
        floor_by_chars(self, text, bytes)
    }

    /// Smallest char boundary whose encoded prefix is at least `bytes`
    /// (or the end of `text` when it is shorter).
    fn ceil_boundary(&self, text: &str, bytes: usize) -> (usize, usize) {
        ceil_by_chars(self, text, bytes)
    }
}

/// UTF-8: text is stored as-is, so outside raw bytes the encoded length is
/// the string length.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Codec;

impl Codec for Utf8Codec {
    fn name(&self) -> &'static str {
        "UTF-8"
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let mut text = String::with_capacity(bytes.len());
        for chunk in bytes.utf8_chunks() {
            push_checked(&mut text, chunk.valid(), |c| c.to_string().into_bytes());
            text.extend(chunk.invalid().iter().copied().map(raw_byte_char));
        }
        text
    }

    fn decode_lossy(&self, bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    fn encode(&self, text: &str) -> Vec<u8> {
        if raw_count(text) == 0 {
            return text.as_bytes().to_vec();
        }
        let mut out = Vec::with_capacity(text.len());
        let mut buf = [0u8; 4];
        for c in text.chars() {
            match raw_byte(c) {
                Some(b) => out.push(b),
                None => out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes()),
            }
        }
        out
    }

    fn encoded_len(&self, text: &str) -> usize {
        text.len() - 3 * raw_count(text)
    }

    fn char_len(&self, c: char) -> usize {
        if raw_byte(c).is_some() { 1 } else { c.len_utf8() }
    }

    fn floor_boundary(&self, text: &str, bytes: usize) -> (usize, usize) {
        if raw_count(text) > 0 {
            return floor_by_chars(self, text, bytes);
        }
        let mut idx = bytes.min(text.len());
        while !text.is_char_boundary(idx) {
            idx -= 1;
        }
        (idx, idx)
    }

    fn ceil_boundary(&self, text: &str, bytes: usize) -> (usize, usize) {
        if raw_count(text) > 0 {
            return ceil_by_chars(self, text, bytes);
        }
        let mut idx = bytes.min(text.len());
        while !text.is_char_boundary(idx) {
            idx += 1;
        }
        (idx, idx)
    }
}

/// Any ASCII-compatible encoding known to `encoding_rs` (Latin-1, Shift-JIS, GBK, ...).
#[derive(Debug, Clone, Copy)]
pub struct EncodingCodec {
    encoding: &'static encoding_rs::Encoding,
}

impl EncodingCodec {
    pub fn new(encoding: &'static encoding_rs::Encoding) -> Result<Self, CodecError> {
        if !encoding.is_ascii_compatible() {
            return Err(CodecError::NotAsciiCompatible(encoding.name()));
        }
        Ok(Self { encoding })
    }

    pub fn for_label(label: &str) -> Result<Self, CodecError> {
        let encoding = encoding_rs::Encoding::for_label(label.as_bytes())
            .ok_or_else(|| CodecError::UnknownLabel(label.to_string()))?;
        Self::new(encoding)
    }

    fn encode_char(&self, c: char) -> Vec<u8> {
        let mut buf = [0u8; 4];
        self.encoding.encode(c.encode_utf8(&mut buf)).0.into_owned()
    }
}

impl Codec for EncodingCodec {
    fn name(&self) -> &'static str {
        self.encoding.name()
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let mut decoder = self.encoding.new_decoder_without_bom_handling();
        let mut text = String::with_capacity(bytes.len());
        let mut run = String::new();
        let mut pos = 0;
        loop {
            let rest = bytes.len() - pos;
            run.reserve(
                decoder
                    .max_utf8_buffer_length_without_replacement(rest)
                    .unwrap_or(rest * 3 + 16),
            );
            let (result, read) = decoder.decode_to_string_without_replacement(&bytes[pos..], &mut run, true);
            pos += read;
            push_checked(&mut text, &run, |c| self.encode_char(c));
            run.clear();
            match result {
                DecoderResult::InputEmpty => break,
                DecoderResult::OutputFull => {}
                DecoderResult::Malformed(bad, after) => {
                    let end = pos.saturating_sub(usize::from(after));
                    let start = end.saturating_sub(usize::from(bad));
                    text.extend(bytes[start..end].iter().copied().map(raw_byte_char));
                }
            }
        }
        text
    }

    fn decode_lossy(&self, bytes: &[u8]) -> String {
        let (text, _had_errors) = self.encoding.decode_without_bom_handling(bytes);
        text.into_owned()
    }

    fn encode(&self, text: &str) -> Vec<u8> {
        if raw_count(text) == 0 {
            return self.encoding.encode(text).0.into_owned();
        }
        let mut out = Vec::with_capacity(text.len());
        let mut run_start = 0;
        for (idx, c) in text.char_indices() {
            if let Some(b) = raw_byte(c) {
                out.extend_from_slice(&self.encoding.encode(&text[run_start..idx]).0);
                out.push(b);
                run_start = idx + c.len_utf8();
            }
        }
        out.extend_from_slice(&self.encoding.encode(&text[run_start..]).0);
        out
    }
}

/// Resolve a codec from a label; `utf-8`/`utf8` map to the fast [`Utf8Codec`].
pub fn codec_for_label(label: &str) -> Result<Box<dyn Codec>, CodecError> {
    match label.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Ok(Box::new(Utf8Codec)),
        _ => Ok(Box::new(EncodingCodec::for_label(label)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lossy_decode_of_split_sequence_changes_length() {
        let text = "hé€😀";
        let bytes = text.as_bytes();
        // Start inside the 3-byte euro sign.
        let decoded = Utf8Codec.decode_lossy(&bytes[4..]);
        assert!(decoded.starts_with('\u{FFFD}'));
        assert_ne!(Utf8Codec.encoded_len(&decoded), bytes.len() - 4);
    }

    #[test]
    fn invalid_utf8_survives_decoding() {
        let bytes = b"ab\x80cd\xE2\x82\xFFz\xF4\x8F\xBF\x80";
        let text = Utf8Codec.decode(bytes);
        assert!(text.starts_with("ab") && text.contains("cd"));
        assert_eq!(text.chars().filter(|&c| raw_byte(c).is_some()).count(), 8);
        assert_eq!(Utf8Codec.encoded_len(&text), bytes.len());
        assert_eq!(Utf8Codec.encode(&text), bytes);
        assert_eq!(for_display(&text).matches('\u{FFFD}').count(), 8);
        // Each raw byte is one encoded byte wide.
        assert_eq!(Utf8Codec.floor_boundary(&text, 3), (6, 3));
        assert_eq!(Utf8Codec.ceil_boundary(&text, 3), (6, 3));
    }

    #[test]
    fn utf8_boundaries_snap_to_char_edges() {
        let text = "aé€b"; // a(1) é(2) €(3) b(1)
        assert_eq!(Utf8Codec.floor_boundary(text, 2), (1, 1));
        assert_eq!(Utf8Codec.ceil_boundary(text, 2), (3, 3));
        assert_eq!(Utf8Codec.floor_boundary(text, 3), (3, 3));
        assert_eq!(Utf8Codec.ceil_boundary(text, 99), (7, 7));
    }

    #[test]
    fn generic_boundaries_match_utf8_fast_path() {
        struct Slow;
        impl Codec for Slow {
            fn name(&self) -> &'static str {
                "slow"
            }
            fn decode(&self, bytes: &[u8]) -> String {
                Utf8Codec.decode(bytes)
            }
            fn decode_lossy(&self, bytes: &[u8]) -> String {
                Utf8Codec.decode_lossy(bytes)
            }
            fn encode(&self, text: &str) -> Vec<u8> {
                Utf8Codec.encode(text)
            }
        }
        for text in ["xé€😀y".to_string(), Utf8Codec.decode(b"x\xC3\xA9\x80\x80y")] {
            for b in 0..=text.len() + 2 {
                assert_eq!(Slow.floor_boundary(&text, b), Utf8Codec.floor_boundary(&text, b));
                assert_eq!(Slow.ceil_boundary(&text, b), Utf8Codec.ceil_boundary(&text, b));
            }
        }
    }

    #[test]
    fn legacy_encoding_measures_encoded_bytes() {
        let codec = EncodingCodec::for_label("shift_jis").unwrap();
        let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode("日本a");
        assert_eq!(codec.decode(&bytes), "日本a");
        assert_eq!(codec.encoded_len("日本a"), 5);
        assert_eq!(codec.char_len('日'), 2);
    }

    #[test]
    fn legacy_encoding_keeps_malformed_bytes() {
        let codec = EncodingCodec::for_label("shift_jis").unwrap();
        let mut bytes = encoding_rs::SHIFT_JIS.encode("日本").0.into_owned();
        bytes.insert(2, 0xA0);
        bytes.push(0x81);
        let text = codec.decode(&bytes);
        assert_eq!(codec.encode(&text), bytes);
        assert_eq!(codec.encoded_len(&text), bytes.len());
        assert!(text.starts_with('日'));
        assert!(codec.decode_lossy(&bytes).contains('\u{FFFD}'));
    }

    #[test]
    fn utf16_is_rejected() {
        assert_eq!(
            EncodingCodec::for_label("utf-16le").unwrap_err(),
            CodecError::NotAsciiCompatible("UTF-16LE")
        );
        assert!(matches!(
            codec_for_label("no-such-encoding"),
            Err(CodecError::UnknownLabel(_))
        ));
    }
}
