//! Text storage for the materialized window plus the codec seam.
//!
//! The window's text lives behind [`TextBuffer`] so the chunk manager can be
//! driven against the rope-backed [`Buffer`] in production and a plain
//! `String` in tests. Offsets are UTF-8 byte offsets into the decoded text;
//! callers keep them on char boundaries.

use std::ops::Range;

use ropey::Rope;

pub mod codec;
pub use codec::{
    Codec, CodecError, EncodingCodec, Utf8Codec, codec_for_label, for_display, raw_byte,
    raw_byte_char,
};

/// Mutable text capability used by the window manager.
pub trait TextBuffer {
    /// Length of the decoded text in UTF-8 bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, pos: usize, text: &str);

    /// Delete `range` (clamped) and return the removed text.
    fn delete(&mut self, range: Range<usize>) -> String;

    fn slice(&self, range: Range<usize>) -> String;

    fn contents(&self) -> String {
        self.slice(0..self.len())
    }

    fn clear(&mut self) {
        let len = self.len();
        self.delete(0..len);
    }

    /// Encoded byte length of `range` under `codec`.
    fn encoded_len(&self, codec: &dyn Codec, range: Range<usize>) -> usize {
        codec.encoded_len(&self.slice(range))
    }
}

fn clamp_range(range: Range<usize>, len: usize) -> Option<Range<usize>> {
    let s = range.start.min(len);
    let e = range.end.min(len);
    (s < e).then_some(s..e)
}

/// A text buffer backed by a `ropey::Rope`.
#[derive(Clone)]
pub struct Buffer {
    rope: Rope,
    pub name: String,
}

impl Buffer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            rope: Rope::new(),
            name: name.into(),
        }
    }
}

impl TextBuffer for Buffer {
    fn len(&self) -> usize {
        self.rope.len_bytes()
    }

    fn insert(&mut self, pos: usize, text: &str) {
        let char_index = self.rope.byte_to_char(pos.min(self.rope.len_bytes()));
        self.rope.insert(char_index, text);
    }

    fn delete(&mut self, range: Range<usize>) -> String {
        let Some(range) = clamp_range(range, self.rope.len_bytes()) else {
            return String::new();
        };
        // Translate byte offsets to char indices (rope.remove expects char range)
        let start_char = self.rope.byte_to_char(range.start);
        let end_char = self.rope.byte_to_char(range.end);
        debug_assert_eq!(self.rope.char_to_byte(start_char), range.start);
        debug_assert_eq!(self.rope.char_to_byte(end_char), range.end);
        let removed = self.rope.slice(start_char..end_char).to_string();
        self.rope.remove(start_char..end_char);
        removed
    }

    fn slice(&self, range: Range<usize>) -> String {
        let Some(range) = clamp_range(range, self.rope.len_bytes()) else {
            return String::new();
        };
        self.rope.byte_slice(range).to_string()
    }

    fn clear(&mut self) {
        self.rope = Rope::new();
    }
}

/// Plain strings serve as the in-memory fake.
impl TextBuffer for String {
    fn len(&self) -> usize {
        str::len(self)
    }

    fn insert(&mut self, pos: usize, text: &str) {
        self.insert_str(pos.min(str::len(self)), text);
    }

    fn delete(&mut self, range: Range<usize>) -> String {
        match clamp_range(range, str::len(self)) {
            Some(range) => self.drain(range).collect(),
            None => String::new(),
        }
    }

    fn slice(&self, range: Range<usize>) -> String {
        match clamp_range(range, str::len(self)) {
            Some(range) => self[range].to_string(),
            None => String::new(),
        }
    }

    fn clear(&mut self) {
        String::clear(self);
    }
}
