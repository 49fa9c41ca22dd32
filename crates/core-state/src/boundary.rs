//! Snapping requested byte ranges onto decodable text boundaries.
//!
//! A requested range may start or end in the middle of a multi-byte
//! character. The start is fixed by decoding a short sample from a little
//! before the candidate and checking that it re-encodes to the same number of
//! bytes; while it does not, the sample start retreats one byte at a time, at
//! most `probe_depth` times. The end is fixed by decoding a few bytes past the
//! candidate and cutting at the first character boundary at or after it.
//!
//! Both operations only report where the range landed. They never touch a
//! window; [`ChunkWindow`](crate::ChunkWindow) applies the result.

use core_file::FileHandle;
use core_text::Codec;
use tracing::{trace, warn};

/// Retreat steps tried before a start boundary is accepted best-effort.
pub const PROBE_DEPTH: u32 = 3;
/// Accepted excess of re-encoded bytes over the sampled span, exclusive.
pub const DISCREPANCY_TOLERANCE: u64 = 3;
/// Bytes decoded when probing a start boundary.
pub const SAMPLE_SIZE: u64 = 24;
/// Bytes read past a requested end to find the next character boundary.
pub const END_EXTRA: u64 = 4;
/// Distance the first probe starts before the candidate start.
pub const START_BACKOFF: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryAdjuster {
    pub probe_depth: u32,
    pub tolerance: u64,
    pub sample_size: u64,
    pub end_extra: u64,
    pub start_backoff: u64,
}

impl Default for BoundaryAdjuster {
    fn default() -> Self {
        Self {
            probe_depth: PROBE_DEPTH,
            tolerance: DISCREPANCY_TOLERANCE,
            sample_size: SAMPLE_SIZE,
            end_extra: END_EXTRA,
            start_backoff: START_BACKOFF,
        }
    }
}

/// Result of snapping a start offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartAdjustment {
    /// Adjusted start, never after the candidate.
    pub start: u64,
    /// `false` when no probe re-encoded cleanly and the last one was kept.
    pub stable: bool,
    /// Retreat steps taken.
    pub probes: u32,
}

/// Where decoded text should be cut to end on a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndCut {
    /// Length of the kept text in UTF-8 bytes.
    pub text_len: usize,
    /// Absolute file offset of the cut.
    pub end: u64,
}

/// Decoded text for an adjusted byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    pub start: u64,
    pub end: u64,
    pub text: String,
    pub stable: bool,
}

impl BoundaryAdjuster {
    /// Find a start at or before `candidate` where decoding is stable.
    ///
    /// `safe_end` bounds how far a sample may extend. `end_fixed` means the
    /// range end will not be adjusted afterwards, so a sample reaching
    /// `safe_end` must re-encode exactly. So must a sample whose text does not
    /// end in a replacement character: the tolerance only absorbs a character
    /// split by the sample end.
    pub fn adjust_start(
        &self,
        file: &FileHandle,
        codec: &dyn Codec,
        candidate: u64,
        safe_end: u64,
        end_fixed: bool,
    ) -> std::io::Result<StartAdjustment> {
        let size = file.size();
        let safe_end = safe_end.min(size).max(candidate);
        let mut safe_start = candidate.saturating_sub(self.start_backoff);
        let sample_end = safe_end.min(
            safe_start + self.sample_size.max(candidate - safe_start + self.end_extra),
        );
        let mut probes = 0;
        let mut stable = true;
        let bytes = loop {
            let (bytes, text, span) = self.sample(file, codec, safe_start, sample_end, safe_end)?;
            if safe_start == 0 {
                break bytes;
            }
            let encoded = codec.encoded_len(&text) as u64;
            let strict = safe_start + span == size
                || (end_fixed && safe_start + span == safe_end)
                || !text.ends_with('\u{FFFD}');
            let accepted = if strict {
                encoded == span
            } else {
                encoded >= span && encoded - span < self.tolerance
            };
            if accepted {
                break bytes;
            }
            if probes == self.probe_depth {
                stable = false;
                break bytes;
            }
            trace!(target: "window.boundary", safe_start, span, encoded, strict, "start_probe_rejected");
            probes += 1;
            safe_start -= 1;
        };
        let text = codec.decode(&bytes);
        let (_, skipped) = codec.floor_boundary(&text, (candidate - safe_start) as usize);
        Ok(StartAdjustment {
            start: safe_start + skipped as u64,
            stable,
            probes,
        })
    }

    /// Lossily decode `[start, end)`, extending the end one byte at a time
    /// (up to `end_extra` bytes, never past `limit`) while the text ends in a
    /// replacement character. Returns the bytes read, the text and its byte
    /// span.
    fn sample(
        &self,
        file: &FileHandle,
        codec: &dyn Codec,
        start: u64,
        end: u64,
        limit: u64,
    ) -> std::io::Result<(Vec<u8>, String, u64)> {
        let bytes = file.read(start, (end + self.end_extra).min(limit).max(end))?;
        let base = ((end - start) as usize).min(bytes.len());
        let mut text = codec.decode_lossy(&bytes[..base]);
        let mut span = base;
        while text.ends_with('\u{FFFD}') && span < bytes.len() {
            span += 1;
            text = codec.decode_lossy(&bytes[..span]);
        }
        if text.ends_with('\u{FFFD}') {
            span = base;
            text = codec.decode_lossy(&bytes[..base]);
        }
        Ok((bytes, text, span as u64))
    }

    /// Cut `text` (decoded from `text_start`) at the first character
    /// boundary whose encoded offset reaches `border`.
    ///
    /// The cut is located by walking from whichever end of the text is
    /// closer to the border; both walks pick the same point.
    pub fn cut_end(&self, codec: &dyn Codec, text: &str, text_start: u64, border: u64) -> EndCut {
        let want = border.saturating_sub(text_start) as usize;
        let total = codec.encoded_len(text);
        if want >= total {
            return EndCut {
                text_len: text.len(),
                end: text_start + total as u64,
            };
        }
        let tail = total - want;
        let (text_len, encoded) = if want <= tail {
            codec.ceil_boundary(text, want)
        } else {
            let mut suffix = 0;
            let mut cut = text.len();
            for (idx, c) in text.char_indices().rev() {
                let len = codec.char_len(c);
                if suffix + len > tail {
                    break;
                }
                suffix += len;
                cut = idx;
            }
            (cut, total - suffix)
        };
        trace!(target: "window.boundary", border, from_start = want <= tail, text_len, "end_cut");
        EndCut {
            text_len,
            end: text_start + encoded as u64,
        }
    }

    /// Decode `[start, end)` with the requested edges snapped.
    ///
    /// The start is only adjusted when it is not already the file start, and
    /// the end only when it is before the file end. An unstable start is
    /// logged and used as-is.
    pub fn load(
        &self,
        file: &FileHandle,
        codec: &dyn Codec,
        start: u64,
        end: u64,
        adjust_start: bool,
        adjust_end: bool,
    ) -> std::io::Result<Loaded> {
        let size = file.size();
        let end = end.min(size);
        let adjust_start = adjust_start && start > 0;
        let adjust_end = adjust_end && end < size;
        let mut stable = true;
        let start = if adjust_start {
            let adj = self.adjust_start(file, codec, start, end, !adjust_end)?;
            if !adj.stable {
                warn!(target: "window.boundary", requested = start, start = adj.start, probes = adj.probes, "decode_instability");
            }
            stable = adj.stable;
            adj.start
        } else {
            start
        };
        let read_end = if adjust_end {
            (end + self.end_extra).min(size)
        } else {
            end
        };
        let bytes = file.read(start, read_end)?;
        let mut text = codec.decode(&bytes);
        let loaded_end = if adjust_end {
            let cut = self.cut_end(codec, &text, start, end);
            text.truncate(cut.text_len);
            cut.end
        } else {
            start + bytes.len() as u64
        };
        Ok(Loaded {
            start,
            end: loaded_end,
            text,
            stable,
        })
    }
}
