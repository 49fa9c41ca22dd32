//! Where edited window text sits relative to the file bytes it replaced.
//!
//! Text outside every [`Edit`] is exactly the file bytes at its position,
//! so walking the map from the window start converts a text offset to a file
//! offset. An edit stands for `replaced` file bytes whatever its text is.

use std::ops::Range;

/// One edited stretch of window text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    /// Text offsets of the stretch.
    pub text: Range<usize>,
    /// File bytes the stretch stands for.
    pub replaced: u64,
}

/// File offsets a text offset maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Before any file bytes an edit at this offset removed.
    pub before: u64,
    /// After them.
    pub after: u64,
    /// Strictly inside an edit's text, where `before..after` is the edit's
    /// whole file span.
    pub inside: bool,
}

/// Edits in text order. No two edits touch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditMap {
    edits: Vec<Edit>,
}

impl EditMap {
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn clear(&mut self) {
        self.edits.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Edit> {
        self.edits.iter()
    }

    /// `len` bytes of new text went in at `pos`. An edit touching `pos`
    /// absorbs them.
    pub fn inserted(&mut self, pos: usize, len: usize) {
        if len == 0 {
            return;
        }
        let mut merged = Edit {
            text: pos..pos + len,
            replaced: 0,
        };
        self.edits.retain_mut(|e| {
            if e.text.end < pos {
                true
            } else if e.text.start > pos {
                e.text.start += len;
                e.text.end += len;
                true
            } else {
                merged.text.start = merged.text.start.min(e.text.start);
                merged.text.end = merged.text.end.max(e.text.end + len);
                merged.replaced += e.replaced;
                false
            }
        });
        self.place(merged);
    }

    /// The text in `range` was deleted. `unedited` is the encoded length of
    /// the parts of it that were still file bytes (see [`EditMap::unedited`]).
    pub fn deleted(&mut self, range: Range<usize>, unedited: u64) {
        let len = range.end - range.start;
        let mut merged = Edit {
            text: range.start..range.start,
            replaced: unedited,
        };
        self.edits.retain_mut(|e| {
            if e.text.end < range.start {
                true
            } else if e.text.start > range.end {
                e.text.start -= len;
                e.text.end -= len;
                true
            } else {
                let end = if e.text.end > range.end {
                    e.text.end - len
                } else {
                    range.start
                };
                merged.text.start = merged.text.start.min(e.text.start);
                merged.text.end = merged.text.end.max(end);
                merged.replaced += e.replaced;
                false
            }
        });
        if merged.replaced > 0 || !merged.text.is_empty() {
            self.place(merged);
        }
    }

    /// Parts of `range` outside every edit.
    pub fn unedited(&self, range: Range<usize>) -> Vec<Range<usize>> {
        let mut parts = Vec::new();
        let mut at = range.start;
        for e in &self.edits {
            if e.text.end <= at || e.text.is_empty() {
                continue;
            }
            if e.text.start >= range.end {
                break;
            }
            if e.text.start > at {
                parts.push(at..e.text.start);
            }
            at = at.max(e.text.end);
        }
        if at < range.end {
            parts.push(at..range.end);
        }
        parts
    }

    /// `len` bytes of file text were put in front of the window text.
    pub fn prepended(&mut self, len: usize) {
        for e in &mut self.edits {
            e.text.start += len;
            e.text.end += len;
        }
    }

    /// The text from `cut` on was dropped. An edit cut in two keeps its
    /// whole file span.
    pub fn truncate(&mut self, cut: usize) {
        self.edits.retain_mut(|e| {
            e.text.end = e.text.end.min(cut);
            e.text.start < cut
        });
    }

    /// The text before `cut` was dropped. An edit cut in two keeps its
    /// whole file span.
    pub fn drop_front(&mut self, cut: usize) {
        self.edits.retain_mut(|e| {
            e.text.start = e.text.start.saturating_sub(cut);
            e.text.end = e.text.end.saturating_sub(cut);
            e.text.end > 0
        });
    }

    /// File offsets of text offset `pos` in a window starting at file offset
    /// `start`. `measure` is the encoded length of a stretch of unedited text.
    pub fn locate(&self, pos: usize, start: u64, measure: impl Fn(Range<usize>) -> u64) -> Location {
        let mut disk = start;
        let mut at = 0;
        for e in &self.edits {
            if pos <= e.text.start {
                let before = disk + measure(at..pos);
                let after = if pos == e.text.start && e.text.is_empty() {
                    before + e.replaced
                } else {
                    before
                };
                return Location {
                    before,
                    after,
                    inside: false,
                };
            }
            disk += measure(at..e.text.start);
            if pos < e.text.end {
                return Location {
                    before: disk,
                    after: disk + e.replaced,
                    inside: true,
                };
            }
            disk += e.replaced;
            at = e.text.end;
        }
        let at_pos = disk + measure(at..pos);
        Location {
            before: at_pos,
            after: at_pos,
            inside: false,
        }
    }

    fn place(&mut self, edit: Edit) {
        let idx = self.edits.partition_point(|e| e.text.start < edit.text.start);
        self.edits.insert(idx, edit);
    }
}
