use core_text::TextBuffer;
use tracing::trace;

/// Maximum number of entries retained in the undo log.
pub const UNDO_HISTORY_MAX: usize = 10_000;

/// One recorded change. Positions are UTF-8 byte offsets relative to the
/// window start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoEntry {
    /// Separates undo groups; carries no position.
    Boundary,
    /// Cursor position before a group of edits.
    CursorPosition(usize),
    /// Text was inserted over `[start, end)`.
    Insertion { start: usize, end: usize },
    /// `text` was deleted at `pos`.
    Deletion { text: String, pos: usize },
    /// A text property changed over `[start, end)`; `value` is the previous value.
    PropertyChange {
        property: String,
        value: String,
        start: usize,
        end: usize,
    },
    /// Marker `marker` was relocated away from `pos`.
    MarkerRelocation { marker: u32, pos: usize },
}

fn translate(pos: usize, delta: i64, floor: usize) -> Option<usize> {
    let moved = pos as i64 + delta;
    (moved >= floor as i64).then_some(moved as usize)
}

impl UndoEntry {
    /// Highest position referenced by the entry.
    pub fn max_position(&self) -> Option<usize> {
        match self {
            Self::Boundary => None,
            Self::CursorPosition(pos) | Self::MarkerRelocation { pos, .. } => Some(*pos),
            Self::Insertion { end, .. } | Self::PropertyChange { end, .. } => Some(*end),
            Self::Deletion { pos, .. } => Some(*pos),
        }
    }

    /// Translate every position by `delta`. `None` when the lowest position
    /// would land below `floor`.
    pub fn translated(&self, delta: i64, floor: usize) -> Option<Self> {
        Some(match self {
            Self::Boundary => Self::Boundary,
            Self::CursorPosition(pos) => Self::CursorPosition(translate(*pos, delta, floor)?),
            Self::Insertion { start, end } => Self::Insertion {
                start: translate(*start, delta, floor)?,
                end: translate(*end, delta, floor)?,
            },
            Self::Deletion { text, pos } => Self::Deletion {
                text: text.clone(),
                pos: translate(*pos, delta, floor)?,
            },
            Self::PropertyChange {
                property,
                value,
                start,
                end,
            } => Self::PropertyChange {
                property: property.clone(),
                value: value.clone(),
                start: translate(*start, delta, floor)?,
                end: translate(*end, delta, floor)?,
            },
            Self::MarkerRelocation { marker, pos } => Self::MarkerRelocation {
                marker: *marker,
                pos: translate(*pos, delta, floor)?,
            },
        })
    }

    /// Undo the entry's text effect. Returns a cursor position to restore, if any.
    pub fn revert(&self, buffer: &mut dyn TextBuffer) -> Option<usize> {
        match self {
            Self::Insertion { start, end } => {
                buffer.delete(*start..*end);
                Some(*start)
            }
            Self::Deletion { text, pos } => {
                buffer.insert(*pos, text);
                Some(*pos + text.len())
            }
            Self::CursorPosition(pos) => Some(*pos),
            Self::Boundary | Self::PropertyChange { .. } | Self::MarkerRelocation { .. } => None,
        }
    }
}

/// Project an undo log (oldest first) onto a window whose start moved by
/// `delta` text bytes.
///
/// Walks from the most recent entry to the oldest. The first entry that
/// would fall below `floor` ends the walk: it and everything older is
/// dropped, since the bytes it refers to have left the window.
pub fn shift(log: &[UndoEntry], delta: i64, floor: usize) -> Vec<UndoEntry> {
    let mut kept = Vec::with_capacity(log.len());
    for entry in log.iter().rev() {
        match entry.translated(delta, floor) {
            Some(moved) => kept.push(moved),
            None => break,
        }
    }
    kept.reverse();
    kept
}

/// Same walk as [`shift`], stopping at the first entry referencing a
/// position beyond `ceiling` (after the window's tail was cut).
pub fn clip(log: &[UndoEntry], ceiling: usize) -> Vec<UndoEntry> {
    let keep = log
        .iter()
        .rev()
        .take_while(|entry| entry.max_position().is_none_or(|pos| pos <= ceiling))
        .count();
    log[log.len() - keep..].to_vec()
}

/// Ordered edit log for the window (oldest first).
#[derive(Debug, Clone, Default)]
pub struct UndoLog {
    entries: Vec<UndoEntry>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[UndoEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        trace!(target: "state.undo", "undo_log_cleared");
    }

    pub fn push(&mut self, entry: UndoEntry) {
        self.entries.push(entry);
        if self.entries.len() > UNDO_HISTORY_MAX {
            let _ = self.entries.remove(0);
            trace!(target: "state.undo", "undo_log_trimmed");
        }
    }

    /// Close the current group (no-op when already closed).
    pub fn boundary(&mut self) {
        if !matches!(self.entries.last(), None | Some(UndoEntry::Boundary)) {
            self.push(UndoEntry::Boundary);
        }
    }

    /// Pop the most recent group, most recent entry first.
    pub fn pop_group(&mut self) -> Vec<UndoEntry> {
        while matches!(self.entries.last(), Some(UndoEntry::Boundary)) {
            self.entries.pop();
        }
        let mut group = Vec::new();
        while let Some(entry) = self.entries.pop() {
            if entry == UndoEntry::Boundary {
                self.entries.push(entry);
                break;
            }
            group.push(entry);
        }
        group
    }

    pub fn shift(&mut self, delta: i64, floor: usize) {
        if delta == 0 || self.entries.is_empty() {
            return;
        }
        let before = self.entries.len();
        self.entries = shift(&self.entries, delta, floor);
        if self.entries.len() < before {
            trace!(target: "state.undo", delta, dropped = before - self.entries.len(), kept = self.entries.len(), "undo_shift_truncated");
        } else {
            trace!(target: "state.undo", delta, kept = self.entries.len(), "undo_shift");
        }
    }

    pub fn clip(&mut self, ceiling: usize) {
        let before = self.entries.len();
        self.entries = clip(&self.entries, ceiling);
        if self.entries.len() < before {
            trace!(target: "state.undo", ceiling, dropped = before - self.entries.len(), "undo_clip_truncated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_log() -> Vec<UndoEntry> {
        vec![
            UndoEntry::CursorPosition(2),
            UndoEntry::Insertion { start: 2, end: 5 },
            UndoEntry::Boundary,
            UndoEntry::Deletion {
                text: "xy".into(),
                pos: 40,
            },
            UndoEntry::PropertyChange {
                property: "face".into(),
                value: "match".into(),
                start: 30,
                end: 35,
            },
            UndoEntry::MarkerRelocation { marker: 1, pos: 50 },
        ]
    }

    #[test]
    fn positive_shift_moves_every_entry() {
        let shifted = shift(&sample_log(), 10, 0);
        assert_eq!(shifted.len(), 6);
        assert_eq!(shifted[1], UndoEntry::Insertion { start: 12, end: 15 });
        assert_eq!(shifted[5], UndoEntry::MarkerRelocation { marker: 1, pos: 60 });
    }

    #[test]
    fn negative_shift_drops_oldest_out_of_range_entries() {
        let shifted = shift(&sample_log(), -10, 0);
        // The insertion at 2..5 would go negative: it and the older cursor entry vanish.
        assert_eq!(
            shifted,
            vec![
                UndoEntry::Boundary,
                UndoEntry::Deletion {
                    text: "xy".into(),
                    pos: 30
                },
                UndoEntry::PropertyChange {
                    property: "face".into(),
                    value: "match".into(),
                    start: 20,
                    end: 25,
                },
                UndoEntry::MarkerRelocation { marker: 1, pos: 40 },
            ]
        );
    }

    #[test]
    fn truncation_keeps_recent_entries_contiguous() {
        // An old entry that would still be in range survives only if every newer one does.
        let log = vec![
            UndoEntry::Insertion { start: 90, end: 95 },
            UndoEntry::Insertion { start: 1, end: 2 },
            UndoEntry::Insertion { start: 70, end: 71 },
        ];
        let shifted = shift(&log, -5, 0);
        assert_eq!(shifted, vec![UndoEntry::Insertion { start: 65, end: 66 }]);
    }

    #[test]
    fn clip_drops_entries_past_new_end() {
        let clipped = clip(&sample_log(), 45);
        assert!(clipped.is_empty(), "most recent entry at 50 stops the walk");
        let clipped = clip(&sample_log()[..5], 45);
        assert_eq!(clipped.len(), 5);
    }

    #[test]
    fn pop_group_stops_at_boundary() {
        let mut log = UndoLog::new();
        for e in sample_log() {
            log.push(e);
        }
        log.boundary();
        let group = log.pop_group();
        assert_eq!(group.len(), 3);
        assert_eq!(group[0], UndoEntry::MarkerRelocation { marker: 1, pos: 50 });
        let group = log.pop_group();
        assert_eq!(group.len(), 2);
        assert!(log.is_empty());
    }

    #[test]
    fn revert_restores_text() {
        let mut text = String::from("hello world");
        let cursor = UndoEntry::Deletion {
            text: "big ".into(),
            pos: 6,
        }
        .revert(&mut text);
        assert_eq!(text, "hello big world");
        assert_eq!(cursor, Some(10));
        UndoEntry::Insertion { start: 0, end: 6 }.revert(&mut text);
        assert_eq!(text, "big world");
    }

    fn entry_strategy() -> impl Strategy<Value = UndoEntry> {
        prop_oneof![
            Just(UndoEntry::Boundary),
            (0usize..500).prop_map(UndoEntry::CursorPosition),
            (0usize..500, 0usize..20).prop_map(|(s, l)| UndoEntry::Insertion { start: s, end: s + l }),
            (0usize..500).prop_map(|p| UndoEntry::Deletion {
                text: "z".into(),
                pos: p
            }),
            (0u32..4, 0usize..500).prop_map(|(m, p)| UndoEntry::MarkerRelocation { marker: m, pos: p }),
        ]
    }

    proptest! {
        #[test]
        fn shift_then_unshift_is_identity_on_survivors(
            log in prop::collection::vec(entry_strategy(), 0..40),
            delta in -300i64..300,
        ) {
            let there = shift(&log, delta, 0);
            let back = shift(&there, -delta, 0);
            // Survivors form a suffix of the original log.
            prop_assert!(back.len() <= log.len());
            prop_assert_eq!(&back[..], &log[log.len() - back.len()..]);
            // Nothing dropped ever reappears.
            prop_assert!(back.len() <= there.len());
        }
    }
}
