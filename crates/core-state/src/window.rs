//! The materialized window over a file.
//!
//! [`ChunkWindow`] holds the decoded text of one byte range plus its edit
//! state. [`ChunkWindow::move_to`] is the only way the range changes:
//!
//! * an empty or out-of-file request collapses the window to `0` or `size`;
//! * a request that cannot reuse the current content (disjoint, exactly the
//!   current range while dirty, or the file changed on disk) reloads it;
//! * an overlapping request edits the content in place, trimming or
//!   materializing only the edge deltas, so edits inside the overlap survive.
//!
//! `start` and `end` are always file offsets. Requested offsets and the
//! cursor offset are measured over the edited text, which differs from the
//! file by the net length of the edits. The [`EditMap`] converts between the
//! two when an edge is trimmed.
//!
//! Discarding unsaved edits always goes through the caller's
//! [`ConfirmationPolicy`]. A refused confirmation leaves the window untouched.

use core_events::{ConfirmReason, ConfirmationPolicy};
use core_file::FileHandle;
use core_text::{Codec, TextBuffer};
use tracing::{debug, info};

use crate::boundary::{BoundaryAdjuster, Loaded};
use crate::edits::EditMap;
use crate::error::ViewError;
use crate::undo::{UndoEntry, UndoLog};

/// How far the materialized range deviates from the requested one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundaryAdjustment {
    /// Requested start minus materialized start.
    pub trimmed_from_start: u64,
    /// Materialized end minus requested end.
    pub appended_to_end: u64,
}

pub struct ChunkWindow {
    file: FileHandle,
    codec: Box<dyn Codec>,
    content: Box<dyn TextBuffer>,
    adjuster: BoundaryAdjuster,
    start: u64,
    end: u64,
    dirty: bool,
    edits: EditMap,
    undo: UndoLog,
    point: usize,
}

impl ChunkWindow {
    /// An empty window at offset 0. `content` is cleared.
    pub fn new(
        file: FileHandle,
        codec: Box<dyn Codec>,
        mut content: Box<dyn TextBuffer>,
        adjuster: BoundaryAdjuster,
    ) -> Self {
        content.clear();
        Self {
            file,
            codec,
            content,
            adjuster,
            start: 0,
            end: 0,
            dirty: false,
            edits: EditMap::default(),
            undo: UndoLog::new(),
            point: 0,
        }
    }

    pub fn name(&self) -> &str {
        self.file.name()
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    /// On-disk end of the materialized range.
    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn size(&self) -> u64 {
        self.file.size()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    pub fn adjuster(&self) -> &BoundaryAdjuster {
        &self.adjuster
    }

    pub fn file(&self) -> &FileHandle {
        &self.file
    }

    pub fn undo_log(&self) -> &UndoLog {
        &self.undo
    }

    pub fn edits(&self) -> &EditMap {
        &self.edits
    }

    pub fn text(&self) -> String {
        self.content.contents()
    }

    /// Decoded length in UTF-8 bytes.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// End of the window in edited coordinates: where the content would end
    /// on disk if it were written back now.
    pub fn edit_end(&self) -> u64 {
        if self.dirty {
            self.start + self.content.encoded_len(self.codec.as_ref(), 0..self.content.len()) as u64
        } else {
            self.end
        }
    }

    /// Cursor as a text offset into the window.
    pub fn point(&self) -> usize {
        self.point
    }

    /// Place the cursor, snapping back to a character boundary.
    pub fn set_point(&mut self, pos: usize) {
        let text = self.content.contents();
        let mut pos = pos.min(text.len());
        while !text.is_char_boundary(pos) {
            pos -= 1;
        }
        self.point = pos;
    }

    /// Cursor as an absolute byte offset.
    pub fn point_offset(&self) -> u64 {
        self.start + self.content.encoded_len(self.codec.as_ref(), 0..self.point) as u64
    }

    /// Place the cursor at an absolute byte offset, clamped to the window.
    pub fn set_point_offset(&mut self, offset: u64) {
        self.point = self.local_offset(offset);
    }

    /// Text offset of the character boundary at or before absolute `offset`.
    pub fn local_offset(&self, offset: u64) -> usize {
        if offset <= self.start {
            return 0;
        }
        let text = self.content.contents();
        self.codec.floor_boundary(&text, (offset - self.start) as usize).0
    }

    /// Absolute byte offset of text offset `local`.
    pub fn absolute_offset(&self, local: usize) -> u64 {
        self.start + self.content.encoded_len(self.codec.as_ref(), 0..local) as u64
    }

    /// Move the window to `[start, end)`, snapping the edges onto character
    /// boundaries. The cursor keeps its position in the text when it is still
    /// inside the window.
    pub fn move_to(
        &mut self,
        start: u64,
        end: u64,
        policy: &mut dyn ConfirmationPolicy,
    ) -> Result<BoundaryAdjustment, ViewError> {
        self.file.refresh()?;
        let size = self.file.size();
        if end <= start || start >= size {
            return self.collapse(start, end, size, policy);
        }
        let end = end.min(size);
        let point = self.point_offset();
        let edit_end = self.edit_end();
        let adjustment = if !self.file.visited_is_current() || edit_end < start || end < self.start {
            self.confirm(ConfirmReason::ReloadModified, policy)?;
            self.reload(start, end)?
        } else if start == self.start && end == edit_end {
            if !self.dirty {
                debug!(target: "window.move", start, end, "move_noop");
                return Ok(BoundaryAdjustment::default());
            }
            self.confirm(ConfirmReason::ReloadModified, policy)?;
            self.reload(start, end)?
        } else {
            if start > self.start || end < edit_end {
                self.confirm(ConfirmReason::TrimModified, policy)?;
            }
            return self.incremental(start, end, edit_end);
        };
        self.set_point_offset(point);
        Ok(adjustment)
    }

    fn confirm(
        &self,
        reason: ConfirmReason,
        policy: &mut dyn ConfirmationPolicy,
    ) -> Result<(), ViewError> {
        if !self.dirty || policy.confirm(reason) {
            return Ok(());
        }
        info!(target: "window.move", %reason, start = self.start, end = self.end, "move_refused");
        Err(ViewError::Conflict(reason))
    }

    fn collapse(
        &mut self,
        start: u64,
        end: u64,
        size: u64,
        policy: &mut dyn ConfirmationPolicy,
    ) -> Result<BoundaryAdjustment, ViewError> {
        self.confirm(ConfirmReason::CollapseModified, policy)?;
        let place = if size - start.min(size) < start { size } else { 0 };
        self.content.clear();
        self.edits.clear();
        self.undo.clear();
        self.dirty = false;
        self.start = place;
        self.end = place;
        self.point = 0;
        self.file.mark_visited();
        debug!(target: "window.move", start, end, place, "window_collapsed");
        Ok(BoundaryAdjustment {
            trimmed_from_start: start.abs_diff(place),
            appended_to_end: place.abs_diff(end),
        })
    }

    fn reload(&mut self, start: u64, end: u64) -> Result<BoundaryAdjustment, ViewError> {
        let loaded = self
            .adjuster
            .load(&self.file, self.codec.as_ref(), start, end, true, true)?;
        self.content.clear();
        self.content.insert(0, &loaded.text);
        self.edits.clear();
        self.undo.clear();
        self.dirty = false;
        self.start = loaded.start;
        self.end = loaded.end;
        self.point = 0;
        self.file.mark_visited();
        debug!(target: "window.move", start = loaded.start, end = loaded.end, "full_reload");
        Ok(BoundaryAdjustment {
            trimmed_from_start: start.saturating_sub(loaded.start),
            appended_to_end: loaded.end.saturating_sub(end),
        })
    }

    /// Resolve each edge independently. Reads happen before any content is
    /// touched so an I/O failure leaves the window as it was.
    ///
    /// A trimmed edge lands on the file offset of the kept text, found
    /// through the edit map. Edits wholly in the trimmed part are dropped; an
    /// edit cut in two keeps standing for all the file bytes it replaced.
    fn incremental(
        &mut self,
        start: u64,
        end: u64,
        edit_end: u64,
    ) -> Result<BoundaryAdjustment, ViewError> {
        let codec = self.codec.as_ref();
        let back: Option<(Loaded, u64)> = if end > edit_end {
            let disk_end = self.end + (end - edit_end);
            let loaded = self.adjuster.load(&self.file, codec, self.end, disk_end, false, true)?;
            Some((loaded, disk_end))
        } else {
            None
        };
        let front = if start < self.start {
            Some(self.adjuster.load(&self.file, codec, start, self.start, true, false)?)
        } else {
            None
        };

        let mut adjustment = BoundaryAdjustment::default();
        if let Some((loaded, disk_end)) = back {
            let len = self.content.len();
            self.content.insert(len, &loaded.text);
            adjustment.appended_to_end = loaded.end.saturating_sub(disk_end);
            self.end = loaded.end;
        } else if end < edit_end {
            let text = self.content.contents();
            let (cut, kept) = codec.ceil_boundary(&text, (end - self.start) as usize);
            if cut < text.len() {
                let at = self
                    .edits
                    .locate(cut, self.start, |r| codec.encoded_len(&text[r]) as u64);
                self.end = if at.inside { at.after } else { at.before };
                self.edits.truncate(cut);
                self.content.delete(cut..text.len());
                self.undo.clip(cut);
                self.point = self.point.min(cut);
            }
            adjustment.appended_to_end = (self.start + kept as u64).saturating_sub(end);
        }

        if let Some(loaded) = front {
            let len = loaded.text.len();
            self.content.insert(0, &loaded.text);
            self.edits.prepended(len);
            self.undo.shift(len as i64, 0);
            self.point += len;
            adjustment.trimmed_from_start = start - loaded.start;
            self.start = loaded.start;
        } else if start > self.start {
            let text = self.content.contents();
            let (cut, skipped) = codec.floor_boundary(&text, (start - self.start) as usize);
            adjustment.trimmed_from_start = start - self.start - skipped as u64;
            if cut > 0 {
                let at = self
                    .edits
                    .locate(cut, self.start, |r| codec.encoded_len(&text[r]) as u64);
                self.start = if at.inside { at.before } else { at.after };
                self.edits.drop_front(cut);
                self.content.delete(0..cut);
                self.undo.shift(-(cut as i64), 0);
                self.point = self.point.saturating_sub(cut);
            }
        }

        self.file.mark_visited();
        debug!(
            target: "window.move",
            start = self.start,
            end = self.end,
            trimmed = adjustment.trimmed_from_start,
            appended = adjustment.appended_to_end,
            dirty = self.dirty,
            "incremental_move"
        );
        Ok(adjustment)
    }

    fn check_boundary(&self, text: &str, pos: usize) -> Result<(), ViewError> {
        if pos > text.len() || !text.is_char_boundary(pos) {
            return Err(ViewError::InvalidArgument(format!(
                "offset {pos} is not a character boundary in a {} byte window",
                text.len()
            )));
        }
        Ok(())
    }

    /// Insert `text` at text offset `pos` as one undo group.
    pub fn insert(&mut self, pos: usize, text: &str) -> Result<(), ViewError> {
        self.check_boundary(&self.content.contents(), pos)?;
        if text.is_empty() {
            return Ok(());
        }
        self.undo.push(UndoEntry::CursorPosition(self.point));
        self.content.insert(pos, text);
        self.edits.inserted(pos, text.len());
        self.undo.push(UndoEntry::Insertion {
            start: pos,
            end: pos + text.len(),
        });
        self.undo.boundary();
        self.dirty = true;
        self.point = pos + text.len();
        Ok(())
    }

    /// Delete the text in `range` as one undo group and return it.
    pub fn delete(&mut self, range: std::ops::Range<usize>) -> Result<String, ViewError> {
        let text = self.content.contents();
        self.check_boundary(&text, range.start)?;
        self.check_boundary(&text, range.end)?;
        if range.start >= range.end {
            return Ok(String::new());
        }
        self.undo.push(UndoEntry::CursorPosition(self.point));
        self.note_deletion(range.clone());
        let removed = self.content.delete(range.clone());
        self.undo.push(UndoEntry::Deletion {
            text: removed.clone(),
            pos: range.start,
        });
        self.undo.boundary();
        self.dirty = true;
        self.point = range.start;
        Ok(removed)
    }

    /// Record in the edit map that `range` is about to be deleted.
    fn note_deletion(&mut self, range: std::ops::Range<usize>) {
        let codec = self.codec.as_ref();
        let unedited: u64 = self
            .edits
            .unedited(range.clone())
            .into_iter()
            .map(|r| self.content.encoded_len(codec, r) as u64)
            .sum();
        self.edits.deleted(range, unedited);
    }

    /// Append a host-side entry (text property or marker change) to the log.
    pub fn record(&mut self, entry: UndoEntry) {
        self.undo.push(entry);
    }

    /// Revert the most recent undo group. Returns `false` when there is none.
    /// The window stays dirty.
    pub fn undo(&mut self) -> bool {
        let group = self.undo.pop_group();
        if group.is_empty() {
            return false;
        }
        for entry in &group {
            match entry {
                UndoEntry::Insertion { start, end } => self.note_deletion(*start..*end),
                UndoEntry::Deletion { text, pos } => self.edits.inserted(*pos, text.len()),
                _ => {}
            }
            if let Some(pos) = entry.revert(self.content.as_mut()) {
                self.point = pos;
            }
        }
        debug!(target: "state.undo", reverted = group.len(), "undo_group");
        true
    }

    /// Accept the current content as what is on disk, after an external
    /// writer has persisted it.
    pub fn mark_saved(&mut self) -> Result<(), ViewError> {
        self.file.refresh()?;
        self.end = self.start + self.content.encoded_len(self.codec.as_ref(), 0..self.content.len()) as u64;
        self.edits.clear();
        self.dirty = false;
        self.file.mark_visited();
        Ok(())
    }
}

impl std::fmt::Debug for ChunkWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkWindow")
            .field("file", &self.file)
            .field("codec", &self.codec.name())
            .field("start", &self.start)
            .field("end", &self.end)
            .field("dirty", &self.dirty)
            .field("point", &self.point)
            .finish()
    }
}
