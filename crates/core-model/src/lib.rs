//! File view: one chunk window plus everything a host plugs into it.
//!
//! A [`FileView`] exclusively owns its [`ChunkWindow`], the effective
//! [`Config`], and the collaborator seams (confirmation policy, hooks,
//! progress sink, cancel token). Nothing is shared between views.
//!
//! Invariants after every public call:
//! * `start <= end <= size` for the window.
//! * The window was moved only through [`FileView::move_to`], so
//!   `chunk_changed` fired for every non-minimal move.
//! * A failed operation leaves the window where it was. Multi-step operations
//!   get this from [`ViewTransaction`], which restores the saved position on
//!   drop unless committed.

use std::ops::Range;

use core_config::Config;
use core_events::{
    CancelToken, ConfirmationPolicy, HighlightRequest, NeverConfirm, NoopProgress, NoopViewHooks,
    ProgressSink, ViewHooks, WindowSnapshot,
};
use core_file::{ByteSource, FileHandle};
use core_state::{BoundaryAdjuster, BoundaryAdjustment, ChunkWindow, ViewError};
use core_text::{Buffer, Codec, TextBuffer, Utf8Codec};
use tracing::debug;

mod transaction;
pub use transaction::{SavedPosition, ViewTransaction};

/// Boundary adjuster tuned by the `[boundary]` config section.
pub fn adjuster_from_config(config: &Config) -> BoundaryAdjuster {
    let b = &config.file.boundary;
    BoundaryAdjuster {
        probe_depth: b.probe_depth,
        tolerance: b.tolerance,
        sample_size: b.sample_size,
        end_extra: b.end_extra,
        start_backoff: b.start_backoff,
    }
}

pub struct FileView {
    window: ChunkWindow,
    config: Config,
    policy: Box<dyn ConfirmationPolicy>,
    hooks: Box<dyn ViewHooks>,
    progress: Box<dyn ProgressSink>,
    cancel: CancelToken,
}

impl FileView {
    /// Open a UTF-8 view backed by a rope buffer, with the first batch loaded.
    pub fn open(source: impl ByteSource + 'static, config: Config) -> Result<Self, ViewError> {
        let file = FileHandle::open(source)?;
        let name = file.name().to_string();
        Self::with_parts(file, Box::new(Utf8Codec), Box::new(Buffer::new(name)), config)
    }

    /// Open a view with an explicit codec and text buffer. Unsaved edits are
    /// never discarded until [`FileView::set_policy`] installs a policy that
    /// confirms.
    pub fn with_parts(
        file: FileHandle,
        codec: Box<dyn Codec>,
        content: Box<dyn TextBuffer>,
        mut config: Config,
    ) -> Result<Self, ViewError> {
        config.apply_file_size(file.size());
        let adjuster = adjuster_from_config(&config);
        let window = ChunkWindow::new(file, codec, content, adjuster);
        let mut view = Self {
            window,
            config,
            policy: Box::new(NeverConfirm),
            hooks: Box::new(NoopViewHooks),
            progress: Box::new(NoopProgress),
            cancel: CancelToken::new(),
        };
        let batch = view.batch_size();
        view.move_to(0, batch, false)?;
        Ok(view)
    }

    pub fn set_policy(&mut self, policy: impl ConfirmationPolicy + 'static) {
        self.policy = Box::new(policy);
    }

    pub fn set_hooks(&mut self, hooks: impl ViewHooks + 'static) {
        self.hooks = Box::new(hooks);
    }

    pub fn set_progress(&mut self, progress: impl ProgressSink + 'static) {
        self.progress = Box::new(progress);
    }

    /// Token checked at every progress point. Clones share the flag.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn window(&self) -> &ChunkWindow {
        &self.window
    }

    pub fn batch_size(&self) -> u64 {
        self.config.batch_size()
    }

    pub fn overlap(&self) -> u64 {
        self.config.overlap()
    }

    pub fn start(&self) -> u64 {
        self.window.start()
    }

    pub fn end(&self) -> u64 {
        self.window.end()
    }

    pub fn size(&self) -> u64 {
        self.window.size()
    }

    pub fn is_dirty(&self) -> bool {
        self.window.is_dirty()
    }

    pub fn text(&self) -> String {
        self.window.text()
    }

    pub fn point(&self) -> usize {
        self.window.point()
    }

    pub fn set_point(&mut self, pos: usize) {
        self.window.set_point(pos);
    }

    pub fn point_offset(&self) -> u64 {
        self.window.point_offset()
    }

    pub fn set_point_offset(&mut self, offset: u64) {
        self.window.set_point_offset(offset);
    }

    /// Display snapshot with the 1-based batch index of the window start.
    pub fn snapshot(&self) -> WindowSnapshot {
        let batch = self.batch_size().max(1);
        let size = self.size();
        WindowSnapshot {
            name: self.window.name().to_string(),
            start: self.start(),
            end: self.end(),
            size,
            dirty: self.is_dirty(),
            chunk: self.start() / batch + 1,
            chunks: size.div_ceil(batch).max(1),
        }
    }

    /// Move the window. Unless `minimal`, hosts are notified through
    /// [`ViewHooks::chunk_changed`].
    pub fn move_to(
        &mut self,
        start: u64,
        end: u64,
        minimal: bool,
    ) -> Result<BoundaryAdjustment, ViewError> {
        let adjustment = self.window.move_to(start, end, self.policy.as_mut())?;
        if !minimal {
            let snapshot = self.snapshot();
            debug!(target: "window.move", chunk = snapshot.chunk, chunks = snapshot.chunks, "chunk_changed");
            self.hooks.chunk_changed(&snapshot);
        }
        Ok(adjustment)
    }

    pub fn insert(&mut self, pos: usize, text: &str) -> Result<(), ViewError> {
        self.window.insert(pos, text)
    }

    pub fn delete(&mut self, range: Range<usize>) -> Result<String, ViewError> {
        self.window.delete(range)
    }

    pub fn undo(&mut self) -> bool {
        self.window.undo()
    }

    pub fn mark_saved(&mut self) -> Result<(), ViewError> {
        self.window.mark_saved()?;
        let snapshot = self.snapshot();
        self.hooks.chunk_changed(&snapshot);
        Ok(())
    }

    /// Ask the host to highlight absolute bytes `[start, end)` for the
    /// configured duration.
    pub fn highlight(&mut self, start: u64, end: u64) {
        let request = HighlightRequest {
            start,
            end,
            duration: self.config.highlight_duration(),
        };
        self.hooks.highlight(&request);
    }

    /// Report progress and honor cancellation.
    pub fn progress(&mut self, done: u64, total: u64) -> Result<(), ViewError> {
        self.progress.report(done, total);
        if self.cancel.is_cancelled() {
            debug!(target: "window.move", done, total, "operation_cancelled");
            return Err(ViewError::Cancelled);
        }
        Ok(())
    }

    /// Where the window and cursor are now.
    pub fn save_position(&self) -> SavedPosition {
        SavedPosition {
            start: self.start(),
            end: self.end(),
            point: self.point_offset(),
        }
    }

    /// Return to a saved position. The window must be clean or the move is
    /// refused by the confirmation policy.
    pub fn restore_position(&mut self, saved: SavedPosition) -> Result<(), ViewError> {
        if (self.start(), self.end()) != (saved.start, saved.end) {
            self.move_to(saved.start, saved.end, false)?;
        }
        self.set_point_offset(saved.point);
        Ok(())
    }
}

impl std::fmt::Debug for FileView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileView")
            .field("window", &self.window)
            .field("batch_size", &self.batch_size())
            .finish()
    }
}
