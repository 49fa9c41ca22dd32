//! Scoped restore of the window position.
//!
//! A [`ViewTransaction`] records where the window and cursor are when it is
//! opened. Dropping it without [`ViewTransaction::commit`] moves them back,
//! whether the operation returned early with an error, was cancelled, or
//! unwound.

use std::ops::{Deref, DerefMut};

use tracing::warn;

use crate::FileView;

/// Window range and absolute cursor offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedPosition {
    pub start: u64,
    pub end: u64,
    pub point: u64,
}

pub struct ViewTransaction<'a> {
    view: &'a mut FileView,
    saved: Option<SavedPosition>,
}

impl<'a> ViewTransaction<'a> {
    pub fn begin(view: &'a mut FileView) -> Self {
        let saved = view.save_position();
        Self {
            view,
            saved: Some(saved),
        }
    }

    pub fn saved(&self) -> Option<SavedPosition> {
        self.saved
    }

    /// Keep the current position.
    pub fn commit(mut self) {
        self.saved = None;
    }
}

impl Deref for ViewTransaction<'_> {
    type Target = FileView;

    fn deref(&self) -> &FileView {
        self.view
    }
}

impl DerefMut for ViewTransaction<'_> {
    fn deref_mut(&mut self) -> &mut FileView {
        self.view
    }
}

impl Drop for ViewTransaction<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take()
            && let Err(e) = self.view.restore_position(saved)
        {
            warn!(target: "window.move", start = saved.start, end = saved.end, error = %e, "restore_failed");
        }
    }
}
