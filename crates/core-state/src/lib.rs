//! Window state for a large-file view.
//!
//! * [`boundary`] snaps requested byte ranges onto decodable character
//!   boundaries.
//! * [`edits`] tracks which window text no longer matches the file.
//! * [`undo`] keeps the window's edit log and projects it when the window
//!   start shifts.
//! * [`window`] owns the materialized range and implements the window move.
//!
//! Nothing here prompts, renders, or schedules. Interactive decisions come in
//! through `core-events` seams.

pub mod boundary;
pub mod edits;
pub mod error;
pub mod undo;
pub mod window;

pub use boundary::{
    BoundaryAdjuster, DISCREPANCY_TOLERANCE, END_EXTRA, EndCut, Loaded, PROBE_DEPTH, SAMPLE_SIZE,
    START_BACKOFF, StartAdjustment,
};
pub use edits::{Edit, EditMap, Location};
pub use error::ViewError;
pub use undo::{UNDO_HISTORY_MAX, UndoEntry, UndoLog};
pub use window::{BoundaryAdjustment, ChunkWindow};
