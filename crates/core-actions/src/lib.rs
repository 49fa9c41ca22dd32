//! Operations that walk a [`FileView`](core_model::FileView) across the file:
//! regex search, line addressing and batch navigation.
//!
//! Each operation either completes or leaves the window and cursor where it
//! found them.

pub mod goto_line;
pub mod navigation;
pub mod search;

pub use goto_line::{LINE_TERMINATOR, count_terminators, goto_line};
pub use navigation::{beginning_of_file, end_of_file, jump_to_chunk, next_batch, prev_batch};
pub use search::{Direction, SearchMatch, SearchOutcome, SearchState, search, search_str};
