//! Line addressing across chunks.
//!
//! Lines end at `\r\n`, `\n` or `\r`; a CRLF pair counts once even when the
//! pair is split by a chunk edge. Line `n > 0` starts after the `(n-1)`-th
//! terminator from the beginning of the file. Line `-n` is counted from the
//! end, where a trailing terminator does not open an extra line, so `-1` is
//! the line holding the last byte.
//!
//! Terminators are first counted chunk by chunk with `memchr` over the
//! decoded window text. The chunk holding the target terminator is then
//! handed to the regex search for the remaining count, which takes care of
//! pairs split across the window edge.

use core_model::{FileView, ViewTransaction};
use core_state::ViewError;
use regex::Regex;
use tracing::{debug, info};

use crate::search::{Direction, SearchOutcome, search};

pub const LINE_TERMINATOR: &str = r"\r\n|\n|\r";

fn terminator() -> Result<Regex, ViewError> {
    Regex::new(LINE_TERMINATOR).map_err(|e| ViewError::InvalidArgument(e.to_string()))
}

/// Terminators in `bytes`, counting each CRLF once. `prev_cr` tells whether
/// the byte before `bytes` was a CR.
pub fn count_terminators(bytes: &[u8], prev_cr: bool) -> u64 {
    memchr::memchr2_iter(b'\n', b'\r', bytes)
        .filter(|&i| {
            bytes[i] == b'\r'
                || !match i {
                    0 => prev_cr,
                    _ => bytes[i - 1] == b'\r',
                }
        })
        .count() as u64
}

fn saturate(n: u64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Move to line `n` and put the cursor at its first character. Returns the
/// absolute offset of that character.
pub fn goto_line(view: &mut FileView, n: i64) -> Result<u64, ViewError> {
    if n == 0 {
        return Err(ViewError::InvalidArgument(
            "line numbers start at 1 (or -1 from the end)".to_string(),
        ));
    }
    if view.is_dirty() {
        return Err(ViewError::Modified);
    }
    let mut tx = ViewTransaction::begin(view);
    let offset = if n > 0 {
        line_from_start(&mut tx, n.unsigned_abs())?
    } else {
        line_from_end(&mut tx, n.unsigned_abs())?
    };
    tx.commit();
    info!(target: "goto_line", line = n, offset, "goto_line");
    Ok(offset)
}

fn first_line(view: &mut FileView) -> Result<u64, ViewError> {
    let batch = view.batch_size();
    view.move_to(0, batch, false)?;
    view.set_point(0);
    Ok(0)
}

fn line_from_start(view: &mut FileView, n: u64) -> Result<u64, ViewError> {
    let needed = n - 1;
    if needed == 0 {
        return first_line(view);
    }
    let size = view.size();
    let batch = view.batch_size();
    let mut counted = 0;
    let mut pending_cr = false;
    let mut pos = 0;
    while pos < size {
        view.move_to(pos, pos + batch, true)?;
        let text = view.text();
        let bytes = text.as_bytes();
        let in_chunk = count_terminators(bytes, pending_cr);
        if counted + in_chunk >= needed {
            debug!(target: "goto_line", chunk_start = view.start(), counted, "line_chunk_found");
            // The LF of a CRLF split at the chunk start was counted with its CR.
            let skip_lf = pending_cr && bytes.first() == Some(&b'\n');
            view.set_point(usize::from(skip_lf));
            let outcome = search(view, &terminator()?, (needed - counted) as i64, Direction::Forward)?;
            return match outcome {
                SearchOutcome::AllFound(m) => Ok(m.end),
                other => Err(ViewError::NotFound {
                    found: saturate(counted + u64::from(other.found(0)) + 1),
                    requested: saturate(n),
                }),
            };
        }
        counted += in_chunk;
        pending_cr = bytes.last() == Some(&b'\r');
        pos = view.end();
        view.progress(pos, size)?;
    }
    Err(ViewError::NotFound {
        found: saturate(counted + 1),
        requested: saturate(n),
    })
}

fn line_from_end(view: &mut FileView, n: u64) -> Result<u64, ViewError> {
    let size = view.size();
    let batch = view.batch_size();
    let mut counted = 0;
    let mut next_starts_lf = false;
    let mut last_chunk = true;
    let mut pos = size;
    while pos > 0 {
        view.move_to(pos.saturating_sub(batch), pos, true)?;
        let text = view.text();
        let mut limit = text.len();
        if last_chunk {
            if text.ends_with("\r\n") {
                limit -= 2;
            } else if text.ends_with('\n') || text.ends_with('\r') {
                limit -= 1;
            }
            last_chunk = false;
        }
        let bytes = &text.as_bytes()[..limit];
        // The LF opening the following chunk was already counted for this CR.
        let skip_cr = next_starts_lf && limit == text.len() && bytes.last() == Some(&b'\r');
        let in_chunk = count_terminators(bytes, false) - u64::from(skip_cr);
        if counted + in_chunk >= n {
            debug!(target: "goto_line", chunk_start = view.start(), counted, "line_chunk_found");
            view.set_point(limit - usize::from(skip_cr));
            let outcome = search(view, &terminator()?, (n - counted) as i64, Direction::Backward)?;
            return match outcome {
                SearchOutcome::AllFound(m) => {
                    view.set_point_offset(m.end);
                    Ok(m.end)
                }
                other => Err(ViewError::NotFound {
                    found: saturate(counted + u64::from(other.found(0)) + 1),
                    requested: saturate(n),
                }),
            };
        }
        counted += in_chunk;
        next_starts_lf = text.as_bytes().first() == Some(&b'\n');
        pos = view.start();
        view.progress(size - pos, size)?;
    }
    // With exactly n-1 terminators the first line is line -n.
    if counted + 1 == n {
        return first_line(view);
    }
    Err(ViewError::NotFound {
        found: saturate(counted + 1),
        requested: saturate(n),
    })
}
