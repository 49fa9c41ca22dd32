//! Chunk-crossing regex search.
//!
//! Matching runs over the decoded text of the current window. When the window
//! runs out of matches before `count` are consumed, it slides by
//! `batch - overlap` bytes in the scan direction and the scan resumes where
//! it left off. Every match is tracked by absolute file offset, so offsets
//! survive the boundary snapping of each move.
//!
//! A forward match that ends exactly at the window end is deferred to the
//! next window unless the window already touches the end of the file: a
//! greedy pattern may extend past the edge. Backward mirrors this for a match
//! starting exactly at the window start.
//!
//! Forward search takes the leftmost match at or after the cursor, then
//! continues from its end. Backward search takes the match ending closest
//! to the cursor (never past it), preferring the longest on ties, so a
//! forward match is found again when searching back from its end.
//!
//! Backward matching only sees the text before the cursor, and after each
//! match only the text before that match. The haystack ends there, so `$`,
//! `\z` and `\b` match at the cursor as they would at the end of the text.
//!
//! On success the window is centered on the last match, the cursor is left
//! at its end (forward) or start (backward), and the match is highlighted.
//! Otherwise the window and cursor return to where they were.

use core_model::{FileView, ViewTransaction};
use core_state::{ChunkWindow, ViewError};
use core_text::Codec;
use regex::Regex;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Absolute byte range of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchMatch {
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Every requested match was found; carries the last one.
    AllFound(SearchMatch),
    /// The file boundary was reached after this many matches (at least one).
    PartiallyFound(u32),
    /// The file boundary was reached without any match.
    AtFileBoundary,
}

impl SearchOutcome {
    pub fn found(&self, requested: u32) -> u32 {
        match self {
            Self::AllFound(_) => requested,
            Self::PartiallyFound(found) => *found,
            Self::AtFileBoundary => 0,
        }
    }

    pub fn into_result(self, requested: u32) -> Result<SearchMatch, ViewError> {
        match self {
            Self::AllFound(m) => Ok(m),
            other => Err(ViewError::NotFound {
                found: other.found(requested),
                requested,
            }),
        }
    }
}

/// Progress of one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchState {
    pub direction: Direction,
    pub remaining: u32,
    pub found: u32,
    pub match_start: u64,
    pub match_end: u64,
    pub window_at_match: (u64, u64),
}

impl SearchState {
    fn new(direction: Direction, count: u32) -> Self {
        Self {
            direction,
            remaining: count,
            found: 0,
            match_start: 0,
            match_end: 0,
            window_at_match: (0, 0),
        }
    }

    fn record(&mut self, start: u64, end: u64, window: (u64, u64)) {
        self.remaining -= 1;
        self.found += 1;
        self.match_start = start;
        self.match_end = end;
        self.window_at_match = window;
    }
}

/// Compile `pattern` and search for it.
pub fn search_str(
    view: &mut FileView,
    pattern: &str,
    count: i64,
    direction: Direction,
) -> Result<SearchOutcome, ViewError> {
    let regex = Regex::new(pattern)
        .map_err(|e| ViewError::InvalidArgument(format!("invalid pattern: {e}")))?;
    search(view, &regex, count, direction)
}

/// Find the `count`-th match of `regex` from the cursor in `direction`.
pub fn search(
    view: &mut FileView,
    regex: &Regex,
    count: i64,
    direction: Direction,
) -> Result<SearchOutcome, ViewError> {
    if count <= 0 {
        return Err(ViewError::InvalidArgument(format!(
            "search count must be positive, got {count}"
        )));
    }
    let requested = u32::try_from(count)
        .map_err(|_| ViewError::InvalidArgument(format!("search count {count} is too large")))?;
    if view.is_dirty() {
        return Err(ViewError::Modified);
    }

    let mut tx = ViewTransaction::begin(view);
    let mut state = SearchState::new(direction, requested);
    debug!(target: "search", pattern = regex.as_str(), count, ?direction, from = tx.point_offset(), "search_start");
    if !scan(&mut tx, regex, &mut state)? {
        info!(target: "search", pattern = regex.as_str(), found = state.found, requested, "search_exhausted");
        return Ok(match state.found {
            0 => SearchOutcome::AtFileBoundary,
            found => SearchOutcome::PartiallyFound(found),
        });
    }

    let found = SearchMatch {
        start: state.match_start,
        end: state.match_end,
    };
    let batch = tx.batch_size();
    let center = found.start + (found.end - found.start) / 2;
    let start = center
        .saturating_sub(batch / 2)
        .min(tx.size().saturating_sub(batch));
    tx.move_to(start, start + batch, false)?;
    tx.set_point_offset(match direction {
        Direction::Forward => found.end,
        Direction::Backward => found.start,
    });
    tx.highlight(found.start, found.end);
    tx.commit();
    info!(
        target: "search",
        pattern = regex.as_str(),
        count,
        start = found.start,
        end = found.end,
        "search_found"
    );
    Ok(SearchOutcome::AllFound(found))
}

/// Where one window's scan stopped.
enum WindowScan {
    Complete,
    /// Window exhausted. `deferred` is the edge-touching match boundary to
    /// resume from (its start going forward, its end going backward);
    /// `mark` the boundary of the last match counted in this window.
    Exhausted {
        deferred: Option<u64>,
        mark: Option<u64>,
    },
}

/// Absolute offsets of text positions visited in order.
struct OffsetMap {
    local: usize,
    abs: u64,
}

impl OffsetMap {
    fn new(abs: u64) -> Self {
        Self { local: 0, abs }
    }

    fn at(&mut self, codec: &dyn Codec, text: &str, local: usize) -> u64 {
        if local >= self.local {
            self.abs += codec.encoded_len(&text[self.local..local]) as u64;
        } else {
            self.abs -= codec.encoded_len(&text[local..self.local]) as u64;
        }
        self.local = local;
        self.abs
    }
}

fn next_boundary(text: &str, pos: usize) -> usize {
    text[pos..]
        .chars()
        .next()
        .map_or(text.len() + 1, |c| pos + c.len_utf8())
}

fn prev_boundary(text: &str, pos: usize) -> Option<usize> {
    text[..pos].chars().next_back().map(|c| pos - c.len_utf8())
}

/// Slide until `state.remaining` reaches zero or the file boundary.
fn scan(view: &mut FileView, regex: &Regex, state: &mut SearchState) -> Result<bool, ViewError> {
    let size = view.size();
    let batch = view.batch_size();
    let overlap = view.overlap();
    let mut resume = view.point_offset();
    let mut from = view.point();
    loop {
        let (win_start, win_end) = (view.start(), view.end());
        let text = view.text();
        let scan = match state.direction {
            Direction::Forward => {
                scan_forward(view.window(), &text, regex, from, state, win_end >= size, batch)
            }
            Direction::Backward => {
                scan_backward(view.window(), &text, regex, from, state, win_start == 0, batch)
            }
        };
        let (deferred, mark) = match scan {
            WindowScan::Complete => return Ok(true),
            WindowScan::Exhausted { .. } if reached_boundary(state.direction, win_start, win_end, size) => {
                return Ok(false);
            }
            WindowScan::Exhausted { deferred, mark } => (deferred, mark),
        };

        let (next_start, next_end) = match state.direction {
            Direction::Forward => {
                let edge = win_end.saturating_sub(overlap);
                resume = match deferred {
                    Some(start) => start,
                    None => resume.max(edge).max(mark.unwrap_or(0)),
                };
                let next_start = edge.min(resume);
                (next_start, next_start + batch)
            }
            Direction::Backward => {
                let edge = (win_start + overlap).min(win_end);
                resume = match deferred {
                    Some(end) => end,
                    None => resume.min(edge).min(mark.unwrap_or(u64::MAX)),
                };
                let next_end = edge.max(resume);
                (next_end.saturating_sub(batch), next_end)
            }
        };
        debug!(target: "search", next_start, next_end, resume, found = state.found, deferred = deferred.is_some(), "search_slide");
        let done = match state.direction {
            Direction::Forward => next_start,
            Direction::Backward => size - next_end,
        };
        view.progress(done, size)?;
        view.move_to(next_start, next_end, true)?;
        from = view.window().local_offset(resume);
    }
}

fn reached_boundary(direction: Direction, win_start: u64, win_end: u64, size: u64) -> bool {
    match direction {
        Direction::Forward => win_end >= size,
        Direction::Backward => win_start == 0,
    }
}

fn scan_forward(
    window: &ChunkWindow,
    text: &str,
    regex: &Regex,
    from: usize,
    state: &mut SearchState,
    at_file_end: bool,
    batch: u64,
) -> WindowScan {
    let codec = window.codec();
    let bounds = (window.start(), window.end());
    let mut offsets = OffsetMap::new(window.start());
    let mut mark = None;
    let mut pos = from;
    while pos <= text.len() {
        let Some(m) = regex.find_at(text, pos) else {
            break;
        };
        let start = offsets.at(codec, text, m.start());
        if m.end() == text.len() && !at_file_end && start > bounds.0 && start + batch > bounds.1 {
            return WindowScan::Exhausted {
                deferred: Some(start),
                mark,
            };
        }
        let end = offsets.at(codec, text, m.end());
        state.record(start, end, bounds);
        if state.remaining == 0 {
            return WindowScan::Complete;
        }
        mark = Some(end);
        pos = if m.is_empty() {
            next_boundary(text, m.end())
        } else {
            m.end()
        };
    }
    WindowScan::Exhausted {
        deferred: None,
        mark,
    }
}

/// The match in `hay` with the rightmost end, the longest one on ties.
/// Candidates are the matches starting at each position from `hint` on.
/// `hay` is already cut at the search limit, which anchors `$` there.
fn last_match(regex: &Regex, hay: &str, hint: usize) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut s = hint;
    while s <= hay.len() {
        let Some(m) = regex.find_at(hay, s) else {
            break;
        };
        if best.is_none_or(|(_, end)| m.end() > end) {
            best = Some((m.start(), m.end()));
        }
        s = next_boundary(hay, m.start());
    }
    best
}

fn scan_backward(
    window: &ChunkWindow,
    text: &str,
    regex: &Regex,
    from: usize,
    state: &mut SearchState,
    at_file_start: bool,
    batch: u64,
) -> WindowScan {
    let codec = window.codec();
    let bounds = (window.start(), window.end());
    let mut offsets = OffsetMap::new(window.start());
    // Leftmost tiling of the haystack: each tile start is a lower bound for
    // the rightmost match ending before the tile's end.
    let tiles: Vec<(usize, usize)> = regex
        .find_iter(&text[..from])
        .map(|m| (m.start(), m.end()))
        .collect();
    let mut idx = tiles.len();
    let mut limit = from;
    let mut mark = None;
    loop {
        while idx > 0 && tiles[idx - 1].1 > limit {
            idx -= 1;
        }
        let hint = if idx > 0 { tiles[idx - 1].0 } else { 0 };
        let Some((m_start, m_end)) = last_match(regex, &text[..limit], hint) else {
            break;
        };
        let end = offsets.at(codec, text, m_end);
        if m_start == 0 && !at_file_start && end < bounds.1 && end < bounds.0 + batch {
            return WindowScan::Exhausted {
                deferred: Some(end),
                mark,
            };
        }
        let start = offsets.at(codec, text, m_start);
        state.record(start, end, bounds);
        if state.remaining == 0 {
            return WindowScan::Complete;
        }
        mark = Some(start);
        limit = if m_start == m_end {
            match prev_boundary(text, m_start) {
                Some(p) => p,
                None => break,
            }
        } else {
            m_start
        };
    }
    WindowScan::Exhausted {
        deferred: None,
        mark,
    }
}
