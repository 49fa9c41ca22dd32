//! Collaborator seams for a file view.
//!
//! The chunk manager and the sliding search never talk to a user directly.
//! Everything interactive is injected through the small traits here:
//! * [`ConfirmationPolicy`] answers "discard unsaved edits?" before any
//!   destructive reload of a dirty window.
//! * [`ProgressSink`] receives absolute byte progress during long scans.
//! * [`CancelToken`] is polled at every progress point; a raised token makes
//!   the running operation restore its pre-call window and return.
//! * [`ViewHooks`] observes window moves (the rename/notification hook) and
//!   transient match highlights.
//!
//! All hooks run synchronously on the caller's thread and must not block.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Why a destructive operation is asking for confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmReason {
    /// The requested range is empty or outside the file; the window would be erased.
    CollapseModified,
    /// The requested range does not overlap the window (or the file changed on disk).
    ReloadModified,
    /// The requested range is narrower than the edited window; edits may be cut off.
    TrimModified,
}

impl fmt::Display for ConfirmReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CollapseModified => write!(f, "chunk modified, erase it"),
            Self::ReloadModified => write!(f, "chunk modified, reload from disk"),
            Self::TrimModified => write!(f, "chunk modified, trim edited region"),
        }
    }
}

/// Decides whether unsaved window edits may be discarded.
pub trait ConfirmationPolicy {
    fn confirm(&mut self, reason: ConfirmReason) -> bool;
}

impl<F> ConfirmationPolicy for F
where
    F: FnMut(ConfirmReason) -> bool,
{
    fn confirm(&mut self, reason: ConfirmReason) -> bool {
        self(reason)
    }
}

/// Always allows discarding edits.
pub struct AlwaysConfirm;

impl ConfirmationPolicy for AlwaysConfirm {
    fn confirm(&mut self, _reason: ConfirmReason) -> bool {
        true
    }
}

/// Never allows discarding edits; destructive moves fail with a conflict.
pub struct NeverConfirm;

impl ConfirmationPolicy for NeverConfirm {
    fn confirm(&mut self, _reason: ConfirmReason) -> bool {
        false
    }
}

/// Receives absolute byte progress during long scans.
pub trait ProgressSink {
    fn report(&mut self, done: u64, total: u64);
}

impl<F> ProgressSink for F
where
    F: FnMut(u64, u64),
{
    fn report(&mut self, done: u64, total: u64) {
        self(done, total)
    }
}

pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn report(&mut self, _done: u64, _total: u64) {}
}

/// Best-effort cancellation flag. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Display snapshot of the current window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub name: String,
    pub start: u64,
    pub end: u64,
    pub size: u64,
    pub dirty: bool,
    /// 1-based index of the batch-sized chunk containing `start`.
    pub chunk: u64,
    pub chunks: u64,
}

impl fmt::Display for WindowSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}/{}) [{}-{}/{}]{}",
            self.name,
            self.chunk,
            self.chunks,
            self.start,
            self.end,
            self.size,
            if self.dirty { " *" } else { "" }
        )
    }
}

/// A transient highlight over absolute file bytes `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightRequest {
    pub start: u64,
    pub end: u64,
    /// How long the highlight stays visible before the host clears it.
    pub duration: Duration,
}

/// Observer of window changes. Default methods are no-ops.
pub trait ViewHooks {
    /// Fired after every non-minimal window move.
    fn chunk_changed(&mut self, _snapshot: &WindowSnapshot) {}
    /// Fired when a search lands on its final match.
    fn highlight(&mut self, _request: &HighlightRequest) {}
}

/// Default no-op hooks implementation.
pub struct NoopViewHooks;

impl ViewHooks for NoopViewHooks {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_act_as_policies_and_sinks() {
        let mut asked = Vec::new();
        let mut policy = |reason: ConfirmReason| {
            asked.push(reason);
            reason != ConfirmReason::TrimModified
        };
        assert!(policy.confirm(ConfirmReason::ReloadModified));
        assert!(!policy.confirm(ConfirmReason::TrimModified));
        assert_eq!(asked.len(), 2);

        let mut seen = Vec::new();
        let mut sink = |done: u64, total: u64| seen.push((done, total));
        sink.report(10, 100);
        assert_eq!(seen, vec![(10, 100)]);
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
        other.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn snapshot_label() {
        let snap = WindowSnapshot {
            name: "big.log".into(),
            start: 1024,
            end: 2048,
            size: 4000,
            dirty: true,
            chunk: 2,
            chunks: 4,
        };
        assert_eq!(snap.to_string(), "big.log(2/4) [1024-2048/4000] *");
    }
}
