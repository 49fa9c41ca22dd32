//! Batch-wise movement of the window.
//!
//! Every move here is non-minimal: hosts are told about the new chunk.

use core_model::FileView;
use core_state::{BoundaryAdjustment, ViewError};
use tracing::debug;

/// Move `n` batches towards the end of the file. A negative `n` keeps the
/// start and grows the window by `|n|` batches instead.
pub fn next_batch(view: &mut FileView, n: i64) -> Result<BoundaryAdjustment, ViewError> {
    if n == 0 {
        return Err(ViewError::InvalidArgument("batch count must not be zero".into()));
    }
    let batch = view.batch_size();
    let end = view
        .end()
        .saturating_add(batch.saturating_mul(n.unsigned_abs()))
        .min(view.size());
    let start = if n < 0 {
        view.start()
    } else {
        end.saturating_sub(batch)
    };
    debug!(target: "window.move", n, start, end, "next_batch");
    view.move_to(start, end, false)
}

/// Move `n` batches towards the start of the file. A negative `n` keeps the
/// end and grows the window backwards.
pub fn prev_batch(view: &mut FileView, n: i64) -> Result<BoundaryAdjustment, ViewError> {
    if n == 0 {
        return Err(ViewError::InvalidArgument("batch count must not be zero".into()));
    }
    let batch = view.batch_size();
    let start = view
        .start()
        .saturating_sub(batch.saturating_mul(n.unsigned_abs()));
    let end = if n < 0 {
        view.end()
    } else {
        (start + batch).min(view.size())
    };
    debug!(target: "window.move", n, start, end, "prev_batch");
    view.move_to(start, end, false)
}

/// Jump to 1-based batch `k`.
pub fn jump_to_chunk(view: &mut FileView, k: u64) -> Result<BoundaryAdjustment, ViewError> {
    let batch = view.batch_size();
    let chunks = view.snapshot().chunks;
    if k == 0 || k > chunks {
        return Err(ViewError::InvalidArgument(format!(
            "chunk {k} out of range 1..={chunks}"
        )));
    }
    let start = (k - 1) * batch;
    view.move_to(start, start + batch, false)
}

pub fn beginning_of_file(view: &mut FileView) -> Result<BoundaryAdjustment, ViewError> {
    let batch = view.batch_size();
    view.move_to(0, batch, false)
}

pub fn end_of_file(view: &mut FileView) -> Result<BoundaryAdjustment, ViewError> {
    let size = view.size();
    let batch = view.batch_size();
    view.move_to(size.saturating_sub(batch), size, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_config::Config;
    use core_file::MemorySource;

    fn view() -> FileView {
        let mut cfg = Config::default();
        cfg.file.window.batch_size = 100;
        FileView::open(MemorySource::new("n", vec![b'n'; 450]), cfg).unwrap()
    }

    #[test]
    fn batches_step_and_clamp() {
        let mut v = view();
        next_batch(&mut v, 1).unwrap();
        assert_eq!((v.start(), v.end()), (100, 200));
        next_batch(&mut v, 3).unwrap();
        assert_eq!((v.start(), v.end()), (350, 450));
        prev_batch(&mut v, 1).unwrap();
        assert_eq!((v.start(), v.end()), (250, 350));
        prev_batch(&mut v, 9).unwrap();
        assert_eq!((v.start(), v.end()), (0, 100));
    }

    #[test]
    fn negative_counts_grow_the_window() {
        let mut v = view();
        next_batch(&mut v, -2).unwrap();
        assert_eq!((v.start(), v.end()), (0, 300));
        end_of_file(&mut v).unwrap();
        assert_eq!((v.start(), v.end()), (350, 450));
        prev_batch(&mut v, -1).unwrap();
        assert_eq!((v.start(), v.end()), (250, 450));
    }

    #[test]
    fn chunks_are_one_based() {
        let mut v = view();
        jump_to_chunk(&mut v, 5).unwrap();
        assert_eq!((v.start(), v.end()), (400, 450));
        assert_eq!(v.snapshot().chunk, 5);
        assert!(matches!(jump_to_chunk(&mut v, 0), Err(ViewError::InvalidArgument(_))));
        assert!(matches!(jump_to_chunk(&mut v, 6), Err(ViewError::InvalidArgument(_))));
        beginning_of_file(&mut v).unwrap();
        assert_eq!((v.start(), v.end()), (0, 100));
        assert!(matches!(next_batch(&mut v, 0), Err(ViewError::InvalidArgument(_))));
    }
}
