use core_actions::goto_line;
use core_config::Config;
use core_file::MemorySource;
use core_model::FileView;
use core_state::ViewError;
use proptest::prelude::*;
use regex::Regex;

fn open(bytes: Vec<u8>, batch: u64) -> FileView {
    let mut cfg = Config::default();
    cfg.file.window.batch_size = batch;
    FileView::open(MemorySource::new("lines.txt", bytes), cfg).unwrap()
}

fn numbered(lines: usize) -> Vec<u8> {
    (1..=lines)
        .map(|i| format!("line {i:04}\n"))
        .collect::<String>()
        .into_bytes()
}

/// Offsets where lines start, counting each `\r\n` once.
fn line_starts(text: &str) -> Vec<u64> {
    let term = Regex::new(r"\r\n|\n|\r").unwrap();
    std::iter::once(0)
        .chain(term.find_iter(text).map(|m| m.end() as u64))
        .collect()
}

fn strip_terminator(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .or_else(|| text.strip_suffix('\r'))
        .unwrap_or(text)
}

#[test]
fn positive_lines_from_start() {
    let mut view = open(numbered(500), 64);
    assert_eq!(goto_line(&mut view, 1).unwrap(), 0);
    assert_eq!(goto_line(&mut view, 2).unwrap(), 10);
    assert_eq!(goto_line(&mut view, 137).unwrap(), 1360);
    assert_eq!(view.point_offset(), 1360);
    assert!(view.start() <= 1360 && 1360 < view.end());
    assert_eq!(goto_line(&mut view, 500).unwrap(), 4990);
    // The empty line after the final newline.
    assert_eq!(goto_line(&mut view, 501).unwrap(), 5000);
}

#[test]
fn negative_lines_from_end() {
    let mut view = open(numbered(500), 64);
    assert_eq!(goto_line(&mut view, -1).unwrap(), 4990);
    assert_eq!(goto_line(&mut view, -3).unwrap(), 4970);
    assert_eq!(goto_line(&mut view, -500).unwrap(), 0);
}

#[test]
fn missing_lines_restore_window() {
    let mut view = open(numbered(500), 64);
    goto_line(&mut view, 200).unwrap();
    let before = (view.start(), view.end(), view.point_offset());
    assert!(matches!(
        goto_line(&mut view, 502),
        Err(ViewError::NotFound { found: 501, requested: 502 })
    ));
    assert!(matches!(
        goto_line(&mut view, -501),
        Err(ViewError::NotFound { found: 500, requested: 501 })
    ));
    assert_eq!((view.start(), view.end(), view.point_offset()), before);
    assert!(matches!(goto_line(&mut view, 0), Err(ViewError::InvalidArgument(_))));
}

#[test]
fn crlf_split_across_chunks_counts_once() {
    // A batch of 31 splits every other pair between CR and LF.
    let mut view = open(b"ab\r\n".repeat(100), 31);
    for n in 1..=101i64 {
        assert_eq!(goto_line(&mut view, n).unwrap(), 4 * (n as u64 - 1), "line {n}");
    }
    for k in 1..=100i64 {
        assert_eq!(goto_line(&mut view, -k).unwrap(), 4 * (100 - k as u64), "line -{k}");
    }
}

#[test]
fn dirty_window_is_refused() {
    let mut view = open(numbered(10), 64);
    view.insert(0, "x").unwrap();
    assert!(matches!(goto_line(&mut view, 3), Err(ViewError::Modified)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_line_start_is_reachable(
        bytes in prop::collection::vec(prop::sample::select(vec![b'a', b'b', b'\r', b'\n']), 1..160),
        batch in 3u64..40,
    ) {
        let text = String::from_utf8(bytes.clone()).unwrap();
        let starts = line_starts(&text);
        let mut view = open(bytes, batch);
        for (i, &start) in starts.iter().enumerate() {
            prop_assert_eq!(goto_line(&mut view, i as i64 + 1).unwrap(), start);
        }
        prop_assert!(goto_line(&mut view, starts.len() as i64 + 1).is_err());

        let back = line_starts(strip_terminator(&text));
        for (k, &start) in back.iter().rev().enumerate() {
            prop_assert_eq!(goto_line(&mut view, -(k as i64 + 1)).unwrap(), start);
        }
        prop_assert!(goto_line(&mut view, -(back.len() as i64 + 1)).is_err());
    }
}
