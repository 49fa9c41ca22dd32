use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use core_events::{ConfirmReason, NeverConfirm};
use core_file::{FileHandle, MemorySource};
use core_state::{BoundaryAdjuster, ChunkWindow, ViewError};
use core_text::Utf8Codec;
use tracing::Level;
use tracing::subscriber::with_default;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone)]
struct BufferWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl BufferWriter {
    fn new() -> (Self, Arc<Mutex<Vec<u8>>>) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        (Self { inner: buf.clone() }, buf)
    }
}

struct LockedWriter<'a> {
    guard: MutexGuard<'a, Vec<u8>>,
}

impl<'a> Write for LockedWriter<'a> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for BufferWriter {
    type Writer = LockedWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LockedWriter {
            guard: self.inner.lock().expect("log buffer poisoned"),
        }
    }
}

fn capture<F: FnOnce()>(f: F) -> String {
    let (writer, buffer) = BufferWriter::new();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_ansi(false)
        .without_time()
        .with_writer(writer)
        .finish();
    with_default(subscriber, f);
    let out = buffer.lock().unwrap().clone();
    String::from_utf8(out).unwrap()
}

fn window(bytes: Vec<u8>) -> ChunkWindow {
    let file = FileHandle::open(MemorySource::new("log.bin", bytes)).unwrap();
    ChunkWindow::new(
        file,
        Box::new(Utf8Codec),
        Box::new(String::new()),
        BoundaryAdjuster::default(),
    )
}

#[test]
fn undecodable_start_degrades_with_warning() {
    let mut win = window(vec![0xBF; 4096]);
    let output = capture(|| {
        win.move_to(1000, 2000, &mut NeverConfirm).unwrap();
    });
    assert!(output.contains("WARN window.boundary:"), "{output}");
    assert!(output.contains("decode_instability"));
    // Best effort still yields a usable window.
    assert!(win.start() <= 1000);
    assert!(!win.is_empty());
}

#[test]
fn refused_reload_is_logged_and_leaves_window() {
    let mut win = window(b"0123456789".repeat(100));
    win.move_to(0, 100, &mut NeverConfirm).unwrap();
    win.insert(3, "edit").unwrap();
    let before = (win.start(), win.end(), win.text());

    let mut result = None;
    let output = capture(|| {
        result = Some(win.move_to(500, 600, &mut NeverConfirm));
    });
    assert!(matches!(
        result,
        Some(Err(ViewError::Conflict(ConfirmReason::ReloadModified)))
    ));
    assert!(output.contains("INFO window.move:"));
    assert!(output.contains("move_refused"));
    assert_eq!((win.start(), win.end(), win.text()), before);
}
