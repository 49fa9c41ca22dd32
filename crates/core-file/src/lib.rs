//! Byte-source abstraction and file identity.
//!
//! The view never holds more than one window of file bytes. Everything that
//! touches storage goes through [`ByteSource`]: a ranged read plus a
//! size/mtime query. [`DiskFile`] is the real implementation; [`MemorySource`]
//! is a shared in-memory stand-in whose contents can be swapped underneath an
//! open view (used to exercise the externally-modified path).
//!
//! [`FileHandle`] caches size and mtime and counts observed on-disk changes.
//! The window records the change count at its last materialization; a
//! mismatch forces the window onto its full-reload path.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use tracing::debug;

/// Size and modification time of a byte source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub mtime: Option<SystemTime>,
}

/// Ranged access to an arbitrarily large byte stream.
pub trait ByteSource {
    /// Display name (last path component for files).
    fn name(&self) -> &str;

    fn stat(&self) -> io::Result<FileStat>;

    /// Read bytes `[start, end)`. Reads past the end of the source are
    /// truncated, never padded.
    fn read_range(&self, start: u64, end: u64) -> io::Result<Vec<u8>>;
}

/// A file on disk, reopened for every read so no descriptor is held between moves.
#[derive(Debug, Clone)]
pub struct DiskFile {
    path: PathBuf,
    name: String,
}

impl DiskFile {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        if metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            path: path.to_path_buf(),
            name,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for DiskFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn stat(&self) -> io::Result<FileStat> {
        let metadata = std::fs::metadata(&self.path)?;
        Ok(FileStat {
            size: metadata.len(),
            mtime: metadata.modified().ok(),
        })
    }

    fn read_range(&self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        if end <= start {
            return Ok(Vec::new());
        }
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(start))?;
        let mut buf = Vec::with_capacity((end - start) as usize);
        file.take(end - start).read_to_end(&mut buf)?;
        debug!(target: "io", file = %self.path.display(), start, end, read = buf.len(), "read_range");
        Ok(buf)
    }
}

#[derive(Debug, Default)]
struct MemoryData {
    bytes: Vec<u8>,
    generation: u64,
}

/// Shared in-memory byte source. Clones observe the same bytes, so a test can
/// keep one clone and rewrite the "file" while a view owns another.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Arc<Mutex<MemoryData>>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: Arc::new(Mutex::new(MemoryData {
                bytes: bytes.into(),
                generation: 1,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryData> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the contents, advancing the reported modification time.
    pub fn replace(&self, bytes: impl Into<Vec<u8>>) {
        let mut data = self.lock();
        data.bytes = bytes.into();
        data.generation += 1;
    }

    pub fn len(&self) -> u64 {
        self.lock().bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn stat(&self) -> io::Result<FileStat> {
        let data = self.lock();
        Ok(FileStat {
            size: data.bytes.len() as u64,
            mtime: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(data.generation)),
        })
    }

    fn read_range(&self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let data = self.lock();
        let len = data.bytes.len() as u64;
        let s = start.min(len) as usize;
        let e = end.min(len) as usize;
        if s >= e {
            return Ok(Vec::new());
        }
        Ok(data.bytes[s..e].to_vec())
    }
}

/// Immutable file identity plus lazily refreshed size.
pub struct FileHandle {
    source: Box<dyn ByteSource>,
    size: u64,
    mtime: Option<SystemTime>,
    generation: u64,
    visited_generation: u64,
}

impl FileHandle {
    pub fn open(source: impl ByteSource + 'static) -> io::Result<Self> {
        let stat = source.stat()?;
        debug!(target: "io", name = source.name(), size = stat.size, "file_handle_open");
        Ok(Self {
            source: Box::new(source),
            size: stat.size,
            mtime: stat.mtime,
            generation: 0,
            visited_generation: 0,
        })
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    /// Last known total size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn mtime(&self) -> Option<SystemTime> {
        self.mtime
    }

    /// Re-stat the source. When the modification time moved, the cached size
    /// is refreshed. Returns `true` if the source changed since the last call.
    pub fn refresh(&mut self) -> io::Result<bool> {
        let stat = self.source.stat()?;
        if stat.mtime == self.mtime && stat.size == self.size {
            return Ok(false);
        }
        debug!(target: "io", name = self.source.name(), old_size = self.size, new_size = stat.size, "file_changed_on_disk");
        self.size = stat.size;
        self.mtime = stat.mtime;
        self.generation += 1;
        Ok(true)
    }

    /// Whether the materialized content was read after the last observed change.
    pub fn visited_is_current(&self) -> bool {
        self.visited_generation == self.generation
    }

    /// Record that the window now reflects the current on-disk state.
    pub fn mark_visited(&mut self) {
        self.visited_generation = self.generation;
    }

    /// Read `[start, end)`, clamped to the known size.
    pub fn read(&self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let end = end.min(self.size);
        if end <= start {
            return Ok(Vec::new());
        }
        self.source.read_range(start, end)
    }
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("name", &self.source.name())
            .field("size", &self.size)
            .field("mtime", &self.mtime)
            .finish()
    }
}
