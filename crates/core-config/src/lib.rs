//! Configuration loading and parsing.
//!
//! Parses `vlf.toml` (or an override path provided by the binary):
//!
//! ```toml
//! [window]
//! batch_size = 1048576   # bytes per window
//!
//! [search]
//! overlap = 1024         # bytes shared by consecutive search windows
//! highlight_ms = 1000    # how long a found match stays highlighted
//!
//! [boundary]
//! probe_depth = 3
//! tolerance = 3
//! sample_size = 24
//! end_extra = 4
//! start_backoff = 4
//! ```
//!
//! Every key is optional. Unknown fields are ignored, and a missing or
//! malformed file yields the defaults. The effective batch size depends on
//! the opened file and is computed by `Config::apply_file_size`.

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

/// Default window size in bytes.
pub const DEFAULT_BATCH_SIZE: u64 = 1024 * 1024;
/// Upper bound of the default search overlap.
pub const MAX_DEFAULT_OVERLAP: u64 = 1024;

#[derive(Debug, Deserialize, Clone)]
pub struct WindowConfig {
    #[serde(default = "WindowConfig::default_batch_size")]
    pub batch_size: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            batch_size: Self::default_batch_size(),
        }
    }
}

impl WindowConfig {
    const fn default_batch_size() -> u64 {
        DEFAULT_BATCH_SIZE
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Explicit overlap; `None` derives it from the batch size.
    #[serde(default)]
    pub overlap: Option<u64>,
    #[serde(default = "SearchConfig::default_highlight_ms")]
    pub highlight_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            overlap: None,
            highlight_ms: Self::default_highlight_ms(),
        }
    }
}

impl SearchConfig {
    const fn default_highlight_ms() -> u64 {
        1000
    }
}

/// Tuning constants of the boundary adjuster.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BoundaryConfig {
    #[serde(default = "BoundaryConfig::default_probe_depth")]
    pub probe_depth: u32,
    #[serde(default = "BoundaryConfig::default_tolerance")]
    pub tolerance: u64,
    #[serde(default = "BoundaryConfig::default_sample_size")]
    pub sample_size: u64,
    #[serde(default = "BoundaryConfig::default_end_extra")]
    pub end_extra: u64,
    #[serde(default = "BoundaryConfig::default_start_backoff")]
    pub start_backoff: u64,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            probe_depth: Self::default_probe_depth(),
            tolerance: Self::default_tolerance(),
            sample_size: Self::default_sample_size(),
            end_extra: Self::default_end_extra(),
            start_backoff: Self::default_start_backoff(),
        }
    }
}

impl BoundaryConfig {
    const fn default_probe_depth() -> u32 {
        3
    }
    const fn default_tolerance() -> u64 {
        3
    }
    const fn default_sample_size() -> u64 {
        24
    }
    const fn default_end_extra() -> u64 {
        4
    }
    const fn default_start_backoff() -> u64 {
        4
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub boundary: BoundaryConfig,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub file: ConfigFile,          // parsed (or default) data
    pub effective_batch_size: u64, // clamped to the opened file
}

impl Default for Config {
    fn default() -> Self {
        Self {
            file: ConfigFile::default(),
            effective_batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("vlf.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("vlf").join("vlf.toml");
    }
    PathBuf::from("vlf.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(Config::default());
    };
    match toml::from_str::<ConfigFile>(&content) {
        Ok(file) => {
            let effective_batch_size = file.window.batch_size.max(1);
            Ok(Config {
                file,
                effective_batch_size,
            })
        }
        Err(e) => {
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
            Ok(Config::default())
        }
    }
}

impl Config {
    /// Clamp the batch size to `[1, max(1, size)]` for a file of `size`
    /// bytes. Returns the effective value.
    pub fn apply_file_size(&mut self, size: u64) -> u64 {
        let raw = self.file.window.batch_size;
        let clamped = raw.clamp(1, size.max(1));
        if clamped != raw {
            info!(target: "config", raw, clamped, file_size = size, "batch_size_clamped");
        }
        self.effective_batch_size = clamped;
        clamped
    }

    pub fn batch_size(&self) -> u64 {
        self.effective_batch_size
    }

    /// Bytes shared by consecutive search windows. Defaults to
    /// `min(1024, batch / 8)` and is always below the batch size.
    pub fn overlap(&self) -> u64 {
        let batch = self.effective_batch_size;
        let overlap = self
            .file
            .search
            .overlap
            .unwrap_or_else(|| MAX_DEFAULT_OVERLAP.min(batch / 8));
        overlap.min(batch.saturating_sub(1))
    }

    pub fn highlight_duration(&self) -> Duration {
        Duration::from_millis(self.file.search.highlight_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, MutexGuard};
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

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert_eq!(cfg.file.window.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(cfg.overlap(), 1024);
        assert_eq!(cfg.file.boundary, BoundaryConfig::default());
    }

    #[test]
    fn parses_window_and_search_sections() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            tmp.path(),
            "[window]\nbatch_size = 4096\n[search]\nhighlight_ms = 250\n[boundary]\nprobe_depth = 5\n",
        )
        .unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.batch_size(), 4096);
        assert_eq!(cfg.overlap(), 512);
        assert_eq!(cfg.highlight_duration(), Duration::from_millis(250));
        assert_eq!(cfg.file.boundary.probe_depth, 5);
        assert_eq!(cfg.file.boundary.tolerance, 3);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[window\nbatch_size = ").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.file.window.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(cfg.batch_size(), DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn explicit_overlap_stays_below_batch() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[window]\nbatch_size = 100\n[search]\noverlap = 400\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.overlap(), 99);
    }

    #[test]
    fn small_file_clamps_batch_and_default_overlap() {
        let mut cfg = Config::default();
        assert_eq!(cfg.apply_file_size(10_000), 10_000);
        assert_eq!(cfg.overlap(), 1024);
        assert_eq!(cfg.apply_file_size(800), 800);
        assert_eq!(cfg.overlap(), 100);
        assert_eq!(cfg.apply_file_size(0), 1);
        assert_eq!(cfg.overlap(), 0);
    }

    #[test]
    fn clamp_logging_uses_config_target() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[window]\nbatch_size = 65536\n").unwrap();
        let mut cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        let (writer, buffer) = BufferWriter::new();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::INFO)
            .with_target(true)
            .with_ansi(false)
            .without_time()
            .with_writer(writer)
            .finish();

        with_default(subscriber, || {
            cfg.apply_file_size(1000);
        });

        let log_output = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(log_output.contains("INFO config:"));
        assert!(log_output.contains("batch_size_clamped"));
        assert_eq!(cfg.batch_size(), 1000);
    }
}
