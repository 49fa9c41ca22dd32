//! vlf entrypoint: open a large file through a chunk window, navigate, print
//! the window.
use anyhow::{Context, Result, bail};
use clap::Parser;
use core_actions::{Direction, goto_line, jump_to_chunk, search_str};
use core_config::{Config, load_from};
use core_events::{HighlightRequest, ViewHooks, WindowSnapshot};
use core_file::{DiskFile, FileHandle};
use core_model::FileView;
use core_text::{Buffer, codec_for_label, for_display};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "vlf", version, about = "View a large file one chunk at a time")]
struct Args {
    /// File to open.
    pub path: PathBuf,
    /// Configuration file (overrides discovery of `vlf.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Window size in bytes (overrides `[window] batch_size`).
    #[arg(long)]
    pub batch: Option<u64>,
    /// Text encoding label understood by the WHATWG encoding standard.
    #[arg(long, default_value = "utf-8")]
    pub encoding: String,
    /// Go to this line; negative values count from the end.
    #[arg(long, allow_negative_numbers = true)]
    pub line: Option<i64>,
    /// Search for this regular expression.
    #[arg(long)]
    pub search: Option<String>,
    /// Which match to stop at.
    #[arg(long, default_value_t = 1)]
    pub count: i64,
    /// Search towards the start of the file.
    #[arg(long)]
    pub backward: bool,
    /// Show this 1-based chunk.
    #[arg(long)]
    pub chunk: Option<u64>,
}

/// Reports window changes to the log and remembers the last highlight.
#[derive(Default)]
struct LogHooks {
    last_highlight: std::rc::Rc<std::cell::Cell<Option<HighlightRequest>>>,
}

impl ViewHooks for LogHooks {
    fn chunk_changed(&mut self, snapshot: &WindowSnapshot) {
        debug!(target: "runtime", %snapshot, "chunk_changed");
    }

    fn highlight(&mut self, request: &HighlightRequest) {
        self.last_highlight.set(Some(*request));
    }
}

struct AppStartup;

impl AppStartup {
    /// Log to `./vlf.log`, filtered by `RUST_LOG`. The returned guard flushes
    /// the writer when dropped.
    fn configure_logging() -> Option<WorkerGuard> {
        let log_dir = Path::new(".");
        let file_appender = tracing_appender::rolling::never(log_dir, "vlf.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
            .ok()
            .map(|()| guard)
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }

    fn load_config(args: &Args) -> Result<Config> {
        let mut config = load_from(args.config.clone())?;
        if let Some(batch) = args.batch {
            if batch == 0 {
                bail!("--batch must be at least 1");
            }
            config.file.window.batch_size = batch;
        }
        Ok(config)
    }

    fn open_view(args: &Args, config: Config) -> Result<FileView> {
        let source = DiskFile::open(&args.path)
            .with_context(|| format!("cannot open {}", args.path.display()))?;
        let file = FileHandle::open(source)?;
        let codec = codec_for_label(&args.encoding)?;
        let name = file.name().to_string();
        let view = FileView::with_parts(file, codec, Box::new(Buffer::new(name)), config)?;
        info!(
            target: "runtime.startup",
            path = %args.path.display(),
            size = view.size(),
            batch = view.batch_size(),
            encoding = args.encoding.as_str(),
            "view_opened"
        );
        Ok(view)
    }
}

fn navigate(view: &mut FileView, args: &Args) -> Result<()> {
    if let Some(k) = args.chunk {
        jump_to_chunk(view, k)?;
    }
    if let Some(n) = args.line {
        goto_line(view, n)?;
    }
    if let Some(pattern) = args.search.as_deref() {
        let direction = if args.backward {
            Direction::Backward
        } else {
            Direction::Forward
        };
        let requested = u32::try_from(args.count.max(0)).unwrap_or(u32::MAX);
        search_str(view, pattern, args.count, direction)?.into_result(requested)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let _log_guard = AppStartup::configure_logging();
    AppStartup::install_panic_hook();
    info!(target: "runtime", "startup");

    let args = Args::parse();
    let config = AppStartup::load_config(&args)?;
    let mut view = AppStartup::open_view(&args, config)?;
    let hooks = LogHooks::default();
    let highlight = hooks.last_highlight.clone();
    view.set_hooks(hooks);

    navigate(&mut view, &args)?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", view.snapshot())?;
    if let Some(hl) = highlight.get() {
        writeln!(out, "match [{}-{}) cursor {}", hl.start, hl.end, view.point_offset())?;
    } else if args.line.is_some() {
        writeln!(out, "cursor {}", view.point_offset())?;
    }
    out.write_all(for_display(&view.text()).as_bytes())?;
    out.flush()?;
    info!(target: "runtime", "shutdown");
    Ok(())
}
