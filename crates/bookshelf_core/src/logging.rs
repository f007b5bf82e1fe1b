//! Logging backend for the book store.
//!
//! # Responsibility
//! - Route `log` records to stderr or to a size-rotated file set.
//! - Keep logged values on one line and bounded in length.
//!
//! # Invariants
//! - The backend starts at most once per process; later calls must ask for
//!   the same level and target.
//! - Starting the backend never panics.
//! - Panic payloads are sanitized before they are logged.

use flexi_logger::{
    Cleanup, Criterion, FileSpec, LogSpecification, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Once;

const LOG_BASENAME: &str = "bookshelf";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 4;
const PANIC_TEXT_LIMIT: usize = 200;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: Once = Once::new();

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    Directory(PathBuf),
}

impl LogTarget {
    /// `None` means stderr. A directory must be given as an absolute path.
    fn parse(log_dir: Option<&str>) -> Result<Self, String> {
        let Some(raw) = log_dir else {
            return Ok(Self::Stderr);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("log directory cannot be empty".to_string());
        }
        let dir = Path::new(raw);
        if !dir.is_absolute() {
            return Err(format!("log directory must be absolute, got `{raw}`"));
        }
        Ok(Self::Directory(dir.to_path_buf()))
    }
}

impl Display for LogTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stderr => f.write_str("stderr"),
            Self::Directory(dir) => write!(f, "{}", dir.display()),
        }
    }
}

struct ActiveLogger {
    level: LevelFilter,
    target: LogTarget,
    _handle: LoggerHandle,
}

impl ActiveLogger {
    fn start(level: LevelFilter, target: LogTarget) -> Result<Self, String> {
        let logger = Logger::with(LogSpecification::builder().default(level).build());

        let handle = match &target {
            LogTarget::Stderr => logger
                .log_to_stderr()
                .format(flexi_logger::detailed_format)
                .start(),
            LogTarget::Directory(dir) => {
                std::fs::create_dir_all(dir).map_err(|err| {
                    format!("failed to create log directory `{}`: {err}", dir.display())
                })?;
                logger
                    .log_to_file(
                        FileSpec::default()
                            .directory(dir.as_path())
                            .basename(LOG_BASENAME),
                    )
                    .rotate(
                        Criterion::Size(ROTATE_AT_BYTES),
                        Naming::Numbers,
                        Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
                    )
                    .write_mode(WriteMode::BufferAndFlush)
                    .append()
                    .format_for_files(flexi_logger::detailed_format)
                    .start()
            }
        }
        .map_err(|err| format!("failed to start logger on {target}: {err}"))?;

        install_panic_hook();
        info!(
            "event=logging_init module=core status=ok level={level} target={target} os={} version={}",
            std::env::consts::OS,
            env!("CARGO_PKG_VERSION")
        );

        Ok(Self {
            level,
            target,
            _handle: handle,
        })
    }

    fn check_same(&self, level: LevelFilter, target: &LogTarget) -> Result<(), String> {
        if &self.target != target {
            return Err(format!(
                "logging already writes to `{}`; cannot switch to `{target}`",
                self.target
            ));
        }
        if self.level != level {
            return Err(format!(
                "logging already runs at `{}`; cannot switch to `{level}`",
                self.level
            ));
        }
        Ok(())
    }
}

/// Starts the logging backend.
///
/// `log_dir = None` logs to stderr. Otherwise files named `bookshelf*.log`
/// rotate inside `log_dir`.
///
/// # Errors
/// - `level` is not one of trace|debug|info|warn|error|off.
/// - `log_dir` is empty, relative, or cannot be created.
/// - Logging already runs with another level or target.
pub fn init_logging(level: &str, log_dir: Option<&str>) -> Result<(), String> {
    let level = parse_level(level)?;
    let target = LogTarget::parse(log_dir)?;

    ACTIVE
        .get_or_try_init(|| ActiveLogger::start(level, target.clone()))?
        .check_same(level, &target)
}

/// Active level and target, or `None` before `init_logging` succeeded.
pub fn logging_status() -> Option<(LevelFilter, LogTarget)> {
    ACTIVE
        .get()
        .map(|active| (active.level, active.target.clone()))
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn parse_level(raw: &str) -> Result<LevelFilter, String> {
    let raw = raw.trim();
    let name = if raw.eq_ignore_ascii_case("warning") {
        "warn"
    } else {
        raw
    };
    LevelFilter::from_str(name).map_err(|_| {
        format!("unsupported log level `{raw}`; expected trace|debug|info|warn|error|off")
    })
}

fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let location = info.location().map_or_else(
                || "unknown".to_string(),
                |loc| format!("{}:{}", loc.file(), loc.line()),
            );
            error!(
                "event=panic module=core status=error location={location} payload={}",
                panic_text(info.payload())
            );
            previous(info);
        }));
    });
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    let text = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload");
    sanitize_message(text, PANIC_TEXT_LIMIT)
}

/// Replaces control characters with spaces and cuts after `max_chars`,
/// marking the cut with `...`.
pub(crate) fn sanitize_message(value: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(value.len().min(max_chars + 3));
    for (index, ch) in value.chars().enumerate() {
        if index == max_chars {
            out.push_str("...");
            break;
        }
        out.push(if ch.is_control() { ' ' } else { ch });
    }
    out
}
