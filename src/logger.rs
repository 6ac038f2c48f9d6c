//! Session logger for the batch tool.
//!
//! One log file per run, truncated when the session opens:
//!   Windows:  `%APPDATA%\vox-compute\vox-compute.log`
//!   Linux:    `$XDG_DATA_HOME/vox-compute/vox-compute.log` (or `~/.local/share`)
//!   macOS:    `~/Library/Application Support/vox-compute/vox-compute.log`
//!
//! Use `log_info!` / `log_warn!` / `log_err!` anywhere in the crate.  Until
//! `init()` runs (library users, tests) lines go nowhere unless stderr echo
//! is switched on with `set_echo(true)`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static SESSION: OnceLock<SessionLog> = OnceLock::new();
static ECHO: AtomicBool = AtomicBool::new(false);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Panic,
}

impl Level {
    pub fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Panic => "PANIC",
        }
    }
}

/// An open log file.  The process-wide session is one of these.
pub struct SessionLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl SessionLog {
    /// Create (or truncate) `path` and write the session banner.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let log = Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        };
        log.append(&format!(
            "=== vox-compute {} session started (unix {}) ===",
            env!("CARGO_PKG_VERSION"),
            unix_secs().unwrap_or(0)
        ));
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one raw line.  I/O errors are dropped so logging never
    /// aborts a batch run.
    pub fn append(&self, line: &str) {
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{}", line);
        }
    }

    pub fn record(&self, level: Level, msg: &str) {
        self.append(&format_line(&timestamp(), level, msg));
    }
}

/// Path of the session log, once `init()` has opened it.
pub fn log_path() -> Option<&'static Path> {
    SESSION.get().map(SessionLog::path)
}

/// Mirror every log line to stderr (used by `--verbose`).
pub fn set_echo(enabled: bool) {
    ECHO.store(enabled, Ordering::Relaxed);
}

/// Backend of the logging macros.
pub fn write(level: Level, msg: &str) {
    let line = format_line(&timestamp(), level, msg);
    if ECHO.load(Ordering::Relaxed) {
        eprintln!("{}", line);
    }
    if let Some(session) = SESSION.get() {
        session.append(&line);
    }
}

fn format_line(ts: &str, level: Level, msg: &str) -> String {
    format!("[{}] [{}] {}", ts, level.tag(), msg)
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*))
    };
}

/// Open the session log and route panics into it.  Call once from `main`.
/// A log file that cannot be opened is reported on stderr and skipped.
pub fn init() {
    let Some(dir) = data_dir() else {
        eprintln!("[logger] No data directory; session log disabled");
        return;
    };
    let path = dir.join("vox-compute").join("vox-compute.log");
    let session = match SessionLog::create(&path) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            return;
        }
    };
    if SESSION.set(session).is_err() {
        return;
    }

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write(Level::Panic, &info.to_string());
        prev(info);
    }));
}

fn env_dir(var: &str) -> Option<PathBuf> {
    std::env::var_os(var).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        env_dir("APPDATA")
    }
    #[cfg(target_os = "macos")]
    {
        env_dir("HOME").map(|h| h.join("Library").join("Application Support"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        env_dir("XDG_DATA_HOME").or_else(|| env_dir("HOME").map(|h| h.join(".local").join("share")))
    }
}

fn unix_secs() -> Option<u64> {
    SystemTime::now().duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

/// HH:MM:SS within the current UTC day.
fn timestamp() -> String {
    match unix_secs() {
        Some(secs) => clock_string(secs),
        None => "??:??:??".to_string(),
    }
}

fn clock_string(secs: u64) -> String {
    let h = (secs % 86400) / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}
