//! File log for a hive run, kept apart from the console report.
//!
//! Each `hive` invocation truncates `~/.hive/hive.log` and appends one
//! timestamped line per event. What lands where:
//! - ERROR: the command that `main` gives up on
//! - WARN: a role failing without stopping the run. Logger errors and
//!   error acks, planner errors or timeouts that trigger the fallback,
//!   blank assignments dropped from a plan, unknown `parent_id` or
//!   `replaces` targets, two assignments sharing a `file_path`, snapshot
//!   writes that failed, and producer or reviewer panics
//! - INFO: run start and stop reason, one summary line per round
//! - DEBUG: dispatched nodes, per-task outcomes, config and snapshot IO
//! - TRACE: raw stdout of command roles
//!
//! `--debug` or `HIVE_DEBUG=1` lowers the threshold to DEBUG;
//! `HIVE_DEBUG=trace` lowers it to TRACE. Until `init_with_debug` runs
//! every call is a no-op, which keeps library users and unit tests out
//! of the home directory.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::OnceLock;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Severity of a line, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

/// Threshold for the `--debug` flag and the raw `HIVE_DEBUG` value.
fn threshold(flag: bool, env: Option<&str>) -> LogLevel {
    match env.map(|v| v.trim().to_lowercase()).as_deref() {
        Some("trace") => LogLevel::Trace,
        Some("1") | Some("true") | Some("debug") => LogLevel::Debug,
        _ if flag => LogLevel::Debug,
        _ => LogLevel::Info,
    }
}

/// Point the log at a fresh `~/.hive/hive.log` and set the threshold.
///
/// Without a home directory the log stays disabled.
pub fn init_with_debug(debug: bool) {
    let env = std::env::var("HIVE_DEBUG").ok();
    let level = threshold(debug, env.as_deref());
    DEBUG_ENABLED.store(level >= LogLevel::Debug, Ordering::SeqCst);
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);

    if let Some(hive_dir) = dirs::home_dir().map(|h| h.join(".hive")) {
        let _ = std::fs::create_dir_all(&hive_dir);
        let path = hive_dir.join("hive.log");
        let _ = std::fs::write(&path, "");
        LOG_PATH.set(path).ok();
    }
}

pub fn is_debug() -> bool {
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

pub fn get_level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Append `msg` if `level` passes the threshold. IO errors are ignored;
/// the file log never fails a run.
pub fn log_at(level: LogLevel, msg: &str) {
    if level > get_level() {
        return;
    }

    if let Some(path) = LOG_PATH.get() {
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
            let _ = writeln!(file, "[{}] [{}] {}", timestamp, level.as_str(), msg);
        }
    }
}

pub fn log(msg: &str) {
    log_at(LogLevel::Info, msg);
}

pub fn error(msg: &str) {
    log_at(LogLevel::Error, msg);
}

pub fn warn(msg: &str) {
    log_at(LogLevel::Warn, msg);
}

pub fn debug(msg: &str) {
    log_at(LogLevel::Debug, msg);
}

pub fn trace(msg: &str) {
    log_at(LogLevel::Trace, msg);
}

/// `format!`-style INFO line.
#[macro_export]
macro_rules! hlog {
    ($($arg:tt)*) => {
        $crate::log::log(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! hlog_error {
    ($($arg:tt)*) => {
        $crate::log::error(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! hlog_warn {
    ($($arg:tt)*) => {
        $crate::log::warn(&format!($($arg)*))
    };
}

/// Formats even when filtered out; keep arguments cheap.
#[macro_export]
macro_rules! hlog_debug {
    ($($arg:tt)*) => {
        $crate::log::debug(&format!($($arg)*))
    };
}

#[macro_export]
macro_rules! hlog_trace {
    ($($arg:tt)*) => {
        $crate::log::trace(&format!($($arg)*))
    };
}
