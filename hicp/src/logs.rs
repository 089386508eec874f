//! Run log for the analysis pipeline.
//!
//! Entries are echoed to stderr. [`capture`] additionally collects every
//! entry logged by the current thread while a closure runs, so a finished
//! run can attach exactly its own entries to the run report.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

thread_local! {
    static CAPTURED: RefCell<Option<Vec<LogEntry>>> = const { RefCell::new(None) };
}

/// Log level for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Monotonic sequence number
    pub seq: u64,
    pub level: LogLevel,
    pub message: String,
    /// Optional indentation level (for nested logs)
    #[serde(default)]
    pub indent: u8,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self { seq: 0, level, message: message.into(), indent: 0 }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }
}

/// Global run log
pub static RUN_LOG: Lazy<RunLog> = Lazy::new(RunLog::new);

/// Numbers log entries and echoes them to stderr
pub struct RunLog {
    next_seq: AtomicU64,
    quiet: AtomicBool,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            next_seq: AtomicU64::new(0),
            quiet: AtomicBool::new(false),
        }
    }

    /// Record an entry and print it unless quiet
    pub fn log(&self, mut entry: LogEntry) {
        entry.seq = self.next_seq.fetch_add(1, Ordering::SeqCst);

        if !self.quiet.load(Ordering::Relaxed) {
            let prefix = match entry.level {
                LogLevel::Info => "   ",
                LogLevel::Success => "   ✓",
                LogLevel::Warning => "   ⚠️",
            };
            let indent = "   ".repeat(entry.indent as usize);
            eprintln!("{}{} {}", indent, prefix, entry.message);
        }

        CAPTURED.with(|captured| {
            if let Some(entries) = captured.borrow_mut().as_mut() {
                entries.push(entry);
            }
        });
    }

    /// Silence (or restore) the stderr echo. Captured entries are unaffected.
    pub fn set_quiet(&self, quiet: bool) {
        self.quiet.store(quiet, Ordering::Relaxed);
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `f` and return its result with the entries this thread logged meanwhile.
///
/// Nested captures also hand their entries to the enclosing capture.
pub fn capture<T>(f: impl FnOnce() -> T) -> (T, Vec<LogEntry>) {
    let outer = CAPTURED.with(|captured| captured.replace(Some(Vec::new())));
    let result = f();
    let entries = CAPTURED
        .with(|captured| captured.replace(outer))
        .unwrap_or_default();
    CAPTURED.with(|captured| {
        if let Some(outer) = captured.borrow_mut().as_mut() {
            outer.extend(entries.iter().cloned());
        }
    });
    (result, entries)
}

/// Convenient logging functions
pub fn log_info(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::info(msg));
}

pub fn log_success(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::success(msg));
}

pub fn log_warning(msg: impl Into<String>) {
    RUN_LOG.log(LogEntry::warning(msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    RUN_LOG.log(LogEntry::info(msg).with_indent(indent));
}
