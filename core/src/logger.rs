//! In-process log sink
//!
//! A full-screen UI owns stdout/stderr, so records go to a bounded ring
//! buffer (shown by the `logs` command) and optionally to a file.

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

const DEFAULT_CAPACITY: usize = 1000;

pub struct DebugLogEntry {
    pub timestamp: String,
    pub level: Level,
    pub module: String,
    pub message: String,
}

impl DebugLogEntry {
    fn line(&self) -> String {
        format!(
            "[{}] [{}] [{}] {}",
            self.timestamp, self.level, self.module, self.message
        )
    }
}

pub struct DebugLogger {
    ring_buffer: VecDeque<DebugLogEntry>,
    max_entries: usize,
    file_path: Option<PathBuf>,
}

impl DebugLogger {
    pub fn new(max_entries: usize) -> Self {
        Self {
            ring_buffer: VecDeque::with_capacity(max_entries),
            max_entries,
            file_path: None,
        }
    }

    pub fn set_file_path(&mut self, path: PathBuf) {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        self.file_path = Some(path);
    }

    pub fn push(&mut self, level: Level, module: &str, message: String) {
        let entry = DebugLogEntry {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            level,
            module: module.to_string(),
            message,
        };

        if let Some(path) = &self.file_path {
            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
                let _ = writeln!(file, "{}", entry.line());
            }
        }

        if self.ring_buffer.len() >= self.max_entries {
            self.ring_buffer.pop_front();
        }
        self.ring_buffer.push_back(entry);
    }

    /// Newest entries first
    pub fn recent(&self, n: usize) -> Vec<String> {
        self.ring_buffer
            .iter()
            .rev()
            .take(n)
            .map(DebugLogEntry::line)
            .collect()
    }
}

struct GlobalLogger {
    inner: Mutex<DebugLogger>,
}

static LOGGER: OnceLock<GlobalLogger> = OnceLock::new();

fn global() -> &'static GlobalLogger {
    LOGGER.get_or_init(|| GlobalLogger {
        inner: Mutex::new(DebugLogger::new(DEFAULT_CAPACITY)),
    })
}

impl Log for GlobalLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Ok(mut logger) = self.inner.lock() {
            logger.push(
                record.level(),
                record.module_path().unwrap_or("notch"),
                record.args().to_string(),
            );
        }
    }

    fn flush(&self) {}
}

/// Install the ring-buffer logger as the `log` backend.
///
/// Calling it twice only updates the file path and level.
pub fn init(file_path: Option<PathBuf>, level: LevelFilter) {
    let logger = global();
    if let (Some(path), Ok(mut inner)) = (file_path, logger.inner.lock()) {
        inner.set_file_path(path);
    }
    let _ = log::set_logger(logger);
    log::set_max_level(level);
}

/// Newest `n` log lines, newest first
pub fn recent(n: usize) -> Vec<String> {
    match global().inner.lock() {
        Ok(logger) => logger.recent(n),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_drops_oldest() {
        let mut logger = DebugLogger::new(2);
        logger.push(Level::Info, "a", "first".to_string());
        logger.push(Level::Info, "a", "second".to_string());
        logger.push(Level::Warn, "b", "third".to_string());

        let recent = logger.recent(10);
        assert_eq!(recent.len(), 2);
        assert!(recent[0].ends_with("third"));
        assert!(recent[1].ends_with("second"));
    }

    #[test]
    fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("debug.log");
        let mut logger = DebugLogger::new(4);
        logger.set_file_path(path.clone());
        logger.push(Level::Debug, "notch_core::session", "hello".to_string());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[DEBUG] [notch_core::session] hello"));
    }
}
