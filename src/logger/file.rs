//! Optional append-only log file

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

static LOG_FILE: OnceCell<Mutex<BufWriter<File>>> = OnceCell::new();

/// Open the log file (append mode), creating parent directories
pub fn init_file_logging(path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                format!("Failed to create log directory '{}': {}", parent.display(), e)
            })?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("Failed to open log file '{}': {}", path.display(), e))?;

    LOG_FILE
        .set(Mutex::new(BufWriter::new(file)))
        .map_err(|_| "File logging already initialized".to_string())
}

/// Write one line; no-op when file logging is off
pub fn write_to_file(line: &str) {
    if let Some(writer) = LOG_FILE.get() {
        let _ = writeln!(writer.lock(), "{}", line);
    }
}

pub fn flush_file_logging() {
    if let Some(writer) = LOG_FILE.get() {
        let _ = writer.lock().flush();
    }
}
