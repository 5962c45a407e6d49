//! Append-only file sink
//!
//! Lines are buffered and flushed on `flush_file_logging` and on every error line.
//! Until `init_file_logging` succeeds, file writes are silently dropped.

use crate::constants::DEFAULT_LOG_PATH;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

static FILE_SINK: Lazy<Mutex<Option<BufWriter<File>>>> = Lazy::new(|| Mutex::new(None));

/// Open the default log file, reporting (but surviving) failures
pub fn init_file_logging() {
    if let Err(e) = init_file_logging_at(Path::new(DEFAULT_LOG_PATH)) {
        eprintln!("Failed to open log file {}: {}", DEFAULT_LOG_PATH, e);
    }
}

/// Open `path` for appending, creating parent directories as needed
pub fn init_file_logging_at(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut sink = FILE_SINK.lock();
    if let Some(previous) = sink.as_mut() {
        let _ = previous.flush();
    }
    *sink = Some(BufWriter::new(file));
    Ok(())
}

pub fn write_to_file(line: &str) {
    let mut sink = FILE_SINK.lock();
    if let Some(writer) = sink.as_mut() {
        let _ = writeln!(writer, "{}", line);
        if line.contains("[ERROR]") {
            let _ = writer.flush();
        }
    }
}

pub fn flush_file_logging() {
    if let Some(writer) = FILE_SINK.lock().as_mut() {
        let _ = writer.flush();
    }
}
