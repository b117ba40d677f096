//! Daily log file persistence

use crate::paths;
use chrono::Local;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};

struct FileLogState {
    date: String,
    writer: BufWriter<File>,
}

static FILE_LOG: Lazy<Mutex<Option<FileLogState>>> = Lazy::new(|| Mutex::new(None));

fn open_for_date(date: &str) -> Option<FileLogState> {
    let path = paths::get_logs_directory().join(format!("tokenscout_{}.log", date));
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => Some(FileLogState {
            date: date.to_string(),
            writer: BufWriter::new(file),
        }),
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", path.display(), e);
            None
        }
    }
}

pub fn init_file_logging() {
    if !super::config::get_logger_config().file_logging {
        return;
    }
    let date = Local::now().format("%Y-%m-%d").to_string();
    *FILE_LOG.lock() = open_for_date(&date);
}

/// Append a line, rotating to a new file when the date changes
pub fn write_to_file(line: &str) {
    let mut guard = FILE_LOG.lock();
    let Some(state) = guard.as_mut() else {
        return;
    };

    let today = Local::now().format("%Y-%m-%d").to_string();
    if state.date != today {
        let _ = state.writer.flush();
        match open_for_date(&today) {
            Some(next) => *state = next,
            None => {
                *guard = None;
                return;
            }
        }
    }

    if let Some(state) = guard.as_mut() {
        let _ = writeln!(state.writer, "{}", line);
    }
}

pub fn flush_file_logging() {
    if let Some(state) = FILE_LOG.lock().as_mut() {
        let _ = state.writer.flush();
    }
}
