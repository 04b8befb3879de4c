use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

#[derive(Serialize)]
struct FailureRecord<'a> {
    timestamp_ms: i64,
    operation: &'a str,
    message: &'a str,
}

#[derive(Clone, Debug)]
pub struct ErrorLogStore {
    path: PathBuf,
}

impl ErrorLogStore {
    pub fn new(path: PathBuf) -> Self {
        ErrorLogStore { path }
    }

    /// Appends one JSON line naming the failed operation.
    pub fn append_message(&self, operation: &str, message: &str) -> Result<()> {
        let record = FailureRecord {
            timestamp_ms: Local::now().timestamp_millis(),
            operation,
            message,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?,
            _ => {}
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(&line))
            .with_context(|| format!("appending to {}", self.path.display()))
    }
}
