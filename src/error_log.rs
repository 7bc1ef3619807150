use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::DeskError;

#[derive(Clone, Debug)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Local>,
    pub context: String,
    pub kind: &'static str,
    pub message: String,
}

impl ErrorLogEntry {
    pub fn from_error(context: impl Into<String>, err: &DeskError) -> Self {
        ErrorLogEntry {
            timestamp: Local::now(),
            context: context.into(),
            kind: err.kind_label(),
            message: err.to_string(),
        }
    }

    fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Append-only JSON-lines journal of failures the desk ran into.
#[derive(Clone, Debug)]
pub struct ErrorLogStore {
    path: PathBuf,
}

impl ErrorLogStore {
    pub fn new(path: PathBuf) -> Self {
        ErrorLogStore { path }
    }

    pub fn record(&self, context: impl Into<String>, err: &DeskError) -> Result<()> {
        self.append(&ErrorLogEntry::from_error(context, err))
    }

    fn append(&self, entry: &ErrorLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        serde_json::to_writer(&mut file, &StoredErrorLogEntry::from(entry))?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

#[derive(Serialize)]
struct StoredErrorLogEntry {
    timestamp_ms: i64,
    context: String,
    kind: &'static str,
    message: String,
}

impl From<&ErrorLogEntry> for StoredErrorLogEntry {
    fn from(entry: &ErrorLogEntry) -> Self {
        StoredErrorLogEntry {
            timestamp_ms: entry.timestamp_ms(),
            context: entry.context.clone(),
            kind: entry.kind,
            message: entry.message.clone(),
        }
    }
}
