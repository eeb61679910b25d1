//! JSONL event sink - append-only writer
//!
//! One file per UTC day (`YYYY-MM-DD.jsonl`), one [`EventRecord`] per line.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use multiguard_core::{Clock, EventSink, GuardEvent, SystemClock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EventError;

/// A logged guard event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub event: GuardEvent,
}

#[derive(Default)]
struct Writer {
    current_file: Option<BufWriter<File>>,
    current_date: Option<String>,
}

/// Append-only JSONL event log
pub struct JsonlEventSink {
    base_path: PathBuf,
    clock: Arc<dyn Clock>,
    writer: Mutex<Writer>,
}

impl JsonlEventSink {
    /// Create a sink writing under `base_path`, creating it if needed
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self, EventError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;

        Ok(Self {
            base_path,
            clock: Arc::new(SystemClock),
            writer: Mutex::new(Writer::default()),
        })
    }

    /// Timestamp records (and pick their file) from `clock`
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Append an event, returning the stored record
    pub fn append(&self, event: GuardEvent) -> Result<EventRecord, EventError> {
        let record = EventRecord {
            id: Uuid::new_v4(),
            recorded_at: self.clock.now(),
            event,
        };
        let date = record.recorded_at.format("%Y-%m-%d").to_string();
        let json = serde_json::to_string(&record)?;

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        // Rotate file if date changed
        if writer.current_date.as_ref() != Some(&date) {
            self.rotate_file(&mut writer, &date)?;
        }

        if let Some(ref mut file) = writer.current_file {
            writeln!(file, "{}", json)?;
            file.flush()?;
        }

        Ok(record)
    }

    fn rotate_file(&self, writer: &mut Writer, date: &str) -> Result<(), EventError> {
        if let Some(ref mut file) = writer.current_file {
            file.flush()?;
        }

        let file_path = self.file_path(date);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)?;

        tracing::debug!(path = %file_path.display(), "Event log rotated");
        writer.current_file = Some(BufWriter::new(file));
        writer.current_date = Some(date.to_string());
        Ok(())
    }

    fn file_path(&self, date: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", date))
    }

    /// Path of the file records stamped now would go to
    pub fn current_file_path(&self) -> PathBuf {
        self.file_path(&self.clock.now().format("%Y-%m-%d").to_string())
    }

    /// List all JSONL files in the log, oldest first
    pub fn list_files(&self) -> Result<Vec<PathBuf>, EventError> {
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "jsonl") {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Flush and close the current file
    pub fn close(&self) -> Result<(), EventError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(ref mut file) = writer.current_file {
            file.flush()?;
        }
        *writer = Writer::default();
        Ok(())
    }
}

impl EventSink for JsonlEventSink {
    fn emit(&self, event: GuardEvent) {
        let name = event.name();
        if let Err(e) = self.append(event) {
            // Hooks cannot fail on audit I/O
            tracing::error!(event = name, error = %e, "Failed to append guard event");
        }
    }
}

impl Drop for JsonlEventSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use multiguard_core::{Address, ManualClock};
    use tempfile::TempDir;

    fn added(label: &str) -> GuardEvent {
        GuardEvent::GuardAdded {
            account: Address::from_label("safe"),
            guard: Address::from_label(label),
        }
    }

    #[test]
    fn test_append_writes_json_line() {
        let dir = TempDir::new().unwrap();
        let sink = JsonlEventSink::new(dir.path()).unwrap();

        let record = sink.append(added("g1")).unwrap();
        let content = fs::read_to_string(sink.current_file_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines.len(), 1);
        let parsed: EventRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, record);
        assert!(lines[0].contains(r#""type":"guard_added""#));
    }

    #[test]
    fn test_daily_rotation() {
        let dir = TempDir::new().unwrap();
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let sink = JsonlEventSink::new(dir.path())
            .unwrap()
            .with_clock(clock.clone());

        sink.append(added("g1")).unwrap();
        clock.advance(Duration::hours(2));
        sink.append(added("g2")).unwrap();
        sink.append(added("g3")).unwrap();

        let files = sink.list_files().unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("2026-03-01.jsonl"));
        assert!(files[1].ends_with("2026-03-02.jsonl"));
        assert_eq!(fs::read_to_string(&files[1]).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_sink_reopens_after_close() {
        let dir = TempDir::new().unwrap();
        let sink = JsonlEventSink::new(dir.path()).unwrap();

        sink.emit(added("g1"));
        sink.close().unwrap();
        sink.emit(added("g2"));

        let content = fs::read_to_string(sink.current_file_path()).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_new_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("audit").join("guards");
        let sink = JsonlEventSink::new(&nested).unwrap();

        assert!(nested.is_dir());
        assert_eq!(sink.base_path(), nested.as_path());
        assert!(sink.list_files().unwrap().is_empty());
    }
}
