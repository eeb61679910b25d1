//! JSONL event reader - sequential replay of the audit log

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use multiguard_core::Address;

use crate::error::EventError;
use crate::store::EventRecord;

/// Sequential event reader
pub struct EventReader {
    files: Vec<PathBuf>,
}

impl EventReader {
    /// Create a reader over every `.jsonl` file in a directory
    pub fn from_directory(path: impl AsRef<Path>) -> Result<Self, EventError> {
        let path = path.as_ref();
        let mut files = Vec::new();

        if path.exists() {
            for entry in std::fs::read_dir(path)? {
                let file_path = entry?.path();
                if file_path.extension().is_some_and(|ext| ext == "jsonl") {
                    files.push(file_path);
                }
            }
        }

        files.sort();

        Ok(Self { files })
    }

    /// Read all records from all files in order
    pub fn read_all(&self) -> Result<Vec<EventRecord>, EventError> {
        let mut records = Vec::new();

        for file_path in &self.files {
            let reader = BufReader::new(File::open(file_path)?);

            for (idx, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let record: EventRecord =
                    serde_json::from_str(&line).map_err(|e| EventError::InvalidLine {
                        file: file_path.display().to_string(),
                        line: idx + 1,
                        reason: e.to_string(),
                    })?;
                records.push(record);
            }
        }

        Ok(records)
    }

    /// Records belonging to one account, in log order
    pub fn for_account(&self, account: &Address) -> Result<Vec<EventRecord>, EventError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.event.account() == account)
            .collect())
    }

    /// Get the most recent record
    pub fn last_record(&self) -> Result<Option<EventRecord>, EventError> {
        Ok(self.read_all()?.pop())
    }

    /// Count total records across all files
    pub fn count(&self) -> Result<usize, EventError> {
        let mut count = 0;

        for file_path in &self.files {
            let reader = BufReader::new(File::open(file_path)?);
            for line in reader.lines() {
                if !line?.trim().is_empty() {
                    count += 1;
                }
            }
        }

        Ok(count)
    }
}
