//! Append-only JSONL fallback sink: UTF-8, LF terminators, one
//! object per line. Opened in append mode the same way
//! `tutordex_logging::RollingFileAppender` opens its log file — no
//! rotation here since delivery failures are expected to be rare and
//! operator-triaged, not a high-volume stream.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde::Serialize;

use crate::error::DeliveryError;

pub struct JsonlSink {
    file: Mutex<std::fs::File>,
}

impl JsonlSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DeliveryError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Mutex::new(file) })
    }

    pub fn append<T: Serialize>(&self, record: &T) -> Result<(), DeliveryError> {
        let mut line = serde_json::to_string(record).map_err(|e| {
            DeliveryError::Sink(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        line.push('\n');

        let mut file = self.file.lock().unwrap();
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn appends_one_json_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failures.jsonl");
        let sink = JsonlSink::open(&path).unwrap();

        sink.append(&json!({"chat_id": 1, "reason": "timeout"})).unwrap();
        sink.append(&json!({"chat_id": 2, "reason": "rate_limited"})).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with('}'));
    }

    #[test]
    fn reopening_appends_rather_than_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failures.jsonl");
        JsonlSink::open(&path).unwrap().append(&json!({"n": 1})).unwrap();
        JsonlSink::open(&path).unwrap().append(&json!({"n": 2})).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
