//! JSONL queue file for finalized aggregates
//!
//! One aggregate per line in the downstream wire format. Every publish is
//! flushed so a consumer tailing the file sees each day as soon as it lands.

use super::publisher_backend::{AggregatePublisher, PublishError};
use crate::pipeline::types::FinalizedAggregate;
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct JsonlPublisher {
    file: BufWriter<File>,
    path: PathBuf,
    published: u64,
}

impl JsonlPublisher {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, PublishError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        log::info!("📝 Writing daily aggregates to: {}", path.display());

        Ok(Self {
            file: BufWriter::new(file),
            path: path.to_path_buf(),
            published: 0,
        })
    }

    pub fn write_aggregate(&mut self, aggregate: &FinalizedAggregate) -> Result<(), PublishError> {
        let json = aggregate.to_json()?;
        writeln!(self.file, "{}", json)?;
        self.file.flush()?;

        self.published += 1;
        log::debug!("Appended aggregate #{} to {}", self.published, self.path.display());

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for JsonlPublisher {
    fn drop(&mut self) {
        let _ = self.file.flush();
    }
}

#[async_trait]
impl AggregatePublisher for JsonlPublisher {
    async fn publish(&mut self, aggregate: &FinalizedAggregate) -> Result<(), PublishError> {
        self.write_aggregate(aggregate)
    }

    async fn flush(&mut self) -> Result<(), PublishError> {
        self.file.flush()?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "JSONL"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_jsonl_publish_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue").join("daily.jsonl");

        let mut publisher = JsonlPublisher::new(&path).unwrap();
        publisher
            .publish(&FinalizedAggregate { timestamp: 1000, average_value: 13.9 })
            .await
            .unwrap();
        publisher
            .publish(&FinalizedAggregate { timestamp: 86_401_000, average_value: 7.0 })
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], r#"{"Timestamp":1000,"AveragePM2.5":13.9}"#);

        let second = FinalizedAggregate::from_json(lines[1]).unwrap();
        assert_eq!(second.average_value, 7.0);
    }

    #[tokio::test]
    async fn test_jsonl_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily.jsonl");

        {
            let mut publisher = JsonlPublisher::new(&path).unwrap();
            publisher
                .publish(&FinalizedAggregate { timestamp: 1, average_value: 1.0 })
                .await
                .unwrap();
        }
        let mut publisher = JsonlPublisher::new(&path).unwrap();
        publisher
            .publish(&FinalizedAggregate { timestamp: 2, average_value: 2.0 })
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
        assert_eq!(publisher.backend_type(), "JSONL");
    }
}
