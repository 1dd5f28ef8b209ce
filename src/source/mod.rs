//! Reading sources - the subscription side of the pipeline
//!
//! A source only moves raw payload strings into the ingestion channel.
//! Decoding and validation happen in the ingestion loop, so a source never
//! drops or rewrites a message on its own.

pub mod tail_reader;

pub use tail_reader::{TailReader, TailStart};

use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Where raw reading payloads come from
#[derive(Debug, Clone)]
pub enum ReadingSource {
    /// Newline-delimited payloads on stdin (e.g. piped from a subscriber CLI)
    Stdin,
    /// JSONL file followed as it grows
    Tail { path: PathBuf, start: TailStart },
}

impl ReadingSource {
    /// Pick the source for an optional input path
    pub fn from_input_path(input_path: Option<PathBuf>) -> Self {
        match input_path {
            Some(path) => ReadingSource::Tail { path, start: TailStart::Beginning },
            None => ReadingSource::Stdin,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ReadingSource::Stdin => "stdin".to_string(),
            ReadingSource::Tail { path, .. } => format!("tail {}", path.display()),
        }
    }

    /// Forward payloads into `tx` until the input ends or the channel closes
    ///
    /// Returns the number of payloads forwarded.
    pub async fn run(self, tx: mpsc::Sender<String>) -> std::io::Result<u64> {
        match self {
            ReadingSource::Stdin => {
                let stdin = BufReader::new(tokio::io::stdin());
                forward_lines(stdin, tx).await
            }
            ReadingSource::Tail { path, start } => {
                let mut reader = TailReader::new(path, start);
                reader.start().await?;

                let mut forwarded = 0u64;
                loop {
                    let line = reader.read_line().await?;
                    if tx.send(line).await.is_err() {
                        log::warn!("⚠️  Reading channel closed, stopping tail source");
                        return Ok(forwarded);
                    }
                    forwarded += 1;
                }
            }
        }
    }
}

/// Forward each non-empty line of `reader` into `tx`
pub async fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>) -> std::io::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0u64;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if tx.send(line.to_string()).await.is_err() {
            log::warn!("⚠️  Reading channel closed, stopping line source");
            break;
        }
        forwarded += 1;
    }

    log::info!("Line source finished after {} payloads", forwarded);
    Ok(forwarded)
}
