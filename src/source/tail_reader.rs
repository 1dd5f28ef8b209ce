//! Follow a JSONL reading capture as a writer appends to it
//!
//! Lines are only handed out once their terminating newline is on disk. A
//! writer that lands one payload in several `write` calls is therefore seen as
//! a single line. Rotation is detected either by a new inode (rename + create)
//! or by the file shrinking below the consumed offset (copy + truncate).

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::time::sleep;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

/// Where to begin reading when the file is first opened
///
/// A rotated file is always read from the beginning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailStart {
    /// Replay everything already in the file
    Beginning,
    /// Only lines appended after opening
    End,
}

/// Open capture file plus what is needed to notice it being replaced
struct OpenCapture {
    reader: BufReader<File>,
    inode: Option<u64>,
    /// Bytes handed out as complete lines, plus the start position
    committed: u64,
}

pub struct TailReader {
    path: PathBuf,
    start: TailStart,
    poll_interval: Duration,
    capture: Option<OpenCapture>,
    /// Bytes of a line whose newline has not been written yet
    pending: Vec<u8>,
}

impl TailReader {
    pub fn new(path: PathBuf, start: TailStart) -> Self {
        Self {
            path,
            start,
            poll_interval: Duration::from_millis(100),
            capture: None,
            pending: Vec::new(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the capture and position it according to `TailStart`
    pub async fn start(&mut self) -> std::io::Result<()> {
        self.reopen(self.start).await
    }

    async fn reopen(&mut self, start: TailStart) -> std::io::Result<()> {
        let file = File::open(&self.path).await?;
        let inode = inode_of(&file.metadata().await?);

        let mut reader = BufReader::new(file);
        let committed = match start {
            TailStart::Beginning => 0,
            TailStart::End => reader.seek(SeekFrom::End(0)).await?,
        };

        if !self.pending.is_empty() {
            log::warn!(
                "⚠️  Discarding {} bytes of unterminated line from previous file",
                self.pending.len()
            );
            self.pending.clear();
        }

        self.capture = Some(OpenCapture { reader, inode, committed });
        log::info!("📖 Tailing {} from {:?}", self.path.display(), start);
        Ok(())
    }

    /// Next complete, non-blank line with surrounding whitespace removed
    ///
    /// Waits for the writer when the file has no complete line available.
    pub async fn read_line(&mut self) -> std::io::Result<String> {
        loop {
            if self.capture.is_none() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} is not open, call start() first", self.path.display()),
                ));
            }

            if self.was_rotated().await? {
                log::info!("🔄 Capture rotated, reopening: {}", self.path.display());
                self.reopen(TailStart::Beginning).await?;
            }

            let Some(capture) = self.capture.as_mut() else {
                continue;
            };

            capture.reader.read_until(b'\n', &mut self.pending).await?;

            if self.pending.last() != Some(&b'\n') {
                // EOF, possibly mid-line: keep what we have and wait for more
                sleep(self.poll_interval).await;
                continue;
            }

            capture.committed += self.pending.len() as u64;
            let line = String::from_utf8_lossy(&self.pending).trim().to_string();
            self.pending.clear();
            if !line.is_empty() {
                return Ok(line);
            }
        }
    }

    async fn was_rotated(&self) -> std::io::Result<bool> {
        let Some(capture) = self.capture.as_ref() else {
            return Ok(false);
        };

        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            // Old file moved away, new one not created yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        let replaced = match (capture.inode, inode_of(&metadata)) {
            (Some(old), Some(current)) => old != current,
            _ => false,
        };
        let consumed = capture.committed + self.pending.len() as u64;
        Ok(replaced || metadata.len() < consumed)
    }
}

#[cfg(unix)]
fn inode_of(metadata: &std::fs::Metadata) -> Option<u64> {
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn inode_of(_metadata: &std::fs::Metadata) -> Option<u64> {
    None
}
