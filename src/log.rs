//! Buffered append-only room logs
//!
//! Every broadcast line is pushed onto the room's queue. Once the queue
//! holds more than `threshold` lines a flush is started on the blocking
//! pool, so delivery to live members never waits on disk.
//!
//! Ordering: a flush takes the writer lock, then drains the whole queue.
//! A failed write puts its batch back at the front of the queue while the
//! writer lock is still held, so no later batch can overtake it.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::LogError;

/// State shared between the room and its in-flight flushes
#[derive(Debug)]
struct LogShared {
    path: PathBuf,
    /// Lines waiting to reach disk, in arrival order
    queue: Mutex<Vec<String>>,
    /// Held for the whole duration of a disk write
    writer: Mutex<()>,
}

impl LogShared {
    fn queue(&self) -> MutexGuard<'_, Vec<String>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write everything queued so far. Returns whether any line was written.
    fn write_queued(&self) -> Result<bool, LogError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let batch = std::mem::take(&mut *self.queue());
        if batch.is_empty() {
            return Ok(false);
        }

        match append_batch(&self.path, &batch) {
            Ok(()) => Ok(true),
            Err(source) => {
                self.queue().splice(0..0, batch);
                Err(LogError::WriteFailed {
                    path: self.path.clone(),
                    source,
                })
            }
        }
    }
}

/// Append one batch: a leading blank line, then the lines joined by `\n`
fn append_batch(path: &Path, lines: &[String]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut chunk = String::from("\n");
    chunk.push_str(&lines.join("\n"));
    file.write_all(chunk.as_bytes())?;
    file.flush()
}

/// Write-behind log of one room
#[derive(Debug)]
pub struct RoomLog {
    shared: Arc<LogShared>,
    threshold: usize,
    in_flight: Vec<JoinHandle<()>>,
}

impl RoomLog {
    /// Create a log writing to `path`, flushing once more than `threshold`
    /// lines are pending
    pub fn new(path: PathBuf, threshold: usize) -> Self {
        Self {
            shared: Arc::new(LogShared {
                path,
                queue: Mutex::new(Vec::new()),
                writer: Mutex::new(()),
            }),
            threshold,
            in_flight: Vec::new(),
        }
    }

    /// Number of lines not yet on disk
    pub fn pending_len(&self) -> usize {
        self.shared.queue().len()
    }

    /// Queue a line, starting a background flush past the threshold
    ///
    /// Must be called from within a tokio runtime.
    pub fn push(&mut self, line: String) {
        let pending = {
            let mut queue = self.shared.queue();
            queue.push(line);
            queue.len()
        };

        if pending > self.threshold {
            self.spawn_flush();
        }
    }

    fn spawn_flush(&mut self) {
        self.in_flight.retain(|handle| !handle.is_finished());

        let shared = Arc::clone(&self.shared);
        let handle = tokio::task::spawn_blocking(move || match shared.write_queued() {
            Ok(true) => debug!("Flushed log {}", shared.path.display()),
            Ok(false) => {}
            Err(e) => warn!("Log flush failed, keeping lines for retry: {}", e),
        });
        self.in_flight.push(handle);
    }

    /// Wait for every background flush started so far
    pub async fn settle(&mut self) {
        for handle in self.in_flight.drain(..) {
            if let Err(e) = handle.await {
                warn!("Log flush task for {} failed: {}", self.shared.path.display(), e);
            }
        }
    }

    /// Synchronously write every pending line
    ///
    /// Blocks the calling thread on disk I/O; meant for shutdown.
    /// Returns whether anything was written.
    pub fn flush_sync(&self) -> Result<bool, LogError> {
        self.shared.write_queued()
    }
}
