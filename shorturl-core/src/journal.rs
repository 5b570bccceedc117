// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Append-only record log.
//!
//! Every accepted put (and every delete tombstone) is written as one JSON
//! object per line:
//!
//! ```text
//! {"key":"b","url":"https://example.com/a"}
//! {"key":"b","url":"","deleted":true}
//! ```
//!
//! Replay decodes lines until end-of-stream. A truncated or corrupt trailing
//! line is what a crash mid-append leaves behind, so it ends the stream with a
//! warning. A corrupt line followed by more data is a hard load failure.
//!
//! Appends happen on a dedicated task fed by a bounded channel, so `put`
//! never waits on disk.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{JournalError, StoreResult};
use crate::types::Record;

/// Lazy decoder over a newline-delimited record stream.
pub struct RecordReader<R> {
    reader: R,
    path: PathBuf,
    line: usize,
    valid_len: u64,
    unterminated: bool,
    done: bool,
}

impl<R: BufRead> RecordReader<R> {
    /// Wrap a buffered source. `path` is only used in error messages.
    pub fn new(reader: R, path: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            path: path.into(),
            line: 0,
            valid_len: 0,
            unterminated: false,
            done: false,
        }
    }

    /// Bytes covered by the records decoded so far.
    ///
    /// Once the iterator is exhausted this is the length of the intact prefix
    /// of the log; anything after it is a torn tail.
    pub fn valid_len(&self) -> u64 {
        self.valid_len
    }

    /// True when the last decoded record was not followed by a newline.
    ///
    /// Appending to such a log must start with a newline, or the next record
    /// would share its line.
    pub fn unterminated(&self) -> bool {
        self.unterminated
    }

    fn at_eof(&mut self) -> std::io::Result<bool> {
        self.reader.fill_buf().map(|b| b.is_empty())
    }

    fn fail(&mut self, reason: String) -> Option<StoreResult<Record>> {
        self.done = true;
        Some(Err(JournalError::LoadFailed {
            path: self.path.clone(),
            line: self.line,
            reason,
        }
        .into()))
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = StoreResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = Vec::new();
        loop {
            if self.done {
                return None;
            }

            buf.clear();
            let read = match self.reader.read_until(b'\n', &mut buf) {
                Ok(n) => n,
                Err(e) => return self.fail(e.to_string()),
            };
            if read == 0 {
                self.done = true;
                return None;
            }
            self.line += 1;

            let terminated = buf.last() == Some(&b'\n');
            let body = buf.trim_ascii();
            if body.is_empty() && terminated {
                self.valid_len += read as u64;
                continue;
            }

            match serde_json::from_slice::<Record>(body) {
                Ok(record) => {
                    self.valid_len += read as u64;
                    self.unterminated = !terminated;
                    return Some(Ok(record));
                }
                Err(e) => {
                    let at_tail = if terminated {
                        match self.at_eof() {
                            Ok(eof) => eof,
                            Err(io) => return self.fail(io.to_string()),
                        }
                    } else {
                        true
                    };
                    if !at_tail {
                        return self.fail(e.to_string());
                    }
                    tracing::warn!(
                        path = %self.path.display(),
                        line = self.line,
                        bytes = read,
                        error = %e,
                        "Ignoring torn record at end of log"
                    );
                    self.done = true;
                    return None;
                }
            }
        }
    }
}

/// Result of replaying a log file.
#[derive(Debug, Default)]
pub struct Replay {
    /// Records in log order.
    pub records: Vec<Record>,
    /// Length of the intact prefix of the file.
    pub valid_len: u64,
    /// The last record has no trailing newline.
    pub unterminated: bool,
}

/// Record log operations.
pub struct RecordLog;

impl RecordLog {
    /// Replay the log at `path`. A missing file is an empty log.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Replay> {
        let path = path.as_ref();

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Replay::default());
            }
            Err(e) => {
                return Err(JournalError::OpenFailed {
                    path: path.to_path_buf(),
                    source: e,
                }
                .into());
            }
        };

        let mut reader = RecordReader::new(BufReader::new(file), path);
        let records = reader.by_ref().collect::<StoreResult<Vec<_>>>()?;

        Ok(Replay {
            records,
            valid_len: reader.valid_len(),
            unterminated: reader.unterminated(),
        })
    }

    /// Replay the log and open it for appending.
    ///
    /// A torn tail is cut off first, and a final record missing its newline
    /// gets one, so new records always start on a clean line.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<(Vec<Record>, tokio::fs::File)> {
        let path = path.as_ref();
        let replay = Self::load(path)?;

        let open_err = |source| JournalError::OpenFailed {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(open_err)?;

        let on_disk = file.metadata().map_err(open_err)?.len();
        if on_disk > replay.valid_len {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = on_disk - replay.valid_len,
                "Truncating torn tail of record log"
            );
            file.set_len(replay.valid_len).map_err(open_err)?;
        }
        if replay.unterminated {
            tracing::debug!(path = %path.display(), "Terminating last record of log");
            (&file).write_all(b"\n").map_err(open_err)?;
        }

        tracing::info!(
            path = %path.display(),
            records = replay.records.len(),
            "Record log replayed"
        );

        Ok((replay.records, tokio::fs::File::from_std(file)))
    }
}

/// Handle to the background append task.
#[derive(Debug)]
pub struct LogWriter {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<u64>,
}

impl LogWriter {
    /// Spawn the append loop draining `queue` into `sink`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<W>(queue: mpsc::Receiver<Record>, sink: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (shutdown, signal) = oneshot::channel();
        let task = tokio::spawn(append_loop(queue, sink, signal));
        Self { shutdown, task }
    }

    /// Stop accepting records, drain what is queued and wait for the task.
    ///
    /// Returns the number of records written over the writer's lifetime.
    pub async fn shutdown(self) -> StoreResult<u64> {
        // The task may already have exited because every sender was dropped.
        let _ = self.shutdown.send(());
        self.task.await.map_err(|e| {
            JournalError::WriteFailed {
                key: String::new(),
                source: std::io::Error::other(e),
            }
            .into()
        })
    }
}

async fn append_loop<W>(
    mut queue: mpsc::Receiver<Record>,
    mut sink: W,
    mut signal: oneshot::Receiver<()>,
) -> u64
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;

    loop {
        tokio::select! {
            next = queue.recv() => match next {
                Some(record) => {
                    if append(&mut sink, &record).await {
                        written += 1;
                    }
                }
                None => break,
            },
            _ = &mut signal => {
                queue.close();
                while let Some(record) = queue.recv().await {
                    if append(&mut sink, &record).await {
                        written += 1;
                    }
                }
                break;
            }
        }
    }

    if let Err(e) = sink.shutdown().await {
        tracing::warn!(error = %e, "Failed to close record log");
    }
    tracing::debug!(written, "Record log writer stopped");
    written
}

/// Encode and flush one record. Failures are logged and swallowed.
async fn append<W>(sink: &mut W, record: &Record) -> bool
where
    W: AsyncWrite + Unpin,
{
    let result = async {
        let mut line = serde_json::to_vec(record).map_err(std::io::Error::other)?;
        line.push(b'\n');
        sink.write_all(&line).await?;
        sink.flush().await
    }
    .await;

    match result {
        Ok(()) => true,
        Err(source) => {
            let err = JournalError::WriteFailed {
                key: record.key.clone(),
                source,
            };
            tracing::error!(error = %err, "Record not persisted");
            false
        }
    }
}
