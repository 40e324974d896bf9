//! Writable destinations for uploaded chunks.
//!
//! A [`ChunkSink`] receives chunks one at a time, in order, and is told
//! how the upload ended: [`commit`](ChunkSink::commit) after the last chunk
//! of a complete upload, [`abort`](ChunkSink::abort) after a failed write,
//! a truncated upload or a broken stream. What happens to partial output
//! on abort (and on cancellation, when the sink is dropped mid-upload) is
//! the sink's [`PartialPolicy`].

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// What to do with partially written output when an upload does not
/// complete successfully.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialPolicy {
    /// Remove partial output.
    #[default]
    Delete,
    /// Leave partial output in place; the caller cleans up.
    Keep,
}

/// A destination that accepts an upload incrementally.
///
/// Each returned future must finish before the consumer requests the next
/// chunk, so implementations never see two writes in flight.
pub trait ChunkSink: Send {
    /// Write one chunk in full.
    fn write_chunk(&mut self, chunk: &[u8]) -> impl Future<Output = io::Result<()>> + Send;

    /// Make everything written so far durable. Called once, after the last
    /// chunk of a complete upload.
    fn commit(&mut self) -> impl Future<Output = io::Result<()>> + Send;

    /// Dispose of partial output according to the sink's policy.
    fn abort(&mut self) -> impl Future<Output = io::Result<()>> + Send {
        std::future::ready(Ok(()))
    }
}

impl<S: ChunkSink> ChunkSink for &mut S {
    fn write_chunk(&mut self, chunk: &[u8]) -> impl Future<Output = io::Result<()>> + Send {
        (**self).write_chunk(chunk)
    }

    fn commit(&mut self) -> impl Future<Output = io::Result<()>> + Send {
        (**self).commit()
    }

    fn abort(&mut self) -> impl Future<Output = io::Result<()>> + Send {
        (**self).abort()
    }
}

/// Adapts any `AsyncWrite` into a sink. Commit flushes; abort is a no-op
/// since a bare writer has nothing to remove.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin + Send> ChunkSink for WriterSink<W> {
    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.writer.write_all(chunk).await
    }

    async fn commit(&mut self) -> io::Result<()> {
        self.writer.flush().await
    }
}

/// A file on local disk receiving an upload.
///
/// The sink owns the file handle for the duration of the upload. On
/// [`abort`](ChunkSink::abort), or when dropped before
/// [`commit`](ChunkSink::commit) (the upload was cancelled), the handle
/// is closed and, under [`PartialPolicy::Delete`], the file is removed.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
    policy: PartialPolicy,
    sync_on_commit: bool,
    written: u64,
    committed: bool,
    released: bool,
}

impl FileSink {
    /// Create (or truncate) the file at `path`.
    pub async fn create(path: impl Into<PathBuf>, policy: PartialPolicy) -> io::Result<Self> {
        let path = path.into();
        let file = File::create(&path).await?;
        Ok(Self::from_file(file, path, policy))
    }

    /// Take ownership of a file the caller already opened at `path`.
    pub fn from_file(file: File, path: impl Into<PathBuf>, policy: PartialPolicy) -> Self {
        Self {
            path: path.into(),
            file: Some(file),
            policy,
            sync_on_commit: true,
            written: 0,
            committed: false,
            released: false,
        }
    }

    /// Whether commit waits for the data to reach the disk (default `true`).
    pub fn sync_on_commit(mut self, sync: bool) -> Self {
        self.sync_on_commit = sync;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> PartialPolicy {
        self.policy
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    fn file_mut(&mut self) -> io::Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("file sink already released"))
    }
}

impl ChunkSink for FileSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        let file = self.file_mut()?;
        file.write_all(chunk).await?;
        // tokio hands writes to a blocking task; wait for it to land so the
        // file never holds less than what the consumer has acknowledged.
        file.flush().await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn commit(&mut self) -> io::Result<()> {
        let sync = self.sync_on_commit;
        let file = self.file_mut()?;
        file.flush().await?;
        if sync {
            file.sync_all().await?;
        }
        self.committed = true;
        debug!(path = %self.path.display(), bytes = self.written, "upload committed");
        Ok(())
    }

    async fn abort(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            // Let any buffered write settle before the handle goes away.
            if let Err(e) = file.flush().await {
                debug!(path = %self.path.display(), error = %e, "flush before abort failed");
            }
        }
        self.released = true;

        match self.policy {
            PartialPolicy::Keep => {
                debug!(path = %self.path.display(), bytes = self.written, "keeping partial upload");
                Ok(())
            }
            PartialPolicy::Delete => match tokio::fs::remove_file(&self.path).await {
                Ok(()) => {
                    debug!(path = %self.path.display(), "removed partial upload");
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            },
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if self.committed || self.released {
            return;
        }
        drop(self.file.take());
        if self.policy == PartialPolicy::Delete {
            // Drop cannot await. A single unlink is short enough to run
            // inline, even on a runtime worker.
            match std::fs::remove_file(&self.path) {
                Ok(()) => debug!(path = %self.path.display(), "removed abandoned upload"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to remove abandoned upload"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writer_sink_collects_in_order() {
        let mut sink = WriterSink::new(Vec::new());
        sink.write_chunk(b"ab").await.unwrap();
        sink.write_chunk(b"cde").await.unwrap();
        sink.commit().await.unwrap();
        assert_eq!(sink.into_inner(), b"abcde");
    }

    async fn write_then_abort<S: ChunkSink>(mut sink: S) {
        sink.write_chunk(b"xy").await.unwrap();
        sink.abort().await.unwrap();
    }

    #[tokio::test]
    async fn mut_ref_forwards_to_sink() {
        let mut sink = WriterSink::new(Vec::new());
        write_then_abort(&mut sink).await;
        assert_eq!(sink.get_ref(), b"xy");
    }

    #[tokio::test]
    async fn file_sink_commit_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");

        let mut sink = FileSink::create(&path, PartialPolicy::Delete).await.unwrap();
        sink.write_chunk(b"hello ").await.unwrap();
        sink.write_chunk(b"world").await.unwrap();
        sink.commit().await.unwrap();
        assert!(sink.is_committed());
        assert_eq!(sink.bytes_written(), 11);
        drop(sink);

        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn file_sink_abort_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.bin");

        let mut sink = FileSink::create(&path, PartialPolicy::Delete).await.unwrap();
        sink.write_chunk(b"half").await.unwrap();
        sink.abort().await.unwrap();

        assert!(!path.exists());
        assert!(sink.write_chunk(b"more").await.is_err());
    }

    #[tokio::test]
    async fn file_sink_abort_keep_leaves_partial_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.bin");

        let mut sink = FileSink::create(&path, PartialPolicy::Keep).await.unwrap();
        sink.write_chunk(b"half").await.unwrap();
        sink.abort().await.unwrap();
        drop(sink);

        assert_eq!(std::fs::read(&path).unwrap(), b"half");
    }

    #[tokio::test]
    async fn file_sink_dropped_uncommitted_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped.bin");

        let mut sink = FileSink::create(&path, PartialPolicy::Delete).await.unwrap();
        sink.write_chunk(b"data").await.unwrap();
        drop(sink);

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn file_sink_abort_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.bin");

        let mut sink = FileSink::create(&path, PartialPolicy::Delete).await.unwrap();
        std::fs::remove_file(&path).unwrap();
        sink.abort().await.unwrap();
    }

    #[test]
    fn partial_policy_defaults_to_delete() {
        assert_eq!(PartialPolicy::default(), PartialPolicy::Delete);
    }
}
