//! The stock accumulators and the operations built on them.

use std::future::{ready, Future};
use std::path::PathBuf;

use bytes::Bytes;
use serde::Serialize;
use sha2::{Digest as _, Sha256};
use tracing::warn;

use crate::consumer::{Accumulator, Step, StreamConsumer};
use crate::sink::{ChunkSink, FileSink, PartialPolicy};
use crate::{StreamError, UploadOutcome, UploadStream};

/// Sums chunk lengths into a single running total.
#[derive(Debug, Default)]
pub struct ByteCounter {
    total: u64,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Accumulator for ByteCounter {
    type Output = u64;

    fn accumulate(&mut self, chunk: Bytes) -> impl Future<Output = Step> + Send {
        self.total += chunk.len() as u64;
        ready(Step::Continue)
    }

    fn finish(self) -> impl Future<Output = u64> + Send {
        ready(self.total)
    }

    fn abandon(self, _err: &StreamError) -> impl Future<Output = Option<u64>> + Send {
        // A count has no soft-failure value; every early end is a failure.
        ready(None)
    }
}

/// Writes each chunk to a sink and reports whether the upload landed.
///
/// The first failed write halts the fold. The terminal value is `true`
/// only if every write and the final commit succeeded; otherwise the sink
/// is aborted (applying its partial-output policy) and the value is
/// `false`. A truncated upload is also `false`. Any other stream error
/// aborts the sink and fails the upload.
pub struct SinkWriter<S> {
    sink: S,
    write_failed: bool,
}

impl<S: ChunkSink> SinkWriter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            write_failed: false,
        }
    }

    async fn discard(&mut self) {
        if let Err(e) = self.sink.abort().await {
            warn!(error = %e, "failed to discard partial upload");
        }
    }
}

impl<S: ChunkSink> Accumulator for SinkWriter<S> {
    type Output = bool;

    async fn accumulate(&mut self, chunk: Bytes) -> Step {
        match self.sink.write_chunk(&chunk).await {
            Ok(()) => Step::Continue,
            Err(e) => {
                warn!(error = %e, len = chunk.len(), "sink write failed");
                self.write_failed = true;
                Step::Halt
            }
        }
    }

    async fn finish(mut self) -> bool {
        if self.write_failed {
            self.discard().await;
            return false;
        }
        match self.sink.commit().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "sink commit failed");
                self.discard().await;
                false
            }
        }
    }

    async fn abandon(mut self, err: &StreamError) -> Option<bool> {
        self.discard().await;
        err.is_incomplete().then_some(false)
    }
}

/// Length and SHA-256 of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Digest {
    pub bytes: u64,
    /// Lowercase hex.
    pub sha256: String,
}

/// Hashes the payload as it streams past.
#[derive(Default)]
pub struct DigestAccumulator {
    hasher: Sha256,
    bytes: u64,
}

impl DigestAccumulator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Accumulator for DigestAccumulator {
    type Output = Digest;

    fn accumulate(&mut self, chunk: Bytes) -> impl Future<Output = Step> + Send {
        self.hasher.update(&chunk);
        self.bytes += chunk.len() as u64;
        ready(Step::Continue)
    }

    fn finish(self) -> impl Future<Output = Digest> + Send {
        ready(Digest {
            bytes: self.bytes,
            sha256: hex::encode(self.hasher.finalize()),
        })
    }

    fn abandon(self, _err: &StreamError) -> impl Future<Output = Option<Digest>> + Send {
        ready(None)
    }
}

/// Write the upload to `sink`, chunk by chunk.
///
/// `Completed(true)` when everything was written and committed,
/// `Completed(false)` when a write or commit failed or the upload was
/// truncated, `Failed` when the stream broke.
pub async fn consume_to_sink<S: ChunkSink>(upload: UploadStream, sink: S) -> UploadOutcome<bool> {
    StreamConsumer::new(upload).fold(SinkWriter::new(sink)).await
}

/// Count the bytes of the upload without keeping any of them.
pub async fn consume_to_byte_count(upload: UploadStream) -> UploadOutcome<u64> {
    StreamConsumer::new(upload).fold(ByteCounter::new()).await
}

/// Hash the upload without keeping any of it.
pub async fn consume_to_digest(upload: UploadStream) -> UploadOutcome<Digest> {
    StreamConsumer::new(upload).fold(DigestAccumulator::new()).await
}

/// Write the upload to a new file at `path`.
///
/// Failing to create the file is a soft failure, like any other write
/// failure.
pub async fn transfer_to(
    upload: UploadStream,
    path: impl Into<PathBuf>,
    policy: PartialPolicy,
) -> UploadOutcome<bool> {
    let path = path.into();
    match FileSink::create(&path, policy).await {
        Ok(sink) => consume_to_sink(upload, sink).await,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not create upload file");
            UploadOutcome::Completed(false)
        }
    }
}
