//! The single-pass fold over an upload stream.
//!
//! [`StreamConsumer::fold`] drives an [`Accumulator`] through the chunks of
//! one [`UploadStream`]. The driver is an explicit state machine:
//!
//! ```text
//!   AwaitingChunk ──chunk──▶ Writing ──Continue──▶ AwaitingChunk
//!        │                      │
//!        │ end / soft error     │ Halt
//!        ▼                      ▼
//!      Done ◀───────────────── Done
//!
//!   AwaitingChunk ──hard error──▶ Failed
//! ```
//!
//! The next chunk is only polled from `AwaitingChunk`, which is entered
//! after the previous chunk's step has resolved. That is the whole
//! backpressure story: one chunk in flight, in order.

use std::future::{poll_fn, Future};

use bytes::Bytes;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::body::ByteStream;
use crate::meta::UploadMeta;
use crate::shutdown::with_shutdown;
use crate::{StreamError, UploadError, UploadOutcome, UploadStream};

/// Whether the fold should keep pulling chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// Stop consuming. No further chunk is requested and the accumulator
    /// is finished with what it has.
    Halt,
}

/// The combining function of a fold over upload chunks.
///
/// Every future returned here is awaited to completion before the
/// consumer does anything else, so implementations may hold exclusive
/// resources (a file handle) without further synchronization.
pub trait Accumulator: Send + Sized {
    type Output;

    /// Apply one chunk.
    fn accumulate(&mut self, chunk: Bytes) -> impl Future<Output = Step> + Send;

    /// Produce the terminal value after end-of-stream or a [`Step::Halt`].
    fn finish(self) -> impl Future<Output = Self::Output> + Send;

    /// The stream ended with `err` instead of end-of-stream.
    ///
    /// Return `Some` to complete with a value that reports the failure
    /// softly, or `None` to fail the upload with `err`.
    fn abandon(self, err: &StreamError) -> impl Future<Output = Option<Self::Output>> + Send;
}

/// Where the fold driver is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Waiting on the host for the next chunk.
    AwaitingChunk,
    /// Applying the current chunk.
    Writing,
    /// A terminal value was produced.
    Done,
    /// The stream failed; no value exists.
    Failed,
}

impl ConsumerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Legal transitions of the driver.
    pub fn can_advance_to(self, next: Self) -> bool {
        use ConsumerState::*;
        matches!(
            (self, next),
            (AwaitingChunk, Writing)
                | (AwaitingChunk, Done)
                | (AwaitingChunk, Failed)
                | (Writing, AwaitingChunk)
                | (Writing, Done)
        )
    }
}

/// Consumes one upload, exactly once.
pub struct StreamConsumer {
    meta: UploadMeta,
    body: ByteStream,
    state: ConsumerState,
    chunks: u64,
    bytes: u64,
}

impl StreamConsumer {
    pub fn new(upload: UploadStream) -> Self {
        let (meta, body) = upload.into_parts();
        Self {
            meta,
            body,
            state: ConsumerState::AwaitingChunk,
            chunks: 0,
            bytes: 0,
        }
    }

    pub fn meta(&self) -> &UploadMeta {
        &self.meta
    }

    /// Fold every chunk into `acc` and return the terminal outcome.
    ///
    /// If the upload declared a length, a body that runs past it fails at
    /// the offending chunk (before that chunk is applied), and a body that
    /// ends short is reported to the accumulator as
    /// [`StreamError::Incomplete`].
    pub async fn fold<A: Accumulator>(mut self, mut acc: A) -> UploadOutcome<A::Output> {
        let declared = self.meta.declared_len;

        loop {
            let next = poll_fn(|cx| self.body.as_mut().poll_next(cx)).await;
            match next {
                Some(Ok(chunk)) => {
                    let len = chunk.len() as u64;
                    if let Some(expected) = declared.filter(|&limit| self.bytes + len > limit) {
                        return self
                            .stop(acc, StreamError::LengthExceeded { expected })
                            .await;
                    }

                    self.advance(ConsumerState::Writing);
                    let step = acc.accumulate(chunk).await;
                    self.chunks += 1;
                    self.bytes += len;
                    trace!(
                        chunk = self.chunks,
                        len,
                        total = self.bytes,
                        state = ?self.state,
                        "chunk applied"
                    );

                    if step == Step::Halt {
                        debug!(
                            chunks = self.chunks,
                            bytes = self.bytes,
                            "accumulator halted, no further chunks requested"
                        );
                        break;
                    }
                    self.advance(ConsumerState::AwaitingChunk);
                }
                Some(Err(err)) => return self.stop(acc, err).await,
                None => {
                    if let Some(expected) = declared.filter(|&limit| self.bytes < limit) {
                        let err = StreamError::Incomplete {
                            received: self.bytes,
                            expected: Some(expected),
                        };
                        return self.stop(acc, err).await;
                    }
                    break;
                }
            }
        }

        let output = acc.finish().await;
        self.advance(ConsumerState::Done);
        debug!(
            filename = self.meta.filename.as_deref().unwrap_or("-"),
            chunks = self.chunks,
            bytes = self.bytes,
            "upload consumed"
        );
        UploadOutcome::Completed(output)
    }

    /// Like [`fold`](StreamConsumer::fold), but gives up silently once
    /// `shutdown` flips to `true`. Returns `None` on cancellation.
    pub async fn fold_until<A: Accumulator>(
        self,
        acc: A,
        shutdown: watch::Receiver<bool>,
    ) -> Option<UploadOutcome<A::Output>> {
        with_shutdown(self.fold(acc), shutdown).await
    }

    async fn stop<A: Accumulator>(mut self, acc: A, err: StreamError) -> UploadOutcome<A::Output> {
        match acc.abandon(&err).await {
            Some(output) => {
                self.advance(ConsumerState::Done);
                warn!(
                    chunks = self.chunks,
                    bytes = self.bytes,
                    error = %err,
                    "upload ended early"
                );
                UploadOutcome::Completed(output)
            }
            None => {
                self.advance(ConsumerState::Failed);
                warn!(
                    chunks = self.chunks,
                    bytes = self.bytes,
                    error = %err,
                    "upload stream failed"
                );
                UploadOutcome::Failed(UploadError {
                    chunks: self.chunks,
                    bytes: self.bytes,
                    source: err,
                })
            }
        }
    }

    fn advance(&mut self, next: ConsumerState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal consumer transition {:?} -> {next:?}",
            self.state
        );
        self.state = next;
    }
}
