//! WarpGrid streaming upload consumer.
//!
//! Consumes an uploaded body of unknown length as a sequence of chunks,
//! without buffering the whole payload, and produces one terminal
//! [`UploadOutcome`]: a persisted file plus a success flag, a byte count,
//! or a digest.
//!
//! # Streaming Model
//!
//! The host turns whatever it has into an [`UploadStream`]: a buffered
//! body (sliced zero-copy), an `AsyncRead`, or its own
//! `Stream<Item = Result<Bytes, E>>`. Metadata comes from the part's
//! headers via [`UploadMeta::from_headers`]. A [`StreamConsumer`] then runs a
//! single left fold over the chunks with an [`Accumulator`]. The stock
//! operations are instantiations of that fold:
//!
//! - [`consume_to_sink`] / [`transfer_to`] write each chunk to a
//!   [`ChunkSink`] and yield `bool`,
//! - [`consume_to_byte_count`] yields the total length,
//! - [`consume_to_digest`] yields length and SHA-256.
//!
//! # Failure Model
//!
//! A sink that cannot take a write, or an upload the host reports as
//! truncated, is a *soft* failure: `Completed(false)`. A stream that cannot
//! be read is a *hard* failure: `Failed(UploadError)`. Partial output is
//! handled by the sink's [`PartialPolicy`]. Cancellation (dropping the
//! future, or [`with_shutdown`]) produces no outcome at all.
//!
//! # Memory Guarantee
//!
//! The fold is pull-based. A chunk is requested only after the previous
//! chunk's step (including its write) has completed, so at most one chunk
//! is held at a time regardless of upload size. Reader-backed streams
//! allocate one chunk buffer up front; hosts should keep chunk sizes at or
//! below [`MAX_CHUNK_SIZE`].

mod accumulate;
mod body;
pub mod config;
mod consumer;
mod error;
mod meta;
mod outcome;
mod shutdown;
mod sink;
mod stream;

pub use accumulate::{
    consume_to_byte_count, consume_to_digest, consume_to_sink, transfer_to, ByteCounter, Digest,
    DigestAccumulator, SinkWriter,
};
pub use body::{ByteStream, DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};
pub use config::UploadConfig;
pub use consumer::{Accumulator, ConsumerState, Step, StreamConsumer};
pub use error::{StreamError, UploadError};
pub use meta::{PartHeader, PartHeaders, UploadMeta};
pub use outcome::UploadOutcome;
pub use shutdown::with_shutdown;
pub use sink::{ChunkSink, FileSink, PartialPolicy, WriterSink};
pub use stream::UploadStream;
