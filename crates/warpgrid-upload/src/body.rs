//! Chunk sources for upload bodies.
//!
//! Two adapters turn host-side bodies into pull-based chunk streams:
//! [`ChunkedBytesStream`] slices an already-buffered body without copying
//! (via `Bytes::slice()`), and [`ReaderStream`] pulls fixed-size chunks from
//! any `tokio::io::AsyncRead`. Both yield exactly one chunk per poll and
//! never read ahead of the consumer.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use tokio::io::{AsyncRead, ReadBuf};

use crate::StreamError;

/// Default chunk size for breaking bodies into stream chunks (64 KB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Largest accepted chunk size (16 MB). Reader streams allocate a full
/// chunk up front, so this bounds per-upload memory.
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// A type-erased, fallible async stream of byte chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// Yields a `Bytes` buffer in fixed-size chunks without copying.
///
/// Each `poll_next` returns a single `Bytes::slice()` sharing the original
/// allocation's refcount, so no per-chunk allocation occurs.
pub(crate) struct ChunkedBytesStream {
    buf: Bytes,
    chunk_size: usize,
    offset: usize,
}

impl ChunkedBytesStream {
    pub fn new(buf: Bytes, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk_size must be > 0");
        Self {
            buf,
            chunk_size,
            offset: 0,
        }
    }
}

impl Stream for ChunkedBytesStream {
    type Item = Result<Bytes, StreamError>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.offset >= this.buf.len() {
            return Poll::Ready(None);
        }
        let end = std::cmp::min(this.offset + this.chunk_size, this.buf.len());
        let chunk = this.buf.slice(this.offset..end);
        this.offset = end;
        Poll::Ready(Some(Ok(chunk)))
    }
}

/// Pulls chunks of at most `chunk_size` bytes from an async reader.
///
/// A read is only issued when the consumer polls, so the reader is never
/// ahead of the fold by more than the chunk being yielded. A zero-length
/// read is end-of-stream; a read error is yielded once and ends the stream.
pub(crate) struct ReaderStream<R> {
    reader: Option<R>,
    buf: BytesMut,
    chunk_size: usize,
}

impl<R> ReaderStream<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk_size must be > 0");
        Self {
            reader: Some(reader),
            buf: BytesMut::new(),
            chunk_size,
        }
    }
}

impl<R: AsyncRead + Unpin> Stream for ReaderStream<R> {
    type Item = Result<Bytes, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(reader) = this.reader.as_mut() else {
            return Poll::Ready(None);
        };

        if this.buf.len() < this.chunk_size {
            this.buf.resize(this.chunk_size, 0);
        }
        let mut read_buf = ReadBuf::new(&mut this.buf[..this.chunk_size]);

        match Pin::new(reader).poll_read(cx, &mut read_buf) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(e)) => {
                this.reader = None;
                Poll::Ready(Some(Err(StreamError::Io(e))))
            }
            Poll::Ready(Ok(())) => {
                let n = read_buf.filled().len();
                if n == 0 {
                    this.reader = None;
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(Ok(this.buf.split_to(n).freeze())))
            }
        }
    }
}

/// A fallible stream that immediately returns `None`.
pub(crate) struct EmptyStream;

impl Stream for EmptyStream {
    type Item = Result<Bytes, StreamError>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(None)
    }
}
