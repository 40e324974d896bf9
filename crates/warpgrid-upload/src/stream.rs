use bytes::Bytes;
use futures_core::Stream;
use tokio::io::AsyncRead;

use crate::body::{ByteStream, ChunkedBytesStream, EmptyStream, ReaderStream, DEFAULT_CHUNK_SIZE};
use crate::meta::UploadMeta;
use crate::StreamError;

/// One uploaded resource: its metadata and its body as a chunk stream.
///
/// An `UploadStream` is consumed by value, exactly once, by a
/// [`StreamConsumer`](crate::StreamConsumer). The constructors here are the
/// host-side adapters: whatever the host has (a buffered body, an async
/// reader, or its own stream of chunks) becomes the same pull-based
/// [`ByteStream`].
///
/// # Memory Guarantee
///
/// Every source yields one chunk per poll and only when polled. The
/// consumer holds at most one chunk at a time, regardless of body size.
pub struct UploadStream {
    meta: UploadMeta,
    body: ByteStream,
}

impl UploadStream {
    /// Wrap a host-provided chunk stream.
    ///
    /// Any error type convertible into [`StreamError`] is accepted, so
    /// hosts can pass `std::io::Error` streams straight through.
    pub fn new<S, E>(meta: UploadMeta, stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<StreamError> + 'static,
    {
        Self {
            meta,
            body: Box::pin(ErrInto { inner: Box::pin(stream) }),
        }
    }

    /// Wrap a stream that already speaks [`StreamError`].
    pub fn from_byte_stream(meta: UploadMeta, body: ByteStream) -> Self {
        Self { meta, body }
    }

    /// An upload whose body is already in memory, yielded in
    /// [`DEFAULT_CHUNK_SIZE`] zero-copy slices.
    pub fn from_bytes(meta: UploadMeta, body: impl Into<Bytes>) -> Self {
        Self::from_bytes_chunked(meta, body, DEFAULT_CHUNK_SIZE)
    }

    /// Like [`from_bytes()`](UploadStream::from_bytes) with a custom chunk size.
    pub fn from_bytes_chunked(meta: UploadMeta, body: impl Into<Bytes>, chunk_size: usize) -> Self {
        let body = body.into();
        if body.is_empty() {
            return Self::empty(meta);
        }
        Self {
            meta,
            body: Box::pin(ChunkedBytesStream::new(body, chunk_size)),
        }
    }

    /// An upload read from an async reader (a spooled part, stdin, a socket).
    pub fn from_reader<R>(meta: UploadMeta, reader: R, chunk_size: usize) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            meta,
            body: Box::pin(ReaderStream::new(Box::pin(reader), chunk_size)),
        }
    }

    /// An upload with no body.
    pub fn empty(meta: UploadMeta) -> Self {
        Self {
            meta,
            body: Box::pin(EmptyStream),
        }
    }

    pub fn meta(&self) -> &UploadMeta {
        &self.meta
    }

    pub fn into_parts(self) -> (UploadMeta, ByteStream) {
        (self.meta, self.body)
    }
}

/// Maps a host stream's error type into [`StreamError`].
struct ErrInto<E> {
    inner: std::pin::Pin<Box<dyn Stream<Item = Result<Bytes, E>> + Send>>,
}

impl<E: Into<StreamError>> Stream for ErrInto<E> {
    type Item = Result<Bytes, StreamError>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.get_mut()
            .inner
            .as_mut()
            .poll_next(cx)
            .map(|item| item.map(|res| res.map_err(Into::into)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::task::{Context, Poll};

    fn poll_all(upload: UploadStream) -> Vec<Result<Bytes, StreamError>> {
        let (_, mut body) = upload.into_parts();
        let mut items = Vec::new();
        let waker = std::task::Waker::noop();
        let mut cx = Context::from_waker(waker);
        loop {
            match body.as_mut().poll_next(&mut cx) {
                Poll::Ready(Some(item)) => items.push(item),
                Poll::Ready(None) => break,
                Poll::Pending => panic!("should not pend"),
            }
        }
        items
    }

    #[test]
    fn from_bytes_empty_body_yields_nothing() {
        let upload = UploadStream::from_bytes(UploadMeta::default(), Bytes::new());
        assert!(poll_all(upload).is_empty());
    }

    #[test]
    fn from_bytes_small_body_single_chunk() {
        let upload = UploadStream::from_bytes(UploadMeta::default(), vec![1u8; 100]);
        let items = poll_all(upload);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().map(Bytes::len).ok(), Some(100));
    }

    #[test]
    fn from_bytes_chunked_preserves_content() {
        let data: Vec<u8> = (0..=255).cycle().take(10_000).collect();
        let upload = UploadStream::from_bytes_chunked(UploadMeta::default(), data.clone(), 1024);

        let reassembled: Vec<u8> = poll_all(upload)
            .into_iter()
            .flat_map(|item| item.expect("chunk should be Ok").to_vec())
            .collect();
        assert_eq!(reassembled, data);
    }

    #[test]
    fn from_reader_reads_all() {
        let upload = UploadStream::from_reader(UploadMeta::default(), &b"hello world"[..], 4);
        let sizes: Vec<usize> = poll_all(upload)
            .into_iter()
            .map(|item| item.expect("ok").len())
            .collect();
        assert_eq!(sizes, vec![4, 4, 3]);
    }

    struct IoErrAfterOne(bool);

    impl Stream for IoErrAfterOne {
        type Item = Result<Bytes, std::io::Error>;

        fn poll_next(self: std::pin::Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            let this = self.get_mut();
            if this.0 {
                return Poll::Ready(None);
            }
            this.0 = true;
            Poll::Ready(Some(Err(std::io::Error::other("reset"))))
        }
    }

    #[test]
    fn new_converts_host_errors() {
        let upload = UploadStream::new(UploadMeta::default(), IoErrAfterOne(false));
        let items = poll_all(upload);
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(StreamError::Io(_))));
    }

    #[test]
    fn meta_is_carried() {
        let meta = UploadMeta::default().with_filename("a.txt");
        let upload = UploadStream::empty(meta.clone());
        assert_eq!(upload.meta(), &meta);
    }
}
