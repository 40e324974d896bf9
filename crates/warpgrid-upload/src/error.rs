//! Error types for upload streams.

use thiserror::Error;

/// A failure signalled through the upload stream itself.
///
/// Hosts yield this as the error item of `Stream<Item = Result<Bytes, StreamError>>`.
/// Everything except [`StreamError::Incomplete`] is a transport-level
/// malfunction and ends a fold with [`UploadOutcome::Failed`](crate::UploadOutcome::Failed).
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("read error: {0}")]
    Io(#[from] std::io::Error),

    /// The body ended before the whole upload arrived.
    #[error("upload incomplete: received {received} bytes{}", expected_suffix(.expected))]
    Incomplete {
        received: u64,
        expected: Option<u64>,
    },

    /// The body carried more bytes than its declared length.
    #[error("upload exceeded declared length of {expected} bytes")]
    LengthExceeded { expected: u64 },
}

impl StreamError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Whether the host reported a truncated upload rather than a broken stream.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete { .. })
    }
}

fn expected_suffix(expected: &Option<u64>) -> String {
    match expected {
        Some(n) => format!(" of {n}"),
        None => String::new(),
    }
}

impl From<String> for StreamError {
    fn from(s: String) -> Self {
        Self::Transport(s)
    }
}

impl From<&str> for StreamError {
    fn from(s: &str) -> Self {
        Self::Transport(s.to_string())
    }
}

/// Hard failure of an upload: the stream could not be read to the end.
#[derive(Debug, Error)]
#[error("upload stream failed after {chunks} chunks ({bytes} bytes)")]
pub struct UploadError {
    /// Chunks received before the failure.
    pub chunks: u64,
    /// Bytes received before the failure.
    pub bytes: u64,
    #[source]
    pub source: StreamError,
}

impl UploadError {
    pub fn stream_error(&self) -> &StreamError {
        &self.source
    }
}
