use crate::UploadError;

/// The single terminal result of consuming one upload.
///
/// `Completed` carries the fold's value, which may itself describe a soft
/// failure (a sink reporting `false`). `Failed` means the stream could not
/// be read to its end and no meaningful value exists.
#[derive(Debug)]
#[must_use]
pub enum UploadOutcome<T> {
    Completed(T),
    Failed(UploadError),
}

impl<T> UploadOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&UploadError> {
        match self {
            Self::Completed(_) => None,
            Self::Failed(err) => Some(err),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> UploadOutcome<U> {
        match self {
            Self::Completed(value) => UploadOutcome::Completed(f(value)),
            Self::Failed(err) => UploadOutcome::Failed(err),
        }
    }

    /// Hand the outcome to `?`-style callers: hard failures become `Err`.
    pub fn into_result(self) -> Result<T, UploadError> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Failed(err) => Err(err),
        }
    }
}
