//! Failure kinds for a catalog run.
//!
//! Each variant is a distinct outcome a caller can act on: nothing to parse,
//! parse corrupted, or couldn't save.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The compressed catalog could not be opened or read.
    #[error("catalog unavailable at {path:?}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The bzip2 data is corrupt or ends mid-stream.
    #[error("catalog archive is corrupt: {message}")]
    Decompress { message: String },

    /// Structurally invalid markup: mismatched or unclosed tags, bad attributes,
    /// undeclared entities.
    #[error("malformed markup at byte {position}: {message}")]
    MalformedMarkup { position: u64, message: String },

    /// A file descriptor named a book with no committed record.
    #[error("file descriptor {filename:?} refers to book {book_id:?} with no committed record")]
    OrphanFileDescriptor { book_id: String, filename: String },

    /// Writing the persisted catalog failed; the destination was left untouched.
    #[error("failed to persist catalog to {path:?}: {source}")]
    PersistenceFailure {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMarkup {
            position: 0,
            message: message.into(),
        }
    }

    pub fn source_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            source,
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PersistenceFailure {
            path: path.into(),
            source,
        }
    }

    /// Stamps a byte offset onto a markup error raised without one.
    pub(crate) fn at(self, offset: u64) -> Self {
        match self {
            Self::MalformedMarkup { position: 0, message } => Self::MalformedMarkup {
                position: offset,
                message,
            },
            other => other,
        }
    }
}
