use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable classification of a [`MemoryError`], suitable for wire responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidArgument,
    TypeMismatch,
    Io,
    Corrupt,
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("{op}: {what} not found")]
    NotFound { op: &'static str, what: String },

    #[error("{op}: {what} already exists")]
    AlreadyExists { op: &'static str, what: String },

    #[error("{op}: invalid argument: {reason}")]
    InvalidArgument { op: &'static str, reason: String },

    #[error("{op}: {what} is not {expected}")]
    TypeMismatch {
        op: &'static str,
        what: String,
        expected: &'static str,
    },

    #[error("{op}: I/O failure on {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{op}: {} does not hold a valid profile document: {reason}", path.display())]
    Corrupt {
        op: &'static str,
        path: PathBuf,
        reason: String,
    },
}

impl MemoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::Io { .. } => ErrorKind::Io,
            Self::Corrupt { .. } => ErrorKind::Corrupt,
        }
    }

    pub(crate) fn not_found(op: &'static str, what: impl Into<String>) -> Self {
        Self::NotFound {
            op,
            what: what.into(),
        }
    }

    pub(crate) fn already_exists(op: &'static str, what: impl Into<String>) -> Self {
        Self::AlreadyExists {
            op,
            what: what.into(),
        }
    }

    pub(crate) fn invalid(op: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            op,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
