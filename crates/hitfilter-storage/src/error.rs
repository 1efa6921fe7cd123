//! Storage errors.

use hitfilter_filter::FilterError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerializerError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed filter document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported filter format version {found} (this build reads up to {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("rule #{index}: {reason}")]
    InvalidRule { index: usize, reason: String },

    #[error(transparent)]
    Filter(#[from] FilterError),
}

impl SerializerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SerializerError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SerializerError>;
