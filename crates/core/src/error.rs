use std::path::PathBuf;

use thiserror::Error;

/// All errors produced by ftutils-core.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed message span (expected \"\\n\\n<label>: <body>\"): {span:?}")]
    MalformedSpan { span: String },

    #[error("role label {label:?} cannot be used as a message boundary")]
    InvalidRole { label: String },

    #[error("invalid record on line {line}: {source}")]
    InvalidRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no transcripts found under {}", root.display())]
    NoTranscripts { root: PathBuf },
}

impl CodecError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
