use thiserror::Error;

use crate::retry::FailureKind;

pub type EsResult<T> = Result<T, EsError>;

/// Failures surfaced by the client layer.
///
/// Transport problems are classified (see [`FailureKind`]) so callers can
/// distinguish a reset connection from an unresolvable host without string
/// matching on log lines.
#[derive(Debug, Error)]
pub enum EsError {
    #[error("transport failure ({kind:?}): {source}")]
    Transport {
        kind: FailureKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("[{index}][{doc_type}][{id}]: document missing")]
    DocumentMissing {
        index: String,
        doc_type: String,
        id: String,
    },

    #[error("malformed response: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport pool closed")]
    PoolClosed,
}

impl EsError {
    /// The HTTP status carried by this error, if it came from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::DocumentMissing { .. } => Some(404),
            _ => None,
        }
    }

    pub fn is_document_missing(&self) -> bool {
        matches!(self, Self::DocumentMissing { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
