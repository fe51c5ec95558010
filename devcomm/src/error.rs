use crate::types::{ElementType, Rank};

pub type Result<T> = std::result::Result<T, CommError>;

#[derive(Debug, thiserror::Error)]
pub enum CommError {
    #[error("{operation} requires contiguous buffers, got {what} with shape {shape:?}")]
    Layout {
        operation: &'static str,
        what: &'static str,
        shape: Vec<usize>,
    },

    #[error("unsupported element type {dtype} for the device transport")]
    UnsupportedType { dtype: ElementType },

    #[error("unsupported reduction op {op:?} (expected one of sum, prod, max, min)")]
    UnsupportedOp { op: String },

    #[error("{operation} requires {what} to have {expected} elements in its first dimension, found shape {shape:?}")]
    Shape {
        operation: &'static str,
        what: &'static str,
        expected: usize,
        shape: Vec<usize>,
    },

    #[error("{operation}: buffer size mismatch, expected {expected} elements, got {actual}")]
    SizeMismatch {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{operation}: element type mismatch between input ({input}) and output ({output})")]
    TypeMismatch {
        operation: &'static str,
        input: ElementType,
        output: ElementType,
    },

    #[error("store request for key {key:?} timed out after {timeout_ms}ms")]
    Timeout { key: String, timeout_ms: u64 },

    #[error("key {key:?} not found in store")]
    NotFound { key: String },

    #[error("device transport failure: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("invalid rank {rank}: group size is {world_size}")]
    InvalidRank { rank: Rank, world_size: u32 },

    #[error("invalid group configuration: {reason}")]
    InvalidGroup { reason: String },

    #[error("session bootstrap failed: {reason}")]
    Bootstrap { reason: String },

    #[error("store at {addr} rejected request: {reason}")]
    Store { addr: String, reason: String },

    #[error("message decode failed: {0}")]
    DecodeFailed(String),

    #[error("message encode failed: {0}")]
    EncodeFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommError {
    /// Create a `Transport` error with just a message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a `Transport` error with a message and a source error.
    pub fn transport_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this error was raised by argument validation, before any
    /// store or transport call was issued.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CommError::Layout { .. }
                | CommError::UnsupportedType { .. }
                | CommError::UnsupportedOp { .. }
                | CommError::Shape { .. }
                | CommError::SizeMismatch { .. }
                | CommError::TypeMismatch { .. }
                | CommError::InvalidRank { .. }
        )
    }
}
