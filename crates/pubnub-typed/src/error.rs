//! Error types for the typed facade.

/// Errors returned by this crate.
///
/// Everything except [`Error::Config`] is a contract violation raised at the
/// adapter boundary: the transport handed over something that is not a
/// usable wire envelope. Service-reported failures never show up here; they
/// travel through the error callback as [`ClientError`](crate::ClientError).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("envelope is null")]
    NullEnvelope,

    #[error("envelope is not a list (got {0})")]
    NotAList(&'static str),

    #[error("envelope has {len} elements, need at least {min}")]
    TooShort { len: usize, min: usize },

    #[error("envelope element {index} is not a map")]
    NotAMap { index: usize },

    #[error("serializer error: {0}")]
    Serializer(#[from] SerializerError),

    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// True for failures caused by a malformed envelope shape.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::NullEnvelope
                | Error::NotAList(_)
                | Error::TooShort { .. }
                | Error::NotAMap { .. }
        )
    }
}

/// Errors produced by a [`JsonPluggable`](crate::JsonPluggable) implementation.
#[derive(Debug, thiserror::Error)]
pub enum SerializerError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, Error>;
