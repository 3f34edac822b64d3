//! Crate-wide error types.
//!
//! Mirrors [`crate::from_str`]-style error enums: one `thiserror` enum per
//! failure domain, unified here under [`Error`] for callers that just want a
//! single `Result` alias.

use thiserror::Error;

/// The result type returned by the fallible public APIs in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A malformed frame, a sentence missing its `.tag`, or any other violation
/// of the RouterOS API wire protocol. Fatal to the [`crate::connection::Connection`]
/// that observes it.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("sentence missing .tag api-attribute")]
    MissingTag,

    #[error("response sentence for unknown tag {0}")]
    UnknownTag(String),

    #[error("word exceeds maximum encodable length (2^36 - 1 bytes)")]
    WordTooLong,

    #[error("word payload is not valid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("api-attribute key missing '.' prefix: {0}")]
    MissingApiAttributePrefix(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A `!trap` sentence returned by the device for a given request, surfaced
/// with the accumulated trap messages. Also used for the synthetic
/// `"response cancelled"` trap injected by [`crate::connection::Connection::close`].
#[derive(Error, Debug)]
#[error("response error: {messages:?}")]
pub struct ResponseError {
    pub messages: Vec<String>,
}

/// An endpoint/target pair that the translation layer cannot express as a
/// RouterOS static DNS record.
#[derive(Error, Debug)]
#[error("unsupported record type: {0:?}")]
pub struct UnsupportedRecordType(pub crate::endpoint::RecordType);

/// The crate-level error, unifying every failure domain above plus the
/// generic I/O and JSON failures that cross the HTTP boundary.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error(transparent)]
    UnsupportedRecordType(#[from] UnsupportedRecordType),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
